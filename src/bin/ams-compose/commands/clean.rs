//! `ams-compose clean` command

use ams_compose::core::lock::ValidationStatus;
use ams_compose::{Installer, Result};

pub fn execute() -> Result<()> {
    let installer = Installer::new(std::env::current_dir()?);
    let report = installer.clean()?;

    if report.removed_mirrors.is_empty() {
        println!("No unused mirrors found");
    } else {
        println!("Removed {} unused mirrors", report.removed_mirrors.len());
    }
    if report.removed_invalid > 0 {
        println!("Removed {} invalid mirror directories", report.removed_invalid);
    }

    if report.removed_orphans.is_empty() {
        println!("No orphaned libraries found");
    } else {
        println!(
            "Removed {} orphaned libraries from lockfile:",
            report.removed_orphans.len()
        );
        for name in &report.removed_orphans {
            println!("  {name}");
        }
    }

    let issues: Vec<(&String, &str)> = report
        .validation
        .iter()
        .filter(|(_, entry)| entry.validation_status != ValidationStatus::Valid)
        .map(|(name, entry)| (name, entry.validation_status.as_str()))
        .collect();

    if issues.is_empty() {
        println!("All {} libraries are valid", report.validation.len());
    } else {
        println!("Found {} remaining issues:", issues.len());
        for (name, status) in issues {
            println!("  {name}: {status}");
        }
    }
    Ok(())
}

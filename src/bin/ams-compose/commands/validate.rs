//! `ams-compose validate` command

use ams_compose::core::lock::ValidationStatus;
use ams_compose::{Error, Installer, Result};
use indexmap::IndexMap;

use crate::commands::{print_section, StatusContext};

pub fn execute() -> Result<()> {
    let installer = Installer::new(std::env::current_dir()?);

    let manifest = installer.load_manifest()?;
    println!("Configuration valid: {} libraries defined", manifest.imports.len());

    let results = installer.validate_installation()?;
    let total = results.len();

    let mut valid = IndexMap::new();
    let mut orphaned = IndexMap::new();
    let mut issues = IndexMap::new();
    for (name, entry) in results {
        match entry.validation_status {
            ValidationStatus::Valid => valid.insert(name, entry),
            ValidationStatus::Orphaned => orphaned.insert(name, entry),
            _ => issues.insert(name, entry),
        };
    }

    if !issues.is_empty() {
        print_section(&issues, "Invalid libraries", None, true, StatusContext::Validate);
        println!();
    }
    print_section(
        &orphaned,
        "Orphaned libraries (not in manifest)",
        None,
        true,
        StatusContext::Validate,
    );
    print_section(
        &valid,
        "Valid libraries",
        Some("All libraries are valid"),
        true,
        StatusContext::Validate,
    );

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::ValidationFailed {
            failed: issues.len(),
            total,
        })
    }
}

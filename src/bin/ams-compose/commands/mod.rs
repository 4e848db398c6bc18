//! Subcommand implementations and shared report rendering.

pub mod clean;
pub mod init;
pub mod install;
pub mod list;
pub mod validate;

use ams_compose::core::lock::{InstallStatus, LockEntry, ValidationStatus};
use indexmap::IndexMap;

/// Which status field takes priority in a report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusContext {
    Install,
    Validate,
    List,
}

/// Print libraries in the tabular report format:
///
/// `name | commit:<8hex> | ref:<ref> | license:<type> | status:<status>`
///
/// with `↳` continuation lines for license changes and `⚠` lines for
/// license warnings.
pub fn print_tabular(
    libraries: &IndexMap<String, LockEntry>,
    show_status: bool,
    context: StatusContext,
) {
    if libraries.is_empty() {
        return;
    }

    let name_width = libraries.keys().map(String::len).max().unwrap_or(0);
    let ref_width = libraries
        .values()
        .map(|entry| entry.reference.len())
        .max()
        .unwrap_or(0);
    let license_width = libraries
        .values()
        .map(|entry| entry.license.as_deref().unwrap_or("None").len())
        .max()
        .unwrap_or(0);

    for (name, entry) in libraries {
        let commit = &entry.commit[..entry.commit.len().min(8)];
        let license = entry.license.as_deref().unwrap_or("None");

        if show_status {
            let status = status_for(entry, context);
            println!(
                "{name:<name_width$} | commit:{commit} | ref:{:<ref_width$} | license:{license:<license_width$} | status:{status}",
                entry.reference
            );

            if let Some(change) = &entry.license_change {
                println!("  ↳ {change}");
            }
            if disagreeing_install_status(entry, context) {
                println!("  ↳ last install status: {}", entry.install_status.as_str());
            }
            if let Some(warning) = &entry.license_warning {
                println!("  ⚠ WARNING: {warning}");
            }
        } else {
            println!(
                "{name:<name_width$} | commit:{commit} | ref:{:<ref_width$} | license:{license}",
                entry.reference
            );
        }
    }
}

/// Print a titled section of libraries, or an empty-set message.
pub fn print_section(
    libraries: &IndexMap<String, LockEntry>,
    title: &str,
    empty_message: Option<&str>,
    show_status: bool,
    context: StatusContext,
) {
    if libraries.is_empty() {
        if let Some(message) = empty_message {
            println!("{message}");
        }
        return;
    }

    println!("{title} ({}):", libraries.len());
    print_tabular(libraries, show_status, context);
}

/// Context-aware status selection: validation results prefer
/// `validation_status`, install and list output prefer `install_status`,
/// each falling back to the other.
fn status_for(entry: &LockEntry, context: StatusContext) -> &'static str {
    let install = (!entry.install_status.is_unknown()).then(|| entry.install_status.as_str());
    let validation =
        (!entry.validation_status.is_unknown()).then(|| entry.validation_status.as_str());

    match context {
        StatusContext::Validate => validation.or(install).unwrap_or("unknown"),
        StatusContext::Install | StatusContext::List => install.or(validation).unwrap_or("unknown"),
    }
}

/// Whether the two status fields tell different stories and the secondary
/// one deserves a continuation line.
fn disagreeing_install_status(entry: &LockEntry, context: StatusContext) -> bool {
    context == StatusContext::Validate
        && entry.install_status != InstallStatus::Unknown
        && matches!(
            entry.validation_status,
            ValidationStatus::Modified | ValidationStatus::Missing | ValidationStatus::Error
        )
}

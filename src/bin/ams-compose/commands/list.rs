//! `ams-compose list` command

use ams_compose::{Installer, Result};

use crate::commands::{print_section, StatusContext};

pub fn execute() -> Result<()> {
    let installer = Installer::new(std::env::current_dir()?);
    let installed = installer.list_installed()?;

    print_section(
        &installed,
        "Installed libraries",
        Some("No libraries installed"),
        false,
        StatusContext::List,
    );
    Ok(())
}

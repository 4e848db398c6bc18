//! `ams-compose install` command

use ams_compose::{Installer, Result};

use crate::cli::InstallArgs;
use crate::commands::{print_section, StatusContext};

pub fn execute(args: InstallArgs) -> Result<()> {
    let installer = Installer::new(std::env::current_dir()?);

    let names = (!args.libraries.is_empty()).then_some(args.libraries.as_slice());
    match names {
        Some(names) => println!("Installing libraries: {}", names.join(", ")),
        None => println!("Installing all libraries from ams-compose.yaml"),
    }

    let outcome = installer.install_all(names, args.force, args.check_remote_updates)?;

    print_section(
        &outcome.up_to_date,
        "Up-to-date libraries",
        None,
        true,
        StatusContext::Install,
    );
    if !outcome.up_to_date.is_empty() && !outcome.changed.is_empty() {
        println!();
    }
    print_section(
        &outcome.changed,
        "Processed libraries",
        None,
        true,
        StatusContext::Install,
    );

    if outcome.changed.is_empty() && outcome.up_to_date.is_empty() {
        println!("No libraries to install");
    }
    Ok(())
}

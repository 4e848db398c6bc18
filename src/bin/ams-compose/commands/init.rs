//! `ams-compose init` command

use ams_compose::ops::init::scaffold_manifest;
use ams_compose::Result;

use crate::cli::InitArgs;

pub fn execute(args: InitArgs) -> Result<()> {
    let project_root = std::env::current_dir()?;
    let manifest_path = scaffold_manifest(&project_root, &args.library_root, args.force)?;

    println!("Initialized ams-compose project in {}", project_root.display());
    println!(
        "Edit {} to add library dependencies, then run `ams-compose install`",
        manifest_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| manifest_path.display().to_string())
    );
    Ok(())
}

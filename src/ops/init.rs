//! Project scaffolding for `ams-compose init`.

use std::path::{Path, PathBuf};

use crate::core::config::MANIFEST_FILE_NAME;
use crate::error::{Error, Result};
use crate::util::fs as fsutil;

/// Write a commented template manifest and create the library root.
///
/// Refuses to overwrite an existing manifest unless `force` is set.
pub fn scaffold_manifest(project_root: &Path, library_root: &str, force: bool) -> Result<PathBuf> {
    let manifest_path = project_root.join(MANIFEST_FILE_NAME);
    if manifest_path.exists() && !force {
        return Err(Error::Config(format!(
            "{MANIFEST_FILE_NAME} already exists (use --force to overwrite)"
        )));
    }

    fsutil::ensure_dir(&project_root.join(library_root))?;

    let template = format!(
        r#"# ams-compose configuration
#
# Declare upstream design repositories under `imports`, then run
# `ams-compose install` to fetch them.

# Default directory where libraries are installed
library_root: {library_root}

# Library imports - add your dependencies here
imports: {{}}
#  my_analog_lib:
#    repo: https://github.com/example/analog-library.git
#    ref: main                  # branch, tag, or commit SHA
#    source_path: lib/analog    # path within the repository ("." for all)
#    # local_path: custom/path  # optional: override the library_root location
#    # checkin: false           # optional: keep out of version control
#    # ignore_patterns:         # optional: extra gitignore-style filters
#    #   - "*.raw"
"#
    );

    std::fs::write(&manifest_path, template)?;
    tracing::info!("initialized {}", manifest_path.display());
    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Manifest;
    use tempfile::TempDir;

    #[test]
    fn test_scaffold_creates_manifest_and_library_root() {
        let tmp = TempDir::new().unwrap();

        let path = scaffold_manifest(tmp.path(), "designs/libs", false).unwrap();
        assert!(path.exists());
        assert!(tmp.path().join("designs/libs").is_dir());

        // The template parses as a valid empty manifest.
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.library_root, "designs/libs");
        assert!(manifest.imports.is_empty());
    }

    #[test]
    fn test_scaffold_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        scaffold_manifest(tmp.path(), "libs", false).unwrap();

        let err = scaffold_manifest(tmp.path(), "libs", false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // --force overwrites.
        scaffold_manifest(tmp.path(), "other/libs", true).unwrap();
        let manifest = Manifest::load(&tmp.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest.library_root, "other/libs");
    }
}

//! Installation validation.

use indexmap::IndexMap;

use crate::core::lock::{LockEntry, Lockfile, ValidationStatus};
use crate::error::Result;
use crate::extract::license::compatibility_warning;
use crate::extract::ChecksumBasis;
use crate::ops::Installer;
use crate::util::paths;

impl Installer {
    /// Classify every lockfile entry against the manifest and the disk.
    ///
    /// Statuses: `valid` (checksum matches), `modified` (checksum differs),
    /// `missing` (destination gone), `orphaned` (no manifest entry),
    /// `error` (confinement or I/O failure). Never mutates any state.
    pub fn validate_installation(&self) -> Result<IndexMap<String, LockEntry>> {
        let manifest = self.load_manifest()?;

        let lockfile_path = self.lockfile_path();
        if !lockfile_path.exists() {
            return Ok(IndexMap::new());
        }
        let lockfile = Lockfile::load(&lockfile_path)?;

        let mut results = IndexMap::new();
        for (name, entry) in &lockfile.libraries {
            let mut decorated = entry.clone();
            decorated.validation_status = if !manifest.imports.contains_key(name) {
                ValidationStatus::Orphaned
            } else {
                self.validate_entry(entry)
            };
            decorated.license_warning =
                compatibility_warning(decorated.detected_license.as_deref());
            tracing::debug!("validate: {name} -> {}", decorated.validation_status.as_str());
            results.insert(name.clone(), decorated);
        }
        Ok(results)
    }

    fn validate_entry(&self, entry: &LockEntry) -> ValidationStatus {
        let candidate = self.project_root().join(&entry.local_path);
        let installed = match paths::confine_to_project(self.project_root(), &candidate) {
            Ok(path) => path,
            Err(_) => return ValidationStatus::Error,
        };

        if !installed.exists() {
            return ValidationStatus::Missing;
        }

        let recomputed = self.extractor().installed_checksum(
            &installed,
            ChecksumBasis {
                ignore_patterns: &entry.ignore_patterns,
                checkin: entry.checkin,
            },
        );

        if recomputed.is_empty() {
            ValidationStatus::Error
        } else if recomputed == entry.checksum {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Modified
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;
    use std::fs;
    use tempfile::TempDir;

    fn installed_project() -> (TempDir, Installer, fixtures::FixtureRepo) {
        let upstream = fixtures::basic_repo();
        let tmp = TempDir::new().unwrap();
        let manifest = format!(
            "library_root: designs/libs\nimports:\n  amp_lib:\n    repo: {}\n    ref: main\n    source_path: lib/amplifiers\n",
            upstream.url
        );
        fs::write(tmp.path().join("ams-compose.yaml"), manifest).unwrap();
        let installer = Installer::new(tmp.path().to_path_buf());
        installer.install_all(None, false, false).unwrap();
        (tmp, installer, upstream)
    }

    #[test]
    fn test_valid_after_install() {
        let (_tmp, installer, _upstream) = installed_project();
        let results = installer.validate_installation().unwrap();
        assert_eq!(results["amp_lib"].validation_status, ValidationStatus::Valid);
    }

    #[test]
    fn test_modified_after_local_edit() {
        let (tmp, installer, _upstream) = installed_project();
        fs::write(tmp.path().join("designs/libs/amp_lib/ota.sch"), "* edited").unwrap();

        let results = installer.validate_installation().unwrap();
        assert_eq!(
            results["amp_lib"].validation_status,
            ValidationStatus::Modified
        );
    }

    #[test]
    fn test_modified_after_added_file() {
        let (tmp, installer, _upstream) = installed_project();
        fs::write(tmp.path().join("designs/libs/amp_lib/extra.sch"), "* new").unwrap();

        let results = installer.validate_installation().unwrap();
        assert_eq!(
            results["amp_lib"].validation_status,
            ValidationStatus::Modified
        );
    }

    #[test]
    fn test_missing_after_delete() {
        let (tmp, installer, _upstream) = installed_project();
        fs::remove_dir_all(tmp.path().join("designs/libs/amp_lib")).unwrap();

        let results = installer.validate_installation().unwrap();
        assert_eq!(
            results["amp_lib"].validation_status,
            ValidationStatus::Missing
        );
    }

    #[test]
    fn test_orphaned_when_dropped_from_manifest() {
        let (tmp, installer, _upstream) = installed_project();
        fs::write(
            tmp.path().join("ams-compose.yaml"),
            "library_root: designs/libs\nimports: {}\n",
        )
        .unwrap();

        let results = installer.validate_installation().unwrap();
        assert_eq!(
            results["amp_lib"].validation_status,
            ValidationStatus::Orphaned
        );
    }

    #[test]
    fn test_validation_does_not_mutate_state() {
        let (tmp, installer, _upstream) = installed_project();
        fs::write(tmp.path().join("designs/libs/amp_lib/ota.sch"), "* edited").unwrap();
        let before = fs::read(installer.lockfile_path()).unwrap();

        installer.validate_installation().unwrap();

        let after = fs::read(installer.lockfile_path()).unwrap();
        assert_eq!(before, after);
        assert!(tmp.path().join("designs/libs/amp_lib/ota.sch").exists());
    }

    #[test]
    fn test_no_lockfile_yields_empty_results() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("ams-compose.yaml"),
            "library_root: designs/libs\nimports: {}\n",
        )
        .unwrap();

        let installer = Installer::new(tmp.path().to_path_buf());
        assert!(installer.validate_installation().unwrap().is_empty());
    }

    #[test]
    fn test_provenance_file_does_not_affect_validation() {
        let (tmp, installer, _upstream) = installed_project();

        // The provenance file was written before checksumming, and is
        // excluded from recomputation, so its presence is neutral.
        assert!(tmp
            .path()
            .join("designs/libs/amp_lib")
            .join(crate::core::provenance::ProvenanceRecord::FILE_NAME)
            .exists());

        let results = installer.validate_installation().unwrap();
        assert_eq!(results["amp_lib"].validation_status, ValidationStatus::Valid);
    }
}

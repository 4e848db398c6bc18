//! `.ams-compose.lock` lockfile schema and I/O.
//!
//! The lockfile records the resolved state of every installed library.
//! Unlike the manifest, unknown fields are preserved on round-trip so a
//! newer tool version can add fields without older versions destroying
//! them.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::config::ImportSpec;
use crate::error::{Error, Result};

/// Lockfile name at the project root.
pub const LOCKFILE_NAME: &str = ".ams-compose.lock";

/// How a library was handled by the most recent install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStatus {
    Installed,
    Updated,
    Reinstalled,
    UpToDate,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstallStatus {
    pub fn is_unknown(&self) -> bool {
        matches!(self, InstallStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStatus::Installed => "installed",
            InstallStatus::Updated => "updated",
            InstallStatus::Reinstalled => "reinstalled",
            InstallStatus::UpToDate => "up-to-date",
            InstallStatus::Unknown => "unknown",
        }
    }
}

/// Result of checksum validation for an installed library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Modified,
    Missing,
    Error,
    Orphaned,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ValidationStatus {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ValidationStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Modified => "modified",
            ValidationStatus::Missing => "missing",
            ValidationStatus::Error => "error",
            ValidationStatus::Orphaned => "orphaned",
            ValidationStatus::Unknown => "unknown",
        }
    }
}

/// Resolved state of one installed library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockEntry {
    /// Upstream repository URL.
    pub repo: String,

    /// Git reference the library tracks.
    #[serde(rename = "ref")]
    pub reference: String,

    /// Subtree of interest within the repository.
    pub source_path: String,

    /// Destination, relative to the project root.
    pub local_path: String,

    #[serde(default = "default_checkin")]
    pub checkin: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_patterns: Vec<String>,

    /// User-declared or detected license identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Resolved commit (full 40-char hex).
    pub commit: String,

    /// Checksum of the extracted tree (64-char hex).
    pub checksum: String,

    /// First-install timestamp (UTC RFC 3339).
    pub installed_at: String,

    /// Last-install timestamp (UTC RFC 3339).
    pub updated_at: String,

    /// License identifier detected in the upstream repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_license: Option<String>,

    /// Basename of the detected license file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_file: Option<String>,

    #[serde(default, skip_serializing_if = "InstallStatus::is_unknown")]
    pub install_status: InstallStatus,

    #[serde(default, skip_serializing_if = "ValidationStatus::is_unknown")]
    pub validation_status: ValidationStatus,

    /// Report-only: human-readable note when the detected license changed
    /// since the previous install. Never persisted.
    #[serde(skip)]
    pub license_change: Option<String>,

    /// Report-only: license compatibility advisory. Never persisted.
    #[serde(skip)]
    pub license_warning: Option<String>,

    /// Unknown fields, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_checkin() -> bool {
    true
}

impl LockEntry {
    /// Whether the manifest configuration for this library differs from
    /// what was installed (repo, ref, or source_path changed).
    pub fn config_changed(&self, spec: &ImportSpec) -> bool {
        self.repo != spec.repo
            || self.reference != spec.reference
            || self.source_path != spec.source_path
    }
}

/// The parsed `.ams-compose.lock` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub library_root: String,

    #[serde(default)]
    pub libraries: IndexMap<String, LockEntry>,

    /// Unknown fields, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Lockfile {
    /// Create an empty lockfile with the given library root.
    pub fn new(library_root: impl Into<String>) -> Self {
        Lockfile {
            library_root: library_root.into(),
            libraries: IndexMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Load a lockfile from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("failed to read {}: {err}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|err| Error::Config(format!("failed to parse {}: {err}", path.display())))
    }

    /// Save the lockfile to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entry() -> LockEntry {
        LockEntry {
            repo: "https://github.com/example/analog-lib.git".into(),
            reference: "main".into(),
            source_path: "lib/amplifiers".into(),
            local_path: "designs/libs/amp_lib".into(),
            checkin: true,
            ignore_patterns: vec!["*.raw".into()],
            license: Some("MIT".into()),
            commit: "a".repeat(40),
            checksum: "b".repeat(64),
            installed_at: "2026-01-15T10:00:00Z".into(),
            updated_at: "2026-01-15T10:00:00Z".into(),
            detected_license: Some("MIT".into()),
            license_file: Some("LICENSE".into()),
            install_status: InstallStatus::Installed,
            validation_status: ValidationStatus::Unknown,
            license_change: None,
            license_warning: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_lockfile_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCKFILE_NAME);

        let mut lockfile = Lockfile::new("designs/libs");
        lockfile.libraries.insert("amp_lib".into(), sample_entry());

        lockfile.save(&path).unwrap();
        let loaded = Lockfile::load(&path).unwrap();
        assert_eq!(loaded, lockfile);
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCKFILE_NAME);

        let mut lockfile = Lockfile::new("designs/libs");
        lockfile.libraries.insert("amp_lib".into(), sample_entry());
        lockfile.save(&path).unwrap();

        let first = std::fs::read_to_string(&path).unwrap();
        Lockfile::load(&path).unwrap().save(&path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCKFILE_NAME);

        let raw = format!(
            r#"library_root: designs/libs
future_field: some value
libraries:
  amp_lib:
    repo: https://github.com/example/lib.git
    ref: main
    source_path: .
    local_path: designs/libs/amp_lib
    commit: {commit}
    checksum: {checksum}
    installed_at: 2026-01-15T10:00:00Z
    updated_at: 2026-01-15T10:00:00Z
    new_lock_field: 42
"#,
            commit = "c".repeat(40),
            checksum = "d".repeat(64),
        );
        std::fs::write(&path, raw).unwrap();

        let lockfile = Lockfile::load(&path).unwrap();
        assert!(lockfile.extra.contains_key("future_field"));
        let entry = &lockfile.libraries["amp_lib"];
        assert!(entry.extra.contains_key("new_lock_field"));

        // Unknown fields survive a save/load cycle.
        lockfile.save(&path).unwrap();
        let reloaded = Lockfile::load(&path).unwrap();
        assert_eq!(reloaded, lockfile);
    }

    #[test]
    fn test_transient_fields_not_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCKFILE_NAME);

        let mut entry = sample_entry();
        entry.license_change = Some("license changed: MIT -> GPL-3.0".into());
        entry.license_warning = Some("copyleft".into());

        let mut lockfile = Lockfile::new("designs/libs");
        lockfile.libraries.insert("amp_lib".into(), entry);
        lockfile.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("license_change"));
        assert!(!raw.contains("license_warning"));

        let loaded = Lockfile::load(&path).unwrap();
        assert!(loaded.libraries["amp_lib"].license_change.is_none());
        assert!(loaded.libraries["amp_lib"].license_warning.is_none());
    }

    #[test]
    fn test_status_serialization_values() {
        let mut entry = sample_entry();
        entry.install_status = InstallStatus::UpToDate;
        entry.validation_status = ValidationStatus::Valid;

        let rendered = serde_yaml::to_string(&entry).unwrap();
        assert!(rendered.contains("install_status: up-to-date"));
        assert!(rendered.contains("validation_status: valid"));
    }

    #[test]
    fn test_unknown_status_skipped() {
        let entry = sample_entry();
        assert!(entry.validation_status.is_unknown());

        let rendered = serde_yaml::to_string(&entry).unwrap();
        assert!(!rendered.contains("validation_status"));
    }

    #[test]
    fn test_config_changed() {
        let entry = sample_entry();
        let mut spec = ImportSpec {
            repo: entry.repo.clone(),
            reference: entry.reference.clone(),
            source_path: entry.source_path.clone(),
            local_path: None,
            checkin: true,
            ignore_patterns: vec![],
            license: None,
        };
        assert!(!entry.config_changed(&spec));

        spec.reference = "v2.0".into();
        assert!(entry.config_changed(&spec));

        spec.reference = entry.reference.clone();
        spec.source_path = "other/path".into();
        assert!(entry.config_changed(&spec));
    }

    #[test]
    fn test_missing_lockfile_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = Lockfile::load(&tmp.path().join(LOCKFILE_NAME)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

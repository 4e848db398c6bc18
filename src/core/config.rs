//! `ams-compose.yaml` manifest parsing and schema.
//!
//! The manifest is the declarative list of upstream libraries to install.
//! Unknown fields are rejected so typos surface as configuration errors
//! instead of silently ignored settings.

use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Manifest file name at the project root.
pub const MANIFEST_FILE_NAME: &str = "ams-compose.yaml";

/// Project-global ignore file name (gitignore syntax).
pub const IGNORE_FILE_NAME: &str = ".ams-compose-ignore";

/// Default destination prefix for installed libraries.
pub const DEFAULT_LIBRARY_ROOT: &str = "designs/libs";

static LIBRARY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").unwrap());

/// One library import declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSpec {
    /// Upstream repository URL.
    pub repo: String,

    /// Git reference to install (branch, tag, or commit SHA).
    #[serde(rename = "ref")]
    pub reference: String,

    /// Path of the subtree of interest within the repository; `.` means
    /// the entire tree.
    pub source_path: String,

    /// Destination override; defaults to `<library_root>/<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    /// Whether the installed contents are meant to be committed to the
    /// consuming repository. Governs license preservation and provenance
    /// emission.
    #[serde(default = "default_checkin")]
    pub checkin: bool,

    /// Per-library gitignore-style patterns, evaluated relative to the
    /// extraction source root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_patterns: Vec<String>,

    /// User-declared SPDX license hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

fn default_checkin() -> bool {
    true
}

impl ImportSpec {
    /// Whether this import pins an exact commit (full 40-char hex ref).
    ///
    /// Pinned imports never update, regardless of flags.
    pub fn is_pinned(&self) -> bool {
        self.reference.len() == 40 && self.reference.chars().all(|c| c.is_ascii_hexdigit())
    }
}

/// The parsed `ams-compose.yaml` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Default destination prefix for installed libraries.
    #[serde(default = "default_library_root")]
    pub library_root: String,

    /// Library imports, keyed by library name. Order is preserved and
    /// carried through planning into the lockfile.
    #[serde(default)]
    pub imports: IndexMap<String, ImportSpec>,
}

fn default_library_root() -> String {
    DEFAULT_LIBRARY_ROOT.to_string()
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("failed to read {}: {err}", path.display())))?;

        let manifest: Manifest = serde_yaml::from_str(&raw)
            .map_err(|err| Error::Config(format!("failed to parse {}: {err}", path.display())))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate library names against the naming rule.
    pub fn validate(&self) -> Result<()> {
        for name in self.imports.keys() {
            if !LIBRARY_NAME_RE.is_match(name) {
                return Err(Error::Config(format!(
                    "invalid library name `{name}`: names must match [A-Za-z0-9_][A-Za-z0-9_.-]*"
                )));
            }
        }
        Ok(())
    }
}

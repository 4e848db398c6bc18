//! Per-library provenance metadata.
//!
//! Each checkin-true library carries a `.ams-compose-metadata.yaml` file
//! recording where its contents came from, at which commit, and under
//! which license, so design reuse stays auditable long after the install.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::hash::METADATA_BASENAME;

/// Origin of an installed library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub repository: String,
    pub reference: String,
    pub commit: String,
    pub source_path: String,
}

/// License findings for an installed library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LicenseBlock {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Provenance record embedded in each checkin-true library directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Version of the tool that performed the extraction.
    pub tool_version: String,

    /// Extraction timestamp (UTC RFC 3339 with `Z`).
    pub extracted_at: String,

    pub library_name: String,

    pub source: SourceBlock,

    #[serde(default)]
    pub license: LicenseBlock,

    /// Human-readable compliance notes for auditors.
    #[serde(default)]
    pub compliance_notes: Vec<String>,
}

impl ProvenanceRecord {
    /// Basename of the provenance file inside an installed library.
    pub const FILE_NAME: &'static str = METADATA_BASENAME;

    /// Write the record into the given library directory.
    pub fn write_to(&self, library_dir: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self)?;
        std::fs::write(library_dir.join(Self::FILE_NAME), rendered)?;
        Ok(())
    }

    /// Load a record from a library directory, if present.
    pub fn load_from(library_dir: &Path) -> Result<Option<Self>> {
        let path = library_dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&raw)?))
    }
}

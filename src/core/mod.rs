//! Core data structures for ams-compose.
//!
//! This module contains the foundational types used throughout the tool:
//! - The declarative manifest (ImportSpec, Manifest)
//! - The lockfile (LockEntry, Lockfile, status enums)
//! - Per-library provenance records

pub mod config;
pub mod lock;
pub mod provenance;

pub use config::{ImportSpec, Manifest, DEFAULT_LIBRARY_ROOT, IGNORE_FILE_NAME, MANIFEST_FILE_NAME};
pub use lock::{InstallStatus, LockEntry, Lockfile, ValidationStatus, LOCKFILE_NAME};
pub use provenance::{LicenseBlock, ProvenanceRecord, SourceBlock};

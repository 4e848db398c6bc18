//! ams-compose - dependency management for analog/mixed-signal IC design repositories
//!
//! This crate provides the core library functionality for ams-compose,
//! including repository mirroring, selective subtree extraction, and
//! installation orchestration.

pub mod core;
pub mod error;
pub mod extract;
pub mod ops;
pub mod sources;
pub mod util;

/// Test fixtures for ams-compose unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It builds real local git repositories (with commits,
/// tags, and submodules) for mirror and installer tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    config::{ImportSpec, Manifest},
    lock::{InstallStatus, LockEntry, Lockfile, ValidationStatus},
    provenance::ProvenanceRecord,
};

pub use crate::error::{Error, Result};
pub use crate::ops::Installer;
pub use crate::sources::mirror::{MirrorCache, MirrorState};

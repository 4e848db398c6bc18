//! Installation orchestration.
//!
//! The [`Installer`] is a planner/executor over the manifest: it decides
//! per-library whether work is needed, drives the mirror cache and the
//! extractor, and writes the lockfile exactly once per operation.

pub mod clean;
pub mod init;
pub mod install;
pub mod validate;

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::core::config::{Manifest, MANIFEST_FILE_NAME};
use crate::core::lock::{LockEntry, Lockfile, LOCKFILE_NAME};
use crate::error::Result;
use crate::extract::Extractor;
use crate::sources::git::GitTimeouts;
use crate::sources::mirror::MirrorCache;

pub use clean::CleanReport;
pub use install::{InstallAction, InstallOutcome};

/// Default mirror pool location inside the project.
pub const DEFAULT_MIRROR_DIR: &str = ".mirror";

/// Orchestrates mirror and extraction operations for library installs.
pub struct Installer {
    project_root: PathBuf,
    mirrors: MirrorCache,
    extractor: Extractor,
}

impl Installer {
    /// Create an installer rooted at `project_root`, with mirrors under
    /// `<project_root>/.mirror`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let mirror_root = project_root.join(DEFAULT_MIRROR_DIR);
        Installer {
            mirrors: MirrorCache::new(mirror_root),
            extractor: Extractor::new(project_root.clone()),
            project_root,
        }
    }

    /// Create an installer with an explicit mirror root and git deadlines.
    pub fn with_mirror_root(
        project_root: impl Into<PathBuf>,
        mirror_root: impl Into<PathBuf>,
        timeouts: GitTimeouts,
    ) -> Self {
        let project_root = project_root.into();
        Installer {
            mirrors: MirrorCache::with_timeouts(mirror_root, timeouts),
            extractor: Extractor::new(project_root.clone()),
            project_root,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mirrors(&self) -> &MirrorCache {
        &self.mirrors
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_root.join(MANIFEST_FILE_NAME)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.project_root.join(LOCKFILE_NAME)
    }

    /// Load and validate the manifest.
    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    /// Load the lockfile, or create an empty one with the manifest's
    /// library root when none exists yet.
    pub fn load_lockfile(&self) -> Result<Lockfile> {
        let path = self.lockfile_path();
        if path.exists() {
            Lockfile::load(&path)
        } else {
            Ok(Lockfile::new(self.load_manifest()?.library_root))
        }
    }

    pub fn save_lockfile(&self, lockfile: &Lockfile) -> Result<()> {
        lockfile.save(&self.lockfile_path())
    }

    /// The lockfile map, unchanged.
    pub fn list_installed(&self) -> Result<IndexMap<String, LockEntry>> {
        Ok(self.load_lockfile()?.libraries)
    }
}

/// UTC timestamp in the format used across lockfile and provenance.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

//! Mirror and lockfile garbage collection.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::core::lock::LockEntry;
use crate::error::Result;
use crate::ops::Installer;
use crate::util::hash::normalize_repo_url;

/// What `clean` removed, plus the post-cleanup validation picture.
#[derive(Debug)]
pub struct CleanReport {
    /// URLs of mirrors no live lock entry referenced.
    pub removed_mirrors: Vec<String>,

    /// Mirror directories that failed repository or sidecar validation.
    pub removed_invalid: usize,

    /// Lockfile entries with no matching manifest entry.
    pub removed_orphans: Vec<String>,

    /// Validation results after cleanup.
    pub validation: IndexMap<String, LockEntry>,
}

impl Installer {
    /// Drop orphaned lockfile entries, garbage-collect mirrors, and
    /// validate what remains.
    ///
    /// Orphaned libraries' installed directories are left on disk: the
    /// tool never deletes user-visible content it was not asked to
    /// replace.
    pub fn clean(&self) -> Result<CleanReport> {
        let manifest = self.load_manifest()?;
        let mut lockfile = self.load_lockfile()?;

        let removed_orphans: Vec<String> = lockfile
            .libraries
            .keys()
            .filter(|name| !manifest.imports.contains_key(*name))
            .cloned()
            .collect();
        for name in &removed_orphans {
            tracing::info!("dropping orphaned lockfile entry {name}");
            lockfile.libraries.shift_remove(name);
        }
        if !removed_orphans.is_empty() {
            self.save_lockfile(&lockfile)?;
        }

        let live_urls: HashSet<String> = lockfile
            .libraries
            .values()
            .map(|entry| normalize_repo_url(&entry.repo))
            .collect();
        let removed_mirrors = self.mirrors().remove_unreferenced(&live_urls)?;
        let removed_invalid = self.mirrors().cleanup_invalid()?;

        let validation = self.validate_installation()?;

        Ok(CleanReport {
            removed_mirrors,
            removed_invalid,
            removed_orphans,
            validation,
        })
    }
}

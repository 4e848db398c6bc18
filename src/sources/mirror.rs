//! Content-addressed local clone pool.
//!
//! Each upstream repository is cloned once under
//! `<mirror_root>/<repo_hash>/` and shared by every library that imports
//! from it. A sidecar state file records the URL, the checked-out ref, and
//! the resolved commit; directories that fail repository or sidecar
//! validation are treated as corrupt and recovered by re-cloning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use git2::Repository;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sources::git::{self, GitTimeouts};
use crate::util::fs as fsutil;
use crate::util::hash::{normalize_repo_url, repo_hash};

/// Basename of the state sidecar inside each mirror directory.
pub const MIRROR_STATE_BASENAME: &str = ".mirror-state.yaml";

/// State sidecar stored in each mirror directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorState {
    /// Original repository URL as configured.
    pub repo_url: String,

    /// Hash of the normalized URL; equals the mirror directory name.
    pub repo_hash: String,

    /// Ref most recently checked out.
    pub current_ref: String,

    /// Full commit SHA of the checkout.
    pub resolved_commit: String,

    /// Mirror creation timestamp (UTC RFC 3339).
    pub created_at: String,

    /// Last update timestamp (UTC RFC 3339).
    pub updated_at: String,
}

impl MirrorState {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

/// Manages the pool of repository mirrors.
pub struct MirrorCache {
    mirror_root: PathBuf,
    timeouts: GitTimeouts,
}

impl MirrorCache {
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        MirrorCache {
            mirror_root: mirror_root.into(),
            timeouts: GitTimeouts::default(),
        }
    }

    pub fn with_timeouts(mirror_root: impl Into<PathBuf>, timeouts: GitTimeouts) -> Self {
        MirrorCache {
            mirror_root: mirror_root.into(),
            timeouts,
        }
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    /// Mirror directory for a repository URL. Pure function of the hash.
    pub fn mirror_path(&self, repo_url: &str) -> PathBuf {
        self.mirror_root.join(repo_hash(repo_url))
    }

    /// Whether a valid mirror exists for the URL.
    pub fn mirror_exists(&self, repo_url: &str) -> bool {
        let path = self.mirror_path(repo_url);
        path.exists() && Repository::open(&path).is_ok()
    }

    /// Read the state sidecar for a mirror, if present and parseable.
    pub fn get_state(&self, repo_url: &str) -> Option<MirrorState> {
        if !self.mirror_exists(repo_url) {
            return None;
        }
        MirrorState::load(&self.mirror_path(repo_url).join(MIRROR_STATE_BASENAME)).ok()
    }

    /// Bring the mirror for `repo_url` to `reference`. Idempotent.
    ///
    /// A missing mirror is cloned fresh; an existing one resolves the ref
    /// locally and only fetches when it cannot. Any failure while updating
    /// an existing mirror falls back to a fresh clone.
    pub fn update_mirror(&self, repo_url: &str, reference: &str) -> Result<MirrorState> {
        git::validate_repo_url(repo_url)?;

        if !self.mirror_exists(repo_url) {
            return self.create_mirror(repo_url, reference);
        }

        match self.update_existing(repo_url, reference) {
            Ok(state) => Ok(state),
            Err(err) if err.is_hard() => Err(err),
            Err(err) => {
                tracing::warn!("mirror update for {repo_url} failed ({err}); re-cloning");
                self.create_mirror(repo_url, reference)
            }
        }
    }

    /// Resolve what `reference` points to upstream, fetching first.
    ///
    /// Used by `--check-remote-updates`; does not move the checkout.
    pub fn resolve_remote(&self, repo_url: &str, reference: &str) -> Result<String> {
        git::validate_repo_url(repo_url)?;

        if !self.mirror_exists(repo_url) {
            return Ok(self.create_mirror(repo_url, reference)?.resolved_commit);
        }

        let repo = Repository::open(self.mirror_path(repo_url))?;
        git::fetch_origin(&repo, self.timeouts.fetch)?;
        git::resolve_ref(&repo, reference).ok_or_else(|| Error::RefNotFound {
            url: repo_url.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Remove the mirror for a URL. Returns whether anything was removed.
    pub fn remove_mirror(&self, repo_url: &str) -> Result<bool> {
        let path = self.mirror_path(repo_url);
        if path.exists() {
            fsutil::remove_path_if_exists(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// All mirrors with readable state, keyed by repository URL.
    pub fn list_mirrors(&self) -> BTreeMap<String, MirrorState> {
        let mut mirrors = BTreeMap::new();
        let Ok(entries) = std::fs::read_dir(&self.mirror_root) else {
            return mirrors;
        };

        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.path().is_dir() {
                continue;
            }
            if let Ok(state) = MirrorState::load(&entry.path().join(MIRROR_STATE_BASENAME)) {
                mirrors.insert(state.repo_url.clone(), state);
            }
        }
        mirrors
    }

    /// Remove mirror directories failing repository or sidecar validation.
    ///
    /// A directory is invalid when it is not a git repository, its sidecar
    /// is missing or corrupt, or the sidecar's URL no longer hashes to the
    /// directory name. Returns the number of directories removed.
    pub fn cleanup_invalid(&self) -> Result<usize> {
        let mut removed = 0;
        let Ok(entries) = std::fs::read_dir(&self.mirror_root) else {
            return Ok(removed);
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let valid = Repository::open(&path).is_ok()
                && MirrorState::load(&path.join(MIRROR_STATE_BASENAME))
                    .map(|state| repo_hash(&state.repo_url) == dir_name)
                    .unwrap_or(false);

            if !valid {
                tracing::info!("removing invalid mirror {}", path.display());
                fsutil::remove_path_if_exists(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Garbage-collect mirrors whose URL is not in `live_urls`
    /// (normalized). Returns the URLs of removed mirrors.
    pub fn remove_unreferenced(
        &self,
        live_urls: &std::collections::HashSet<String>,
    ) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for (url, _) in self.list_mirrors() {
            if !live_urls.contains(&normalize_repo_url(&url)) {
                self.remove_mirror(&url)?;
                tracing::info!("removed unused mirror for {url}");
                removed.push(url);
            }
        }
        Ok(removed)
    }

    fn create_mirror(&self, repo_url: &str, reference: &str) -> Result<MirrorState> {
        let mirror_path = self.mirror_path(repo_url);
        fsutil::remove_path_if_exists(&mirror_path)?;
        fsutil::ensure_dir(&self.mirror_root)?;

        // Clone into a temp directory on the same filesystem so a partial
        // clone never occupies the mirror path.
        let staging = tempfile::TempDir::new_in(&self.mirror_root)?;
        let clone_path = staging.path().join("repo");

        let repo = git::clone_repository(repo_url, &clone_path, self.timeouts.clone)?;

        let resolved_commit =
            git::resolve_ref(&repo, reference).ok_or_else(|| Error::RefNotFound {
                url: repo_url.to_string(),
                reference: reference.to_string(),
            })?;
        git::checkout_detached(&repo, &resolved_commit)?;
        git::update_submodules(&repo)?;
        drop(repo);

        std::fs::rename(&clone_path, &mirror_path)?;

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let state = MirrorState {
            repo_url: repo_url.to_string(),
            repo_hash: repo_hash(repo_url),
            current_ref: reference.to_string(),
            resolved_commit,
            created_at: now.clone(),
            updated_at: now,
        };
        state.save(&mirror_path.join(MIRROR_STATE_BASENAME))?;
        Ok(state)
    }

    fn update_existing(&self, repo_url: &str, reference: &str) -> Result<MirrorState> {
        let mirror_path = self.mirror_path(repo_url);
        let previous = self.get_state(repo_url);
        let repo = Repository::open(&mirror_path)?;

        // Resolve locally first; fetch only when the ref is unknown here.
        let resolved_commit = match git::resolve_ref(&repo, reference) {
            Some(sha) => sha,
            None => {
                git::fetch_origin(&repo, self.timeouts.fetch)?;
                git::resolve_ref(&repo, reference).ok_or_else(|| Error::RefNotFound {
                    url: repo_url.to_string(),
                    reference: reference.to_string(),
                })?
            }
        };

        if git::head_commit(&repo)? != resolved_commit {
            git::checkout_detached(&repo, &resolved_commit)?;
        }
        if !repo.submodules()?.is_empty() {
            git::update_submodules(&repo)?;
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let state = MirrorState {
            repo_url: repo_url.to_string(),
            repo_hash: repo_hash(repo_url),
            current_ref: reference.to_string(),
            resolved_commit,
            created_at: previous.map(|p| p.created_at).unwrap_or_else(|| now.clone()),
            updated_at: now,
        };
        state.save(&mirror_path.join(MIRROR_STATE_BASENAME))?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    fn cache() -> (TempDir, MirrorCache) {
        let tmp = TempDir::new().unwrap();
        let cache = MirrorCache::new(tmp.path().join("mirrors"));
        (tmp, cache)
    }

    #[test]
    fn test_mirror_path_is_hash_of_url() {
        let (_tmp, cache) = cache();
        let url = "https://github.com/user/repo.git";
        let path = cache.mirror_path(url);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            repo_hash(url)
        );

        // Equivalent URLs share a mirror.
        assert_eq!(path, cache.mirror_path("git@github.com:user/repo"));
    }

    #[test]
    fn test_update_mirror_rejects_invalid_url() {
        let (_tmp, cache) = cache();
        let err = cache.update_mirror("https://example.com/x.git; rm -rf /", "main").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_create_and_reuse_mirror() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        assert!(!cache.mirror_exists(&fixture.url));
        let state = cache.update_mirror(&fixture.url, "main").unwrap();

        assert!(cache.mirror_exists(&fixture.url));
        assert_eq!(state.resolved_commit, fixture.head_sha());
        assert_eq!(state.current_ref, "main");
        assert_eq!(state.repo_hash, repo_hash(&fixture.url));
        assert!(cache.mirror_path(&fixture.url).join("lib/amplifiers/ota.sch").exists());

        // Second update is idempotent and keeps created_at.
        let again = cache.update_mirror(&fixture.url, "main").unwrap();
        assert_eq!(again.resolved_commit, state.resolved_commit);
        assert_eq!(again.created_at, state.created_at);
    }

    #[test]
    fn test_update_mirror_ref_not_found() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        let err = cache.update_mirror(&fixture.url, "no-such-branch").unwrap_err();
        assert!(matches!(err, Error::RefNotFound { .. }));

        // The failed clone left no mirror directory behind.
        assert!(!cache.mirror_path(&fixture.url).exists());
    }

    #[test]
    fn test_update_mirror_checks_out_tag() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();
        let tagged = fixture.head_sha();
        fixture.tag("v1.0.0");
        fixture.commit_files(&[("lib/amplifiers/lna.sch", "* LNA")], "add LNA");

        let state = cache.update_mirror(&fixture.url, "v1.0.0").unwrap();
        assert_eq!(state.resolved_commit, tagged);
        assert!(!cache.mirror_path(&fixture.url).join("lib/amplifiers/lna.sch").exists());
    }

    #[test]
    fn test_update_mirror_pinned_commit() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();
        let pinned = fixture.head_sha();
        fixture.commit_files(&[("extra.txt", "x")], "more work");

        let state = cache.update_mirror(&fixture.url, &pinned).unwrap();
        assert_eq!(state.resolved_commit, pinned);
    }

    #[test]
    fn test_update_existing_fetches_unknown_ref() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        cache.update_mirror(&fixture.url, "main").unwrap();

        // A tag created after the clone is only resolvable via fetch.
        fixture.commit_files(&[("extra.txt", "x")], "more work");
        fixture.tag("v2.0.0");

        let state = cache.update_mirror(&fixture.url, "v2.0.0").unwrap();
        assert_eq!(state.resolved_commit, fixture.head_sha());
        assert!(cache.mirror_path(&fixture.url).join("extra.txt").exists());
    }

    #[test]
    fn test_corrupt_mirror_recovered_by_reclone() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        cache.update_mirror(&fixture.url, "main").unwrap();

        // Wreck the repository internals.
        let git_dir = cache.mirror_path(&fixture.url).join(".git");
        std::fs::remove_dir_all(&git_dir).unwrap();

        let state = cache.update_mirror(&fixture.url, "main").unwrap();
        assert_eq!(state.resolved_commit, fixture.head_sha());
        assert!(cache.mirror_exists(&fixture.url));
    }

    #[test]
    fn test_resolve_remote_sees_upstream_movement() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        let state = cache.update_mirror(&fixture.url, "main").unwrap();
        let new_sha = fixture.commit_files(&[("new.txt", "new")], "upstream moves");

        let resolved = cache.resolve_remote(&fixture.url, "main").unwrap();
        assert_eq!(resolved, new_sha);

        // resolve_remote does not move the checkout.
        let repo = Repository::open(cache.mirror_path(&fixture.url)).unwrap();
        assert_eq!(git::head_commit(&repo).unwrap(), state.resolved_commit);
    }

    #[test]
    fn test_get_state_roundtrip() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        assert!(cache.get_state(&fixture.url).is_none());
        let written = cache.update_mirror(&fixture.url, "main").unwrap();
        let read = cache.get_state(&fixture.url).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_remove_mirror() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();

        assert!(!cache.remove_mirror(&fixture.url).unwrap());
        cache.update_mirror(&fixture.url, "main").unwrap();
        assert!(cache.remove_mirror(&fixture.url).unwrap());
        assert!(!cache.mirror_exists(&fixture.url));
    }

    #[test]
    fn test_list_mirrors() {
        let (_tmp, cache) = cache();
        let first = fixtures::basic_repo();
        let second = fixtures::basic_repo();

        cache.update_mirror(&first.url, "main").unwrap();
        cache.update_mirror(&second.url, "main").unwrap();

        let mirrors = cache.list_mirrors();
        assert_eq!(mirrors.len(), 2);
        assert!(mirrors.contains_key(&first.url));
        assert!(mirrors.contains_key(&second.url));
    }

    #[test]
    fn test_cleanup_invalid() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::basic_repo();
        cache.update_mirror(&fixture.url, "main").unwrap();

        // Not a repository at all.
        let junk = cache.mirror_root().join("0000000000000000");
        std::fs::create_dir_all(&junk).unwrap();
        std::fs::write(junk.join("noise.txt"), "not a repo").unwrap();

        // Valid repository but missing sidecar.
        let orphan = cache.mirror_root().join("1111111111111111");
        git2::Repository::init(&orphan).unwrap();

        let removed = cache.cleanup_invalid().unwrap();
        assert_eq!(removed, 2);
        assert!(!junk.exists());
        assert!(!orphan.exists());
        assert!(cache.mirror_exists(&fixture.url));
    }

    #[test]
    fn test_remove_unreferenced() {
        let (_tmp, cache) = cache();
        let live = fixtures::basic_repo();
        let dead = fixtures::basic_repo();

        cache.update_mirror(&live.url, "main").unwrap();
        cache.update_mirror(&dead.url, "main").unwrap();

        let mut live_urls = std::collections::HashSet::new();
        live_urls.insert(normalize_repo_url(&live.url));

        let removed = cache.remove_unreferenced(&live_urls).unwrap();
        assert_eq!(removed, vec![dead.url.clone()]);
        assert!(cache.mirror_exists(&live.url));
        assert!(!cache.mirror_exists(&dead.url));
    }

    #[test]
    fn test_mirror_with_submodules() {
        let (_tmp, cache) = cache();
        let fixture = fixtures::repo_with_submodule();

        cache.update_mirror(&fixture.url, "main").unwrap();

        let mirror = cache.mirror_path(&fixture.url);
        assert!(mirror.join("vendor/pdk/models/nmos.spice").exists());
    }
}

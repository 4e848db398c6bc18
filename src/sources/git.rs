//! Low-level git operations for the mirror cache.
//!
//! All network transfers run under a deadline enforced through libgit2's
//! transfer-progress callback; an expired deadline aborts the transfer and
//! surfaces as `Error::Timeout`. URLs are validated before any git call.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository};
use url::Url;

use crate::error::{Error, Result};
use crate::util::is_test_mode;

/// URL schemes accepted for upstream repositories.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ssh", "git"];

/// Characters rejected anywhere in a repository URL.
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '~', '\n', '\r'];

/// Deadlines for git operations.
#[derive(Debug, Clone, Copy)]
pub struct GitTimeouts {
    /// Deadline for fetches against an existing mirror.
    pub fetch: Duration,

    /// Deadline for initial clones (larger: full history transfers).
    pub clone: Duration,
}

impl Default for GitTimeouts {
    fn default() -> Self {
        GitTimeouts {
            fetch: Duration::from_secs(60),
            clone: Duration::from_secs(300),
        }
    }
}

/// Validate a repository URL before any git I/O.
///
/// Rejects shell metacharacters outright and restricts schemes to
/// [`ALLOWED_SCHEMES`]; `file://` is additionally accepted in test mode
/// only. scp-style `git@host:path` forms are allowed.
pub fn validate_repo_url(url: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.trim().is_empty() {
        return Err(invalid("empty URL"));
    }

    if let Some(c) = url.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("contains shell metacharacter `{}`", c.escape_default()),
        });
    }

    if url.contains("://") {
        let parsed = Url::parse(url).map_err(|err| invalid(&format!("unparseable: {err}")))?;
        let scheme = parsed.scheme();
        if scheme == "file" {
            if !is_test_mode() {
                return Err(invalid("file:// URLs are only allowed in test mode"));
            }
        } else if !ALLOWED_SCHEMES.contains(&scheme) {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme `{scheme}`"),
            });
        }
    } else if !(url.starts_with("git@") && url.contains(':')) {
        return Err(invalid("missing URL scheme"));
    }

    Ok(())
}

/// Clone `url` into `dest` with full history.
pub fn clone_repository(url: &str, dest: &Path, timeout: Duration) -> Result<Repository> {
    let deadline = Deadline::new(timeout);

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(deadline.callbacks());
    fetch_options.download_tags(git2::AutotagOption::All);

    tracing::info!("cloning {url}");
    let repo = RepoBuilder::new()
        .fetch_options(fetch_options)
        .clone(url, dest)
        .map_err(|err| deadline.classify("clone", err))?;
    Ok(repo)
}

/// Fetch from `origin` using the remote's configured refspecs.
pub fn fetch_origin(repo: &Repository, timeout: Duration) -> Result<()> {
    let deadline = Deadline::new(timeout);

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(deadline.callbacks());
    fetch_options.download_tags(git2::AutotagOption::All);

    let mut remote = repo.find_remote("origin")?;
    tracing::info!("fetching {}", remote.url().unwrap_or("origin"));
    remote
        .fetch(&[] as &[&str], Some(&mut fetch_options), None)
        .map_err(|err| deadline.classify("fetch", err))?;
    Ok(())
}

/// Resolve a ref to a full commit SHA, preferring the remote-tracking
/// branch so a just-fetched branch resolves to its upstream tip.
pub fn resolve_ref(repo: &Repository, reference: &str) -> Option<String> {
    let candidates = [format!("refs/remotes/origin/{reference}"), reference.to_string()];
    for candidate in candidates {
        if let Ok(object) = repo.revparse_single(&candidate) {
            if let Ok(commit) = object.peel_to_commit() {
                return Some(commit.id().to_string());
            }
        }
    }
    None
}

/// Force-checkout the working tree at the given commit, detaching HEAD.
pub fn checkout_detached(repo: &Repository, commit_hex: &str) -> Result<()> {
    let oid = git2::Oid::from_str(commit_hex)?;
    let commit = repo.find_commit(oid)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(oid)?;
    Ok(())
}

/// Commit SHA of the current HEAD.
pub fn head_commit(repo: &Repository) -> Result<String> {
    let head = repo.head()?.peel_to_commit()?;
    Ok(head.id().to_string())
}

/// Recursively initialize and update all submodules of the working tree.
pub fn update_submodules(repo: &Repository) -> Result<()> {
    fn update_level(repo: &Repository) -> Result<()> {
        for mut submodule in repo.submodules()? {
            tracing::debug!("updating submodule {}", submodule.path().display());
            submodule.update(true, None)?;
            if let Ok(subrepo) = submodule.open() {
                update_level(&subrepo)?;
            }
        }
        Ok(())
    }
    update_level(repo)
}

/// Deadline tracking shared between a transfer callback and its caller.
struct Deadline {
    expires_at: Instant,
    duration: Duration,
    expired: Arc<AtomicBool>,
}

impl Deadline {
    fn new(duration: Duration) -> Self {
        Deadline {
            expires_at: Instant::now() + duration,
            duration,
            expired: Arc::new(AtomicBool::new(false)),
        }
    }

    fn callbacks(&self) -> RemoteCallbacks<'static> {
        let expires_at = self.expires_at;
        let expired = Arc::clone(&self.expired);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(move |_| {
            if Instant::now() > expires_at {
                expired.store(true, Ordering::SeqCst);
                false
            } else {
                true
            }
        });
        callbacks
    }

    /// Map a git error to `Timeout` when the deadline tripped the abort.
    fn classify(&self, operation: &str, err: git2::Error) -> Error {
        if self.expired.load(Ordering::SeqCst) {
            Error::Timeout {
                operation: operation.to_string(),
                seconds: self.duration.as_secs(),
            }
        } else {
            err.into()
        }
    }
}

//! Three-tier ignore filtering for extraction.
//!
//! Tier 1 is a closed list of basenames that are never wanted in an
//! extracted design library (version control internals, development
//! artifacts, OS noise). Tiers 2 and 3 are gitignore-style pattern sets:
//! project-global patterns from `.ams-compose-ignore` and per-library
//! patterns from the import spec. A malformed pattern disables only the
//! tier it belongs to.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::core::config::IGNORE_FILE_NAME;
use crate::extract::license::is_license_candidate;

/// Basenames always excluded from extraction. This list is closed: version
/// control directories, development artifacts, OS noise, and git dotfiles.
pub const BUILTIN_IGNORES: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "CVS",
    // Development artifacts
    ".ipynb_checkpoints",
    "__pycache__",
    "node_modules",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    // OS noise
    ".DS_Store",
    "Thumbs.db",
    // Git dotfiles
    ".gitignore",
    ".gitmodules",
    ".gitattributes",
    // Mirror cache sidecar
    ".mirror-state.yaml",
];

/// The ignore predicate built once per extraction.
pub struct ExtractionFilter {
    source_root: PathBuf,
    global: Option<Gitignore>,
    library: Option<Gitignore>,
    preserve_licenses: bool,
}

impl ExtractionFilter {
    /// Build the filter for one extraction.
    ///
    /// `project_root` supplies the optional `.ams-compose-ignore` file;
    /// `source_root` is the tree being walked (the mirror subtree during
    /// extraction, the installed directory during validation).
    /// `preserve_licenses` is set for checkin-true imports, in which case
    /// license candidate filenames are never filtered.
    pub fn new(
        project_root: &Path,
        source_root: &Path,
        ignore_patterns: &[String],
        preserve_licenses: bool,
    ) -> Self {
        let global = load_global_patterns(project_root)
            .map(|patterns| build_tier(source_root, &patterns))
            .unwrap_or(None);

        let library = if ignore_patterns.is_empty() {
            None
        } else {
            build_tier(source_root, ignore_patterns)
        };

        ExtractionFilter {
            source_root: source_root.to_path_buf(),
            global,
            library,
            preserve_licenses,
        }
    }

    /// Whether the entry at `path` (with basename `name`) is ignored.
    ///
    /// `path` must be inside the filter's source root.
    pub fn is_ignored(&self, path: &Path, name: &str, is_dir: bool) -> bool {
        if self.preserve_licenses && !is_dir && is_license_candidate(name) {
            return false;
        }

        if BUILTIN_IGNORES.contains(&name) {
            return true;
        }

        let relative = match path.strip_prefix(&self.source_root) {
            Ok(rel) => rel,
            Err(_) => Path::new(name),
        };

        for tier in [&self.global, &self.library].into_iter().flatten() {
            if tier.matched_path_or_any_parents(relative, is_dir).is_ignore() {
                return true;
            }
        }

        false
    }
}

/// Compile one gitignore tier. Any malformed pattern empties the tier.
fn build_tier(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if builder.add_line(None, pattern).is_err() {
            tracing::warn!("malformed ignore pattern `{pattern}`: disabling this pattern tier");
            return None;
        }
    }
    builder.build().ok()
}

fn load_global_patterns(project_root: &Path) -> Option<Vec<String>> {
    let path = project_root.join(IGNORE_FILE_NAME);
    let raw = std::fs::read_to_string(path).ok()?;
    Some(raw.lines().map(str::to_string).collect())
}

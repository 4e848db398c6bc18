//! Destination path resolution and project-root confinement.
//!
//! Every library destination — whether read from the manifest, the
//! lockfile, or derived from `library_root` — is resolved through
//! [`confine_to_project`] before any write.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Compute the destination for a library and confine it to the project.
///
/// `local_path` overrides the default `<library_root>/<name>` location;
/// relative overrides are joined with the project root, absolute ones are
/// used as-is. The result is fully resolved (`..` and symlinks) and must
/// remain inside the project root, otherwise `PathEscape` is raised.
pub fn resolve_local_path(
    project_root: &Path,
    library_root: &str,
    library_name: &str,
    local_path: Option<&str>,
) -> Result<PathBuf> {
    let candidate = match local_path {
        Some(overridden) => {
            let overridden = Path::new(overridden);
            if overridden.is_absolute() {
                overridden.to_path_buf()
            } else {
                project_root.join(overridden)
            }
        }
        None => project_root.join(library_root).join(library_name),
    };

    confine_to_project(project_root, &candidate)
}

/// Fully resolve `candidate` and require the project root as an ancestor.
pub fn confine_to_project(project_root: &Path, candidate: &Path) -> Result<PathBuf> {
    let root = project_root
        .canonicalize()
        .map_err(|_| Error::Config(format!("project root not found: {}", project_root.display())))?;

    let resolved = resolve_best_effort(candidate);
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(Error::PathEscape {
            path: candidate.to_path_buf(),
        })
    }
}

/// Display form of a destination, relative to the project root.
pub fn project_relative(project_root: &Path, path: &Path) -> String {
    let root = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    pathdiff::diff_paths(path, &root)
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Resolve a path that may not exist yet: `.` and `..` components are
/// folded lexically first, then the longest existing prefix is
/// canonicalized (following symlinks) and the nonexistent tail appended.
///
/// The returned path is the one callers write to, so the confinement check
/// and the eventual filesystem operations always agree.
fn resolve_best_effort(path: &Path) -> PathBuf {
    let mut folded = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                folded.pop();
            }
            Component::CurDir => {}
            other => folded.push(other.as_os_str()),
        }
    }

    let mut existing = folded;
    let mut tail: Vec<OsString> = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) if !parent.as_os_str().is_empty() => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for segment in tail.iter().rev() {
        resolved.push(segment);
    }
    resolved
}

//! Content hashing and repository URL hashing.
//!
//! Directory checksums are stable under enumeration-order differences:
//! files are folded in lexicographic order of their relative path, and the
//! tool's own metadata file is excluded so validation round-trips against
//! extraction.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Basename of the provenance metadata file written into installed
/// libraries. Excluded from directory checksums.
pub const METADATA_BASENAME: &str = ".ams-compose-metadata.yaml";

/// Sentinel folded into a directory checksum for files that cannot be read.
const UNREADABLE_SENTINEL: &[u8] = b"<unreadable>";

/// Compute the SHA-256 checksum of a single file.
///
/// Returns the lowercase hex digest, or `""` if the path does not exist or
/// is not a regular file.
pub fn file_checksum(path: &Path) -> String {
    if !path.is_file() {
        return String::new();
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return String::new(),
    };

    let mut hasher = Sha256::new();
    if stream_into(&mut hasher, file).is_err() {
        return String::new();
    }
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 checksum of a directory tree.
///
/// All regular files under `dir` are enumerated in lexicographic order of
/// their path relative to `dir`; for each file the relative path bytes are
/// folded into the running hash, followed by the file contents. Files named
/// [`METADATA_BASENAME`] are skipped. Unreadable files fold
/// `<unreadable>` so the result stays deterministic.
///
/// An empty directory yields the hash of the empty input; a nonexistent
/// path yields `""`.
pub fn directory_checksum(dir: &Path) -> String {
    directory_checksum_filtered(dir, |_, _, _| false)
}

/// Like [`directory_checksum`], but additionally skipping entries for which
/// `skip(path, basename, is_dir)` returns true. A skipped directory prunes
/// its whole subtree. Used by validation so the checksum is computed over
/// the same filter as extraction.
pub fn directory_checksum_filtered<F>(dir: &Path, skip: F) -> String
where
    F: Fn(&Path, &str, bool) -> bool,
{
    if !dir.is_dir() {
        return String::new();
    }

    let root = dir.to_path_buf();
    let mut relative_paths: Vec<String> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |entry| {
            if entry.path() == root {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !skip(entry.path(), &name, entry.file_type().is_dir())
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name() != std::ffi::OsStr::new(METADATA_BASENAME))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(dir)
                .ok()
                .map(portable_path_string)
        })
        .collect();
    relative_paths.sort();

    let mut hasher = Sha256::new();
    for relative in &relative_paths {
        hasher.update(relative.as_bytes());
        match File::open(dir.join(relative)) {
            Ok(file) => {
                if stream_into(&mut hasher, file).is_err() {
                    hasher.update(UNREADABLE_SENTINEL);
                }
            }
            Err(_) => hasher.update(UNREADABLE_SENTINEL),
        }
    }

    hex::encode(hasher.finalize())
}

/// Normalize a repository URL for consistent hashing.
///
/// Lowercases, strips trailing `/` and `.git`, and rewrites
/// `git@github.com:` / `git@gitlab.com:` SSH forms to their HTTPS
/// equivalents. Other SSH forms pass through unchanged.
pub fn normalize_repo_url(repo_url: &str) -> String {
    let mut normalized = repo_url.trim_end_matches('/').to_string();
    if normalized.ends_with(".git") {
        normalized.truncate(normalized.len() - 4);
    }

    if let Some(rest) = normalized.strip_prefix("git@github.com:") {
        normalized = format!("https://github.com/{rest}");
    } else if let Some(rest) = normalized.strip_prefix("git@gitlab.com:") {
        normalized = format!("https://gitlab.com/{rest}");
    }

    normalized.to_lowercase()
}

/// Generate the mirror directory hash for a repository URL.
///
/// First 8 bytes of the SHA-256 of the normalized URL, as 16 lowercase hex
/// characters. Equivalent URLs (trailing slash, `.git` suffix, SSH form)
/// map to the same hash.
pub fn repo_hash(repo_url: &str) -> String {
    let normalized = normalize_repo_url(repo_url);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..8])
}

fn stream_into(hasher: &mut Sha256, file: File) -> std::io::Result<()> {
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

fn portable_path_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

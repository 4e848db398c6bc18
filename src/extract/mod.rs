//! Selective subtree extraction from mirrors into the project.
//!
//! An extraction fully replaces the destination: the previous installation
//! is deleted, the subtree is copied through the three-tier filter, license
//! and provenance hygiene run, and only then is the content checksum taken.
//! Provenance and license files therefore exist on disk before
//! checksumming, so later validation is a clean round-trip.

pub mod filter;
pub mod license;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::core::config::ImportSpec;
use crate::core::provenance::{LicenseBlock, ProvenanceRecord, SourceBlock};
use crate::error::{Error, Result};
use crate::extract::filter::ExtractionFilter;
use crate::extract::license::LicenseInfo;
use crate::util::hash::{directory_checksum_filtered, file_checksum};
use crate::util::{fs as fsutil, paths};

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Destination, relative to the project root.
    pub local_path: String,

    /// Content checksum of the destination.
    pub checksum: String,

    /// License detected in the upstream repository (or subtree).
    pub detected_license: Option<String>,

    /// Basename of the detected license file.
    pub license_file: Option<String>,
}

/// Copies designated subtrees out of mirrors into the project.
pub struct Extractor {
    project_root: PathBuf,
}

impl Extractor {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Extractor {
            project_root: project_root.into(),
        }
    }

    /// Extract a library subtree from a mirror working tree.
    ///
    /// `mirror_workdir` is the root of the mirror's checkout;
    /// `spec.source_path` selects the subtree (`.` for the whole tree).
    /// Any failure after the destination has been cleared deletes the
    /// partially written destination before the error propagates.
    pub fn extract(
        &self,
        library_name: &str,
        spec: &ImportSpec,
        mirror_workdir: &Path,
        library_root: &str,
        resolved_commit: &str,
    ) -> Result<ExtractionOutcome> {
        let destination = paths::resolve_local_path(
            &self.project_root,
            library_root,
            library_name,
            spec.local_path.as_deref(),
        )?;

        let source = mirror_workdir.join(&spec.source_path);
        if !source.exists() {
            return Err(Error::SourceMissing {
                path: PathBuf::from(&spec.source_path),
            });
        }

        tracing::info!(
            "extracting {library_name} from {} to {}",
            spec.source_path,
            destination.display()
        );

        fsutil::remove_path_if_exists(&destination)?;
        if let Some(parent) = destination.parent() {
            fsutil::ensure_dir(parent)?;
        }

        let result = self.materialize(library_name, spec, mirror_workdir, &source, &destination, resolved_commit);
        if result.is_err() {
            let _ = fsutil::remove_path_if_exists(&destination);
        }
        result
    }

    /// Recompute the checksum of an installed library, applying the same
    /// filter as extraction so user content matching ignore patterns does
    /// not flip validation.
    pub fn installed_checksum(&self, installed: &Path, spec_like: ChecksumBasis<'_>) -> String {
        if installed.is_dir() {
            let filter = ExtractionFilter::new(
                &self.project_root,
                installed,
                spec_like.ignore_patterns,
                spec_like.checkin,
            );
            directory_checksum_filtered(installed, |path, name, is_dir| {
                filter.is_ignored(path, name, is_dir)
            })
        } else {
            file_checksum(installed)
        }
    }

    fn materialize(
        &self,
        library_name: &str,
        spec: &ImportSpec,
        mirror_workdir: &Path,
        source: &Path,
        destination: &Path,
        resolved_commit: &str,
    ) -> Result<ExtractionOutcome> {
        let io_err = |err: io::Error| Error::Extraction {
            path: destination.to_path_buf(),
            source: err,
        };

        let filter = ExtractionFilter::new(
            &self.project_root,
            source,
            &spec.ignore_patterns,
            spec.checkin,
        );

        if source.is_dir() {
            copy_filtered(source, destination, &filter).map_err(io_err)?;
        } else {
            fs::copy(source, destination).map_err(io_err)?;
        }

        // License detection runs against the repository root first; the
        // subtree is the fallback for repositories without a top-level
        // license file.
        let root_info = license::detect_license(mirror_workdir);
        let info = if root_info.license_type.is_some() {
            root_info
        } else {
            license::detect_license(source)
        };

        if spec.checkin && destination.is_dir() {
            self.preserve_license(&info, mirror_workdir, destination)
                .map_err(io_err)?;
            self.write_provenance(library_name, spec, resolved_commit, &info, destination)?;
        }

        // Checksum runs last, over everything written above.
        let checksum = if destination.is_dir() {
            let validation_filter = ExtractionFilter::new(
                &self.project_root,
                destination,
                &spec.ignore_patterns,
                spec.checkin,
            );
            directory_checksum_filtered(destination, |path, name, is_dir| {
                validation_filter.is_ignored(path, name, is_dir)
            })
        } else {
            file_checksum(destination)
        };

        Ok(ExtractionOutcome {
            local_path: paths::project_relative(&self.project_root, destination),
            checksum,
            detected_license: info.license_type,
            license_file: info.license_file,
        })
    }

    /// Copy a repository-root license file into the destination when the
    /// copied subtree itself carries none.
    fn preserve_license(
        &self,
        info: &LicenseInfo,
        mirror_workdir: &Path,
        destination: &Path,
    ) -> io::Result<()> {
        let Some(file_name) = info.license_file.as_deref() else {
            return Ok(());
        };
        if destination.join(file_name).exists() {
            return Ok(());
        }
        let source_file = mirror_workdir.join(file_name);
        if source_file.is_file() {
            fs::copy(&source_file, destination.join(file_name))?;
        }
        Ok(())
    }

    fn write_provenance(
        &self,
        library_name: &str,
        spec: &ImportSpec,
        resolved_commit: &str,
        info: &LicenseInfo,
        destination: &Path,
    ) -> Result<()> {
        let mut notes = Vec::new();
        if let (Some(license_type), Some(file)) = (&info.license_type, &info.license_file) {
            notes.push(format!(
                "Upstream license {license_type} ({file}) applies to this library."
            ));
        }
        if let Some(warning) = license::compatibility_warning(info.license_type.as_deref()) {
            notes.push(warning);
        }

        let record = ProvenanceRecord {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            extracted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            library_name: library_name.to_string(),
            source: SourceBlock {
                repository: spec.repo.clone(),
                reference: spec.reference.clone(),
                commit: resolved_commit.to_string(),
                source_path: spec.source_path.clone(),
            },
            license: LicenseBlock {
                license_type: info.license_type.clone(),
                file: info.license_file.clone(),
                snippet: info.content_snippet.clone(),
            },
            compliance_notes: notes,
        };
        record.write_to(destination)
    }
}

/// Checksum inputs shared by extraction and validation.
pub struct ChecksumBasis<'a> {
    pub ignore_patterns: &'a [String],
    pub checkin: bool,
}

/// Recursively copy `src` into `dst`, applying the filter and preserving
/// symlinks rather than following them.
fn copy_filtered(src: &Path, dst: &Path, filter: &ExtractionFilter) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let src_path = entry.path();
        let dst_path = dst.join(&name);

        if filter.is_ignored(&src_path, &name_str, file_type.is_dir()) {
            continue;
        }

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path)?;
            crate::util::fs::symlink(&target, &dst_path)?;
        } else if file_type.is_dir() {
            copy_filtered(&src_path, &dst_path, filter)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

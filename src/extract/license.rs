//! License file detection and classification.
//!
//! Detection is advisory: the tool records what it finds and warns about
//! copyleft or unclear licensing, but never refuses an install.

use std::path::Path;

/// License file candidates, in match-priority order. Matching is
/// case-insensitive against directory entries; the first hit wins.
pub const LICENSE_FILENAMES: &[&str] = &[
    "LICENSE",
    "LICENSE.txt",
    "LICENSE.md",
    "LICENSE.rst",
    "LICENCE",
    "COPYING",
    "COPYRIGHT",
];

/// How much of a license file is inspected during classification.
const CLASSIFY_WINDOW: usize = 8192;

/// Result of scanning a directory for a license file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LicenseInfo {
    /// SPDX-style identifier, `Unknown` for unclassified text, or `None`
    /// when no readable license file exists.
    pub license_type: Option<String>,

    /// Basename of the license file that was found.
    pub license_file: Option<String>,

    /// First few meaningful lines of the license text.
    pub content_snippet: Option<String>,
}

/// Whether a filename is one of the recognized license candidates.
pub fn is_license_candidate(name: &str) -> bool {
    LICENSE_FILENAMES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Search `dir` for a license file and classify it.
pub fn detect_license(dir: &Path) -> LicenseInfo {
    let Some((file_name, path)) = find_license_file(dir) else {
        return LicenseInfo::default();
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(_) => return LicenseInfo::default(),
    };
    let window = &bytes[..bytes.len().min(CLASSIFY_WINDOW)];
    let content = String::from_utf8_lossy(window);

    let license_type = classify(&content).unwrap_or("Unknown");

    LicenseInfo {
        license_type: Some(license_type.to_string()),
        license_file: Some(file_name),
        content_snippet: content_snippet(&content),
    }
}

/// Locate the first license candidate in a directory, case-insensitively.
pub fn find_license_file(dir: &Path) -> Option<(String, std::path::PathBuf)> {
    let entries: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    for candidate in LICENSE_FILENAMES {
        if let Some(name) = entries
            .iter()
            .find(|name| name.eq_ignore_ascii_case(candidate))
        {
            return Some((name.clone(), dir.join(name)));
        }
    }
    None
}

/// Advisory message for license types that need designer attention.
///
/// Permissive licenses return `None`; pass `None` for a library with no
/// detected license at all.
pub fn compatibility_warning(license_type: Option<&str>) -> Option<String> {
    match license_type {
        Some(t) if t.starts_with("LGPL") => Some(format!(
            "{t} is weak copyleft: modifications to this library must be released under the same license"
        )),
        Some(t) if t.starts_with("GPL") => Some(format!(
            "{t} is copyleft: derived designs may be subject to source disclosure obligations"
        )),
        Some("Unknown") => {
            Some("license file found but not recognized: review terms manually".to_string())
        }
        Some(_) => None,
        None => Some(
            "no license file detected: usage rights are unclear, contact the upstream author"
                .to_string(),
        ),
    }
}

/// Classify license text (already truncated to the inspection window).
///
/// LGPL is checked before GPL because the LGPL text embeds the GPL name;
/// Apache and MPL carry distinctive headers and go first.
fn classify(content: &str) -> Option<&'static str> {
    let text = content.to_lowercase();

    if text.contains("apache license") && text.contains("version 2.0") {
        return Some("Apache-2.0");
    }
    if text.contains("mozilla public license") && text.contains("2.0") {
        return Some("MPL-2.0");
    }
    if text.contains("lesser general public license") {
        if text.contains("version 3") {
            return Some("LGPL-3.0");
        }
        if text.contains("version 2.1") {
            return Some("LGPL-2.1");
        }
    }
    if text.contains("general public license") {
        if text.contains("version 3") {
            return Some("GPL-3.0");
        }
        if text.contains("version 2") {
            return Some("GPL-2.0");
        }
    }
    if text.contains("bsd 3-clause")
        || (text.contains("redistribution and use") && text.contains("neither the name"))
    {
        return Some("BSD-3-Clause");
    }
    if text.contains("bsd 2-clause")
        || (text.contains("redistribution and use")
            && text.contains("redistributions in binary form"))
    {
        return Some("BSD-2-Clause");
    }
    if text.contains("mit license") || text.contains("permission is hereby granted, free of charge")
    {
        return Some("MIT");
    }
    if text.contains("isc license")
        || text.contains("permission to use, copy, modify, and/or distribute")
    {
        return Some("ISC");
    }

    None
}

/// First 3 non-blank, non-decorative lines of the license text.
fn content_snippet(content: &str) -> Option<String> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_banner(line))
        .take(3)
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn is_banner(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '=' | '*' | '-' | '#'))
}

//! Path utilities for extension matching and safe file naming.
//!
//! Extension checks are case-insensitive since e-book collections routinely mix
//! `Book.EPUB` and `book.epub`. Names coming from document content (e.g. FB2
//! attachment ids) are sanitized before they touch the file system.

use std::ffi::OsStr;
use std::path::Path;

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks whether an extension (without the dot) equals `expected`, ignoring ASCII case.
pub fn extension_eq(extension: Option<&OsStr>, expected: &str) -> bool {
    extension
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Checks whether the path's extension equals `expected`, ignoring ASCII case.
///
/// # Arguments
///
/// * `path` - The path to check
/// * `expected` - Extension without the leading dot, e.g. `"epub"`
pub fn has_extension(path: &Path, expected: &str) -> bool {
    extension_eq(path.extension(), expected)
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
///
/// The result never contains a path separator and is never empty, `.` or `..`,
/// so joining it onto a directory always yields a direct child of that directory.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

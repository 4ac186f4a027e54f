//! Source file classification.
//!
//! Maps a file name to the [`SourceFormat`] it should be converted as, and derives
//! the name of the book the compiler will produce for it. Classification looks at
//! names only; whether an archive really contains a payload is found out while
//! staging the job.

use std::ffi::OsString;
use std::path::Path;

use crate::path_utils::{extension_eq, has_extension};
use crate::types::{SourceFormat, TARGET_EXTENSION, Variant};

/// A convertible source file together with its destination file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub format: SourceFormat,
    /// Base name with any archive/format suffix stripped, plus the target extension.
    pub output_file_name: OsString,
}

/// Classifies a source file by name.
///
/// Recognized: `*.epub`, `*.epub.zip`, `*.fb2`, `*.fb2.zip` (case-insensitive).
/// Returns `None` for anything else, which the collector skips silently.
///
/// # Example
///
/// ```rust
/// use mobi_batch::classifier::classify;
/// use mobi_batch::types::SourceFormat;
/// use std::path::Path;
///
/// let c = classify(Path::new("library/Dune.FB2.zip")).unwrap();
/// assert_eq!(c.format, SourceFormat::ZippedFb2);
/// assert_eq!(c.output_file_name, "Dune.mobi");
/// assert!(classify(Path::new("notes.txt")).is_none());
/// ```
pub fn classify(path: &Path) -> Option<Classification> {
    let stem = path.file_stem()?;

    let (format, base) = if has_extension(path, Variant::Epub.extension()) {
        (SourceFormat::Epub, stem)
    } else if has_extension(path, Variant::Fb2.extension()) {
        (SourceFormat::Fb2, stem)
    } else if has_extension(path, "zip") {
        let inner = Path::new(stem);
        let inner_stem = inner.file_stem()?;
        if extension_eq(inner.extension(), Variant::Epub.extension()) {
            (SourceFormat::ZippedEpub, inner_stem)
        } else if extension_eq(inner.extension(), Variant::Fb2.extension()) {
            (SourceFormat::ZippedFb2, inner_stem)
        } else {
            return None;
        }
    } else {
        return None;
    };

    let mut output_file_name = base.to_os_string();
    output_file_name.push(".");
    output_file_name.push(TARGET_EXTENSION);

    Some(Classification {
        format,
        output_file_name,
    })
}

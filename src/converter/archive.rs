use std::fs::File;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::path_utils::{has_extension, path_to_string_lossy};

/// Extracts the first file entry of `archive_path` whose extension is `extension`
/// (case-insensitive) to `target`, returning the entry's name.
///
/// Blocking; run it through `spawn_blocking` from async code.
pub fn extract_first_matching(archive_path: &Path, extension: &str, target: &Path) -> Result<String> {
    let file = File::open(archive_path).map_err(|e| {
        Error::Staging(format!(
            "Failed to open archive '{}': {}",
            path_to_string_lossy(archive_path),
            e
        ))
    })?;
    let mut archive = ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() || !has_extension(Path::new(entry.name()), extension) {
            continue;
        }

        let name = entry.name().to_string();
        let mut out = File::create(target)?;
        io::copy(&mut entry, &mut out)?;
        return Ok(name);
    }

    Err(Error::Staging(format!(
        "Archive '{}' contains no .{} file",
        path_to_string_lossy(archive_path),
        extension
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extracts_first_matching_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.fb2.zip");
        write_zip(
            &archive,
            &[
                ("readme.txt", b"hello"),
                ("nested/First.FB2", b"<first/>"),
                ("second.fb2", b"<second/>"),
            ],
        );

        let target = dir.path().join("book.fb2");
        let name = extract_first_matching(&archive, "fb2", &target).unwrap();
        assert_eq!(name, "nested/First.FB2");
        assert_eq!(std::fs::read(&target).unwrap(), b"<first/>");
    }

    #[test]
    fn test_no_matching_entry_is_a_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.epub.zip");
        write_zip(&archive, &[("cover.jpg", b"\xff\xd8")]);

        let target = dir.path().join("book.epub");
        let err = extract_first_matching(&archive, "epub", &target).unwrap_err();
        assert!(matches!(err, Error::Staging(_)));
        assert!(!target.exists());
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.epub.zip");
        std::fs::write(&archive, b"not a zip").unwrap();
        assert!(extract_first_matching(&archive, "epub", &dir.path().join("book.epub")).is_err());
    }
}

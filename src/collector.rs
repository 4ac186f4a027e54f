//! Job enumeration.
//!
//! Walks a source tree (or takes an explicit list of files) and turns every
//! convertible file into a [`ConversionJob`]. Tree scans mirror the relative
//! directory layout under the destination and fan out one tokio task per
//! subdirectory; jobs are streamed to the caller over a channel as they are found.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;
use rayon::prelude::*;
use tokio::fs::{self, read_dir};
use tokio::sync::mpsc::UnboundedSender;

use crate::classifier::classify;
use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;
use crate::types::{ConversionJob, ScanError};

/// What a tree scan reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Job(ConversionJob),
    /// A directory that could not be listed; its contents are skipped.
    Failed(ScanError),
}

/// Builds the job for `source` if it is convertible, targeting `dest_dir`.
pub fn job_for(source: &Path, dest_dir: &Path) -> Option<ConversionJob> {
    let classification = classify(source)?;
    Some(ConversionJob::new(
        source.to_path_buf(),
        dest_dir.join(classification.output_file_name),
        classification.format,
    ))
}

/// Checks that a scan root exists and is a directory.
pub async fn validate_root(source_dir: &Path) -> Result<()> {
    let metadata = fs::metadata(source_dir).await.map_err(|_| {
        Error::NotFound(format!(
            "Source directory does not exist: {}",
            path_to_string_lossy(source_dir)
        ))
    })?;
    if !metadata.is_dir() {
        return Err(Error::InvalidPath(
            source_dir.to_path_buf(),
            "Source path is not a directory.".to_string(),
        ));
    }
    Ok(())
}

/// Recursively scans `source_dir`, sending a [`ScanEvent`] for every job and
/// every unreadable directory.
///
/// Each subdirectory is scanned by its own spawned task holding a clone of `tx`,
/// so the receiving end sees the channel close once the whole tree is done.
/// Symlinked files are picked up; symlinked directories are not followed.
pub fn scan_tree(
    source_dir: PathBuf,
    dest_dir: PathBuf,
    tx: UnboundedSender<ScanEvent>,
) -> BoxFuture<'static, ()> {
    async move {
        let mut entries = match read_dir(&source_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                report_failure(&tx, &source_dir, e);
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report_failure(&tx, &source_dir, e);
                    break;
                }
            };
            let path = entry.path();

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    log::warn!("Skipping '{}': {}", path_to_string_lossy(&path), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                let sub_dest = dest_dir.join(entry.file_name());
                tokio::spawn(scan_tree(path, sub_dest, tx.clone()));
                continue;
            }

            let is_file = file_type.is_file()
                || (file_type.is_symlink()
                    && fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false));
            if !is_file {
                continue;
            }

            if let Some(job) = job_for(&path, &dest_dir) {
                // The receiver only goes away if the batch itself was dropped.
                if tx.send(ScanEvent::Job(job)).is_err() {
                    return;
                }
            }
        }
    }
    .boxed()
}

fn report_failure(tx: &UnboundedSender<ScanEvent>, dir: &Path, error: std::io::Error) {
    log::warn!(
        "Failed to read directory '{}': {}",
        path_to_string_lossy(dir),
        error
    );
    let _ = tx.send(ScanEvent::Failed(ScanError {
        path: dir.to_path_buf(),
        message: error.to_string(),
    }));
}

/// Turns an explicit file list into jobs that all target `dest_dir` directly.
///
/// Files are classified in parallel. Unconvertible names are dropped and
/// duplicates are kept once, in the order they were first given.
pub fn jobs_from_files(files: &[PathBuf], dest_dir: &Path) -> Vec<ConversionJob> {
    let jobs: Vec<ConversionJob> = files
        .par_iter()
        .filter_map(|file| job_for(file, dest_dir))
        .collect();

    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.source().to_path_buf()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFormat;
    use tokio::sync::mpsc::unbounded_channel;

    async fn collect_tree(source: &Path, dest: &Path) -> (Vec<ConversionJob>, Vec<ScanError>) {
        let (tx, mut rx) = unbounded_channel();
        tokio::spawn(scan_tree(source.to_path_buf(), dest.to_path_buf(), tx));

        let mut jobs = Vec::new();
        let mut errors = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                ScanEvent::Job(job) => jobs.push(job),
                ScanEvent::Failed(error) => errors.push(error),
            }
        }
        jobs.sort_by(|a, b| a.source().cmp(b.source()));
        (jobs, errors)
    }

    #[test]
    fn test_job_for_maps_into_destination() {
        let job = job_for(Path::new("in/sub/Book.epub.zip"), Path::new("out/sub")).unwrap();
        assert_eq!(job.destination(), Path::new("out/sub/Book.mobi"));
        assert_eq!(job.format(), SourceFormat::ZippedEpub);
        assert!(job_for(Path::new("in/cover.jpg"), Path::new("out")).is_none());
    }

    #[test]
    fn test_jobs_from_files_is_flat_and_deduplicated() {
        let files = vec![
            PathBuf::from("a/one.fb2"),
            PathBuf::from("b/c/two.EPUB"),
            PathBuf::from("readme.md"),
            PathBuf::from("a/one.fb2"),
        ];
        let jobs = jobs_from_files(&files, Path::new("dst"));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].destination(), Path::new("dst/one.mobi"));
        assert_eq!(jobs[1].destination(), Path::new("dst/two.mobi"));
    }

    #[tokio::test]
    async fn test_scan_tree_mirrors_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("sub/deeper")).unwrap();
        std::fs::write(src.join("a.epub"), b"a").unwrap();
        std::fs::write(src.join("notes.txt"), b"n").unwrap();
        std::fs::write(src.join("sub/b.fb2"), b"b").unwrap();
        std::fs::write(src.join("sub/deeper/c.fb2.zip"), b"c").unwrap();

        let dst = dir.path().join("dst");
        let (jobs, errors) = collect_tree(&src, &dst).await;

        assert!(errors.is_empty());
        let destinations: Vec<_> = jobs.iter().map(|j| j.destination().to_path_buf()).collect();
        assert_eq!(
            destinations,
            vec![
                dst.join("a.mobi"),
                dst.join("sub/b.mobi"),
                dst.join("sub/deeper/c.mobi"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreadable_root_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let (jobs, errors) = collect_tree(&missing, &dir.path().join("dst")).await;
        assert!(jobs.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, missing);
    }

    #[tokio::test]
    async fn test_validate_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_root(dir.path()).await.is_ok());
        assert!(matches!(
            validate_root(&dir.path().join("nope")).await,
            Err(Error::NotFound(_))
        ));
        let file = dir.path().join("file.epub");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            validate_root(&file).await,
            Err(Error::InvalidPath(..))
        ));
    }
}

//! Isolated temporary directory for one job's intermediate files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::types::{TARGET_EXTENSION, Variant};

/// Stem shared by every canonical file inside a workspace.
const LOCAL_STEM: &str = "book";
const WORKSPACE_PREFIX: &str = "mobi-batch-";

/// A uniquely named temporary directory owned by exactly one job.
///
/// Call [`Workspace::close`] when the job is done; dropping the workspace also
/// removes the directory, but silently.
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Creates a fresh, empty workspace under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| {
                Error::Staging(format!(
                    "Failed to create workspace in '{}': {}",
                    root.display(),
                    e
                ))
            })?;
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where the staged source payload lives, e.g. `<ws>/book.fb2`.
    pub fn local_input(&self, variant: Variant) -> PathBuf {
        self.file(&format!("{}.{}", LOCAL_STEM, variant.extension()))
    }

    /// File name the compiler is told to write (`book.mobi`).
    pub fn local_output_name(&self) -> String {
        format!("{}.{}", LOCAL_STEM, TARGET_EXTENSION)
    }

    pub fn local_output(&self) -> PathBuf {
        self.file(&self.local_output_name())
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Deletes the workspace and everything in it.
    pub fn close(self) -> Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove workspace '{}': {}", path.display(), e),
            ))
        })
    }
}

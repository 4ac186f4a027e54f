//! Core data types, enums, and reports for the batch converter.
//!
//! This module defines the fundamental data structures used throughout the crate:
//! - Source format classification (`SourceFormat`, `Variant`)
//! - The per-file unit of work (`ConversionJob`) and its result (`ConversionOutcome`)
//! - Reporting types (`UnconvertedJob`, `ScanError`, `BatchReport`)

use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Extension (without the dot) of the books produced by the external compiler.
pub const TARGET_EXTENSION: &str = "mobi";

/// Format-specific conversion strategy.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Variant {
    /// EPUB sources are handed to the compiler as-is.
    Epub,
    /// FB2 sources are rendered to XHTML/OPF/NCX before compiling.
    Fb2,
}

impl Variant {
    /// The extension (without the dot) a payload of this variant carries.
    pub fn extension(&self) -> &'static str {
        match self {
            Variant::Epub => "epub",
            Variant::Fb2 => "fb2",
        }
    }
}

/// Detected format of a source file, including whether it is wrapped in a zip archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceFormat {
    Epub,       // book.epub
    ZippedEpub, // book.epub.zip
    Fb2,        // book.fb2
    ZippedFb2,  // book.fb2.zip
}

impl SourceFormat {
    pub fn variant(&self) -> Variant {
        match self {
            SourceFormat::Epub | SourceFormat::ZippedEpub => Variant::Epub,
            SourceFormat::Fb2 | SourceFormat::ZippedFb2 => Variant::Fb2,
        }
    }

    /// True when the payload has to be extracted from a zip archive.
    pub fn is_archived(&self) -> bool {
        matches!(self, SourceFormat::ZippedEpub | SourceFormat::ZippedFb2)
    }
}

/// One source-file-to-destination-file conversion unit.
///
/// Created by the collector and never mutated afterwards; the task converting it owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConversionJob {
    source: PathBuf,
    destination: PathBuf,
    format: SourceFormat,
}

impl ConversionJob {
    pub fn new(source: PathBuf, destination: PathBuf, format: SourceFormat) -> Self {
        Self {
            source,
            destination,
            format,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }
}

/// The result of converting one [`ConversionJob`]. Produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// True when the job was already converted, or when no step failed and
    /// this run published a fresh destination file.
    pub succeeded: bool,
    /// True when the destination already existed and overwriting is disabled.
    pub already_converted: bool,
    /// Whether the destination file existed once the job finished. A stale
    /// destination left from an earlier run counts.
    pub destination_exists: bool,
    /// Captured console output of the external compiler (empty if it never ran).
    pub tool_output: String,
    /// Exit code of the external compiler, if it ran to completion.
    pub tool_exit_code: Option<i32>,
    /// Message of the step failure that stopped the job, if any.
    pub error_message: Option<String>,
}

impl ConversionOutcome {
    /// Outcome for a job whose task never reported back (e.g. it panicked).
    pub fn aborted(job: &ConversionJob, reason: String) -> Self {
        Self {
            source: job.source().to_path_buf(),
            destination: job.destination().to_path_buf(),
            succeeded: false,
            already_converted: false,
            destination_exists: false,
            tool_output: String::new(),
            tool_exit_code: None,
            error_message: Some(reason),
        }
    }

    pub fn error_text(&self) -> &str {
        self.error_message.as_deref().unwrap_or("")
    }
}

/// A job whose destination file did not exist after it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnconvertedJob {
    pub source: PathBuf,
    pub tool_output: String,
    pub error_message: String,
}

impl fmt::Display for UnconvertedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.source.display())?;
        if !self.tool_output.is_empty() {
            writeln!(f, "---------- Output stream ----------")?;
            writeln!(f, "{}", self.tool_output)?;
        }
        if !self.error_message.is_empty() {
            writeln!(f, "---------- Error message ----------")?;
            writeln!(f, "{}", self.error_message)?;
        }
        if !self.tool_output.is_empty() || !self.error_message.is_empty() {
            write!(f, "-----------------------------------")?;
        }
        Ok(())
    }
}

/// A directory the collector could not read. The rest of the scan continues.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchReport {
    /// One outcome per dispatched job, in dispatch order.
    pub outcomes: Vec<ConversionOutcome>,
    pub scan_errors: Vec<ScanError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

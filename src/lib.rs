//! Mobi Batch - Concurrent E-book Batch Compiler
//!
//! This crate converts whole libraries of EPUB and FB2 books (plain or zipped)
//! into MOBI files by driving an external e-book compiler (`kindlegen` by default)
//! once per book, with every book converted concurrently in its own temporary
//! workspace.
//!
//! # Getting Started
//!
//! Build an [`EngineConfig`], create a [`BatchEngine`] from it, subscribe whatever
//! should hear about progress, then convert a directory tree or a list of files.
//!
//! ```rust,no_run
//! use mobi_batch::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> mobi_batch::error::Result<()> {
//!     // 1. Configure the compiler run
//!     let config = EngineConfig::builder()
//!         .compression_level(2u8)
//!         .delete_input_on_success(false)
//!         .job_limit(JobLimit::PerCpu)
//!         .build()?;
//!
//!     // 2. Track progress (logs one line per finished book)
//!     let tracker = Arc::new(ProgressTracker::new());
//!     let mut engine = BatchEngine::new(config);
//!     engine.subscribe(tracker.clone());
//!
//!     // 3. Convert, keeping the directory layout of the source
//!     let report = engine.convert_tree("./library", "./kindle").await?;
//!
//!     for failure in tracker.unconverted() {
//!         eprintln!("{}", failure);
//!     }
//!     println!("{} books converted", report.succeeded().count());
//!     Ok(())
//! }
//! ```
//!
//! Failures of individual books never abort a batch; they are reported on the
//! book's [`ConversionOutcome`].

pub mod classifier;
pub mod collector;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod observer;
pub mod path_utils;
pub mod progress;
pub mod types;
pub mod workspace;

pub use classifier::classify;
pub use config::{EngineConfig, EngineConfigBuilder, JobLimit};
pub use converter::transform::{Stylesheet, StylesheetTransform, XsltProcessor};
pub use engine::BatchEngine;
pub use observer::{BatchEvent, ChannelObserver, ConversionObserver};
pub use progress::{ProgressSnapshot, ProgressTracker, format_time_left};
pub use types::{
    BatchReport, ConversionJob, ConversionOutcome, ScanError, SourceFormat, UnconvertedJob,
    Variant,
};
pub use workspace::Workspace;

/// Prelude module for convenient imports.
///
/// Re-exports the types needed to configure and run a batch with a single
/// `use mobi_batch::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        BatchEngine, BatchEvent, BatchReport, ChannelObserver, ConversionJob, ConversionObserver,
        ConversionOutcome, EngineConfig, EngineConfigBuilder, JobLimit, ProgressSnapshot,
        ProgressTracker, SourceFormat, Stylesheet, StylesheetTransform, UnconvertedJob, Variant,
        XsltProcessor, classify,
    };
}

//! The batch engine.
//!
//! [`BatchEngine`] turns a source tree or a list of files into jobs, spawns one
//! tokio task per job as soon as the job is known, and waits for all of them.
//! Observers registered with [`BatchEngine::subscribe`] hear when each batch
//! begins, a start notification right before each job is dispatched and a
//! completion notification when it ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;

use crate::collector::{self, ScanEvent};
use crate::config::EngineConfig;
use crate::converter::Converter;
use crate::converter::transform::{StylesheetTransform, XsltProcessor};
use crate::error::Result;
use crate::observer::ConversionObserver;
use crate::path_utils::path_to_string_lossy;
use crate::types::{BatchReport, ConversionJob, ConversionOutcome, ScanError};

/// Runs conversion batches with one configuration.
///
/// # Example
///
/// ```rust,no_run
/// use mobi_batch::prelude::*;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> mobi_batch::error::Result<()> {
/// let config = EngineConfig::builder()
///     .overwrite_existing_output(true)
///     .compression_level(2u8)
///     .build()?;
///
/// let tracker = Arc::new(ProgressTracker::new());
/// let mut engine = BatchEngine::new(config);
/// engine.subscribe(tracker.clone());
///
/// let report = engine.convert_tree("./library", "./kindle").await?;
/// for job in tracker.unconverted() {
///     eprintln!("{}", job);
/// }
/// println!("{} of {} converted", report.succeeded().count(), report.outcomes.len());
/// # Ok(())
/// # }
/// ```
pub struct BatchEngine {
    config: Arc<EngineConfig>,
    transformer: Arc<dyn StylesheetTransform>,
    observers: Vec<Arc<dyn ConversionObserver>>,
}

impl BatchEngine {
    /// Creates an engine using `xsltproc` for the FB2 stylesheets.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            transformer: Arc::new(XsltProcessor::default()),
            observers: Vec::new(),
        }
    }

    /// Replaces the stylesheet processor used for FB2 sources.
    pub fn with_transformer(mut self, transformer: Arc<dyn StylesheetTransform>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Registers an observer for every batch this engine runs from now on.
    /// Each batch opens with [`ConversionObserver::batch_started`].
    pub fn subscribe(&mut self, observer: Arc<dyn ConversionObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Converts every convertible file below `source_dir`, mirroring its layout
    /// under `dest_dir`, and returns once all jobs have finished.
    ///
    /// Fails only if `source_dir` is missing or not a directory. Directories that
    /// cannot be read later on end up in [`BatchReport::scan_errors`].
    pub async fn convert_tree(
        &self,
        source_dir: impl AsRef<Path>,
        dest_dir: impl AsRef<Path>,
    ) -> Result<BatchReport> {
        let source_dir = source_dir.as_ref();
        collector::validate_root(source_dir).await?;
        log::info!("Scanning '{}'", source_dir.display());

        let (tx, mut rx) = unbounded_channel();
        tokio::spawn(collector::scan_tree(
            source_dir.to_path_buf(),
            dest_dir.as_ref().to_path_buf(),
            tx,
        ));

        let mut dispatcher = self.dispatcher();
        let mut scan_errors = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                ScanEvent::Job(job) => dispatcher.dispatch(job).await,
                ScanEvent::Failed(error) => scan_errors.push(error),
            }
        }

        let outcomes = dispatcher.join().await;
        Ok(Self::report(outcomes, scan_errors))
    }

    /// Converts the given files, writing every result directly into `dest_dir`.
    pub async fn convert_files(
        &self,
        files: &[PathBuf],
        dest_dir: impl AsRef<Path>,
    ) -> Result<BatchReport> {
        let jobs = collector::jobs_from_files(files, dest_dir.as_ref());
        log::info!("{} of {} files are convertible", jobs.len(), files.len());

        let mut dispatcher = self.dispatcher();
        for job in jobs {
            dispatcher.dispatch(job).await;
        }

        let outcomes = dispatcher.join().await;
        Ok(Self::report(outcomes, Vec::new()))
    }

    /// Opens a new batch and tells the observers about it.
    fn dispatcher(&self) -> Dispatcher {
        for observer in &self.observers {
            observer.batch_started();
        }
        Dispatcher {
            config: Arc::clone(&self.config),
            transformer: Arc::clone(&self.transformer),
            observers: self.observers.clone().into(),
            limiter: self
                .config
                .job_limit
                .permits()
                .map(|permits| Arc::new(Semaphore::new(permits))),
            tasks: Vec::new(),
        }
    }

    fn report(outcomes: Vec<ConversionOutcome>, scan_errors: Vec<ScanError>) -> BatchReport {
        let report = BatchReport {
            outcomes,
            scan_errors,
        };
        log::info!(
            "Batch finished: {} converted, {} failed",
            report.succeeded().count(),
            report.failed().count()
        );
        report
    }
}

/// Per-batch dispatch state.
struct Dispatcher {
    config: Arc<EngineConfig>,
    transformer: Arc<dyn StylesheetTransform>,
    observers: Arc<[Arc<dyn ConversionObserver>]>,
    limiter: Option<Arc<Semaphore>>,
    tasks: Vec<(ConversionJob, JoinHandle<ConversionOutcome>)>,
}

impl Dispatcher {
    /// Announces `job` and spawns its task right away.
    async fn dispatch(&mut self, job: ConversionJob) {
        let size = source_size(job.source()).await;
        for observer in self.observers.iter() {
            observer.conversion_started(job.source(), size);
        }

        let converter = Converter::new(
            job.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.transformer),
        );
        let observers = Arc::clone(&self.observers);
        let limiter = self.limiter.clone();

        let task = tokio::spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail.
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            let outcome = converter.convert().await;
            notify_completed(&observers, &outcome);
            outcome
        });
        self.tasks.push((job, task));
    }

    /// Waits for every dispatched task. A task that died without reporting is
    /// turned into a failed outcome and announced here instead.
    async fn join(self) -> Vec<ConversionOutcome> {
        let (jobs, tasks): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = join_all(tasks).await;

        jobs.iter()
            .zip(results)
            .map(|(job, result)| match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!(
                        "Conversion task for '{}' aborted: {}",
                        job.source().display(),
                        e
                    );
                    let outcome =
                        ConversionOutcome::aborted(job, format!("Conversion task aborted: {}", e));
                    notify_completed(&self.observers, &outcome);
                    outcome
                }
            })
            .collect()
    }
}

/// Byte size of a source, 0 if it cannot be read.
async fn source_size(source: &Path) -> u64 {
    match fs::metadata(source).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            log::warn!(
                "Failed to read size of '{}': {}",
                path_to_string_lossy(source),
                e
            );
            0
        }
    }
}

fn notify_completed(observers: &[Arc<dyn ConversionObserver>], outcome: &ConversionOutcome) {
    for observer in observers {
        observer.conversion_completed(outcome);
    }
}

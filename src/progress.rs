//! Batch progress accounting.
//!
//! [`ProgressTracker`] is a [`ConversionObserver`] that keeps the byte and file
//! counts of a running batch and logs one line per finished job. The counters
//! start over whenever a new batch begins. Every update
//! happens under a single write lock, so concurrent notifications never lose
//! an increment; snapshots are taken under the read lock and are always
//! internally consistent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::TimeDelta;
use parking_lot::RwLock;

use crate::observer::ConversionObserver;
use crate::path_utils::path_to_string_lossy;
use crate::types::{ConversionOutcome, UnconvertedJob};

/// Shared counters of one batch.
#[derive(Debug)]
struct BatchStatistics {
    started_at: Instant,
    total_jobs: u64,
    completed_jobs: u64,
    total_bytes: u64,
    completed_bytes: u64,
    /// Size of every started job that has not completed yet.
    pending_sizes: HashMap<PathBuf, u64>,
    unconverted: Vec<UnconvertedJob>,
}

impl BatchStatistics {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_jobs: 0,
            completed_jobs: 0,
            total_bytes: 0,
            completed_bytes: 0,
            pending_sizes: HashMap::new(),
            unconverted: Vec::new(),
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_jobs: self.total_jobs,
            completed_jobs: self.completed_jobs,
            total_bytes: self.total_bytes,
            completed_bytes: self.completed_bytes,
            in_flight: self.pending_sizes.len(),
        }
    }
}

/// A consistent copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub total_bytes: u64,
    pub completed_bytes: u64,
    /// Jobs started but not completed.
    pub in_flight: usize,
}

impl ProgressSnapshot {
    /// Completed share of the total bytes, in whole percent.
    /// `None` while nothing has been registered.
    pub fn percent_complete(&self) -> Option<u64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.completed_bytes as u128 * 100 / self.total_bytes as u128) as u64)
    }

    /// Extrapolates the remaining time from `elapsed` and the completed bytes.
    /// `None` until at least one byte has been completed.
    pub fn time_remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.completed_bytes == 0 {
            return None;
        }
        let elapsed_nanos = elapsed.as_nanos();
        let projected = elapsed_nanos * self.total_bytes as u128 / self.completed_bytes as u128;
        let remaining = projected.saturating_sub(elapsed_nanos);
        Some(Duration::from_nanos(remaining.min(u64::MAX as u128) as u64))
    }
}

/// Renders a duration as `hh:mm:ss`, or `d.hh:mm:ss` from one day on.
pub fn format_time_left(duration: Duration) -> String {
    let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
    let days = delta.num_days();
    let hours = delta.num_hours() % 24;
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;

    if days == 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}.{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    }
}

/// Aggregates the notifications of the current batch into progress figures.
#[derive(Debug)]
pub struct ProgressTracker {
    statistics: RwLock<BatchStatistics>,
    log_tool_output: bool,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            statistics: RwLock::new(BatchStatistics::new()),
            log_tool_output: false,
        }
    }

    /// Also logs the compiler output of jobs that succeeded.
    pub fn with_tool_output_logging(mut self, enabled: bool) -> Self {
        self.log_tool_output = enabled;
        self
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.statistics.read().snapshot()
    }

    /// Time since the current batch began, or since the tracker was created
    /// if no batch has begun yet.
    pub fn elapsed(&self) -> Duration {
        self.statistics.read().started_at.elapsed()
    }

    /// Jobs whose destination did not exist once they completed, in completion order.
    pub fn unconverted(&self) -> Vec<UnconvertedJob> {
        self.statistics.read().unconverted.clone()
    }

    fn register_completion(&self, outcome: &ConversionOutcome) -> (ProgressSnapshot, Duration) {
        let mut stats = self.statistics.write();
        stats.completed_jobs += 1;
        let size = stats.pending_sizes.remove(&outcome.source).unwrap_or(0);
        stats.completed_bytes += size;

        if !outcome.destination_exists {
            stats.unconverted.push(UnconvertedJob {
                source: outcome.source.clone(),
                tool_output: outcome.tool_output.clone(),
                error_message: outcome.error_text().to_string(),
            });
        }

        (stats.snapshot(), stats.started_at.elapsed())
    }
}

impl ConversionObserver for ProgressTracker {
    fn batch_started(&self) {
        *self.statistics.write() = BatchStatistics::new();
    }

    fn conversion_started(&self, source: &Path, size: u64) {
        let mut stats = self.statistics.write();
        stats.total_jobs += 1;
        stats.total_bytes += size;
        stats.pending_sizes.insert(source.to_path_buf(), size);
    }

    fn conversion_completed(&self, outcome: &ConversionOutcome) {
        let (snapshot, elapsed) = self.register_completion(outcome);

        if outcome.destination_exists {
            let time_left = snapshot
                .time_remaining(elapsed)
                .map(format_time_left)
                .unwrap_or_else(|| "unknown".to_string());
            log::info!(
                "File #{}/{} ({}%), time left {}: {}",
                snapshot.completed_jobs,
                snapshot.total_jobs,
                snapshot.percent_complete().unwrap_or(100),
                time_left,
                path_to_string_lossy(&outcome.source)
            );
            if self.log_tool_output && !outcome.tool_output.is_empty() {
                log::info!("{}", outcome.tool_output);
            }
        } else {
            let unconverted = UnconvertedJob {
                source: outcome.source.clone(),
                tool_output: outcome.tool_output.clone(),
                error_message: outcome.error_text().to_string(),
            };
            log::warn!("Failed to convert file: {}", unconverted);
        }
    }
}

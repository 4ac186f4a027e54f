//! Start and completion notifications.
//!
//! Observers are registered on one [`BatchEngine`](crate::engine::BatchEngine)
//! and only hear about the batches that engine runs. Every batch opens with
//! `batch_started`, before any of its jobs is announced. Job notifications come
//! from the job tasks themselves, concurrently and in no particular order across
//! jobs; for a single job, `conversion_started` always comes before `conversion_completed`.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::types::ConversionOutcome;

/// Receives per-job notifications from a batch.
pub trait ConversionObserver: Send + Sync {
    /// A new batch begins. Per-batch state should be reset here.
    fn batch_started(&self) {}

    /// A job for `source` is about to be dispatched. `size` is the byte size of
    /// the source, or 0 if it could not be read.
    fn conversion_started(&self, _source: &Path, _size: u64) {}

    /// A job finished, successfully or not.
    fn conversion_completed(&self, _outcome: &ConversionOutcome) {}
}

/// A notification as forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started(PathBuf),
    Completed(ConversionOutcome),
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<BatchEvent>,
}

impl ChannelObserver {
    /// Creates the observer together with the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<BatchEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConversionObserver for ChannelObserver {
    fn conversion_started(&self, source: &Path, _size: u64) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.tx.send(BatchEvent::Started(source.to_path_buf()));
    }

    fn conversion_completed(&self, outcome: &ConversionOutcome) {
        let _ = self.tx.send(BatchEvent::Completed(outcome.clone()));
    }
}

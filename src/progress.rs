//! Shared progress counters for a run

use crate::types::QueueKind;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

/// Capacity of the progress event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Counters for one media queue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindProgress {
    /// Records queued for this kind
    pub total: usize,
    /// Records finished (successfully or not)
    pub done: usize,
}

/// Point-in-time copy of all counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Image queue counters
    pub images: KindProgress,
    /// Video queue counters
    pub videos: KindProgress,
    /// Records that failed permanently
    pub errors: usize,
}

impl ProgressSnapshot {
    /// Records queued across both kinds
    pub fn total(&self) -> usize {
        self.images.total + self.videos.total
    }

    /// Records finished across both kinds
    pub fn done(&self) -> usize {
        self.images.done + self.videos.done
    }

    fn kind_mut(&mut self, kind: QueueKind) -> &mut KindProgress {
        match kind {
            QueueKind::Image => &mut self.images,
            QueueKind::Video => &mut self.videos,
        }
    }
}

/// Emitted whenever a record finishes
#[derive(Clone, Debug, Serialize)]
pub struct ProgressEvent {
    /// Output key of the finished record
    pub key: String,
    /// Queue the record came from
    pub kind: QueueKind,
    /// Whether the record ended in permanent failure
    pub failed: bool,
    /// Counters after this record
    pub snapshot: ProgressSnapshot,
}

/// Progress counters mutated by all workers
///
/// Live displays subscribe to [`ProgressAggregator::subscribe`]; sending with
/// no subscribers is not an error.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<ProgressSnapshot>,
    event_tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    /// Create zeroed counters
    pub fn new() -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(ProgressSnapshot::default()),
            event_tx,
        }
    }

    /// Set the totals for a batch, zeroing completion and error counts
    ///
    /// Each pass counts only its own failures, so a record failing in both
    /// the main and the repair pass is one error per pass, not two in one.
    pub async fn reset(&self, images: usize, videos: usize) {
        *self.state.lock().await = ProgressSnapshot {
            images: KindProgress {
                total: images,
                done: 0,
            },
            videos: KindProgress {
                total: videos,
                done: 0,
            },
            errors: 0,
        };
    }

    /// Count one finished record
    pub async fn complete(&self, key: &str, kind: QueueKind, failed: bool) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.kind_mut(kind).done += 1;
            if failed {
                state.errors += 1;
            }
            *state
        };

        // Ignore send errors (no subscribers is fine)
        self.event_tx
            .send(ProgressEvent {
                key: key.to_string(),
                kind,
                failed,
                snapshot,
            })
            .ok();
    }

    /// Current counters
    pub async fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock().await
    }

    /// Subscribe to per-record events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.event_tx.subscribe()
    }
}

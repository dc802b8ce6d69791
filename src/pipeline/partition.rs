//! Per-kind work queues

use crate::record::Record;
use crate::types::QueueKind;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// The image and video queues of one batch
///
/// Both queues are fully populated before any worker starts; workers only
/// ever pop from the queue of their own kind.
#[derive(Debug, Default)]
pub struct TaskQueues {
    images: Mutex<VecDeque<Record>>,
    videos: Mutex<VecDeque<Record>>,
    image_total: usize,
    video_total: usize,
}

impl TaskQueues {
    /// Split `records` by kind, keeping input order within each queue
    ///
    /// Records without any link are dropped here; they produce no output and
    /// are not counted.
    pub fn partition(records: impl IntoIterator<Item = Record>) -> Self {
        let mut images = VecDeque::new();
        let mut videos = VecDeque::new();
        for record in records.into_iter().filter(|r| !r.is_inert()) {
            match record.kind.queue() {
                QueueKind::Image => images.push_back(record),
                QueueKind::Video => videos.push_back(record),
            }
        }
        Self {
            image_total: images.len(),
            video_total: videos.len(),
            images: Mutex::new(images),
            videos: Mutex::new(videos),
        }
    }

    /// Number of records initially queued for `kind`
    pub fn total(&self, kind: QueueKind) -> usize {
        match kind {
            QueueKind::Image => self.image_total,
            QueueKind::Video => self.video_total,
        }
    }

    /// Take the next record of `kind`, `None` once the queue is drained
    pub async fn pop(&self, kind: QueueKind) -> Option<Record> {
        let queue = match kind {
            QueueKind::Image => &self.images,
            QueueKind::Video => &self.videos,
        };
        queue.lock().await.pop_front()
    }
}

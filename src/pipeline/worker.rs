//! Worker pool draining the per-kind queues

use super::PipelineContext;
use super::partition::TaskQueues;
use super::record_task::process_record;
use crate::types::{LinkOrder, QueueKind, RecordOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Queues each pool slot consumes from, one worker per entry
const SLOT_WORKERS: [QueueKind; 3] = [QueueKind::Video, QueueKind::Image, QueueKind::Image];

/// Outcome counts of one batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Valid output already existed
    pub already_present: usize,
    /// Output produced by this batch
    pub downloaded: usize,
    /// Permanent failures
    pub failed: usize,
    /// Records without links
    pub inert: usize,
    /// Records left in the queues because the run was cancelled
    pub skipped: usize,
}

impl BatchReport {
    fn tally(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::AlreadyPresent => self.already_present += 1,
            RecordOutcome::Downloaded { .. } => self.downloaded += 1,
            RecordOutcome::Failed => self.failed += 1,
            RecordOutcome::Inert => self.inert += 1,
        }
    }

    fn absorb(&mut self, other: BatchReport) {
        self.already_present += other.already_present;
        self.downloaded += other.downloaded;
        self.failed += other.failed;
        self.inert += other.inert;
        self.skipped += other.skipped;
    }

    /// Records that went through the pipeline
    pub fn processed(&self) -> usize {
        self.already_present + self.downloaded + self.failed
    }
}

/// Queue of every worker to spawn for `slots` pool slots (at least one slot)
fn worker_plan(slots: usize) -> Vec<QueueKind> {
    (0..slots.max(1)).flat_map(|_| SLOT_WORKERS).collect()
}

/// Spawn `slots` × (1 video + 2 image) workers and wait for all of them
pub(crate) async fn run_workers(
    ctx: Arc<PipelineContext>,
    queues: Arc<TaskQueues>,
    slots: usize,
    order: LinkOrder,
    cancel: CancellationToken,
) -> BatchReport {
    let plan = worker_plan(slots);
    let mut handles = Vec::with_capacity(plan.len());
    for (index, kind) in plan.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        let queues = Arc::clone(&queues);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(&ctx, &queues, kind, order, &cancel).await
        }));
        debug!(slot = index / SLOT_WORKERS.len(), %kind, "worker spawned");
    }

    let mut report = BatchReport::default();
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(worker_report) => report.absorb(worker_report),
            Err(e) => error!(error = %e, "worker task panicked"),
        }
    }

    // anything still queued was never started
    for kind in [QueueKind::Image, QueueKind::Video] {
        while queues.pop(kind).await.is_some() {
            report.skipped += 1;
        }
    }
    report
}

async fn worker_loop(
    ctx: &PipelineContext,
    queues: &TaskQueues,
    kind: QueueKind,
    order: LinkOrder,
    cancel: &CancellationToken,
) -> BatchReport {
    let mut report = BatchReport::default();
    while !cancel.is_cancelled() {
        let Some(record) = queues.pop(kind).await else {
            break;
        };
        let outcome = process_record(ctx, &record, order).await;
        debug!(key = record.key(), ?outcome, "record finished");
        report.tally(outcome);
    }
    report
}

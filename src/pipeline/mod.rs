//! The fetch, unpack, merge and verify pipeline
//!
//! A run has two passes over the same worker pool:
//!
//! 1. the main pass processes every record with links in `[primary, backup]`
//!    order
//! 2. the repair pass rescans the output directory and reruns only the
//!    records still lacking output, with links in `[backup, primary]` order
//!
//! Each record first checks for an existing valid output (deleting invalid
//! ones), then goes through up to three attempts of download, unpack, merge,
//! verify and stamp. Records that exhaust their attempts land in the failure
//! ledger.

mod artifacts;
mod partition;
mod record_task;
mod repair;
mod worker;

pub use artifacts::{ArtifactPaths, output_extension};
pub use partition::TaskQueues;
pub use repair::scan_for_gaps;
pub use worker::BatchReport;

use crate::blocking::BlockingPool;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::DownloadClient;
use crate::ledger::FailureLedger;
use crate::media::{IntegrityVerifier, MediaTool, MergeEngine, TranscodeOptions};
use crate::progress::{ProgressAggregator, ProgressSnapshot};
use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::types::{LinkOrder, QueueKind};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Everything a worker needs, shared by `Arc`
pub(crate) struct PipelineContext {
    pub(crate) config: Arc<Config>,
    pub(crate) client: DownloadClient,
    pub(crate) tool: Arc<dyn MediaTool>,
    pub(crate) verifier: IntegrityVerifier,
    pub(crate) merger: MergeEngine,
    pub(crate) ledger: Arc<FailureLedger>,
    pub(crate) progress: Arc<ProgressAggregator>,
    pub(crate) fetch_limit: Semaphore,
    pub(crate) pool: BlockingPool,
    pub(crate) policy: RetryPolicy,
}

/// Summary of a full run (main pass plus repair pass)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Outcomes of the main pass
    pub main_pass: BatchReport,
    /// Records rerun by the repair pass
    pub repair_candidates: usize,
    /// Outcomes of the repair pass (zeroed when nothing needed repair)
    pub repair_pass: BatchReport,
    /// Records still without output after the repair pass
    pub still_missing: usize,
    /// Final progress counters
    pub progress: ProgressSnapshot,
}

/// Processes batches of records into the output directory
///
/// # Example
///
/// ```no_run
/// use memories_dl::config::Config;
/// use memories_dl::media::{CliMediaTool, MediaTool};
/// use memories_dl::pipeline::Pipeline;
/// use memories_dl::record::load_records;
/// use std::path::Path;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> memories_dl::Result<()> {
/// let tool: Arc<dyn MediaTool> = Arc::new(CliMediaTool::from_path());
/// let pipeline = Pipeline::new(Config::default(), tool)?;
///
/// let loaded = load_records(Path::new("json/memories_history.json")).await?;
/// let report = pipeline.run(&loaded.records, &CancellationToken::new()).await;
/// println!("{} still missing", report.still_missing);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    /// Build a pipeline from `config`, using `tool` for transcoding, probing
    /// and tagging
    pub fn new(config: Config, tool: Arc<dyn MediaTool>) -> Result<Self> {
        config.validate()?;

        let pool = BlockingPool::new(config.blocking_threads());
        let verifier = IntegrityVerifier::new(Arc::clone(&tool), pool.clone(), config.min_video_bytes);
        let merger = MergeEngine::new(
            Arc::clone(&tool),
            verifier.clone(),
            pool.clone(),
            TranscodeOptions {
                hardware_accel: config.hardware_accel,
                timeout: config.transcode_timeout,
            },
        );

        let ctx = PipelineContext {
            client: DownloadClient::from_config(&config)?,
            ledger: Arc::new(FailureLedger::new(&config.ledger_path)),
            progress: Arc::new(ProgressAggregator::new()),
            fetch_limit: Semaphore::new(config.fetch_permits()),
            policy: RetryPolicy::from_config(&config.retry),
            config: Arc::new(config),
            tool,
            verifier,
            merger,
            pool,
        };
        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Shared progress counters (subscribe for live events)
    pub fn progress(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.ctx.progress)
    }

    /// The failure ledger records are written to
    pub fn ledger(&self) -> Arc<FailureLedger> {
        Arc::clone(&self.ctx.ledger)
    }

    /// Process one batch with the given link order
    pub async fn run_batch(
        &self,
        records: &[Record],
        order: LinkOrder,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let output_dir = &self.ctx.config.output_dir;
        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            error!(?output_dir, error = %e, "cannot create output directory");
        }

        let queues = TaskQueues::partition(records.iter().cloned());
        let images = queues.total(QueueKind::Image);
        let videos = queues.total(QueueKind::Video);
        self.ctx.progress.reset(images, videos).await;

        let slots = self.ctx.config.worker_slots();
        info!(images, videos, slots, ?order, "starting batch");

        let mut report = worker::run_workers(
            Arc::clone(&self.ctx),
            Arc::new(queues),
            slots,
            order,
            cancel.clone(),
        )
        .await;
        report.inert += records.len() - images - videos;

        info!(
            downloaded = report.downloaded,
            already_present = report.already_present,
            failed = report.failed,
            skipped = report.skipped,
            "batch finished"
        );
        report
    }

    /// Main pass, then a repair pass over the records still lacking output
    pub async fn run(&self, records: &[Record], cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport {
            main_pass: self.run_batch(records, LinkOrder::PrimaryFirst, cancel).await,
            ..RunReport::default()
        };

        if cancel.is_cancelled() {
            info!("run cancelled, skipping repair pass");
        } else {
            let config = &self.ctx.config;
            let gaps = scan_for_gaps(records, &config.output_dir, config.mode).await;
            report.repair_candidates = gaps.len();

            if gaps.is_empty() {
                info!("all records have output, no repair needed");
            } else {
                info!(count = gaps.len(), "repair pass: retrying with backup links first");
                report.repair_pass = self.run_batch(&gaps, LinkOrder::BackupFirst, cancel).await;
            }
        }

        let config = &self.ctx.config;
        report.still_missing = scan_for_gaps(records, &config.output_dir, config.mode)
            .await
            .len();
        report.progress = self.ctx.progress.snapshot().await;
        info!(still_missing = report.still_missing, "run complete");
        report
    }
}

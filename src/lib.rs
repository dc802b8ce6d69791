//! # memories-dl
//!
//! Bulk retrieval of a personal media export: every record is downloaded,
//! split into its raw media and overlay, merged according to the chosen
//! processing mode, verified, and tagged with its capture date.
//!
//! ## Design
//!
//! - **Resumable** - a rerun skips every record whose output already verifies
//! - **Self-healing** - empty or corrupt outputs are deleted and fetched again
//! - **Two passes** - records still missing after the main pass are retried
//!   with their backup link first
//! - **Failure ledger** - records that exhaust their attempts are written to a
//!   deduplicated JSON file for later inspection
//!
//! ## Quick Start
//!
//! ```no_run
//! use memories_dl::{CliMediaTool, Config, MediaTool, Pipeline, ProcessingMode};
//! use memories_dl::record::load_records;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         mode: ProcessingMode::Optimized,
//!         ..Default::default()
//!     };
//!     let tool: Arc<dyn MediaTool> = Arc::new(CliMediaTool::from_path());
//!     let pipeline = Pipeline::new(config, tool)?;
//!
//!     // Subscribe to progress events
//!     let mut events = pipeline.progress().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{} done ({} errors)", event.snapshot.done(), event.snapshot.errors);
//!         }
//!     });
//!
//!     let loaded = load_records(Path::new("json/memories_history.json")).await?;
//!     let cancel = CancellationToken::new();
//!     let report = pipeline.run(&loaded.records, &cancel).await;
//!     println!("{:?}", report);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bounded pool for blocking work
pub mod blocking;
/// Startup cleanup of interrupted runs
pub mod cleanup;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// HTTP download with link fallback
pub mod fetch;
/// Failure ledger
pub mod ledger;
/// External media tools, merging and verification
pub mod media;
/// The record processing pipeline
pub mod pipeline;
/// Progress counters
pub mod progress;
/// Input records and the export loader
pub mod record;
/// Per-record retry protocol
pub mod retry;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use cleanup::{CleanupReport, clean_stale_artifacts};
pub use config::{Config, RetryConfig};
pub use error::{Error, MediaError, RecordError, Result};
pub use ledger::{FailureEntry, FailureLedger};
pub use media::{CliMediaTool, IntegrityVerifier, MediaTool, NoOpMediaTool, ProbeInfo};
pub use pipeline::{BatchReport, Pipeline, RunReport};
pub use progress::{ProgressAggregator, ProgressEvent, ProgressSnapshot};
pub use record::{LoadedRecords, Record, load_records};
pub use types::{LinkOrder, MediaKind, ProcessingMode, QueueKind, RecordOutcome};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// Spawns a background task; workers stop taking new records once the token
/// fires while records already in progress finish their attempt chain.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("stopping after records in progress finish");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (sigterm, sigint) => {
            if let Err(e) = sigterm.as_ref().and(sigint.as_ref()) {
                tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            }
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}

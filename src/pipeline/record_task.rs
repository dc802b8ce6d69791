//! Processing of a single record: short-circuit, attempt chain, failure ledger

use super::PipelineContext;
use super::artifacts::{ArtifactPaths, is_candidate_extension, output_extension};
use crate::error::{Error, Result};
use crate::extraction::{PayloadShape, detect_payload, unpack_archive};
use crate::ledger::FailureEntry;
use crate::media::MergePlan;
use crate::record::Record;
use crate::retry::run_with_retry;
use crate::types::{LinkOrder, RecordOutcome};
use crate::utils::{copy_with_retry, extension_of, remove_file_if_exists, write_with_retry};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, warn};

/// Run one record to completion and count it
pub(crate) async fn process_record(
    ctx: &PipelineContext,
    record: &Record,
    order: LinkOrder,
) -> RecordOutcome {
    if record.is_inert() {
        return RecordOutcome::Inert;
    }

    let paths = ArtifactPaths::new(&ctx.config.output_dir, record.key());
    let kind = record.kind.queue();

    if find_valid_output(ctx, &paths).await.is_some() {
        ctx.progress.complete(record.key(), kind, false).await;
        return RecordOutcome::AlreadyPresent;
    }

    let result = run_with_retry(&ctx.policy, record.key(), |attempt| {
        run_attempt(ctx, record, &paths, order, attempt)
    })
    .await;

    match result {
        Ok(((), attempt)) => {
            ctx.progress.complete(record.key(), kind, false).await;
            RecordOutcome::Downloaded { attempt }
        }
        Err(e) => {
            if let Err(ledger_err) = ctx.ledger.record(FailureEntry::new(record, e.to_string())).await {
                error!(
                    key = record.key(),
                    error = %ledger_err,
                    "failed to write failure ledger"
                );
            }
            ctx.progress.complete(record.key(), kind, true).await;
            RecordOutcome::Failed
        }
    }
}

/// First candidate output that verifies, deleting invalid ones on the way
async fn find_valid_output(ctx: &PipelineContext, paths: &ArtifactPaths) -> Option<PathBuf> {
    for candidate in paths.candidates(ctx.config.mode) {
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            continue;
        }
        match ctx.verifier.verify(&candidate).await {
            Ok(()) => {
                debug!(key = paths.key(), path = ?candidate, "valid output present, skipping");
                return Some(candidate);
            }
            Err(e) => {
                warn!(key = paths.key(), path = ?candidate, error = %e, "deleting invalid output");
                if let Err(e) = remove_file_if_exists(&candidate).await {
                    warn!(path = ?candidate, error = %e, "failed to delete invalid output");
                }
            }
        }
    }
    None
}

/// One attempt; transient artifacts are removed whatever the outcome
async fn run_attempt(
    ctx: &PipelineContext,
    record: &Record,
    paths: &ArtifactPaths,
    order: LinkOrder,
    attempt: u32,
) -> Result<()> {
    debug!(key = record.key(), attempt, ?order, "starting attempt");
    let result = attempt_steps(ctx, record, paths, order).await;

    if let Err(e) = paths.cleanup_transient().await {
        debug!(key = record.key(), error = %e, "transient cleanup failed");
    }
    result
}

async fn attempt_steps(
    ctx: &PipelineContext,
    record: &Record,
    paths: &ArtifactPaths,
    order: LinkOrder,
) -> Result<()> {
    let body = {
        let _permit = ctx
            .fetch_limit
            .acquire()
            .await
            .map_err(|_| Error::Other("fetch limiter closed".into()))?;
        ctx.client.fetch(&record.links(order)).await?
    };

    let temp = paths.temp();
    {
        let temp = temp.clone();
        ctx.pool.run(move || write_with_retry(&temp, &body)).await?;
    }

    let kept = match detect_payload(&ctx.pool, &temp).await? {
        PayloadShape::Direct => {
            let main = paths.main(record.kind.direct_extension());
            tokio::fs::rename(&temp, &main).await?;
            verify_or_discard(ctx, &main).await?;
            vec![main]
        }
        PayloadShape::Archive => save_archive(ctx, record, paths).await?,
    };

    for path in &kept {
        stamp(ctx, path, record).await;
    }
    Ok(())
}

/// Unpack a container payload and apply the mode's merge plan
///
/// Returns the permanent outputs left on disk.
async fn save_archive(
    ctx: &PipelineContext,
    record: &Record,
    paths: &ArtifactPaths,
) -> Result<Vec<PathBuf>> {
    let archive = paths.archive();
    tokio::fs::rename(paths.temp(), &archive).await?;
    let parts = unpack_archive(&ctx.pool, &archive, &paths.extract_dir()).await?;

    let ext = output_extension(
        extension_of(&parts.main).as_deref(),
        record.kind.direct_extension(),
    );
    if !is_candidate_extension(&ext) {
        warn!(
            key = paths.key(),
            ext = %ext,
            "output extension is not checked for existing output, a rerun will download it again"
        );
    }
    let main = paths.main(&ext);
    {
        let (from, to) = (parts.main.clone(), main.clone());
        ctx.pool.run(move || copy_with_retry(&from, &to)).await?;
    }
    verify_or_discard(ctx, &main).await?;

    let plan = MergePlan::for_payload(ctx.config.mode, parts.overlay.is_some());
    let overlay = match parts.overlay {
        Some(overlay) if plan.build_merged => overlay,
        _ => return Ok(vec![main]),
    };

    let merged = paths.merged(&ext);
    if let Err(e) = build_merged(ctx, &main, &overlay, &merged).await {
        remove_file_if_exists(&merged).await.ok();
        return Err(e);
    }

    if plan.discard_main {
        remove_file_if_exists(&main).await?;
        Ok(vec![merged])
    } else {
        Ok(vec![main, merged])
    }
}

async fn build_merged(
    ctx: &PipelineContext,
    main: &Path,
    overlay: &Path,
    merged: &Path,
) -> Result<()> {
    ctx.merger.merge(main, overlay, merged).await?;
    ctx.verifier.verify(merged).await
}

/// Verify a produced output, deleting it when it does not pass
async fn verify_or_discard(ctx: &PipelineContext, path: &Path) -> Result<()> {
    let result = ctx.verifier.verify(path).await;
    if result.is_err() {
        remove_file_if_exists(path).await.ok();
    }
    result
}

/// Best-effort capture-date tagging; every failure is swallowed
async fn stamp(ctx: &PipelineContext, path: &Path, record: &Record) {
    if !ctx.config.stamp_metadata {
        return;
    }

    if let Err(e) = ctx.tool.stamp_metadata(path, record).await {
        debug!(?path, tool = ctx.tool.name(), error = %e, "metadata stamp skipped");
    }

    // after tagging, which rewrites the file
    let modified = SystemTime::from(record.timestamp);
    let owned = path.to_path_buf();
    let result = ctx
        .pool
        .run(move || {
            let file = std::fs::File::options().write(true).open(&owned)?;
            file.set_modified(modified)?;
            Ok(())
        })
        .await;
    if let Err(e) = result {
        debug!(?path, error = %e, "failed to set modification time");
    }
}

//! Overlay compositing and the per-mode merge policy

use super::traits::{MediaTool, TranscodeOptions};
use super::verify::IntegrityVerifier;
use crate::blocking::BlockingPool;
use crate::error::{Error, Result};
use crate::types::ProcessingMode;
use crate::utils::{is_image_path, write_with_retry};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// What to produce for one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePlan {
    /// Build `MERGED` from main and overlay
    pub build_merged: bool,
    /// Delete `MAIN` once `MERGED` has been built
    pub discard_main: bool,
}

impl MergePlan {
    /// Plan for a payload under `mode`
    ///
    /// `MAIN` is always saved first. Without an overlay nothing is merged in
    /// any mode.
    pub fn for_payload(mode: ProcessingMode, has_overlay: bool) -> Self {
        let build_merged = has_overlay && mode.builds_merged();
        Self {
            build_merged,
            discard_main: build_merged && mode == ProcessingMode::Optimized,
        }
    }
}

/// Builds `MERGED` outputs from a main asset and its overlay
///
/// Image pairs are composited in-process; any pairing involving a video goes
/// through the [`MediaTool`].
#[derive(Clone)]
pub struct MergeEngine {
    tool: Arc<dyn MediaTool>,
    verifier: IntegrityVerifier,
    pool: BlockingPool,
    options: TranscodeOptions,
}

impl MergeEngine {
    /// Create a merge engine
    pub fn new(
        tool: Arc<dyn MediaTool>,
        verifier: IntegrityVerifier,
        pool: BlockingPool,
        options: TranscodeOptions,
    ) -> Self {
        Self {
            tool,
            verifier,
            pool,
            options,
        }
    }

    /// Composite `overlay` onto `main`, writing `output`
    pub async fn merge(&self, main: &Path, overlay: &Path, output: &Path) -> Result<()> {
        if is_image_path(main) && is_image_path(overlay) {
            self.verifier.verify(main).await?;
            self.verifier.verify(overlay).await?;

            let (main, overlay, output): (PathBuf, PathBuf, PathBuf) =
                (main.into(), overlay.into(), output.into());
            self.pool
                .run(move || composite_images(&main, &overlay, &output))
                .await
        } else {
            debug!(?main, ?overlay, tool = self.tool.name(), "transcoding overlay");
            self.tool
                .transcode(main, overlay, output, &self.options)
                .await
        }
    }
}

/// Alpha-composite `overlay` onto `main` and save a flattened RGB image
///
/// The overlay is resized to the main image's dimensions with Lanczos3 when
/// they differ. The encoding follows `output`'s extension.
pub fn composite_images(main: &Path, overlay: &Path, output: &Path) -> Result<()> {
    let mut base = image::open(main)?.to_rgba8();
    let mut top = image::open(overlay)?.to_rgba8();

    let (width, height) = base.dimensions();
    if top.dimensions() != (width, height) {
        debug!(
            from = ?top.dimensions(),
            to = ?(width, height),
            "resizing overlay"
        );
        top = imageops::resize(&top, width, height, FilterType::Lanczos3);
    }
    imageops::overlay(&mut base, &top, 0, 0);

    let format = ImageFormat::from_path(output)
        .map_err(|e| Error::Other(format!("no encoder for {}: {}", output.display(), e)))?;
    let flattened = DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(base).to_rgb8());

    let mut buf = Vec::new();
    flattened.write_to(&mut Cursor::new(&mut buf), format)?;
    write_with_retry(output, &buf)
}

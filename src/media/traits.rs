//! Traits and types for the external media tools

use crate::record::Record;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// How an overlay transcode should be run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// Request CUDA decode and NVENC encode instead of software x264
    pub hardware_accel: bool,
    /// Wall-clock limit after which the child process is killed
    pub timeout: Duration,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            hardware_accel: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Container metadata reported by a probe
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    /// Container duration in seconds, when reported
    pub duration_secs: Option<f64>,
    /// Number of streams in the container
    pub streams: usize,
}

/// Narrow interface over the external transcode, probe and tagging tools
///
/// Implementations can shell out to installed binaries or provide stub
/// functionality when the tools are unavailable. The pipeline only depends on
/// this trait, so tests substitute a fake.
///
/// # Examples
///
/// ```no_run
/// use memories_dl::media::{CliMediaTool, MediaTool, TranscodeOptions};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tool = CliMediaTool::from_path();
/// tool.transcode(
///     Path::new("clip-main.mp4"),
///     Path::new("clip-overlay.png"),
///     Path::new("2023-05-01_10-00-00_MERGED.mp4"),
///     &TranscodeOptions::default(),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Composite `overlay` on top of the video `main`, writing `output`
    ///
    /// # Errors
    ///
    /// Returns [`crate::MediaError::TranscodeFailure`] when the tool exits
    /// non-zero or exceeds `options.timeout`, and
    /// [`crate::Error::NotSupported`] when no transcoder is available.
    async fn transcode(
        &self,
        main: &Path,
        overlay: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> crate::Result<()>;

    /// Read container metadata of a non-image file
    ///
    /// # Errors
    ///
    /// Any error (including [`crate::Error::NotSupported`]) means the
    /// container could not be probed.
    async fn probe(&self, path: &Path) -> crate::Result<ProbeInfo>;

    /// Write capture date and location tags into the file's metadata
    async fn stamp_metadata(&self, path: &Path, record: &Record) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Build the transcoder argument list for compositing `overlay` onto `main`
///
/// The overlay is cut at the shorter of the two streams; a still-image overlay
/// is looped so it spans the whole clip. Audio of the main clip is kept when
/// present.
pub fn overlay_args(
    main: &Path,
    overlay: &Path,
    output: &Path,
    overlay_is_image: bool,
    options: &TranscodeOptions,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];

    if options.hardware_accel {
        args.extend(["-hwaccel".into(), "cuda".into()]);
    }
    args.extend(["-i".into(), main.to_string_lossy().into_owned()]);

    if overlay_is_image {
        args.extend(["-loop".into(), "1".into()]);
    } else if options.hardware_accel {
        args.extend(["-hwaccel".into(), "cuda".into()]);
    }
    args.extend(["-i".into(), overlay.to_string_lossy().into_owned()]);

    args.extend([
        "-filter_complex".into(),
        "[0:v][1:v]overlay=shortest=1[v]".into(),
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "0:a?".into(),
    ]);

    let (codec, preset) = if options.hardware_accel {
        ("h264_nvenc", "p1")
    } else {
        ("libx264", "fast")
    };
    args.extend([
        "-c:v".into(),
        codec.into(),
        "-preset".into(),
        preset.into(),
        "-c:a".into(),
        "copy".into(),
    ]);

    args.push(output.to_string_lossy().into_owned());
    args
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], value: &str) -> Option<usize> {
        args.iter().position(|a| a == value)
    }

    #[test]
    fn software_transcode_uses_x264() {
        let args = overlay_args(
            Path::new("m.mp4"),
            Path::new("o.mp4"),
            Path::new("out.mp4"),
            false,
            &TranscodeOptions::default(),
        );
        assert!(position(&args, "libx264").is_some());
        assert!(position(&args, "h264_nvenc").is_none());
        assert!(position(&args, "-hwaccel").is_none());
        assert!(position(&args, "-loop").is_none());
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert!(args.iter().any(|a| a.contains("shortest=1")));
    }

    #[test]
    fn image_overlay_is_looped_before_its_input() {
        let args = overlay_args(
            Path::new("m.mp4"),
            Path::new("o.png"),
            Path::new("out.mp4"),
            true,
            &TranscodeOptions::default(),
        );
        let loop_at = position(&args, "-loop").unwrap();
        let overlay_at = position(&args, "o.png").unwrap();
        assert_eq!(loop_at + 3, overlay_at);
    }

    #[test]
    fn hardware_transcode_requests_cuda_and_nvenc() {
        let options = TranscodeOptions {
            hardware_accel: true,
            ..TranscodeOptions::default()
        };
        let args = overlay_args(
            Path::new("m.mp4"),
            Path::new("o.mp4"),
            Path::new("out.mp4"),
            false,
            &options,
        );
        assert_eq!(args.iter().filter(|a| *a == "-hwaccel").count(), 2);
        assert!(position(&args, "h264_nvenc").is_some());
        assert!(position(&args, "p1").is_some());
    }

    #[test]
    fn main_audio_mapping_is_optional() {
        let args = overlay_args(
            Path::new("m.mp4"),
            Path::new("o.png"),
            Path::new("out.mp4"),
            true,
            &TranscodeOptions::default(),
        );
        assert!(position(&args, "0:a?").is_some());
    }
}

//! No-op media tool for graceful degradation

use super::traits::{MediaTool, ProbeInfo, TranscodeOptions};
use crate::record::Record;
use async_trait::async_trait;
use std::path::Path;

/// Media tool used when no external binaries are available
///
/// Every operation returns `Error::NotSupported`. Probing then falls back to
/// the size heuristic, stamping is skipped, and video overlays fail their
/// attempt.
///
/// # Examples
///
/// ```
/// use memories_dl::media::{MediaTool, NoOpMediaTool};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let tool = NoOpMediaTool;
/// assert!(tool.probe(Path::new("clip.mp4")).await.is_err());
/// # }
/// ```
pub struct NoOpMediaTool;

#[async_trait]
impl MediaTool for NoOpMediaTool {
    async fn transcode(
        &self,
        _main: &Path,
        _overlay: &Path,
        _output: &Path,
        _options: &TranscodeOptions,
    ) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "video overlay requires ffmpeg. Ensure ffmpeg is in PATH.".into(),
        ))
    }

    async fn probe(&self, _path: &Path) -> crate::Result<ProbeInfo> {
        Err(crate::Error::NotSupported(
            "container probing requires ffprobe".into(),
        ))
    }

    async fn stamp_metadata(&self, _path: &Path, _record: &Record) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "metadata tagging requires exiftool".into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;
    use chrono::Utc;

    #[tokio::test]
    async fn test_every_operation_is_not_supported() {
        let tool = NoOpMediaTool;
        let p = Path::new("x.mp4");
        assert!(matches!(
            tool.transcode(p, p, p, &TranscodeOptions::default()).await,
            Err(crate::Error::NotSupported(_))
        ));
        assert!(matches!(tool.probe(p).await, Err(crate::Error::NotSupported(_))));
        let record = Record::new(Utc::now(), MediaKind::Video);
        assert!(matches!(
            tool.stamp_metadata(p, &record).await,
            Err(crate::Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_name() {
        assert_eq!(NoOpMediaTool.name(), "noop");
    }
}

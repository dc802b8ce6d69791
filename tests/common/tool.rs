//! In-process stand-in for the external media tools

use async_trait::async_trait;
use memories_dl::media::TranscodeOptions;
use memories_dl::{MediaTool, ProbeInfo, Record};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records every call; transcodes write a fixed clip, probes always succeed
#[derive(Default)]
pub struct FakeMediaTool {
    transcodes: Mutex<Vec<PathBuf>>,
    stamps: Mutex<Vec<PathBuf>>,
}

impl FakeMediaTool {
    /// Outputs of every transcode call, in call order
    pub fn transcodes(&self) -> Vec<PathBuf> {
        self.transcodes.lock().unwrap().clone()
    }

    /// Files passed to `stamp_metadata`, in call order
    pub fn stamps(&self) -> Vec<PathBuf> {
        self.stamps.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn transcode(
        &self,
        _main: &Path,
        _overlay: &Path,
        output: &Path,
        _options: &TranscodeOptions,
    ) -> memories_dl::Result<()> {
        self.transcodes.lock().unwrap().push(output.to_path_buf());
        tokio::fs::write(output, super::fixtures::video_bytes()).await?;
        Ok(())
    }

    async fn probe(&self, _path: &Path) -> memories_dl::Result<ProbeInfo> {
        Ok(ProbeInfo {
            duration_secs: Some(1.0),
            streams: 1,
        })
    }

    async fn stamp_metadata(&self, path: &Path, _record: &Record) -> memories_dl::Result<()> {
        self.stamps.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

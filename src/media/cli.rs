//! CLI-based media tool using ffmpeg, ffprobe and exiftool

use super::traits::{MediaTool, ProbeInfo, TranscodeOptions, overlay_args};
use crate::error::{Error, MediaError};
use crate::record::Record;
use crate::utils::is_image_path;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Timestamp layout exiftool expects for date tags
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Default limit for one exiftool invocation
const DEFAULT_STAMP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit for one ffprobe invocation
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Media tool shelling out to installed binaries
///
/// Each binary is optional; an operation whose binary is missing returns
/// [`Error::NotSupported`].
///
/// # Examples
///
/// ```no_run
/// use memories_dl::media::{CliMediaTool, MediaTool};
/// use std::path::PathBuf;
///
/// // Auto-discover from PATH
/// let tool = CliMediaTool::from_path();
///
/// // Or name the binaries explicitly
/// let tool = CliMediaTool::new(
///     Some(PathBuf::from("/usr/bin/ffmpeg")),
///     Some(PathBuf::from("/usr/bin/ffprobe")),
///     None,
/// );
/// assert_eq!(tool.name(), "cli-ffmpeg");
/// ```
#[derive(Debug, Clone)]
pub struct CliMediaTool {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    exiftool: Option<PathBuf>,
    stamp_timeout: Duration,
    probe_timeout: Duration,
}

impl CliMediaTool {
    /// Create a tool with explicit binary paths
    pub fn new(
        ffmpeg: Option<PathBuf>,
        ffprobe: Option<PathBuf>,
        exiftool: Option<PathBuf>,
    ) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            exiftool,
            stamp_timeout: DEFAULT_STAMP_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Look up `ffmpeg`, `ffprobe` and `exiftool` in PATH
    pub fn from_path() -> Self {
        Self::new(
            which::which("ffmpeg").ok(),
            which::which("ffprobe").ok(),
            which::which("exiftool").ok(),
        )
    }

    /// Set the limit for one metadata-tagging run
    pub fn with_stamp_timeout(mut self, timeout: Duration) -> Self {
        self.stamp_timeout = timeout;
        self
    }

    /// Set the limit for one container probe
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Whether a transcoder binary was found
    pub fn can_transcode(&self) -> bool {
        self.ffmpeg.is_some()
    }

    /// Whether a tagging binary was found
    pub fn can_stamp(&self) -> bool {
        self.exiftool.is_some()
    }
}

/// Run a command to completion, killing it once `timeout` elapses
///
/// Returns `Ok(None)` on timeout.
async fn run_bounded(
    command: &mut Command,
    timeout: Duration,
) -> std::io::Result<Option<Output>> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map(Some),
        // dropping the wait future drops the child, which kills it
        Err(_) => Ok(None),
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(299)
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}

/// ffprobe JSON output, only the parts we read
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> crate::Result<ProbeInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    if probe.streams.is_empty() {
        return Err(Error::ExternalTool("ffprobe reported no streams".into()));
    }
    let duration_secs = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(ProbeInfo {
        duration_secs,
        streams: probe.streams.len(),
    })
}

/// exiftool arguments writing the record's capture date and location
fn stamp_args(path: &Path, record: &Record) -> Vec<String> {
    let ts = record.timestamp.format(EXIF_DATE_FORMAT).to_string();
    let mut args: Vec<String> = vec![
        "-overwrite_original".into(),
        "-q".into(),
        "-ignoreMinorErrors".into(),
    ];

    let tags: &[&str] = if is_image_path(path) {
        &["DateTimeOriginal", "CreateDate", "ModifyDate"]
    } else {
        &["CreateDate", "ModifyDate", "TrackCreateDate", "MediaCreateDate"]
    };
    args.extend(tags.iter().map(|tag| format!("-{tag}={ts}")));

    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        let lat_ref = if lat < 0.0 { "S" } else { "N" };
        let lon_ref = if lon < 0.0 { "W" } else { "E" };
        args.push(format!("-GPSLatitude={}", lat.abs()));
        args.push(format!("-GPSLatitudeRef={lat_ref}"));
        args.push(format!("-GPSLongitude={}", lon.abs()));
        args.push(format!("-GPSLongitudeRef={lon_ref}"));
    }

    args.push(path.to_string_lossy().into_owned());
    args
}

#[async_trait]
impl MediaTool for CliMediaTool {
    async fn transcode(
        &self,
        main: &Path,
        overlay: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> crate::Result<()> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| Error::NotSupported("video overlay requires ffmpeg in PATH".into()))?;

        let args = overlay_args(main, overlay, output, is_image_path(overlay), options);
        debug!(?output, "running ffmpeg {}", args.join(" "));

        let failure = |reason: String| {
            Error::Media(MediaError::TranscodeFailure {
                output: output.to_path_buf(),
                reason,
            })
        };

        let result = run_bounded(Command::new(ffmpeg).args(&args), options.timeout)
            .await
            .map_err(|e| failure(format!("failed to execute ffmpeg: {}", e)))?;

        match result {
            None => Err(failure(format!(
                "timed out after {}s",
                options.timeout.as_secs()
            ))),
            Some(out) if out.status.success() => Ok(()),
            Some(out) => Err(failure(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                stderr_tail(&out)
            ))),
        }
    }

    async fn probe(&self, path: &Path) -> crate::Result<ProbeInfo> {
        let ffprobe = self
            .ffprobe
            .as_ref()
            .ok_or_else(|| Error::NotSupported("probing requires ffprobe in PATH".into()))?;

        let mut command = Command::new(ffprobe);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);
        let output = run_bounded(&mut command, self.probe_timeout)
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffprobe: {}", e)))?
            .ok_or_else(|| {
                Error::ExternalTool(format!(
                    "ffprobe timed out after {}s",
                    self.probe_timeout.as_secs_f32()
                ))
            })?;

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        parse_probe_output(&output.stdout)
    }

    async fn stamp_metadata(&self, path: &Path, record: &Record) -> crate::Result<()> {
        let exiftool = self
            .exiftool
            .as_ref()
            .ok_or_else(|| Error::NotSupported("metadata tagging requires exiftool in PATH".into()))?;

        let args = stamp_args(path, record);
        let result = run_bounded(Command::new(exiftool).args(&args), self.stamp_timeout)
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute exiftool: {}", e)))?;

        match result {
            None => Err(Error::ExternalTool(format!(
                "exiftool timed out after {}s",
                self.stamp_timeout.as_secs()
            ))),
            Some(out) if out.status.success() => Ok(()),
            Some(out) => Err(Error::ExternalTool(format!(
                "exiftool exited with {}: {}",
                out.status,
                stderr_tail(&out)
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "cli-ffmpeg"
    }
}

//! Configuration types for memories-dl

use crate::types::ProcessingMode;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Upper bound for auto-detected worker slots
const MAX_AUTO_WORKERS: usize = 20;

/// Extra fetch permits granted on top of the worker slot count
const FETCH_PERMIT_HEADROOM: usize = 20;

/// Main configuration for a download run
///
/// Every field has a serde default, so an empty JSON/TOML document (or
/// `Config::default()`) yields a working configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving `*_MAIN.*` / `*_MERGED.*` outputs (default: "downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Failure ledger file (default: "failed_memories.json")
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Processing mode for the whole run
    #[serde(default)]
    pub mode: ProcessingMode,

    /// Worker slots; each slot runs one video worker and two image workers (0 = auto)
    #[serde(default)]
    pub workers: usize,

    /// Simultaneous network fetches across all workers (None = worker slots + 20)
    #[serde(default)]
    pub fetch_limit: Option<usize>,

    /// Stamp capture timestamps into produced files (default: true)
    #[serde(default = "default_true")]
    pub stamp_metadata: bool,

    /// Request hardware-accelerated transcoding (default: false)
    #[serde(default)]
    pub hardware_accel: bool,

    /// Per-record retry protocol
    #[serde(default)]
    pub retry: RetryConfig,

    /// Idle timeout of an HTTP fetch: connecting, waiting for the response,
    /// or waiting for the next body chunk (default: 45 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Wall-clock bound for one transcode invocation (default: 300 seconds)
    #[serde(default = "default_transcode_timeout", with = "duration_serde")]
    pub transcode_timeout: Duration,

    /// Wall-clock bound for one metadata stamp invocation (default: 10 seconds)
    #[serde(default = "default_stamp_timeout", with = "duration_serde")]
    pub stamp_timeout: Duration,

    /// Wall-clock bound for one container probe (default: 30 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Non-image files smaller than this are rejected when probing is unavailable
    #[serde(default = "default_min_video_bytes")]
    pub min_video_bytes: u64,

    /// Size of the blocking pool (0 = available parallelism)
    #[serde(default)]
    pub blocking_threads: usize,

    /// User-Agent sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ledger_path: default_ledger_path(),
            mode: ProcessingMode::default(),
            workers: 0,
            fetch_limit: None,
            stamp_metadata: true,
            hardware_accel: false,
            retry: RetryConfig::default(),
            fetch_timeout: default_fetch_timeout(),
            transcode_timeout: default_transcode_timeout(),
            stamp_timeout: default_stamp_timeout(),
            probe_timeout: default_probe_timeout(),
            min_video_bytes: default_min_video_bytes(),
            blocking_threads: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Number of worker slots to spawn
    ///
    /// An explicit `workers` value wins; otherwise `min(cpus + 4, 20)`.
    pub fn worker_slots(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        (available_cpus() + 4).min(MAX_AUTO_WORKERS)
    }

    /// Permits of the global fetch limiter
    pub fn fetch_permits(&self) -> usize {
        self.fetch_limit
            .filter(|n| *n > 0)
            .unwrap_or_else(|| self.worker_slots() + FETCH_PERMIT_HEADROOM)
    }

    /// Size of the blocking pool
    pub fn blocking_threads(&self) -> usize {
        if self.blocking_threads > 0 {
            self.blocking_threads
        } else {
            available_cpus().max(2)
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config {
                message: "retry.max_attempts must be at least 1".into(),
                key: Some("retry.max_attempts".into()),
            });
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(crate::Error::Config {
                message: "output directory must not be empty".into(),
                key: Some("output_dir".into()),
            });
        }
        Ok(())
    }
}

/// Retry configuration for the per-record attempt protocol
///
/// The delay before attempt `n + 1` is exactly `n * backoff_unit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per record (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff time unit (default: 2 seconds)
    #[serde(default = "default_backoff_unit", with = "duration_serde")]
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit: default_backoff_unit(),
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("failed_memories.json")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit() -> Duration {
    Duration::from_secs(2)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_transcode_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_stamp_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_min_video_bytes() -> u64 {
    1024
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36"
        .to_string()
}

// Duration serialization helper. Values are whole seconds, except that a
// fractional value is accepted on input so tests can use sub-second units.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

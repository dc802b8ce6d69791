//! Error types for memories-dl
//!
//! This module provides the error handling for the library:
//! - [`Error`] - the crate-wide error returned by every fallible operation
//! - [`MediaError`] - failures of a single record's fetch/unpack/merge/verify chain
//! - [`RecordError`] - failures while parsing one input record
//!
//! Every [`MediaError`] raised inside a processing attempt is absorbed by the
//! per-record retry protocol; it only surfaces to the operator through the
//! failure ledger once all attempts are exhausted.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for memories-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for memories-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Pipeline error for a single record (download, unpack, merge, verify)
    #[error("{0}")]
    Media(#[from] MediaError),

    /// Input record could not be parsed
    #[error("invalid record: {0}")]
    Record(#[from] RecordError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decode/encode error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Zip container error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// External tool execution failed (ffmpeg, ffprobe, exiftool)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures of one record's processing attempt
#[derive(Debug, Error)]
pub enum MediaError {
    /// Every candidate URL failed (network error, non-success status, empty body)
    #[error("all download links failed ({tried} tried)")]
    LinkExhausted {
        /// Number of candidate links that were attempted
        tried: usize,
    },

    /// The downloaded container had no identifiable main asset
    #[error("empty zip archive: no main asset in {archive}")]
    EmptyArchive {
        /// The archive that was inspected
        archive: PathBuf,
    },

    /// A produced or existing file failed integrity verification
    #[error("corrupt output {path}: {reason}")]
    CorruptOutput {
        /// The file that failed verification
        path: PathBuf,
        /// Why verification failed
        reason: String,
    },

    /// The external transcode tool exited non-zero or timed out
    #[error("transcode failed for {output}: {reason}")]
    TranscodeFailure {
        /// The output the transcode was producing
        output: PathBuf,
        /// Exit status, timeout, or spawn failure description
        reason: String,
    },

    /// A write failed even after the in-place retry
    #[error("write to {path} failed after retry: {reason}")]
    TransientIo {
        /// The path being written
        path: PathBuf,
        /// The underlying I/O failure
        reason: String,
    },
}

/// Failures while parsing one input record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The capture timestamp matched none of the accepted formats
    #[error("unknown date format: {0:?}")]
    UnknownDateFormat(String),
}

impl Error {
    /// Short machine-readable code, used in logs and summaries
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Media(MediaError::LinkExhausted { .. }) => "link_exhausted",
            Error::Media(MediaError::EmptyArchive { .. }) => "empty_archive",
            Error::Media(MediaError::CorruptOutput { .. }) => "corrupt_output",
            Error::Media(MediaError::TranscodeFailure { .. }) => "transcode_failure",
            Error::Media(MediaError::TransientIo { .. }) => "transient_io",
            Error::Record(_) => "invalid_record",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Image(_) => "image_error",
            Error::Archive(_) => "archive_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a [`MediaError::CorruptOutput`]
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Media(MediaError::CorruptOutput {
            path: path.into(),
            reason: reason.into(),
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_exhausted_message_names_all_links() {
        let err = Error::from(MediaError::LinkExhausted { tried: 2 });
        let msg = err.to_string();
        assert!(msg.contains("all download links failed"), "got: {msg}");
        assert_eq!(err.code(), "link_exhausted");
    }

    #[test]
    fn corrupt_helper_builds_media_variant() {
        let err = Error::corrupt("/tmp/x.jpg", "file empty or missing");
        match err {
            Error::Media(MediaError::CorruptOutput { path, reason }) => {
                assert_eq!(path, PathBuf::from("/tmp/x.jpg"));
                assert_eq!(reason, "file empty or missing");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn record_error_converts_and_displays_input() {
        let err: Error = RecordError::UnknownDateFormat("yesterday".into()).into();
        assert_eq!(err.code(), "invalid_record");
        assert!(err.to_string().contains("\"yesterday\""));
    }

    #[test]
    fn http_client_error_converts_to_network() {
        let source = reqwest::Client::new().get("not a url").build().unwrap_err();
        let err: Error = source.into();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.code(), "network_error");
    }

    #[test]
    fn io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.code(), "io_error");
    }
}

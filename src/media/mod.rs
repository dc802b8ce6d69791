//! Media handling: external tools, overlay merging and integrity checks
//!
//! The external transcode, probe and tagging binaries sit behind the
//! [`MediaTool`] trait:
//!
//! - [`CliMediaTool`]: runs `ffmpeg`, `ffprobe` and `exiftool` found in PATH
//! - [`NoOpMediaTool`]: stub used when no binaries are available
//!
//! [`MergeEngine`] builds merged outputs (image pairs in-process, anything
//! involving video through the tool) and [`IntegrityVerifier`] decides whether
//! a file on disk counts as valid output.
//!
//! ## Usage
//!
//! ```no_run
//! use memories_dl::blocking::BlockingPool;
//! use memories_dl::media::{CliMediaTool, IntegrityVerifier, MediaTool};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tool: Arc<dyn MediaTool> = Arc::new(CliMediaTool::from_path());
//!     let verifier = IntegrityVerifier::new(tool, BlockingPool::new(4), 1024);
//!
//!     verifier
//!         .verify(Path::new("downloads/2023-05-01_10-00-00_MAIN.mp4"))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod cli;
mod merge;
mod noop;
mod traits;
mod verify;

pub use cli::CliMediaTool;
pub use merge::{MergeEngine, MergePlan, composite_images};
pub use noop::NoOpMediaTool;
pub use traits::{MediaTool, ProbeInfo, TranscodeOptions, overlay_args};
pub use verify::IntegrityVerifier;

//! Integrity checks for produced and pre-existing outputs

use super::traits::MediaTool;
use crate::blocking::BlockingPool;
use crate::error::{Error, Result};
use crate::utils::{file_size, is_image_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Decides whether a file on disk is valid output
///
/// - missing or zero-byte files always fail
/// - image paths (`.jpg`, `.jpeg`, `.png`) must decode
/// - anything else must probe through the [`MediaTool`], or failing that be
///   at least `min_video_bytes` long
#[derive(Clone)]
pub struct IntegrityVerifier {
    tool: Arc<dyn MediaTool>,
    pool: BlockingPool,
    min_video_bytes: u64,
}

impl IntegrityVerifier {
    /// Create a verifier
    pub fn new(tool: Arc<dyn MediaTool>, pool: BlockingPool, min_video_bytes: u64) -> Self {
        Self {
            tool,
            pool,
            min_video_bytes,
        }
    }

    /// Check `path`, returning [`crate::MediaError::CorruptOutput`] with the
    /// reason on failure
    pub async fn verify(&self, path: &Path) -> Result<()> {
        let size = match file_size(path).await {
            None => return Err(Error::corrupt(path, "file missing")),
            Some(0) => return Err(Error::corrupt(path, "file is empty")),
            Some(size) => size,
        };

        if is_image_path(path) {
            let owned: PathBuf = path.to_path_buf();
            return self
                .pool
                .run(move || decode_image(&owned))
                .await;
        }

        match self.tool.probe(path).await {
            Ok(info) => {
                debug!(?path, streams = info.streams, duration = ?info.duration_secs, "probe ok");
                Ok(())
            }
            Err(e) => {
                debug!(?path, error = %e, size, "probe failed, using size heuristic");
                if size < self.min_video_bytes {
                    Err(Error::corrupt(
                        path,
                        format!("unprobeable and only {} bytes", size),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

fn decode_image(path: &Path) -> Result<()> {
    let reader = image::io::Reader::open(path)?
        .with_guessed_format()
        .map_err(|e| Error::corrupt(path, format!("unreadable image: {}", e)))?;
    reader
        .decode()
        .map(|_| ())
        .map_err(|e| Error::corrupt(path, format!("image does not decode: {}", e)))
}

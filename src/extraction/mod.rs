//! Archive unpacking for split media payloads
//!
//! A downloaded payload is either a single direct asset or a ZIP container
//! holding a `*-main.*` asset and an optional `*-overlay.*` asset. This module
//! tells the two apart and splits containers into their parts.

mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use zip::{MAIN_MARKER, OVERLAY_MARKER, Unpacked, ZipExtractor};

use crate::blocking::BlockingPool;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Shape of a downloaded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadShape {
    /// A ZIP container (the payload path is still the downloaded file)
    Archive,
    /// A single media file with no overlay
    Direct,
}

/// Decide whether the payload at `path` is a container, on the blocking pool
pub async fn detect_payload(pool: &BlockingPool, path: &Path) -> Result<PayloadShape> {
    let path = path.to_path_buf();
    pool.run(move || {
        Ok(if ZipExtractor::is_zip(&path) {
            PayloadShape::Archive
        } else {
            PayloadShape::Direct
        })
    })
    .await
}

/// Split a container into main and overlay assets, on the blocking pool
///
/// # Example
/// ```no_run
/// use memories_dl::blocking::BlockingPool;
/// use memories_dl::extraction::unpack_archive;
/// use std::path::Path;
///
/// # async fn example() -> memories_dl::Result<()> {
/// let pool = BlockingPool::new(2);
/// let parts = unpack_archive(
///     &pool,
///     Path::new("downloads/2023-05-01_10-00-00.zip"),
///     Path::new("downloads/2023-05-01_10-00-00_zip"),
/// )
/// .await?;
/// println!("main: {:?}, overlay: {:?}", parts.main, parts.overlay);
/// # Ok(())
/// # }
/// ```
pub async fn unpack_archive(
    pool: &BlockingPool,
    archive_path: &Path,
    dest_path: &Path,
) -> Result<Unpacked> {
    let archive: PathBuf = archive_path.to_path_buf();
    let dest: PathBuf = dest_path.to_path_buf();
    pool.run(move || ZipExtractor::extract_pair(&archive, &dest))
        .await
}

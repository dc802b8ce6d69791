//! Utility functions for file operations and path classification

use crate::error::{MediaError, Result};
use std::path::Path;
use std::time::Duration;

/// Delay before the single in-place retry of a write that hit a locked file
pub const WRITE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Extensions handled as still images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Check if a path names an image by its extension
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use memories_dl::utils::is_image_path;
///
/// assert!(is_image_path(Path::new("2023-05-01_10-00-00_MAIN.JPG")));
/// assert!(!is_image_path(Path::new("2023-05-01_10-00-00_MAIN.mp4")));
/// assert!(!is_image_path(Path::new("2023-05-01_10-00-00_TEMP")));
/// ```
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Lower-cased extension of a path, without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Write a file, retrying once after [`WRITE_RETRY_DELAY`] when the first
/// write is refused with `PermissionDenied` (typically a file held open by a
/// scanner or preview process).
///
/// Blocking; run it on the blocking pool.
pub fn write_with_retry(path: &Path, data: &[u8]) -> Result<()> {
    write_with_retry_after(path, data, WRITE_RETRY_DELAY)
}

pub(crate) fn write_with_retry_after(path: &Path, data: &[u8], delay: Duration) -> Result<()> {
    match std::fs::write(path, data) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::debug!(?path, error = %e, "write refused, retrying once");
            std::thread::sleep(delay);
            std::fs::write(path, data).map_err(|e| {
                MediaError::TransientIo {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
                .into()
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy a file with the same single-retry policy as [`write_with_retry`]
pub fn copy_with_retry(from: &Path, to: &Path) -> Result<()> {
    let data = std::fs::read(from)?;
    write_with_retry(to, &data)
}

/// Remove a file, treating "not found" as success
pub async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a directory tree, treating "not found" as success
pub async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Size of a regular file, `None` if it does not exist or is not a file
pub async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn image_detection_is_case_insensitive() {
        assert!(is_image_path(Path::new("a.jpeg")));
        assert!(is_image_path(Path::new("a.PNG")));
        assert!(!is_image_path(Path::new("a.mov")));
        assert!(!is_image_path(Path::new("jpg")));
    }

    #[test]
    fn extension_of_lowercases() {
        assert_eq!(extension_of(Path::new("x/foo-main.MP4")).as_deref(), Some("mp4"));
        assert_eq!(extension_of(Path::new("x/foo")), None);
    }

    #[test]
    fn write_with_retry_writes_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_with_retry_after(&path, b"payload", Duration::from_millis(1)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn write_into_missing_directory_is_plain_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        let err = write_with_retry_after(&path, b"x", Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)), "got {err:?}");
    }

    #[test]
    fn copy_with_retry_duplicates_content() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        std::fs::write(&from, b"abc").unwrap();
        copy_with_retry(&from, &to).unwrap();
        assert_eq!(std::fs::read(&to).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn removal_helpers_ignore_missing_paths() {
        let dir = tempdir().unwrap();
        remove_file_if_exists(&dir.path().join("nope")).await.unwrap();
        remove_dir_if_exists(&dir.path().join("nope_zip")).await.unwrap();

        let file = dir.path().join("present");
        std::fs::write(&file, b"1").unwrap();
        assert_eq!(file_size(&file).await, Some(1));
        remove_file_if_exists(&file).await.unwrap();
        assert_eq!(file_size(&file).await, None);
    }
}

use crate::blocking::BlockingPool;
use crate::error::{Error, MediaError};
use crate::extraction::*;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing multiple files
fn create_zip_archive_multi(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_detect_zip_payload_by_content() {
    let temp = TempDir::new().unwrap();
    let payload = temp.path().join("2023-05-01_10-00-00_TEMP");
    create_zip_archive_multi(&payload, &[("a-main.jpg", b"jpeg")]);

    let pool = BlockingPool::new(1);
    assert_eq!(
        detect_payload(&pool, &payload).await.unwrap(),
        PayloadShape::Archive
    );
}

#[tokio::test]
async fn test_detect_direct_payload() {
    let temp = TempDir::new().unwrap();
    let payload = temp.path().join("2023-05-01_10-00-00_TEMP");
    std::fs::write(&payload, b"\x00\x00\x00\x18ftypmp42 not a zip").unwrap();

    let pool = BlockingPool::new(1);
    assert_eq!(
        detect_payload(&pool, &payload).await.unwrap(),
        PayloadShape::Direct
    );
}

#[test]
fn test_is_zip_missing_file() {
    assert!(!ZipExtractor::is_zip(Path::new("/nonexistent/payload")));
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unpack_main_and_overlay() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("k.zip");
    let dest = temp.path().join("k_zip");
    create_zip_archive_multi(
        &archive,
        &[
            ("__MACOSX/._foo-main.jpg", b"resource fork"),
            ("foo-main.jpg", b"main bytes"),
            ("foo-overlay.png", b"overlay bytes"),
            ("notes.txt", b"ignored"),
        ],
    );

    let pool = BlockingPool::new(1);
    let parts = unpack_archive(&pool, &archive, &dest).await.unwrap();

    assert_eq!(parts.main, dest.join("foo-main.jpg"));
    assert_eq!(parts.overlay, Some(dest.join("foo-overlay.png")));
    assert_eq!(std::fs::read(&parts.main).unwrap(), b"main bytes");
    assert!(!dest.join("notes.txt").exists());
    assert!(!dest.join("__MACOSX").exists());
}

#[tokio::test]
async fn test_unpack_main_without_overlay() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("k.zip");
    let dest = temp.path().join("k_zip");
    create_zip_archive_multi(&archive, &[("clip-main.mp4", b"video")]);

    let pool = BlockingPool::new(1);
    let parts = unpack_archive(&pool, &archive, &dest).await.unwrap();
    assert_eq!(parts.main, dest.join("clip-main.mp4"));
    assert!(parts.overlay.is_none());
}

#[tokio::test]
async fn test_unpack_flattens_nested_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("k.zip");
    let dest = temp.path().join("k_zip");
    create_zip_archive_multi(&archive, &[("inner/dir/x-main.png", b"png")]);

    let pool = BlockingPool::new(1);
    let parts = unpack_archive(&pool, &archive, &dest).await.unwrap();
    assert_eq!(parts.main, dest.join("x-main.png"));
}

#[tokio::test]
async fn test_unpack_without_main_is_empty_archive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("k.zip");
    let dest = temp.path().join("k_zip");
    create_zip_archive_multi(&archive, &[("x-overlay.png", b"png")]);

    let pool = BlockingPool::new(1);
    let err = unpack_archive(&pool, &archive, &dest).await.unwrap_err();
    assert!(
        matches!(err, Error::Media(MediaError::EmptyArchive { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_unpack_corrupt_container_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("k.zip");
    std::fs::write(&archive, b"PK\x03\x04 truncated").unwrap();

    let pool = BlockingPool::new(1);
    let err = unpack_archive(&pool, &archive, &temp.path().join("k_zip"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Archive(_)), "got {err:?}");
}

#[test]
fn test_markers() {
    assert_eq!(MAIN_MARKER, "-main.");
    assert_eq!(OVERLAY_MARKER, "-overlay.");
}

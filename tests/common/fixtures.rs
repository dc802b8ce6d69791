//! Payload and record fixtures

use chrono::{TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use memories_dl::{MediaKind, Record};
use std::io::{Cursor, Write};

/// Capture time of the first fixture record: `2023-05-01 10:00:00 UTC`
pub const BASE_KEY: &str = "2023-05-01_10-00-00";

/// Encode a solid-colour JPEG of the given size
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// Encode a half-transparent PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 128]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode fixture image");
    buf
}

/// Bytes standing in for an MP4 clip; large enough for the size heuristic
pub fn video_bytes() -> Vec<u8> {
    let mut body = b"\x00\x00\x00\x18ftypmp42".to_vec();
    body.resize(4096, 0x42);
    body
}

/// Build an in-memory ZIP container from `(name, content)` entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Image record captured `offset_secs` after [`BASE_KEY`]
pub fn image_record(offset_secs: u32) -> Record {
    Record::new(timestamp(offset_secs), MediaKind::Image)
}

/// Video record captured `offset_secs` after [`BASE_KEY`]
pub fn video_record(offset_secs: u32) -> Record {
    Record::new(timestamp(offset_secs), MediaKind::Video)
}

fn timestamp(offset_secs: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, offset_secs)
        .single()
        .expect("valid fixture timestamp")
}

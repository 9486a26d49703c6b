//! Shared test utilities for the comic-shrink test suite.
//!
//! Provides synthetic images, in-memory zip/tar fixture builders, and a tar
//! reader for asserting on converted output.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let page = encode_test_image(&test_rgb_image(40, 60), ImageFormat::Png);
//! let cbz = build_zip(&[("001.png", &page), ("ComicInfo.xml", b"<x/>")]);
//! // ... convert ...
//! let entries = read_tar(&std::fs::read(&output).unwrap());
//! assert_eq!(entries[0].name, "001.webp");
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::{Cursor, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// =========================================================================
// Synthetic images
// =========================================================================

/// Gradient RGB image; content varies so lossy encoders have something to do.
pub fn test_rgb_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Gradient RGBA image with a varying alpha channel.
pub fn test_rgba_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, ((x + y) % 256) as u8])
    }))
}

/// Encode an image into an in-memory file of the given format.
pub fn encode_test_image(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

// =========================================================================
// Fixture archives
// =========================================================================

/// Modification time stamped on every entry by [`build_zip`]
/// (2021-03-04 05:06:08 UTC).
pub fn zip_stamp() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_614_834_368)
}

/// Build a stored (uncompressed) zip. Names ending in `/` become directories.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let stamp = zip::DateTime::from_date_and_time(2021, 3, 4, 5, 6, 8).unwrap();
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(stamp);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

/// Build a tar from `(name, mtime seconds, payload)` triples.
pub fn build_tar(entries: &[(&str, u64, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, mtime, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(*mtime);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

// =========================================================================
// Output inspection
// =========================================================================

/// One entry read back from a tar archive.
#[derive(Debug, Clone)]
pub struct TarRecord {
    pub name: String,
    pub mtime: u64,
    pub mode: u32,
    pub payload: Vec<u8>,
}

/// Parse every entry of a tar archive, panicking on any framing error.
pub fn read_tar(bytes: &[u8]) -> Vec<TarRecord> {
    let mut archive = tar::Archive::new(bytes);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mtime = entry.header().mtime().unwrap();
            let mode = entry.header().mode().unwrap();
            let mut payload = Vec::new();
            entry.read_to_end(&mut payload).unwrap();
            TarRecord {
                name,
                mtime,
                mode,
                payload,
            }
        })
        .collect()
}

//! Media type detection from downloaded bytes
//!
//! Used to correct a declared extension that does not match the content
//! (e.g. a `.jpg` URL serving PNG data). Detection never fails: when nothing
//! can be determined the declared extension is kept.

use crate::types::Dimensions;
use image::ImageReader;
use std::io::Cursor;

/// Detect the real extension of `bytes`
///
/// Order: magic bytes, then the response `Content-Type`, then `declared`.
/// Equivalent spellings (`jpg`/`jpeg`) keep the declared form.
#[must_use]
pub fn detect_extension(bytes: &[u8], declared: &str, content_type: Option<&str>) -> String {
    let detected = sniff_magic(bytes).or_else(|| content_type.and_then(extension_for_mime));

    match detected {
        Some(ext) if !same_extension(ext, declared) => {
            tracing::debug!(declared, detected = ext, "correcting extension from content");
            ext.to_string()
        }
        _ => declared.to_string(),
    }
}

/// Extension implied by the leading bytes, if recognizable
#[must_use]
pub fn sniff_magic(bytes: &[u8]) -> Option<&'static str> {
    if bytes.is_empty() {
        return None;
    }

    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("webm");
    }
    if bytes.starts_with(b"FWS") || bytes.starts_with(b"CWS") || bytes.starts_with(b"ZWS") {
        return Some("swf");
    }

    // AVIF shares the ISO-BMFF `ftyp` box with mp4, so image formats go first
    if let Some(ext) = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
    {
        return Some(ext);
    }

    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return ftyp_brand_extension(&bytes[8..12]);
    }
    None
}

/// Extension for an ISO-BMFF major brand
fn ftyp_brand_extension(brand: &[u8]) -> Option<&'static str> {
    match brand {
        b"avif" | b"avis" => Some("avif"),
        b"heic" | b"heix" | b"heim" | b"heis" | b"mif1" | b"msf1" => Some("heic"),
        b"qt  " => Some("mov"),
        _ => Some("mp4"),
    }
}

/// Extension for a `Content-Type` value (parameters ignored)
#[must_use]
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/avif" => "avif",
        "image/heic" | "image/heif" => "heic",
        "video/webm" => "webm",
        "video/mp4" => "mp4",
        "application/x-shockwave-flash" => "swf",
        _ => return None,
    };
    Some(ext)
}

/// Pixel dimensions from the image header, without decoding pixel data
#[must_use]
pub fn read_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions { width, height })
}

fn same_extension(a: &str, b: &str) -> bool {
    let canonical = |ext: &str| match ext.to_ascii_lowercase().as_str() {
        "jpeg" | "jpe" => "jpg".to_string(),
        other => other.to_string(),
    };
    canonical(a) == canonical(b)
}

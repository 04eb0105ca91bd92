//! Image preprocessing: normalise uploaded scans before oracle submission.
//!
//! Uploads arrive as whatever the phone camera or office scanner produced —
//! RGBA PNGs, CMYK-ish JPEGs, 48-megapixel photographs. The oracle's vision
//! endpoint charges by resolution and rejects oversized payloads, so
//! anything past the size/dimension triggers is downscaled to a bounded
//! canonical form. Text legibility survives 3000 px comfortably for
//! ID-card and A4 scans; upscaling would only invent pixels, so it never
//! happens.

use crate::config::AnalysisConfig;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Normalise raw image bytes to RGB JPEG bounded by the configured limits.
///
/// If the payload exceeds `max_upload_bytes` **or** the longer dimension
/// exceeds `max_dimension_px`, and the longer dimension is above
/// `target_dimension_px`, the image is downscaled so its longer dimension
/// equals the target (aspect preserved, Lanczos3 — the sharpest of the
/// standard resamplers on printed text). Otherwise only the colour-mode
/// conversion and re-encode happen.
///
/// A decode failure propagates — fatal for the page, not the document.
pub fn prepare_image(raw: &[u8], config: &AnalysisConfig) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(raw)?;
    let (width, height) = (img.width(), img.height());
    let longer = width.max(height);

    let oversized =
        raw.len() as u64 > config.max_upload_bytes || longer > config.max_dimension_px;

    let img = if oversized && longer > config.target_dimension_px {
        let ratio = config.target_dimension_px as f64 / longer as f64;
        let new_w = ((width as f64 * ratio) as u32).max(1);
        let new_h = ((height as f64 * ratio) as u32).max(1);
        debug!(
            "downscaling image {}x{} ({} bytes) to {}x{}",
            width,
            height,
            raw.len(),
            new_w,
            new_h
        );
        img.resize(new_w, new_h, FilterType::Lanczos3)
    } else {
        img
    };

    // Canonical colour mode: RGB, alpha dropped.
    let rgb = DynamicImage::ImageRgb8(img.into_rgb8());

    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;
    Ok(buf)
}

//! Crop an arbitrary source photo to the badge photo-band aspect.

use image::RgbaImage;
use serde::Deserialize;
use utoipa::ToSchema;

use super::BadgeError;

/// Aspect of the photo band. Crops must match it or composed badges misalign.
pub const ASPECT_W: u32 = 350;
pub const ASPECT_H: u32 = 347;

/// Operator-adjusted crop window, in source pixels.
///
/// Only the top-left corner and the width are accepted; the height is always
/// derived from the width, so an off-aspect rectangle cannot be expressed.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct CropSelection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
}

/// Height matching the fixed aspect for a given width.
pub fn aspect_height(width: u32) -> u32 {
    ((width as f32) * (ASPECT_H as f32) / (ASPECT_W as f32)).round() as u32
}

/// A cropped sample held in memory until the operator confirms it.
#[derive(Debug, Clone)]
pub struct NormalizedSample {
    image: RgbaImage,
}

impl NormalizedSample {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// JPEG bytes for the confirmation preview. Nothing is persisted.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, BadgeError> {
        use image::ImageEncoder;
        let rgb = image::DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
        let mut buf = Vec::new();
        let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
        enc.write_image(&rgb, rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
            .map_err(|e| BadgeError::Internal(format!("jpeg encode: {e}")))?;
        Ok(buf)
    }
}

/// Decode `bytes` and crop to the fixed aspect.
///
/// Without a selection the largest centered aspect rectangle is used. A zoom
/// factor > 1 shrinks the window around its center, mirroring the crop
/// dialog's slider.
pub fn normalize(
    bytes: &[u8],
    selection: Option<CropSelection>,
    zoom: Option<f32>,
) -> Result<NormalizedSample, BadgeError> {
    let src = image::load_from_memory(bytes)
        .map_err(|e| BadgeError::InvalidSource(e.to_string()))?
        .to_rgba8();
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return Err(BadgeError::InvalidSource("empty image".into()));
    }

    let sel = match selection {
        Some(sel) => sel,
        None => centered_selection(sw, sh),
    };
    let sel = apply_zoom(sel, zoom);
    let (x, y, w, h) = clamp_to_bounds(sel, sw, sh);

    let image = image::imageops::crop_imm(&src, x, y, w, h).to_image();
    Ok(NormalizedSample { image })
}

fn centered_selection(sw: u32, sh: u32) -> CropSelection {
    // widest aspect rectangle that fits the source
    let mut width = sw;
    if aspect_height(width) > sh {
        width = ((sh as f32) * (ASPECT_W as f32) / (ASPECT_H as f32)).floor() as u32;
    }
    let width = width.max(1);
    let height = aspect_height(width).min(sh);
    CropSelection {
        x: (sw - width) / 2,
        y: (sh - height) / 2,
        width,
    }
}

fn apply_zoom(sel: CropSelection, zoom: Option<f32>) -> CropSelection {
    let zoom = zoom.unwrap_or(1.0);
    if !zoom.is_finite() {
        return sel;
    }
    let zoom = zoom.clamp(1.0, 8.0);
    if zoom <= 1.0 {
        return sel;
    }
    let new_w = (((sel.width as f32) / zoom).round() as u32).max(1);
    let old_h = aspect_height(sel.width);
    let new_h = aspect_height(new_w);
    CropSelection {
        x: sel.x + (sel.width - new_w) / 2,
        y: sel.y + old_h.saturating_sub(new_h) / 2,
        width: new_w,
    }
}

fn clamp_to_bounds(sel: CropSelection, sw: u32, sh: u32) -> (u32, u32, u32, u32) {
    let mut w = sel.width.clamp(1, sw);
    let mut h = aspect_height(w);
    if h > sh {
        // shrink, preserving aspect
        w = (((sh as f32) * (ASPECT_W as f32) / (ASPECT_H as f32)).floor() as u32).max(1);
        h = aspect_height(w).min(sh);
    }
    let x = sel.x.min(sw - w);
    let y = sel.y.min(sh - h);
    (x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageEncoder, Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        let enc = image::codecs::png::PngEncoder::new(&mut buf);
        enc.write_image(&img, w, h, image::ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    fn ratio(sample: &NormalizedSample) -> f32 {
        sample.width() as f32 / sample.height() as f32
    }

    const TARGET: f32 = ASPECT_W as f32 / ASPECT_H as f32;

    #[test]
    fn undecodable_input_is_invalid_source() {
        let err = normalize(b"not an image", None, None).unwrap_err();
        assert!(matches!(err, BadgeError::InvalidSource(_)));
    }

    #[test]
    fn default_crop_is_centered_and_on_aspect() {
        for (w, h) in [(800, 600), (600, 800), (350, 347), (1920, 1080), (50, 400)] {
            let sample = normalize(&png_bytes(w, h), None, None).unwrap();
            assert!(sample.width() <= w && sample.height() <= h);
            // within one pixel of the target aspect
            let ideal_h = aspect_height(sample.width());
            assert!(
                (sample.height() as i64 - ideal_h as i64).abs() <= 1,
                "{w}x{h} -> {}x{}",
                sample.width(),
                sample.height()
            );
            assert!((ratio(&sample) - TARGET).abs() < 0.02);
        }
    }

    #[test]
    fn explicit_selection_derives_height() {
        let sample = normalize(
            &png_bytes(1000, 1000),
            Some(CropSelection { x: 100, y: 50, width: 700 }),
            None,
        )
        .unwrap();
        assert_eq!(sample.width(), 700);
        assert_eq!(sample.height(), aspect_height(700));
    }

    #[test]
    fn out_of_bounds_selection_is_clamped_without_breaking_aspect() {
        let sample = normalize(
            &png_bytes(400, 300),
            Some(CropSelection { x: 390, y: 290, width: 900 }),
            None,
        )
        .unwrap();
        assert!(sample.width() <= 400 && sample.height() <= 300);
        assert!((ratio(&sample) - TARGET).abs() < 0.02);
    }

    #[test]
    fn zoom_shrinks_around_center() {
        let sel = CropSelection { x: 0, y: 0, width: 800 };
        let zoomed = apply_zoom(sel, Some(2.0));
        assert_eq!(zoomed.width, 400);
        // centers coincide
        assert_eq!(zoomed.x + zoomed.width / 2, sel.x + sel.width / 2);

        let sample = normalize(&png_bytes(900, 900), Some(sel), Some(2.0)).unwrap();
        assert_eq!(sample.width(), 400);
        assert_eq!(sample.height(), aspect_height(400));
    }

    #[test]
    fn zoom_below_one_is_ignored() {
        let sel = CropSelection { x: 10, y: 10, width: 300 };
        let out = apply_zoom(sel, Some(0.2));
        assert_eq!(out.width, 300);
    }

    #[test]
    fn preview_jpeg_is_produced() {
        use image::GenericImageView;
        let sample = normalize(&png_bytes(700, 700), None, None).unwrap();
        let jpeg = sample.to_jpeg(90).unwrap();
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(back.dimensions(), (sample.width(), sample.height()));
    }
}

//! The rendered surface the pipeline rasterizes.
//!
//! Hosts implement [`RenderSurface`]; the browser host lives in
//! `crate::browser`. Whatever the host, every capture of one export must come
//! out at the same pixel size, so sizing goes through [`capture_dimensions`]
//! and [`normalize_to`] here rather than being left to the host.

use crate::frame::BitmapFrame;
use crate::profile::CaptureQuality;
use crate::result::{MotionError, MotionResult};
use async_trait::async_trait;
use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// A live element that can be sampled into bitmaps
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Resolve at the host's next paint
    async fn next_paint(&self) -> MotionResult<()>;

    /// Settle layout and capture the element's current visual state
    ///
    /// # Errors
    ///
    /// `CaptureFailure` if the host cannot render the element right now.
    async fn rasterize(&self, quality: &CaptureQuality) -> MotionResult<BitmapFrame>;
}

/// Layout box of the capture target in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl ElementRect {
    /// Whether the element has a non-zero layout size
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }

    /// Output pixel size of a capture at `scale`
    pub fn capture_dimensions(&self, scale: f64) -> MotionResult<(u32, u32)> {
        capture_dimensions(self.width, self.height, scale)
    }
}

/// Pixel size of a capture: `floor(css * scale)` on both axes.
///
/// # Errors
///
/// `CaptureFailure` when the element has no area or the scale is not
/// positive.
pub fn capture_dimensions(css_width: f64, css_height: f64, scale: f64) -> MotionResult<(u32, u32)> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(MotionError::capture(format!("invalid capture scale {scale}")));
    }
    let width = (css_width * scale).floor();
    let height = (css_height * scale).floor();
    if !(width >= 1.0 && height >= 1.0) || !width.is_finite() || !height.is_finite() {
        return Err(MotionError::capture(format!(
            "element has no layout size ({css_width}x{css_height} css px)"
        )));
    }
    Ok((width as u32, height as u32))
}

/// Crop or pad `image` to exactly `width` x `height`, anchored top-left.
/// Padding is transparent.
#[must_use]
pub fn normalize_to(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    let mut out = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let cw = image.width().min(width);
    let ch = image.height().min(height);
    let kept = imageops::crop_imm(&image, 0, 0, cw, ch).to_image();
    imageops::replace(&mut out, &kept, 0, 0);
    out
}

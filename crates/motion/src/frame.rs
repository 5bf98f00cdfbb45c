//! Bitmap frames and the append-only frame sequence.
//!
//! A `FrameSequence` belongs to exactly one export. Frames are appended in
//! capture order by the sampler and later moved, in the same order, into a
//! single assembler.

use crate::result::{MotionError, MotionResult};
use image::{ImageFormat, RgbaImage};
use std::time::Duration;

/// A still RGBA capture of the preview surface
#[derive(Debug, Clone)]
pub struct BitmapFrame {
    image: RgbaImage,
    /// Offset of the capture from the start of sampling
    pub captured_at: Duration,
}

impl BitmapFrame {
    /// Wrap an RGBA image captured at `captured_at`
    #[must_use]
    pub fn new(image: RgbaImage, captured_at: Duration) -> Self {
        Self { image, captured_at }
    }

    /// Build a frame from raw RGBA bytes
    ///
    /// # Errors
    ///
    /// Returns error if `data` is not `width * height * 4` bytes long
    pub fn from_rgba(
        data: Vec<u8>,
        width: u32,
        height: u32,
        captured_at: Duration,
    ) -> MotionResult<Self> {
        let image = RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| MotionError::image("RGBA buffer does not match frame dimensions"))?;
        Ok(Self::new(image, captured_at))
    }

    /// Decode a PNG screenshot into a frame
    pub fn from_png(png: &[u8], captured_at: Duration) -> MotionResult<Self> {
        let decoded = image::load_from_memory_with_format(png, ImageFormat::Png)
            .map_err(|e| MotionError::capture(format!("Failed to decode screenshot: {e}")))?;
        Ok(Self::new(decoded.to_rgba8(), captured_at))
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the pixels
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take the pixels, releasing the frame
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Size of the pixel buffer in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Ordered frames of one export run
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: Vec<BitmapFrame>,
}

impl FrameSequence {
    /// Create an empty sequence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if the frame's dimensions differ from the
    /// first frame of the sequence; the frame is dropped.
    pub fn push(&mut self, frame: BitmapFrame) -> MotionResult<()> {
        if let Some(expected) = self.dimensions() {
            if frame.dimensions() != expected {
                return Err(MotionError::FrameSizeMismatch {
                    expected,
                    actual: frame.dimensions(),
                });
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence has no frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Dimensions shared by every frame, if any frame exists
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(BitmapFrame::dimensions)
    }

    /// Frames in capture order
    #[must_use]
    pub fn frames(&self) -> &[BitmapFrame] {
        &self.frames
    }

    /// Capture offsets in order
    pub fn timestamps(&self) -> impl Iterator<Item = Duration> + '_ {
        self.frames.iter().map(|f| f.captured_at)
    }

    /// Move every frame out, leaving the sequence empty
    #[must_use]
    pub fn take_frames(&mut self) -> Vec<BitmapFrame> {
        std::mem::take(&mut self.frames)
    }

    /// Release every frame. Safe to call any number of times.
    pub fn dispose(&mut self) {
        self.frames.clear();
        self.frames.shrink_to_fit();
    }
}

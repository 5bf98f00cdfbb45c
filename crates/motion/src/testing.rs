//! Scripted surfaces and drivers for unit tests.

use crate::animation::{AnimationDriver, TypewriterState};
use crate::frame::BitmapFrame;
use crate::profile::CaptureQuality;
use crate::result::{MotionError, MotionResult};
use crate::surface::RenderSurface;
use crate::video::{EncoderFactory, StreamingEncoder, VideoCodec, VideoSettings};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Surface that paints at a fixed rate and stamps each capture with its
/// call index in the red/green channels of pixel (0, 0).
#[derive(Debug)]
pub struct ScriptedSurface {
    pub width: u32,
    pub height: u32,
    pub paint_interval: Duration,
    pub fail_first: usize,
    /// Fail with a page error instead of a capture error
    pub page_errors: bool,
    pub typed: Option<Arc<TypewriterState>>,
    calls: AtomicUsize,
}

impl ScriptedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            paint_interval: Duration::from_millis(16),
            fail_first: 0,
            page_errors: false,
            typed: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn with_page_errors(mut self) -> Self {
        self.page_errors = true;
        self
    }

    pub fn showing(mut self, state: Arc<TypewriterState>) -> Self {
        self.typed = Some(state);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Index stamped into a frame by [`ScriptedSurface`]
pub fn stamp_of(frame: &BitmapFrame) -> usize {
    let px = frame.image().get_pixel(0, 0);
    usize::from(px[0]) | (usize::from(px[1]) << 8)
}

#[async_trait]
impl RenderSurface for ScriptedSurface {
    async fn next_paint(&self) -> MotionResult<()> {
        tokio::time::sleep(self.paint_interval).await;
        Ok(())
    }

    async fn rasterize(&self, _quality: &CaptureQuality) -> MotionResult<BitmapFrame> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        if idx < self.fail_first {
            let message = format!("scripted failure #{idx}");
            return Err(if self.page_errors {
                MotionError::Page { message }
            } else {
                MotionError::capture(message)
            });
        }
        let typed = self.typed.as_ref().map_or(0, |s| s.visible_chars());
        let mut image = RgbaImage::from_pixel(self.width, self.height, Rgba([40, 40, 60, 255]));
        image.put_pixel(
            0,
            0,
            Rgba([(idx & 0xff) as u8, ((idx >> 8) & 0xff) as u8, typed as u8, 255]),
        );
        Ok(BitmapFrame::new(image, Duration::ZERO))
    }
}

/// Driver that sleeps for a fixed time and records calls
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    pub run_time: Duration,
    pub fail: bool,
    pub log: Mutex<Vec<&'static str>>,
}

impl ScriptedDriver {
    pub fn running_for(run_time: Duration) -> Self {
        Self {
            run_time,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AnimationDriver for ScriptedDriver {
    async fn start(&self) -> MotionResult<()> {
        if let Ok(mut log) = self.log.lock() {
            log.push("start");
        }
        tokio::time::sleep(self.run_time).await;
        if self.fail {
            return Err(MotionError::AnimationFailed {
                message: "scripted".to_string(),
            });
        }
        Ok(())
    }

    async fn reset(&self) -> MotionResult<()> {
        if let Ok(mut log) = self.log.lock() {
            log.push("reset");
        }
        Ok(())
    }
}

pub fn solid_frame(width: u32, height: u32, color: [u8; 4], ms: u64) -> BitmapFrame {
    BitmapFrame::new(
        RgbaImage::from_pixel(width, height, Rgba(color)),
        Duration::from_millis(ms),
    )
}

/// Encoder recording arrival instants and the centre pixel of each push.
/// Clones share their records; as a factory it hands out such clones.
#[derive(Debug, Clone, Default)]
pub struct RecordingEncoder {
    pub arrivals: Arc<Mutex<Vec<Instant>>>,
    pub colors: Arc<Mutex<Vec<[u8; 4]>>>,
    pub end: Arc<Mutex<Option<(Instant, [u8; 4])>>>,
    /// Push index that fails
    pub fail_at: Option<usize>,
    pub output: Vec<u8>,
}

impl RecordingEncoder {
    pub fn producing(output: Vec<u8>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, push: usize) -> Self {
        self.fail_at = Some(push);
        self
    }

    pub fn pushes(&self) -> usize {
        self.arrivals.lock().map(|a| a.len()).unwrap_or_default()
    }
}

fn centre(canvas: &RgbaImage) -> [u8; 4] {
    let (w, h) = canvas.dimensions();
    canvas.get_pixel(w / 2, h / 2).0
}

#[async_trait]
impl StreamingEncoder for RecordingEncoder {
    async fn push_frame(&mut self, canvas: &RgbaImage) -> MotionResult<()> {
        let Ok(mut arrivals) = self.arrivals.lock() else {
            return Err(MotionError::encoder("poisoned"));
        };
        if self.fail_at == Some(arrivals.len()) {
            return Err(MotionError::encoder("encoder pipe closed"));
        }
        arrivals.push(Instant::now());
        if let Ok(mut colors) = self.colors.lock() {
            colors.push(centre(canvas));
        }
        Ok(())
    }

    async fn mark_end(&mut self, last: &RgbaImage) -> MotionResult<()> {
        if let Ok(mut end) = self.end.lock() {
            *end = Some((Instant::now(), centre(last)));
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> MotionResult<Vec<u8>> {
        Ok(self.output)
    }
}

#[async_trait]
impl EncoderFactory for RecordingEncoder {
    async fn open(
        &self,
        _codec: VideoCodec,
        _width: u32,
        _height: u32,
        _settings: &VideoSettings,
    ) -> MotionResult<Box<dyn StreamingEncoder>> {
        Ok(Box::new(self.clone()))
    }
}

//! GIF Assembler.
//!
//! Frames are moved into a [`GifJob`] and compressed on a blocking worker.
//! Progress is reported in two halves: submission, then rendering as the
//! worker writes frames.

use crate::delivery::{non_empty, EncodedMedia};
use crate::frame::BitmapFrame;
use crate::result::{MotionError, MotionResult};
use gif::{Encoder, Frame, Repeat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// GIF encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifSettings {
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest)
    pub speed: i32,
    /// Loop count (0 = infinite)
    pub loop_count: u16,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            speed: 10,
            loop_count: 0,
        }
    }
}

/// Per-frame delay in centiseconds from the actual capture cadence.
///
/// Uses the lower median of consecutive capture gaps, so captures taken
/// after the cadence stopped do not stretch the delay. `fallback` applies
/// when fewer than two frames exist. Never below 1.
#[must_use]
pub fn gif_delay_cs(frames: &[BitmapFrame], fallback: Duration) -> u16 {
    let mut gaps: Vec<Duration> = frames
        .windows(2)
        .map(|pair| pair[1].captured_at.saturating_sub(pair[0].captured_at))
        .collect();
    gaps.sort_unstable();
    let interval = gaps.get(gaps.len().saturating_sub(1) / 2).copied().unwrap_or(fallback);
    let cs = (interval.as_secs_f64() * 100.0).round();
    cs.clamp(1.0, f64::from(u16::MAX)) as u16
}

/// Frames handed over for compression
#[derive(Debug)]
pub struct GifJob {
    width: u16,
    height: u16,
    delay_cs: u16,
    settings: GifSettings,
    frames: Vec<BitmapFrame>,
}

impl GifJob {
    /// Create an empty job for `width` x `height` frames
    ///
    /// # Errors
    ///
    /// `EncoderInit` when a dimension does not fit the GIF format.
    pub fn new(width: u32, height: u32, delay_cs: u16, settings: GifSettings) -> MotionResult<Self> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(MotionError::encoder(format!(
                "{width}x{height} exceeds the GIF limit of 65535 pixels per side"
            )));
        };
        if w == 0 || h == 0 {
            return Err(MotionError::encoder("GIF frames must have a non-zero size"));
        }
        Ok(Self {
            width: w,
            height: h,
            delay_cs: delay_cs.max(1),
            settings,
            frames: Vec::new(),
        })
    }

    /// Move a frame into the job
    pub fn submit(&mut self, frame: BitmapFrame) -> MotionResult<()> {
        let expected = (u32::from(self.width), u32::from(self.height));
        if frame.dimensions() != expected {
            return Err(MotionError::FrameSizeMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Frames submitted so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing was submitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Quantize and write every frame; blocking. `on_frame` receives the
    /// count of frames written.
    pub fn render(self, mut on_frame: impl FnMut(usize)) -> MotionResult<Vec<u8>> {
        let mut output = Vec::new();
        {
            let mut encoder = Encoder::new(&mut output, self.width, self.height, &[])
                .map_err(|e| MotionError::encoder(format!("failed to create GIF encoder: {e}")))?;
            let repeat = match self.settings.loop_count {
                0 => Repeat::Infinite,
                n => Repeat::Finite(n),
            };
            encoder
                .set_repeat(repeat)
                .map_err(|e| MotionError::encoder(format!("failed to set GIF repeat: {e}")))?;

            let speed = self.settings.speed.clamp(1, 30);
            for (i, frame) in self.frames.into_iter().enumerate() {
                let mut rgba = frame.into_image().into_raw();
                let mut gif_frame = Frame::from_rgba_speed(self.width, self.height, &mut rgba, speed);
                gif_frame.delay = self.delay_cs;
                encoder
                    .write_frame(&gif_frame)
                    .map_err(|e| MotionError::encoder(format!("failed to write GIF frame: {e}")))?;
                on_frame(i + 1);
            }
        }
        Ok(output)
    }
}

/// Compresses frame sequences into animated GIFs off the async runtime
#[derive(Debug, Clone, Default)]
pub struct GifAssembler {
    settings: GifSettings,
}

impl GifAssembler {
    /// Create an assembler
    #[must_use]
    pub fn new(settings: GifSettings) -> Self {
        Self { settings }
    }

    /// The settings
    #[must_use]
    pub fn settings(&self) -> &GifSettings {
        &self.settings
    }

    /// Encode `frames` at `delay_cs` per frame.
    ///
    /// `on_progress` receives 0.0 to 0.5 during submission and 0.5 to 1.0
    /// while the worker renders.
    pub async fn assemble(
        &self,
        frames: Vec<BitmapFrame>,
        delay_cs: u16,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<EncodedMedia> {
        let Some(first) = frames.first() else {
            return Err(MotionError::EmptySequence);
        };
        let (width, height) = first.dimensions();
        let n = frames.len();
        let mut job = GifJob::new(width, height, delay_cs, self.settings)?;
        info!(width, height, frames = n, delay_cs, "encoding GIF");

        for (i, frame) in frames.into_iter().enumerate() {
            job.submit(frame)?;
            on_progress(0.5 * (i + 1) as f64 / n as f64);
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<usize>();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let result = job.render(|written| {
                progress_tx.send(written).ok();
            });
            done_tx.send(result).ok();
        });

        while let Some(written) = progress_rx.recv().await {
            on_progress(0.5 + 0.5 * written as f64 / n as f64);
        }
        let bytes = done_rx
            .await
            .map_err(|_| MotionError::encoder("GIF worker exited without a result"))??;
        let bytes = non_empty(bytes, "gif")?;
        debug!(bytes = bytes.len(), "GIF encoded");

        Ok(EncodedMedia {
            bytes,
            mime: "image/gif",
            extension: "gif",
            width,
            height,
            frame_count: n,
            duration: Duration::from_millis(u64::from(delay_cs.max(1)) * 10 * n as u64),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::solid_frame;
    use std::io::Cursor;

    fn decode_delays(bytes: &[u8]) -> (u16, u16, Vec<u16>) {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(bytes)).unwrap();
        let (w, h) = (decoder.width(), decoder.height());
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        (w, h, delays)
    }

    mod delay_tests {
        use super::*;

        #[test]
        fn test_delay_from_capture_cadence() {
            let frames: Vec<_> = (0..5).map(|i| solid_frame(2, 2, [0; 4], i * 50)).collect();
            assert_eq!(gif_delay_cs(&frames, Duration::from_millis(200)), 5);
        }

        #[test]
        fn test_delay_ignores_late_trailing_captures() {
            let mut frames: Vec<_> = (0..30).map(|i| solid_frame(2, 2, [0; 4], i * 50)).collect();
            frames.push(solid_frame(2, 2, [0; 4], 4500));
            frames.push(solid_frame(2, 2, [0; 4], 4510));
            assert_eq!(gif_delay_cs(&frames, Duration::from_millis(50)), 5);
        }

        #[test]
        fn test_delay_takes_lower_median_of_irregular_gaps() {
            let frames = vec![
                solid_frame(2, 2, [0; 4], 0),
                solid_frame(2, 2, [0; 4], 20),
                solid_frame(2, 2, [0; 4], 300),
            ];
            assert_eq!(gif_delay_cs(&frames, Duration::from_millis(50)), 2);
        }

        #[test]
        fn test_single_frame_uses_fallback() {
            let frames = vec![solid_frame(2, 2, [0; 4], 0)];
            assert_eq!(gif_delay_cs(&frames, Duration::from_millis(50)), 5);
        }

        #[test]
        fn test_delay_never_below_one() {
            let frames: Vec<_> = (0..4).map(|_| solid_frame(2, 2, [0; 4], 7)).collect();
            assert_eq!(gif_delay_cs(&frames, Duration::ZERO), 1);
            assert_eq!(gif_delay_cs(&[], Duration::ZERO), 1);
        }
    }

    mod assemble_tests {
        use super::*;

        #[tokio::test]
        async fn test_assembles_valid_gif() {
            let frames: Vec<_> = (0..3u8)
                .map(|i| solid_frame(8, 6, [i * 80, 20, 20, 255], u64::from(i) * 50))
                .collect();
            let media = GifAssembler::default()
                .assemble(frames, 5, &mut |_: f64| {})
                .await
                .unwrap();

            assert_eq!(&media.bytes[..6], b"GIF89a");
            assert_eq!(media.mime, "image/gif");
            assert_eq!(media.extension, "gif");
            assert_eq!(media.duration, Duration::from_millis(150));
            let (w, h, delays) = decode_delays(&media.bytes);
            assert_eq!((w, h), (8, 6));
            assert_eq!(delays, vec![5, 5, 5]);
        }

        #[tokio::test]
        async fn test_single_frame_gif() {
            let media = GifAssembler::default()
                .assemble(vec![solid_frame(4, 4, [255; 4], 0)], 5, &mut |_: f64| {})
                .await
                .unwrap();
            let (_, _, delays) = decode_delays(&media.bytes);
            assert_eq!(delays.len(), 1);
        }

        #[tokio::test]
        async fn test_progress_split_between_submit_and_render() {
            let frames: Vec<_> = (0..4).map(|i| solid_frame(4, 4, [9; 4], i * 10)).collect();
            let mut seen = Vec::new();
            GifAssembler::default()
                .assemble(frames, 2, &mut |p: f64| seen.push(p))
                .await
                .unwrap();

            assert_eq!(seen.len(), 8);
            assert_eq!(seen[3], 0.5);
            assert!(seen.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(seen.last().copied(), Some(1.0));
        }

        #[tokio::test]
        async fn test_empty_input_rejected() {
            let result = GifAssembler::default()
                .assemble(Vec::new(), 5, &mut |_: f64| {})
                .await;
            assert!(matches!(result, Err(MotionError::EmptySequence)));
        }

        #[test]
        fn test_oversized_frames_rejected() {
            let result = GifJob::new(65_536, 1, 5, GifSettings::default());
            assert!(matches!(result, Err(MotionError::EncoderInit { .. })));
        }

        #[test]
        fn test_job_rejects_mismatched_frame() {
            let mut job = GifJob::new(4, 4, 5, GifSettings::default()).unwrap();
            job.submit(solid_frame(4, 4, [0; 4], 0)).unwrap();
            let result = job.submit(solid_frame(5, 4, [0; 4], 0));
            assert!(matches!(result, Err(MotionError::FrameSizeMismatch { .. })));
            assert_eq!(job.len(), 1);
        }

        #[test]
        fn test_finite_loop_count_renders() {
            let settings = GifSettings {
                speed: 30,
                loop_count: 2,
            };
            let mut job = GifJob::new(2, 2, 5, settings).unwrap();
            job.submit(solid_frame(2, 2, [1, 2, 3, 255], 0)).unwrap();
            let mut written = Vec::new();
            let bytes = job.render(|n| written.push(n)).unwrap();
            assert!(!bytes.is_empty());
            assert_eq!(written, vec![1]);
        }
    }
}

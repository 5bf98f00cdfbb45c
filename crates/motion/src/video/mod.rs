//! Video Assembler.
//!
//! Streaming encoders stamp each frame with the moment it arrives, not with
//! a duration supplied by the caller. The assembler therefore replays the
//! stored sequence in real time: every frame is painted onto one fixed-size
//! canvas, pushed to the encoder, and followed by a wait that keeps the
//! replay on an absolute `target / n` schedule. Output duration then matches
//! the requested duration however irregularly the frames were captured.
//!
//! ## Codec preference
//!
//! | codec      | container | encoder            |
//! |------------|-----------|--------------------|
//! | `H264Mp4`  | mp4       | ffmpeg `libx264`   |
//! | `Vp9Webm`  | webm      | ffmpeg `libvpx-vp9`|
//! | `Vp8Webm`  | webm      | ffmpeg `libvpx`    |
//! | `MjpegMp4` | mp4       | in-process         |

mod ffmpeg;
mod mjpeg;

pub use ffmpeg::{FfmpegProbe, FfmpegStream};
pub use mjpeg::MjpegMp4Stream;

use crate::delivery::{non_empty, EncodedMedia};
use crate::frame::BitmapFrame;
use crate::profile::{AspectRatio, ResolutionProfile};
use crate::result::{MotionError, MotionResult};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Output codec and the container it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoCodec {
    /// H.264 in MP4
    H264Mp4,
    /// VP9 in WebM
    Vp9Webm,
    /// VP8 in WebM
    Vp8Webm,
    /// Motion JPEG in MP4, encoded in-process
    MjpegMp4,
}

impl VideoCodec {
    /// Default preference order; the last entry is always available
    pub const PREFERENCE: [Self; 4] = [Self::H264Mp4, Self::Vp9Webm, Self::Vp8Webm, Self::MjpegMp4];

    /// Container the codec is packaged in
    #[must_use]
    pub const fn container(self) -> Container {
        match self {
            Self::H264Mp4 | Self::MjpegMp4 => Container::Mp4,
            Self::Vp9Webm | Self::Vp8Webm => Container::Webm,
        }
    }

    /// ffmpeg encoder name, `None` for in-process codecs
    #[must_use]
    pub const fn ffmpeg_encoder(self) -> Option<&'static str> {
        match self {
            Self::H264Mp4 => Some("libx264"),
            Self::Vp9Webm => Some("libvpx-vp9"),
            Self::Vp8Webm => Some("libvpx"),
            Self::MjpegMp4 => None,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::H264Mp4 => "h264-mp4",
            Self::Vp9Webm => "vp9-webm",
            Self::Vp8Webm => "vp8-webm",
            Self::MjpegMp4 => "mjpeg-mp4",
        };
        f.write_str(label)
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264-mp4" | "h264" | "avc" => Ok(Self::H264Mp4),
            "vp9-webm" | "vp9" => Ok(Self::Vp9Webm),
            "vp8-webm" | "vp8" => Ok(Self::Vp8Webm),
            "mjpeg-mp4" | "mjpeg" => Ok(Self::MjpegMp4),
            other => Err(format!("unknown codec '{other}'")),
        }
    }
}

/// File container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// ISO base media
    Mp4,
    /// Matroska subset
    Webm,
}

impl Container {
    /// MIME type of the container
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
        }
    }

    /// File extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Tells which codecs the host can encode
pub trait CodecProbe: Send + Sync + fmt::Debug {
    /// Whether `codec` can be initialized here
    fn supports(&self, codec: VideoCodec) -> bool;
}

/// Probe answering from a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    supported: HashSet<VideoCodec>,
}

impl StaticProbe {
    /// Support exactly `codecs`
    #[must_use]
    pub fn new(codecs: impl IntoIterator<Item = VideoCodec>) -> Self {
        Self {
            supported: codecs.into_iter().collect(),
        }
    }
}

impl CodecProbe for StaticProbe {
    fn supports(&self, codec: VideoCodec) -> bool {
        self.supported.contains(&codec)
    }
}

/// First supported codec in `preferences`; the last entry when none is.
///
/// # Errors
///
/// `EncoderInit` for an empty preference list.
pub fn select_codec(preferences: &[VideoCodec], probe: &dyn CodecProbe) -> MotionResult<VideoCodec> {
    let Some(&floor) = preferences.last() else {
        return Err(MotionError::encoder("codec preference list is empty"));
    };
    let chosen = preferences
        .iter()
        .copied()
        .find(|c| probe.supports(*c))
        .unwrap_or(floor);
    debug!(%chosen, "codec selected");
    Ok(chosen)
}

/// Placement of a `src` image fitted inside `dst`: `(x, y, width, height)`.
///
/// Scales to fill one dimension and centres along the other; the aspect
/// ratio is kept to within rounding.
#[must_use]
pub fn letterbox_rect(src: (u32, u32), dst: (u32, u32)) -> (u32, u32, u32, u32) {
    let (sw, sh) = (f64::from(src.0.max(1)), f64::from(src.1.max(1)));
    let (dw, dh) = (f64::from(dst.0), f64::from(dst.1));
    let scale = (dw / sw).min(dh / sh);
    let w = ((sw * scale).round() as u32).clamp(1, dst.0.max(1));
    let h = ((sh * scale).round() as u32).clamp(1, dst.1.max(1));
    ((dst.0 - w.min(dst.0)) / 2, (dst.1 - h.min(dst.1)) / 2, w, h)
}

/// Paint `frame` letterboxed onto `canvas` over a solid `background`.
pub fn compose_letterboxed(
    canvas: &mut RgbaImage,
    frame: &RgbaImage,
    background: [u8; 4],
    filter: FilterType,
) {
    for px in canvas.pixels_mut() {
        *px = Rgba(background);
    }
    let (x, y, w, h) = letterbox_rect(frame.dimensions(), canvas.dimensions());
    if (w, h) == frame.dimensions() {
        imageops::overlay(canvas, frame, i64::from(x), i64::from(y));
    } else {
        let scaled = imageops::resize(frame, w, h, filter);
        imageops::overlay(canvas, &scaled, i64::from(x), i64::from(y));
    }
}

/// Encoder that timestamps frames by arrival
#[async_trait]
pub trait StreamingEncoder: Send {
    /// Signal that `canvas` holds a new frame
    async fn push_frame(&mut self, canvas: &RgbaImage) -> MotionResult<()>;

    /// Mark the instant the stream ends. `last` is the canvas as it was
    /// after the final push; encoders that time frames only by arrival
    /// resend it so the stream reaches this instant.
    async fn mark_end(&mut self, _last: &RgbaImage) -> MotionResult<()> {
        Ok(())
    }

    /// Finalize and return the encoded file
    async fn finish(self: Box<Self>) -> MotionResult<Vec<u8>>;
}

/// Opens the encoder for a chosen codec
#[async_trait]
pub trait EncoderFactory: Send + Sync + fmt::Debug {
    /// Start an encoder for `codec` producing `width` x `height` frames
    async fn open(
        &self,
        codec: VideoCodec,
        width: u32,
        height: u32,
        settings: &VideoSettings,
    ) -> MotionResult<Box<dyn StreamingEncoder>>;
}

/// ffmpeg for the codecs it provides, in-process MJPEG otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEncoders;

#[async_trait]
impl EncoderFactory for SystemEncoders {
    async fn open(
        &self,
        codec: VideoCodec,
        width: u32,
        height: u32,
        settings: &VideoSettings,
    ) -> MotionResult<Box<dyn StreamingEncoder>> {
        match codec.ffmpeg_encoder() {
            Some(name) => {
                let stream = FfmpegStream::spawn(
                    codec,
                    name,
                    width,
                    height,
                    settings.fps,
                    settings.profile.bitrate(),
                )
                .await?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(MjpegMp4Stream::new(
                width,
                height,
                settings.fps,
                settings.jpeg_quality,
            ))),
        }
    }
}

/// Settings for video assembly
#[derive(Debug, Clone)]
pub struct VideoSettings {
    /// Output frame rate
    pub fps: u32,
    /// Resolution profile
    pub profile: ResolutionProfile,
    /// Output shape
    pub aspect: AspectRatio,
    /// Letterbox fill
    pub background: [u8; 4],
    /// Codec preference order
    pub codecs: Vec<VideoCodec>,
    /// JPEG quality for the in-process codec
    pub jpeg_quality: u8,
    /// Wait after opening the encoder before the first frame
    pub startup_delay: Duration,
    /// Wait after the last frame before finalizing
    pub trailing_pause: Duration,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            profile: ResolutionProfile::default(),
            aspect: AspectRatio::default(),
            background: [0, 0, 0, 255],
            codecs: VideoCodec::PREFERENCE.to_vec(),
            jpeg_quality: 90,
            startup_delay: Duration::from_millis(30),
            trailing_pause: Duration::from_millis(300),
        }
    }
}

/// Timing of one replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Frames pushed
    pub frames: usize,
    /// Wait scheduled after each frame
    pub per_frame: Duration,
    /// From first push to end mark
    pub elapsed: Duration,
}

/// Replays frame sequences into a streaming encoder
#[derive(Debug, Clone)]
pub struct VideoAssembler {
    settings: VideoSettings,
    probe: Option<Arc<dyn CodecProbe>>,
    encoders: Arc<dyn EncoderFactory>,
}

impl VideoAssembler {
    /// Create an assembler that probes ffmpeg for codec support
    #[must_use]
    pub fn new(settings: VideoSettings) -> Self {
        Self {
            settings,
            probe: None,
            encoders: Arc::new(SystemEncoders),
        }
    }

    /// Use `probe` instead of asking ffmpeg
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn CodecProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Open encoders through `encoders` instead of [`SystemEncoders`]
    #[must_use]
    pub fn with_encoders(mut self, encoders: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = encoders;
        self
    }

    /// The settings
    #[must_use]
    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// Output canvas size
    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.settings.profile.dimensions(self.settings.aspect)
    }

    /// Codec this assembler would use on this host
    pub async fn resolve_codec(&self) -> MotionResult<VideoCodec> {
        match &self.probe {
            Some(probe) => select_codec(&self.settings.codecs, probe.as_ref()),
            None => {
                let probe = FfmpegProbe::detect().await;
                select_codec(&self.settings.codecs, &probe)
            }
        }
    }

    /// Encode `frames` into a video lasting `target`.
    ///
    /// `on_progress` receives the fraction of frames replayed.
    pub async fn assemble(
        &self,
        frames: Vec<BitmapFrame>,
        target: Duration,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<EncodedMedia> {
        if frames.is_empty() {
            return Err(MotionError::EmptySequence);
        }
        let codec = self.resolve_codec().await?;
        let (width, height) = self.canvas_size();
        let encoder = self
            .encoders
            .open(codec, width, height, &self.settings)
            .await?;
        info!(%codec, width, height, frames = frames.len(), "encoding video");

        let frame_count = frames.len();
        let (report, bytes) = self.replay(frames, target, encoder, on_progress).await?;
        let bytes = non_empty(bytes, codec.container().extension())?;
        debug!(
            bytes = bytes.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "video encoded"
        );

        Ok(EncodedMedia {
            bytes,
            mime: codec.container().mime(),
            extension: codec.container().extension(),
            width,
            height,
            frame_count,
            duration: target,
        })
    }

    /// Paint and push each frame on an absolute `target / n` schedule.
    pub async fn replay(
        &self,
        frames: Vec<BitmapFrame>,
        target: Duration,
        mut encoder: Box<dyn StreamingEncoder>,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<(ReplayReport, Vec<u8>)> {
        if frames.is_empty() {
            return Err(MotionError::EmptySequence);
        }
        let (width, height) = self.canvas_size();
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba(self.settings.background));
        let filter = self.settings.profile.smoothing().filter();

        let n = frames.len();
        let per_frame = target / n as u32;

        tokio::time::sleep(self.settings.startup_delay).await;

        let started = Instant::now();
        for (i, frame) in frames.into_iter().enumerate() {
            compose_letterboxed(&mut canvas, frame.image(), self.settings.background, filter);
            drop(frame);
            encoder.push_frame(&canvas).await?;
            on_progress((i + 1) as f64 / n as f64);
            tokio::time::sleep_until(started + per_frame * (i as u32 + 1)).await;
        }
        encoder.mark_end(&canvas).await?;
        let elapsed = started.elapsed();

        tokio::time::sleep(self.settings.trailing_pause).await;
        let bytes = encoder.finish().await?;

        Ok((
            ReplayReport {
                frames: n,
                per_frame,
                elapsed,
            },
            bytes,
        ))
    }
}

//! Snippet Motion: turn a code snippet into a typewriter video or GIF.
//!
//! A preview page types the snippet out while frames are sampled from it;
//! the frames are then encoded and written to disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  start()   ┌──────────────┐  rasterize  ┌──────────────┐
//! │  Animation   │◄───────────│   Exporter   │────────────►│ Frame        │
//! │  Driver      │            │ (one at a    │             │ Sampler      │
//! └──────────────┘            │  time)       │◄────────────└──────────────┘
//!                             └──────┬───────┘   frames
//!                                    │
//!                 ┌──────────────────┴──────────────────┐
//!                 ▼                                     ▼
//!         ┌──────────────┐                      ┌──────────────┐
//!         │ Video        │  mp4 / webm          │ GIF          │  gif
//!         │ Assembler    │─────────┐    ┌───────│ Assembler    │
//!         └──────────────┘         ▼    ▼       └──────────────┘
//!                               ┌──────────┐
//!                               │ Delivery │
//!                               └──────────┘
//! ```
//!
//! With the `browser` feature, [`PreviewPage`] drives a real Chromium tab
//! and serves as both the capture surface and the animation driver.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod animation;
pub mod browser;
pub mod config;
pub mod delivery;
pub mod export;
pub mod frame;
pub mod gif_assembler;
pub mod preview;
pub mod profile;
pub mod result;
pub mod sampler;
pub mod surface;
pub mod video;

#[cfg(test)]
mod testing;

pub use animation::{AnimationDriver, Typewriter, TypewriterState, TypingConfig};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{PreviewBrowser, PreviewPage};
pub use config::{parse_hex_color, DurationPreset, ExportConfig};
pub use delivery::{export_filename, Delivery, EncodedMedia};
pub use export::{
    ExportKind, ExportObserver, ExportOutcome, ExportPhase, ExportProgress, ExportSession,
    ExportStrategy, Exporter, GifExportStrategy, Notification, NullObserver, ProgressTracker,
    RecordingObserver, VideoExportStrategy,
};
pub use frame::{BitmapFrame, FrameSequence};
pub use gif_assembler::{gif_delay_cs, GifAssembler, GifJob, GifSettings};
pub use preview::{PreviewDocument, PREVIEW_ELEMENT_ID};
pub use profile::{AspectRatio, CaptureQuality, ResolutionProfile, Smoothing};
pub use result::{MotionError, MotionResult};
pub use sampler::{capture_once, FrameSampler, SamplerConfig, SamplerStats, StopSignal};
pub use surface::{ElementRect, RenderSurface};
pub use video::{
    select_codec, CodecProbe, Container, EncoderFactory, FfmpegProbe, StaticProbe,
    StreamingEncoder, SystemEncoders, VideoAssembler, VideoCodec, VideoSettings,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

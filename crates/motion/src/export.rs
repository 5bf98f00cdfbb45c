//! Export Orchestrator.
//!
//! One export runs through `Capturing → Finalizing → Rendering → Done`:
//!
//! 1. The animation and the sampler run concurrently on the calling task.
//!    The animation arm waits for the effect to finish *and* for the target
//!    duration to pass, then raises the stop signal.
//! 2. One more capture is forced so the sequence is never empty because of
//!    timing alone.
//! 3. The frames are moved into the format's assembler.
//! 4. The result is written to disk and the observer is notified.
//!
//! Whatever happens, the animation is reset, frames are released and
//! progress returns to zero before the call returns.

use crate::animation::AnimationDriver;
use crate::config::ExportConfig;
use crate::delivery::{Delivery, EncodedMedia};
use crate::frame::{BitmapFrame, FrameSequence};
use crate::gif_assembler::{gif_delay_cs, GifAssembler};
use crate::profile::CaptureQuality;
use crate::result::{MotionError, MotionResult};
use crate::sampler::{capture_once, FrameSampler, SamplerConfig, SamplerStats, StopSignal};
use crate::surface::RenderSurface;
use crate::video::{CodecProbe, EncoderFactory, VideoAssembler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Video file
    Video,
    /// Animated GIF
    Gif,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Gif => "GIF",
        })
    }
}

/// Where an export is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPhase {
    /// No export running
    #[default]
    Idle,
    /// Sampling the animation
    Capturing,
    /// Forced final capture
    Finalizing,
    /// Encoding
    Rendering,
    /// Encoded and delivered
    Done,
}

/// Progress signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Current phase
    pub phase: ExportPhase,
    /// 0 to 100
    pub percent: u8,
}

/// User-facing outcome message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Export written to `path`
    Success {
        /// Format exported
        kind: ExportKind,
        /// Written file
        path: PathBuf,
    },
    /// Export failed; details are only logged
    Failure {
        /// Format attempted
        kind: ExportKind,
    },
}

impl Notification {
    /// Text shown to the user
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success {
                kind: ExportKind::Video,
                ..
            } => "Video exported successfully!",
            Self::Success {
                kind: ExportKind::Gif,
                ..
            } => "GIF exported successfully!",
            Self::Failure {
                kind: ExportKind::Video,
            } => "Failed to export video. Please try again.",
            Self::Failure {
                kind: ExportKind::Gif,
            } => "Failed to export GIF. Please try again.",
        }
    }

    /// Whether this reports a failure
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Receives progress and notifications from an [`Exporter`]
pub trait ExportObserver: Send + Sync {
    /// Progress changed
    fn on_progress(&self, progress: ExportProgress);

    /// An export finished
    fn on_notification(&self, notification: &Notification);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ExportObserver for NullObserver {
    fn on_progress(&self, _progress: ExportProgress) {}

    fn on_notification(&self, _notification: &Notification) {}
}

/// Observer that keeps everything it receives
#[derive(Debug, Default)]
pub struct RecordingObserver {
    progress: Mutex<Vec<ExportProgress>>,
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress updates in order
    #[must_use]
    pub fn progress(&self) -> Vec<ExportProgress> {
        self.progress.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Notifications in order
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl ExportObserver for RecordingObserver {
    fn on_progress(&self, progress: ExportProgress) {
        if let Ok(mut p) = self.progress.lock() {
            p.push(progress);
        }
    }

    fn on_notification(&self, notification: &Notification) {
        if let Ok(mut n) = self.notifications.lock() {
            n.push(notification.clone());
        }
    }
}

/// Forwards progress to an observer, never letting the percentage go back
/// until [`reset`](Self::reset).
pub struct ProgressTracker {
    current: ExportProgress,
    observer: Arc<dyn ExportObserver>,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    /// Start at `{ Idle, 0 }`
    #[must_use]
    pub fn new(observer: Arc<dyn ExportObserver>) -> Self {
        Self {
            current: ExportProgress::default(),
            observer,
        }
    }

    /// Last reported progress
    #[must_use]
    pub fn current(&self) -> ExportProgress {
        self.current
    }

    /// Move to `phase` at `percent`, clamped to `[current, 100]`
    pub fn set(&mut self, phase: ExportPhase, percent: u8) {
        let next = ExportProgress {
            phase: phase.max(self.current.phase),
            percent: percent.min(100).max(self.current.percent),
        };
        if next != self.current {
            self.current = next;
            self.observer.on_progress(next);
        }
    }

    /// Back to `{ Idle, 0 }`
    pub fn reset(&mut self) {
        self.current = ExportProgress::default();
        self.observer.on_progress(self.current);
    }
}

/// State of one export call. Frames are released on [`dispose`](Self::dispose)
/// or drop, whichever comes first.
#[derive(Debug)]
pub struct ExportSession {
    id: Uuid,
    kind: ExportKind,
    target: Duration,
    interval: Duration,
    phase: ExportPhase,
    frames: FrameSequence,
}

impl ExportSession {
    /// Open a session
    #[must_use]
    pub fn new(kind: ExportKind, target: Duration, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target,
            interval,
            phase: ExportPhase::Idle,
            frames: FrameSequence::new(),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Format being exported
    #[must_use]
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Requested duration
    #[must_use]
    pub fn target(&self) -> Duration {
        self.target
    }

    /// Sampling interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    /// Captured frames
    #[must_use]
    pub fn frames(&self) -> &FrameSequence {
        &self.frames
    }

    /// Release frames and return to idle. Idempotent.
    pub fn dispose(&mut self) {
        self.frames.dispose();
        self.phase = ExportPhase::Idle;
    }
}

impl Drop for ExportSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// How one output format captures and encodes
#[async_trait]
pub trait ExportStrategy: Send + Sync {
    /// Format produced
    fn kind(&self) -> ExportKind;

    /// Capture rate
    fn frame_rate(&self) -> u32;

    /// Rasterization settings
    fn capture_quality(&self) -> CaptureQuality;

    /// Encode the captured frames
    async fn assemble(
        &self,
        frames: Vec<BitmapFrame>,
        target: Duration,
        cadence: Duration,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<EncodedMedia>;
}

/// Video output through [`VideoAssembler`]
#[derive(Debug, Clone)]
pub struct VideoExportStrategy {
    assembler: VideoAssembler,
    quality: CaptureQuality,
}

impl VideoExportStrategy {
    /// Create a strategy
    #[must_use]
    pub fn new(assembler: VideoAssembler, quality: CaptureQuality) -> Self {
        Self { assembler, quality }
    }
}

#[async_trait]
impl ExportStrategy for VideoExportStrategy {
    fn kind(&self) -> ExportKind {
        ExportKind::Video
    }

    fn frame_rate(&self) -> u32 {
        self.assembler.settings().fps
    }

    fn capture_quality(&self) -> CaptureQuality {
        self.quality
    }

    async fn assemble(
        &self,
        frames: Vec<BitmapFrame>,
        target: Duration,
        _cadence: Duration,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<EncodedMedia> {
        self.assembler.assemble(frames, target, on_progress).await
    }
}

/// GIF output through [`GifAssembler`]
#[derive(Debug, Clone)]
pub struct GifExportStrategy {
    assembler: GifAssembler,
    fps: u32,
    quality: CaptureQuality,
}

impl GifExportStrategy {
    /// Create a strategy
    #[must_use]
    pub fn new(assembler: GifAssembler, fps: u32, quality: CaptureQuality) -> Self {
        Self {
            assembler,
            fps,
            quality,
        }
    }
}

#[async_trait]
impl ExportStrategy for GifExportStrategy {
    fn kind(&self) -> ExportKind {
        ExportKind::Gif
    }

    fn frame_rate(&self) -> u32 {
        self.fps
    }

    fn capture_quality(&self) -> CaptureQuality {
        self.quality
    }

    async fn assemble(
        &self,
        frames: Vec<BitmapFrame>,
        _target: Duration,
        cadence: Duration,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> MotionResult<EncodedMedia> {
        let delay = gif_delay_cs(&frames, cadence);
        self.assembler.assemble(frames, delay, on_progress).await
    }
}

/// What a successful export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    /// Session that produced it
    pub session_id: Uuid,
    /// Format
    pub kind: ExportKind,
    /// Written file
    pub path: PathBuf,
    /// MIME type actually produced
    pub mime: &'static str,
    /// File size
    pub bytes: usize,
    /// Pixel size
    pub dimensions: (u32, u32),
    /// Frames encoded
    pub frame_count: usize,
    /// Sampler counters
    pub sampling: SamplerStats,
}

/// Clears the exporting flag when dropped
struct ExportGate<'a>(&'a AtomicBool);

impl<'a> ExportGate<'a> {
    fn acquire(flag: &'a AtomicBool) -> MotionResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MotionError::ExportInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for ExportGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Public entry point for exports
pub struct Exporter {
    config: ExportConfig,
    observer: Arc<dyn ExportObserver>,
    delivery: Delivery,
    probe: Option<Arc<dyn CodecProbe>>,
    encoders: Option<Arc<dyn EncoderFactory>>,
    exporting: AtomicBool,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("delivery", &self.delivery)
            .field("exporting", &self.is_exporting())
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Create an exporter delivering into `config.output_dir`
    #[must_use]
    pub fn new(config: ExportConfig, observer: Arc<dyn ExportObserver>) -> Self {
        let delivery = Delivery::new(&config.output_dir);
        Self {
            config,
            observer,
            delivery,
            probe: None,
            encoders: None,
            exporting: AtomicBool::new(false),
        }
    }

    /// Replace the delivery target
    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Decide codec support with `probe` instead of asking ffmpeg
    #[must_use]
    pub fn with_codec_probe(mut self, probe: Arc<dyn CodecProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Open video encoders through `encoders`
    #[must_use]
    pub fn with_encoder_factory(mut self, encoders: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = Some(encoders);
        self
    }

    /// The configuration
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Whether an export is running
    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    /// Strategy for video exports under the current config
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad background color.
    pub fn video_strategy(&self) -> MotionResult<VideoExportStrategy> {
        let mut assembler = VideoAssembler::new(self.config.video_settings()?);
        if let Some(probe) = &self.probe {
            assembler = assembler.with_probe(Arc::clone(probe));
        }
        if let Some(encoders) = &self.encoders {
            assembler = assembler.with_encoders(Arc::clone(encoders));
        }
        Ok(VideoExportStrategy::new(
            assembler,
            self.config.video_capture_quality(),
        ))
    }

    /// Strategy for GIF exports under the current config
    #[must_use]
    pub fn gif_strategy(&self) -> GifExportStrategy {
        GifExportStrategy::new(
            GifAssembler::new(self.config.gif),
            self.config.gif_fps,
            self.config.gif_capture_quality(),
        )
    }

    /// Export a video of the animation lasting `target`
    pub async fn export_video(
        &self,
        surface: &dyn RenderSurface,
        driver: &dyn AnimationDriver,
        target: Duration,
    ) -> MotionResult<ExportOutcome> {
        match self.video_strategy() {
            Ok(strategy) => self.export_with(&strategy, surface, driver, target).await,
            Err(e) => {
                error!(error = %e, "video export setup failed");
                self.observer.on_notification(&Notification::Failure {
                    kind: ExportKind::Video,
                });
                Err(e)
            }
        }
    }

    /// Export an animated GIF of the animation lasting `target`
    pub async fn export_gif(
        &self,
        surface: &dyn RenderSurface,
        driver: &dyn AnimationDriver,
        target: Duration,
    ) -> MotionResult<ExportOutcome> {
        self.export_with(&self.gif_strategy(), surface, driver, target)
            .await
    }

    /// Run one export with `strategy`
    ///
    /// # Errors
    ///
    /// `ExportInProgress` if another export is running; otherwise the first
    /// fatal error of the pipeline, after cleanup ran.
    #[instrument(
        skip_all,
        fields(kind = %strategy.kind(), target_ms = target.as_millis() as u64)
    )]
    pub async fn export_with(
        &self,
        strategy: &dyn ExportStrategy,
        surface: &dyn RenderSurface,
        driver: &dyn AnimationDriver,
        target: Duration,
    ) -> MotionResult<ExportOutcome> {
        let _gate = ExportGate::acquire(&self.exporting)?;
        let kind = strategy.kind();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.observer));

        let result = match SamplerConfig::new(target, strategy.frame_rate(), strategy.capture_quality())
        {
            Ok(sampler_config) => {
                let mut session = ExportSession::new(kind, target, sampler_config.interval());
                info!(session = %session.id(), "export started");
                let result = self
                    .run(strategy, sampler_config, surface, driver, &mut session, &mut tracker)
                    .await;
                session.dispose();
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                info!(path = %outcome.path.display(), bytes = outcome.bytes, "export finished");
                self.observer.on_notification(&Notification::Success {
                    kind,
                    path: outcome.path.clone(),
                });
            }
            Err(e) => {
                error!(error = %e, "export failed");
                self.observer.on_notification(&Notification::Failure { kind });
            }
        }

        if let Err(e) = driver.reset().await {
            warn!(error = %e, "animation reset failed");
        }
        tracker.reset();
        result
    }

    async fn run(
        &self,
        strategy: &dyn ExportStrategy,
        sampler_config: SamplerConfig,
        surface: &dyn RenderSurface,
        driver: &dyn AnimationDriver,
        session: &mut ExportSession,
        tracker: &mut ProgressTracker,
    ) -> MotionResult<ExportOutcome> {
        let target = session.target();
        let quality = sampler_config.quality;
        let sampler = FrameSampler::new(sampler_config);
        let stop = StopSignal::new();

        session.phase = ExportPhase::Capturing;
        tracker.set(ExportPhase::Capturing, 0);

        let started = Instant::now();
        let deadline = started + target;
        let animation = async {
            let result = driver.start().await;
            if result.is_ok() {
                tokio::time::sleep_until(deadline).await;
            }
            stop.raise();
            result
        };
        let mut on_capture = |p: f64| {
            tracker.set(ExportPhase::Capturing, (p * 59.0).floor() as u8);
        };
        let capture = sampler.run(surface, &stop, &mut session.frames, &mut on_capture);
        let (animated, sampling) = tokio::join!(animation, capture);
        animated?;
        debug!(
            frames = session.frames.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "capture complete"
        );

        session.phase = ExportPhase::Finalizing;
        tracker.set(ExportPhase::Finalizing, 65);
        if let Err(e) = capture_once(surface, &quality, started, &mut session.frames).await {
            warn!(error = %e, "finalizing capture failed");
        }
        if session.frames.is_empty() {
            return Err(MotionError::EmptySequence);
        }

        session.phase = ExportPhase::Rendering;
        tracker.set(ExportPhase::Rendering, 70);
        let frames = session.frames.take_frames();
        let media = strategy
            .assemble(frames, target, session.interval(), &mut |p: f64| {
                tracker.set(ExportPhase::Rendering, 70 + (p * 29.0).floor() as u8);
            })
            .await?;

        let path = self.delivery.deliver(&media).await?;
        session.phase = ExportPhase::Done;
        tracker.set(ExportPhase::Done, 100);

        Ok(ExportOutcome {
            session_id: session.id(),
            kind: session.kind(),
            path,
            mime: media.mime,
            bytes: media.len(),
            dimensions: (media.width, media.height),
            frame_count: media.frame_count,
            sampling,
        })
    }
}

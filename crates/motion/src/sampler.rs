//! Frame Sampler: paint-synchronised capture over a wall-clock budget.
//!
//! The loop wakes on every host paint and captures whenever the next slot
//! is due. The due time advances by a whole interval per slot, never to
//! "now", so capture latency does not push later slots back. Real elapsed
//! time decides when sampling ends: the loop only exits once the stop signal
//! is raised, and then takes one trailing capture so the final visual state
//! is always represented.

use crate::frame::FrameSequence;
use crate::profile::CaptureQuality;
use crate::result::{MotionError, MotionResult};
use crate::surface::RenderSurface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Cadence settings for one capture run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Total time to cover
    pub budget: Duration,
    /// Capture rate
    pub fps: u32,
    /// Rasterization quality
    pub quality: CaptureQuality,
}

impl SamplerConfig {
    /// Create a config
    ///
    /// # Errors
    ///
    /// Returns error for a zero budget or zero frame rate
    pub fn new(budget: Duration, fps: u32, quality: CaptureQuality) -> MotionResult<Self> {
        if budget.is_zero() {
            return Err(MotionError::config("export duration must be non-zero"));
        }
        if fps == 0 {
            return Err(MotionError::config("frame rate must be non-zero"));
        }
        Ok(Self {
            budget,
            fps,
            quality,
        })
    }

    /// Number of cadence slots: `ceil(budget_s * fps)`
    #[must_use]
    pub fn target_frames(&self) -> u32 {
        let nanos = self.budget.as_nanos() * u128::from(self.fps);
        let frames = nanos.div_ceil(1_000_000_000);
        frames.clamp(1, u128::from(u32::MAX)) as u32
    }

    /// Spacing between cadence slots
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.budget / self.target_frames()
    }
}

/// Cross-task flag that ends a capture run
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a lowered signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the sampler to stop after its trailing capture
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether stop was requested
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// What a capture run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Frames kept from cadence slots
    pub cadence_frames: usize,
    /// Slots whose capture failed or was rejected
    pub dropped: usize,
    /// Whether the post-stop capture was kept
    pub trailing_captured: bool,
}

/// Paint-synchronised frame sampler
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    /// Create a sampler
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// The cadence settings
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `surface` into `frames` until `stop` is raised.
    ///
    /// `on_progress` receives the fraction of cadence slots consumed.
    pub async fn run<S>(
        &self,
        surface: &S,
        stop: &StopSignal,
        frames: &mut FrameSequence,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> SamplerStats
    where
        S: RenderSurface + ?Sized,
    {
        let slots = self.config.target_frames();
        let interval = self.config.interval();
        let started = Instant::now();
        let mut next_due = started;
        let mut used = 0u32;
        let mut stats = SamplerStats::default();

        debug!(
            slots,
            interval_ms = interval.as_secs_f64() * 1000.0,
            "sampling started"
        );

        while !stop.is_raised() {
            if let Err(e) = surface.next_paint().await {
                debug!(error = %e, "paint wait failed; falling back to timer");
                tokio::time::sleep(interval).await;
            }
            if stop.is_raised() {
                break;
            }
            if used < slots && Instant::now() >= next_due {
                if self.capture_into(surface, started, frames).await {
                    stats.cadence_frames += 1;
                } else {
                    stats.dropped += 1;
                }
                used += 1;
                next_due += interval;
                on_progress(f64::from(used) / f64::from(slots));
            }
        }

        stats.trailing_captured = self.capture_into(surface, started, frames).await;
        debug!(
            cadence = stats.cadence_frames,
            dropped = stats.dropped,
            trailing = stats.trailing_captured,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sampling stopped"
        );
        stats
    }

    /// One capture, stamped relative to `started`. Failures are dropped.
    pub async fn capture_into<S>(
        &self,
        surface: &S,
        started: Instant,
        frames: &mut FrameSequence,
    ) -> bool
    where
        S: RenderSurface + ?Sized,
    {
        match capture_once(surface, &self.config.quality, started, frames).await {
            Ok(()) => true,
            Err(e) if e.is_frame_local() => {
                trace!(error = %e, "frame dropped");
                false
            }
            Err(e) => {
                warn!(error = %e, "frame dropped");
                false
            }
        }
    }
}

/// Rasterize once with the quality's timeout and append the result.
pub async fn capture_once<S>(
    surface: &S,
    quality: &CaptureQuality,
    started: Instant,
    frames: &mut FrameSequence,
) -> MotionResult<()>
where
    S: RenderSurface + ?Sized,
{
    let mut frame = tokio::time::timeout(quality.timeout, surface.rasterize(quality))
        .await
        .map_err(|_| {
            MotionError::capture(format!(
                "capture timed out after {}ms",
                quality.timeout.as_millis()
            ))
        })??;
    frame.captured_at = started.elapsed();
    frames.push(frame)
}

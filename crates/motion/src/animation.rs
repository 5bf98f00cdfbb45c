//! Typewriter animation: timing configuration and the driver seam.
//!
//! The export pipeline only needs two things from the animation: a way to
//! start it from scratch and be told when it is over, and a way to snap it
//! back to the fully typed state. [`AnimationDriver`] is that seam.
//! [`Typewriter`] is the in-process implementation; the browser host drives
//! the same timing inside the preview page.

use crate::result::MotionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Starts and resets a typewriter effect
#[async_trait]
pub trait AnimationDriver: Send + Sync {
    /// Run the whole effect from an empty editor, including breakpoint
    /// pauses and the end hold. Must not resolve before all of that elapsed.
    async fn start(&self) -> MotionResult<()>;

    /// Show the fully typed code without animating
    async fn reset(&self) -> MotionResult<()>;
}

/// Pacing of the typewriter effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Delay between two character reveals
    #[serde(with = "millis")]
    pub char_delay: Duration,
    /// Zero-based line indices after which typing pauses
    pub breakpoints: BTreeSet<usize>,
    /// Length of each breakpoint pause
    #[serde(with = "millis")]
    pub pause: Duration,
    /// Time the finished code stays on screen before `start` resolves
    #[serde(with = "millis")]
    pub hold: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            char_delay: Duration::from_millis(40),
            breakpoints: BTreeSet::new(),
            pause: Duration::from_millis(800),
            hold: Self::DEFAULT_HOLD,
        }
    }
}

impl TypingConfig {
    /// End-of-animation hold
    pub const DEFAULT_HOLD: Duration = Duration::from_millis(500);

    /// Floor for the per-character delay
    pub const MIN_CHAR_DELAY: Duration = Duration::from_millis(10);

    /// Fit the effect for `code` into `target`.
    ///
    /// The time left after the hold and the breakpoint pauses is spread over
    /// the characters. When pauses eat the whole budget the delay is clamped
    /// to `min_delay` instead of going negative, and the animation simply
    /// runs longer than the target.
    #[must_use]
    pub fn for_target_duration(
        code: &str,
        target: Duration,
        breakpoints: BTreeSet<usize>,
        pause: Duration,
        min_delay: Duration,
    ) -> Self {
        let mut config = Self {
            char_delay: min_delay,
            breakpoints,
            pause,
            hold: Self::DEFAULT_HOLD,
        };
        let chars = code.chars().count() as u32;
        let pauses = pause * config.effective_breakpoints(code) as u32;
        let typing_time = target.saturating_sub(config.hold).saturating_sub(pauses);
        if chars > 0 {
            let per_char = Duration::from_millis((typing_time / chars).as_millis() as u64);
            config.char_delay = per_char.max(min_delay);
        }
        debug!(
            chars,
            char_delay_ms = config.char_delay.as_millis() as u64,
            "typing delay fitted to target duration"
        );
        config
    }

    /// Set the end hold
    #[must_use]
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Breakpoints that name a line that exists in `code`
    #[must_use]
    pub fn effective_breakpoints(&self, code: &str) -> usize {
        let lines = code.split('\n').count();
        self.breakpoints.range(..lines).count()
    }

    /// Visible character counts after which the effect pauses
    #[must_use]
    pub fn pause_points(&self, code: &str) -> BTreeSet<usize> {
        let mut points = BTreeSet::new();
        let mut visible = 0usize;
        for (line, text) in code.split('\n').enumerate() {
            visible += text.chars().count();
            if self.breakpoints.contains(&line) {
                points.insert(visible);
            }
            // the newline itself
            visible += 1;
        }
        points
    }

    /// How long `start` takes for `code`
    #[must_use]
    pub fn estimated_run_time(&self, code: &str) -> Duration {
        let chars = code.chars().count() as u32;
        self.char_delay * chars + self.pause * self.effective_breakpoints(code) as u32 + self.hold
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Observable state of a [`Typewriter`]
#[derive(Debug, Default)]
pub struct TypewriterState {
    visible: AtomicUsize,
    animating: AtomicBool,
}

impl TypewriterState {
    /// Number of characters currently shown
    #[must_use]
    pub fn visible_chars(&self) -> usize {
        self.visible.load(Ordering::Acquire)
    }

    /// Whether the effect is running
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animating.load(Ordering::Acquire)
    }
}

/// In-process typewriter paced by the tokio clock
#[derive(Debug, Clone)]
pub struct Typewriter {
    code: Arc<str>,
    config: TypingConfig,
    state: Arc<TypewriterState>,
}

impl Typewriter {
    /// Create a typewriter showing the fully typed `code`
    #[must_use]
    pub fn new(code: impl Into<Arc<str>>, config: TypingConfig) -> Self {
        let code = code.into();
        let state = Arc::new(TypewriterState::default());
        state
            .visible
            .store(code.chars().count(), Ordering::Release);
        Self {
            code,
            config,
            state,
        }
    }

    /// Shared state, for surfaces that render the typed text
    #[must_use]
    pub fn state(&self) -> Arc<TypewriterState> {
        Arc::clone(&self.state)
    }

    /// The typing configuration
    #[must_use]
    pub fn config(&self) -> &TypingConfig {
        &self.config
    }

    /// The code currently on screen
    #[must_use]
    pub fn visible_text(&self) -> String {
        self.code
            .chars()
            .take(self.state.visible_chars())
            .collect()
    }
}

#[async_trait]
impl AnimationDriver for Typewriter {
    async fn start(&self) -> MotionResult<()> {
        let total = self.code.chars().count();
        let pauses = self.config.pause_points(&self.code);

        self.state.visible.store(0, Ordering::Release);
        self.state.animating.store(true, Ordering::Release);

        for shown in 0..=total {
            if shown > 0 {
                tokio::time::sleep(self.config.char_delay).await;
                self.state.visible.store(shown, Ordering::Release);
            }
            if pauses.contains(&shown) {
                tokio::time::sleep(self.config.pause).await;
            }
        }

        self.state.animating.store(false, Ordering::Release);
        tokio::time::sleep(self.config.hold).await;
        Ok(())
    }

    async fn reset(&self) -> MotionResult<()> {
        self.state
            .visible
            .store(self.code.chars().count(), Ordering::Release);
        self.state.animating.store(false, Ordering::Release);
        Ok(())
    }
}

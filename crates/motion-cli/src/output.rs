//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use snippet_motion::{ExportObserver, ExportPhase, ExportProgress, Notification};

/// Progress bar and status lines on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a 0-100 progress bar
    pub fn start_progress(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Current bar position, if a bar is shown
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.progress_bar.as_ref().map(ProgressBar::position)
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

/// Bar message for a phase
#[must_use]
pub const fn phase_label(phase: ExportPhase) -> &'static str {
    match phase {
        ExportPhase::Idle => "",
        ExportPhase::Capturing => "Capturing frames",
        ExportPhase::Finalizing => "Final frame",
        ExportPhase::Rendering => "Encoding",
        ExportPhase::Done => "Done",
    }
}

impl ExportObserver for ProgressReporter {
    fn on_progress(&self, progress: ExportProgress) {
        let Some(ref pb) = self.progress_bar else {
            return;
        };
        match progress.phase {
            // the reset after cleanup
            ExportPhase::Idle => {}
            ExportPhase::Done => {
                pb.set_position(u64::from(progress.percent));
                pb.finish_with_message(phase_label(ExportPhase::Done));
            }
            phase => {
                pb.set_position(u64::from(progress.percent));
                pb.set_message(phase_label(phase));
            }
        }
    }

    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::Success { path, .. } => {
                self.success(&format!("{} {}", notification.message(), path.display()));
            }
            Notification::Failure { .. } => {
                if let Some(ref pb) = self.progress_bar {
                    pb.abandon();
                }
                self.failure(notification.message());
            }
        }
    }
}

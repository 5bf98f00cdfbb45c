//! Result and error types for Snippet Motion.

use thiserror::Error;

/// Result type for Snippet Motion operations
pub type MotionResult<T> = Result<T, MotionError>;

/// Errors that can occur while capturing or encoding an export
#[derive(Debug, Error)]
pub enum MotionError {
    /// A single rasterization failed (recovered by the sampler)
    #[error("Frame capture failed: {message}")]
    CaptureFailure {
        /// Error message
        message: String,
    },

    /// A frame did not match the resolution of the sequence it was added to
    #[error("Frame size mismatch: expected {expected:?}, got {actual:?}")]
    FrameSizeMismatch {
        /// Dimensions of the first frame in the sequence
        expected: (u32, u32),
        /// Dimensions of the rejected frame
        actual: (u32, u32),
    },

    /// An assembler was handed zero usable frames
    #[error("No frames were captured")]
    EmptySequence,

    /// No codec could be initialized or the encoder reported an error
    #[error("Encoder initialization failed: {message}")]
    EncoderInit {
        /// Error message
        message: String,
    },

    /// The encoder finished without producing any bytes
    #[error("Encoded {format} output is empty")]
    EncodedOutputEmpty {
        /// Output format label
        format: String,
    },

    /// Writing the finished file to its destination failed
    #[error("Download failed: {message}")]
    DownloadTrigger {
        /// Error message
        message: String,
    },

    /// Another export is already running on this exporter
    #[error("An export is already in progress")]
    ExportInProgress,

    /// The animation driver failed to run the typewriter effect
    #[error("Animation failed: {message}")]
    AnimationFailed {
        /// Error message
        message: String,
    },

    /// Browser launch or connection error
    #[error("Browser error: {message}")]
    Browser {
        /// Error message
        message: String,
    },

    /// Page setup error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Image processing error (decoding, resizing, JPEG encoding)
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl MotionError {
    /// Create a capture failure
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailure {
            message: message.into(),
        }
    }

    /// Create an encoder initialization failure
    #[must_use]
    pub fn encoder(message: impl Into<String>) -> Self {
        Self::EncoderInit {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an image processing error
    #[must_use]
    pub fn image(message: impl Into<String>) -> Self {
        Self::ImageProcessing {
            message: message.into(),
        }
    }

    /// Whether the sampler may drop this error and keep going
    #[must_use]
    pub const fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::CaptureFailure { .. } | Self::FrameSizeMismatch { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_failure_message() {
        let err = MotionError::capture("node detached");
        assert!(err.to_string().contains("Frame capture failed"));
        assert!(err.to_string().contains("node detached"));
    }

    #[test]
    fn test_frame_local_errors() {
        assert!(MotionError::capture("x").is_frame_local());
        assert!(MotionError::FrameSizeMismatch {
            expected: (2, 2),
            actual: (3, 2)
        }
        .is_frame_local());
        assert!(!MotionError::EmptySequence.is_frame_local());
        assert!(!MotionError::encoder("x").is_frame_local());
    }

    #[test]
    fn test_encoded_output_empty_names_format() {
        let err = MotionError::EncodedOutputEmpty {
            format: "gif".to_string(),
        };
        assert_eq!(err.to_string(), "Encoded gif output is empty");
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MotionError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}

//! Resolution profiles and capture quality.
//!
//! Profiles are lookup data: each names an output size class, the
//! supersampling factor used when rasterizing the preview, and the bitrate
//! ceiling handed to the video encoder. None of these numbers carry
//! semantics beyond fidelity.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Output size class for video exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionProfile {
    /// 1280 px long edge
    #[serde(rename = "720p")]
    Hd720,
    /// 1920 px long edge
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    /// 3840 px long edge
    #[serde(rename = "4k")]
    Uhd4k,
}

impl ResolutionProfile {
    /// All profiles, smallest first
    pub const ALL: [Self; 3] = [Self::Hd720, Self::Hd1080, Self::Uhd4k];

    /// Long edge of the output frame in pixels
    #[must_use]
    pub const fn long_edge(self) -> u32 {
        match self {
            Self::Hd720 => 1280,
            Self::Hd1080 => 1920,
            Self::Uhd4k => 3840,
        }
    }

    /// Rasterization supersampling factor
    #[must_use]
    pub const fn supersample(self) -> f64 {
        match self {
            Self::Hd720 => 1.5,
            Self::Hd1080 => 2.0,
            Self::Uhd4k => 3.0,
        }
    }

    /// Encoder bitrate ceiling in bits per second
    #[must_use]
    pub const fn bitrate(self) -> u32 {
        match self {
            Self::Hd720 => 8_000_000,
            Self::Hd1080 => 12_000_000,
            Self::Uhd4k => 35_000_000,
        }
    }

    /// Resampling used when fitting captures onto the output canvas
    #[must_use]
    pub const fn smoothing(self) -> Smoothing {
        match self {
            Self::Hd720 => Smoothing::Triangle,
            Self::Hd1080 | Self::Uhd4k => Smoothing::Lanczos3,
        }
    }

    /// Output frame size for an aspect ratio. Both sides are even, as
    /// yuv420p encoders require.
    #[must_use]
    pub const fn dimensions(self, aspect: AspectRatio) -> (u32, u32) {
        let long = self.long_edge();
        let short = even(long * 9 / 16);
        match aspect {
            AspectRatio::Landscape => (long, short),
            AspectRatio::Portrait => (short, long),
            AspectRatio::Square => (short, short),
        }
    }

    /// Capture settings for video exports at this profile
    #[must_use]
    pub const fn capture_quality(self) -> CaptureQuality {
        CaptureQuality {
            scale: self.supersample(),
            timeout: CaptureQuality::DEFAULT_TIMEOUT,
        }
    }
}

const fn even(v: u32) -> u32 {
    v & !1
}

impl fmt::Display for ResolutionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
            Self::Uhd4k => "4k",
        };
        f.write_str(label)
    }
}

impl FromStr for ResolutionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "720p" | "720" | "hd" => Ok(Self::Hd720),
            "1080p" | "1080" | "fullhd" => Ok(Self::Hd1080),
            "4k" | "2160p" | "uhd" => Ok(Self::Uhd4k),
            other => Err(format!("unknown resolution profile '{other}'")),
        }
    }
}

/// Shape of the output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    /// 16:9 window mockup
    #[default]
    Landscape,
    /// 9:16 phone mockup
    Portrait,
    /// 1:1
    Square,
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" | "16:9" | "window" => Ok(Self::Landscape),
            "portrait" | "9:16" | "phone" => Ok(Self::Portrait),
            "square" | "1:1" => Ok(Self::Square),
            other => Err(format!("unknown aspect ratio '{other}'")),
        }
    }
}

/// Resize filter choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    /// No smoothing
    Nearest,
    /// Bilinear
    Triangle,
    /// Lanczos with window 3
    Lanczos3,
}

impl Smoothing {
    /// Matching `image` filter
    #[must_use]
    pub const fn filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Rasterization knobs. They change fidelity, never capture semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureQuality {
    /// Device pixels per CSS pixel
    pub scale: f64,
    /// Upper bound on a single capture round trip
    pub timeout: Duration,
}

impl CaptureQuality {
    /// Default capture timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// GIF exports capture at a fixed scale and keep the captured size
    pub const GIF: Self = Self {
        scale: 1.5,
        timeout: Self::DEFAULT_TIMEOUT,
    };
}

impl Default for CaptureQuality {
    fn default() -> Self {
        ResolutionProfile::default().capture_quality()
    }
}

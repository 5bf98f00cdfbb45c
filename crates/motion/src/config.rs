//! Export configuration.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! profile: 4k
//! aspect: portrait
//! background: "#0d1117"
//! codecs: [vp9-webm, mjpeg-mp4]
//! ```

use crate::animation::millis;
use crate::gif_assembler::GifSettings;
use crate::profile::{AspectRatio, CaptureQuality, ResolutionProfile};
use crate::result::{MotionError, MotionResult};
use crate::video::{VideoCodec, VideoSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Named export lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPreset {
    /// 1.5 seconds
    Short,
    /// 4 seconds
    #[default]
    Medium,
    /// 8 seconds
    Long,
}

impl DurationPreset {
    /// Target duration of the preset
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_millis(1500),
            Self::Medium => Duration::from_millis(4000),
            Self::Long => Duration::from_millis(8000),
        }
    }
}

impl fmt::Display for DurationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        })
    }
}

impl FromStr for DurationPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown duration '{other}'")),
        }
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
///
/// # Errors
///
/// `InvalidConfig` for anything else.
pub fn parse_hex_color(value: &str) -> MotionResult<[u8; 4]> {
    let invalid = || MotionError::config(format!("invalid color '{value}'"));
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                rgba[i] = v * 17;
            }
            Ok(rgba)
        }
        6 | 8 => {
            let mut rgba = [255u8; 4];
            for (i, slot) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
                *slot = channel(&hex[i * 2..i * 2 + 2])?;
            }
            Ok(rgba)
        }
        _ => Err(invalid()),
    }
}

/// Settings shared by all exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Video capture and output rate
    pub video_fps: u32,
    /// GIF capture rate
    pub gif_fps: u32,
    /// Video resolution profile
    pub profile: ResolutionProfile,
    /// Video frame shape
    pub aspect: AspectRatio,
    /// Letterbox fill, as a hex color
    pub background: String,
    /// Video codec preference order
    pub codecs: Vec<VideoCodec>,
    /// Where finished exports are written
    pub output_dir: PathBuf,
    /// Pause after the last video frame before finalizing
    #[serde(with = "millis")]
    pub trailing_pause: Duration,
    /// Wait between opening the encoder and the first frame
    #[serde(with = "millis")]
    pub startup_delay: Duration,
    /// Upper bound on a single capture
    #[serde(with = "millis")]
    pub capture_timeout: Duration,
    /// Floor for the per-character typing delay
    #[serde(with = "millis")]
    pub min_char_delay: Duration,
    /// Length of each breakpoint pause
    #[serde(with = "millis")]
    pub pause: Duration,
    /// GIF encoder settings
    pub gif: GifSettings,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            video_fps: 30,
            gif_fps: 20,
            profile: ResolutionProfile::default(),
            aspect: AspectRatio::default(),
            background: "#0d1117".to_string(),
            codecs: VideoCodec::PREFERENCE.to_vec(),
            output_dir: PathBuf::from("."),
            trailing_pause: Duration::from_millis(300),
            startup_delay: Duration::from_millis(30),
            capture_timeout: CaptureQuality::DEFAULT_TIMEOUT,
            min_char_delay: Duration::from_millis(10),
            pause: Duration::from_millis(800),
            gif: GifSettings::default(),
        }
    }
}

impl ExportConfig {
    /// Parse and validate YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or a value is out of range.
    pub fn from_yaml(yaml: &str) -> MotionResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or does not validate.
    pub fn from_yaml_file(path: &Path) -> MotionResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> MotionResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> MotionResult<()> {
        if !(1..=120).contains(&self.video_fps) {
            return Err(MotionError::config(format!(
                "video_fps must be 1-120, got {}",
                self.video_fps
            )));
        }
        // GIF delays are whole centiseconds
        if !(1..=50).contains(&self.gif_fps) {
            return Err(MotionError::config(format!(
                "gif_fps must be 1-50, got {}",
                self.gif_fps
            )));
        }
        if self.codecs.is_empty() {
            return Err(MotionError::config("codecs must name at least one codec"));
        }
        if self.min_char_delay.is_zero() {
            return Err(MotionError::config("min_char_delay must be non-zero"));
        }
        if self.capture_timeout.is_zero() {
            return Err(MotionError::config("capture_timeout must be non-zero"));
        }
        if !(1..=30).contains(&self.gif.speed) {
            return Err(MotionError::config(format!(
                "gif.speed must be 1-30, got {}",
                self.gif.speed
            )));
        }
        parse_hex_color(&self.background)?;
        Ok(())
    }

    /// Set the video frame rate
    #[must_use]
    pub fn with_video_fps(mut self, fps: u32) -> Self {
        self.video_fps = fps;
        self
    }

    /// Set the GIF frame rate
    #[must_use]
    pub fn with_gif_fps(mut self, fps: u32) -> Self {
        self.gif_fps = fps;
        self
    }

    /// Set the resolution profile
    #[must_use]
    pub fn with_profile(mut self, profile: ResolutionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the frame shape
    #[must_use]
    pub fn with_aspect(mut self, aspect: AspectRatio) -> Self {
        self.aspect = aspect;
        self
    }

    /// Set the letterbox color
    #[must_use]
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background = color.into();
        self
    }

    /// Set the codec preference order
    #[must_use]
    pub fn with_codecs(mut self, codecs: Vec<VideoCodec>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the trailing pause
    #[must_use]
    pub fn with_trailing_pause(mut self, pause: Duration) -> Self {
        self.trailing_pause = pause;
        self
    }

    /// Set the breakpoint pause length
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Capture quality for video exports
    #[must_use]
    pub fn video_capture_quality(&self) -> CaptureQuality {
        CaptureQuality {
            timeout: self.capture_timeout,
            ..self.profile.capture_quality()
        }
    }

    /// Capture quality for GIF exports
    #[must_use]
    pub fn gif_capture_quality(&self) -> CaptureQuality {
        CaptureQuality {
            timeout: self.capture_timeout,
            ..CaptureQuality::GIF
        }
    }

    /// Video assembler settings
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an unparseable background color.
    pub fn video_settings(&self) -> MotionResult<VideoSettings> {
        Ok(VideoSettings {
            fps: self.video_fps,
            profile: self.profile,
            aspect: self.aspect,
            background: parse_hex_color(&self.background)?,
            codecs: self.codecs.clone(),
            trailing_pause: self.trailing_pause,
            startup_delay: self.startup_delay,
            ..VideoSettings::default()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod color_tests {
        use super::*;

        #[test]
        fn test_parse_long_and_short_forms() {
            assert_eq!(parse_hex_color("#0d1117").unwrap(), [13, 17, 23, 255]);
            assert_eq!(parse_hex_color("#fff").unwrap(), [255, 255, 255, 255]);
            assert_eq!(parse_hex_color("#00000080").unwrap(), [0, 0, 0, 128]);
        }

        #[test]
        fn test_reject_malformed_colors() {
            for bad in ["0d1117", "#0d11", "#zzzzzz", "#", "#ééé", "#+f+f+f"] {
                assert!(parse_hex_color(bad).is_err(), "{bad}");
            }
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults_validate() {
            let config = ExportConfig::default();
            config.validate().unwrap();
            assert_eq!(config.video_fps, 30);
            assert_eq!(config.gif_fps, 20);
            assert_eq!(config.trailing_pause, Duration::from_millis(300));
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = ExportConfig::from_yaml(
                "profile: 4k\naspect: portrait\ncodecs: [vp9-webm, mjpeg-mp4]\ntrailing_pause: 500\n",
            )
            .unwrap();
            assert_eq!(config.profile, ResolutionProfile::Uhd4k);
            assert_eq!(config.aspect, AspectRatio::Portrait);
            assert_eq!(config.codecs, vec![VideoCodec::Vp9Webm, VideoCodec::MjpegMp4]);
            assert_eq!(config.trailing_pause, Duration::from_millis(500));
            assert_eq!(config.video_fps, 30);
        }

        #[test]
        fn test_yaml_round_trip() {
            let config = ExportConfig::default()
                .with_profile(ResolutionProfile::Hd720)
                .with_background("#112233")
                .with_output_dir("/tmp/exports");
            let yaml = config.to_yaml().unwrap();
            assert_eq!(ExportConfig::from_yaml(&yaml).unwrap(), config);
        }

        #[test]
        fn test_validation_rejects_out_of_range() {
            assert!(ExportConfig::default().with_video_fps(0).validate().is_err());
            assert!(ExportConfig::default().with_gif_fps(60).validate().is_err());
            assert!(ExportConfig::default().with_codecs(Vec::new()).validate().is_err());
            assert!(ExportConfig::default()
                .with_background("navy")
                .validate()
                .is_err());
        }

        #[test]
        fn test_invalid_yaml_is_yaml_error() {
            let result = ExportConfig::from_yaml("video_fps: [not a number");
            assert!(matches!(result, Err(MotionError::Yaml(_))));
        }

        #[test]
        fn test_from_yaml_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("motion.yaml");
            std::fs::write(&path, "gif_fps: 15\n").unwrap();
            assert_eq!(ExportConfig::from_yaml_file(&path).unwrap().gif_fps, 15);
        }

        #[test]
        fn test_capture_quality_per_format() {
            let config = ExportConfig::default().with_profile(ResolutionProfile::Uhd4k);
            assert!((config.video_capture_quality().scale - 3.0).abs() < f64::EPSILON);
            assert!((config.gif_capture_quality().scale - 1.5).abs() < f64::EPSILON);
        }

        #[test]
        fn test_video_settings_carry_background() {
            let settings = ExportConfig::default()
                .with_background("#ff0000")
                .video_settings()
                .unwrap();
            assert_eq!(settings.background, [255, 0, 0, 255]);
        }

        #[test]
        fn test_duration_presets() {
            assert_eq!(DurationPreset::Short.duration(), Duration::from_millis(1500));
            assert_eq!(DurationPreset::Medium.duration(), Duration::from_millis(4000));
            assert_eq!(DurationPreset::Long.duration(), Duration::from_millis(8000));
            assert_eq!("LONG".parse::<DurationPreset>().unwrap(), DurationPreset::Long);
        }
    }
}

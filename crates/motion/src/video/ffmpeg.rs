//! Streaming encoder backed by a system `ffmpeg` process.
//!
//! Frames are written as raw RGBA to ffmpeg's stdin and stamped with the
//! wall clock on arrival (`-use_wallclock_as_timestamps`); the output is
//! resampled to a constant frame rate.

use super::{CodecProbe, Container, StreamingEncoder, VideoCodec};
use crate::result::{MotionError, MotionResult};
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

/// Codec support reported by `ffmpeg -encoders`
#[derive(Debug, Clone, Default)]
pub struct FfmpegProbe {
    encoders: HashSet<String>,
}

impl FfmpegProbe {
    /// Ask the `ffmpeg` on `PATH` which encoders it has. A missing binary
    /// yields a probe that supports only in-process codecs.
    pub async fn detect() -> Self {
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                let probe = Self::from_listing(&String::from_utf8_lossy(&out.stdout));
                debug!(encoders = probe.encoders.len(), "ffmpeg encoders detected");
                probe
            }
            Ok(out) => {
                warn!(status = %out.status, "ffmpeg -encoders failed");
                Self::default()
            }
            Err(e) => {
                debug!(error = %e, "ffmpeg not available");
                Self::default()
            }
        }
    }

    /// Parse an `ffmpeg -encoders` listing
    #[must_use]
    pub fn from_listing(listing: &str) -> Self {
        let encoders = listing
            .lines()
            .skip_while(|line| !line.trim_start().starts_with("------"))
            .skip(1)
            .filter_map(|line| {
                let mut cols = line.split_whitespace();
                let flags = cols.next()?;
                let name = cols.next()?;
                flags.starts_with('V').then(|| name.to_string())
            })
            .collect();
        Self { encoders }
    }

    /// Whether ffmpeg was found with at least one video encoder
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.encoders.is_empty()
    }
}

impl CodecProbe for FfmpegProbe {
    fn supports(&self, codec: VideoCodec) -> bool {
        codec
            .ffmpeg_encoder()
            .map_or(true, |name| self.encoders.contains(name))
    }
}

/// Command-line arguments for one encode
#[must_use]
pub fn ffmpeg_args(
    codec: VideoCodec,
    encoder: &str,
    width: u32,
    height: u32,
    fps: u32,
    bitrate: u32,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    args.push(format!("{width}x{height}"));
    args.extend(
        ["-use_wallclock_as_timestamps", "1", "-i", "pipe:0", "-an", "-c:v", encoder]
            .map(String::from),
    );
    args.extend(["-b:v".to_string(), bitrate.to_string()]);
    args.extend(["-maxrate".to_string(), bitrate.to_string()]);
    args.extend(["-bufsize".to_string(), (bitrate * 2).to_string()]);
    match codec {
        VideoCodec::H264Mp4 => args.extend(["-preset", "veryfast"].map(String::from)),
        VideoCodec::Vp9Webm | VideoCodec::Vp8Webm => {
            args.extend(["-deadline", "realtime", "-cpu-used", "8"].map(String::from));
        }
        VideoCodec::MjpegMp4 => {}
    }
    args.extend(["-r".to_string(), fps.to_string()]);
    args.extend(["-pix_fmt", "yuv420p"].map(String::from));
    if codec.container() == Container::Mp4 {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }
    args.push(output.display().to_string());
    args
}

/// Running ffmpeg encode
#[derive(Debug)]
pub struct FfmpegStream {
    child: Child,
    stdin: Option<ChildStdin>,
    output: NamedTempFile,
    width: u32,
    height: u32,
}

impl FfmpegStream {
    /// Spawn ffmpeg for `codec` writing to a temporary file
    ///
    /// # Errors
    ///
    /// `EncoderInit` for odd dimensions or if the process cannot be started.
    pub async fn spawn(
        codec: VideoCodec,
        encoder: &str,
        width: u32,
        height: u32,
        fps: u32,
        bitrate: u32,
    ) -> MotionResult<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(MotionError::encoder(format!(
                "{width}x{height} is not a valid yuv420p size; dimensions must be even"
            )));
        }

        let output = tempfile::Builder::new()
            .prefix("snippet-motion-")
            .suffix(&format!(".{}", codec.container().extension()))
            .tempfile()?;
        let args = ffmpeg_args(codec, encoder, width, height, fps, bitrate, output.path());
        debug!(%codec, encoder, "spawning ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MotionError::encoder(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MotionError::encoder("failed to open ffmpeg stdin"))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            output,
            width,
            height,
        })
    }
}

impl FfmpegStream {
    async fn write_canvas(&mut self, canvas: &RgbaImage) -> MotionResult<()> {
        if canvas.dimensions() != (self.width, self.height) {
            return Err(MotionError::FrameSizeMismatch {
                expected: (self.width, self.height),
                actual: canvas.dimensions(),
            });
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MotionError::encoder("ffmpeg stream already finished"));
        };
        stdin
            .write_all(canvas.as_raw())
            .await
            .map_err(|e| MotionError::encoder(format!("failed to write frame to ffmpeg: {e}")))
    }
}

#[async_trait]
impl StreamingEncoder for FfmpegStream {
    async fn push_frame(&mut self, canvas: &RgbaImage) -> MotionResult<()> {
        self.write_canvas(canvas).await
    }

    // ffmpeg stamps by arrival; the last frame is sent again to reach the end mark
    async fn mark_end(&mut self, last: &RgbaImage) -> MotionResult<()> {
        self.write_canvas(last).await
    }

    async fn finish(mut self: Box<Self>) -> MotionResult<Vec<u8>> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await.ok();
        }
        let Self { child, output, .. } = *self;
        let result = child
            .wait_with_output()
            .await
            .map_err(|e| MotionError::encoder(format!("failed to wait for ffmpeg: {e}")))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MotionError::encoder(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(tokio::fs::read(output.path()).await?)
    }
}

//! Motion JPEG in an MP4 container, encoded in-process.
//!
//! Always available, so it sits last in the codec preference list. Each
//! sample's duration in `stts` is the gap until the next frame arrived, and
//! the last sample runs until the end mark.

use super::StreamingEncoder;
use crate::result::{MotionError, MotionResult};
use async_trait::async_trait;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage, RgbaImage};
use std::time::Duration;
use tokio::time::Instant;

/// Media timescale in ticks per second
pub const TIMESCALE: u32 = 90_000;

const IDENTITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// Arrival-timestamped MJPEG stream
#[derive(Debug)]
pub struct MjpegMp4Stream {
    width: u32,
    height: u32,
    fps: u32,
    quality: u8,
    samples: Vec<Vec<u8>>,
    arrivals: Vec<Instant>,
    end: Option<Instant>,
}

impl MjpegMp4Stream {
    /// Create an empty stream for `width` x `height` frames
    #[must_use]
    pub fn new(width: u32, height: u32, fps: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            fps: fps.max(1),
            quality: quality.clamp(1, 100),
            samples: Vec::new(),
            arrivals: Vec::new(),
            end: None,
        }
    }

    /// Number of frames received
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn encode_jpeg(&self, canvas: &RgbaImage) -> MotionResult<Vec<u8>> {
        if canvas.dimensions() != (self.width, self.height) {
            return Err(MotionError::FrameSizeMismatch {
                expected: (self.width, self.height),
                actual: canvas.dimensions(),
            });
        }
        let rgb: RgbImage = canvas.convert();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode(rgb.as_raw(), self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| MotionError::encoder(format!("JPEG encoding failed: {e}")))?;
        Ok(buffer)
    }

    /// Per-sample durations in [`TIMESCALE`] ticks.
    ///
    /// Offsets are rounded from the first arrival and then differenced, so
    /// the sum equals the rounded span from first frame to end mark.
    #[must_use]
    pub fn sample_durations(&self) -> Vec<u32> {
        let Some(&first) = self.arrivals.first() else {
            return Vec::new();
        };
        let mut offsets: Vec<u64> = self
            .arrivals
            .iter()
            .map(|at| ticks(at.saturating_duration_since(first)))
            .collect();
        let last = offsets.last().copied().unwrap_or(0);
        let end = self.end.map_or_else(
            || last + u64::from(TIMESCALE / self.fps),
            |e| ticks(e.saturating_duration_since(first)),
        );
        offsets.push(end.max(last + 1));
        offsets
            .windows(2)
            .map(|w| (w[1].saturating_sub(w[0])).clamp(1, u64::from(u32::MAX)) as u32)
            .collect()
    }

    fn into_mp4(self) -> Vec<u8> {
        let durations = self.sample_durations();
        let total: u64 = durations.iter().map(|d| u64::from(*d)).sum();
        let total = total.min(u64::from(u32::MAX)) as u32;

        let ftyp = atom(b"ftyp", &{
            let mut body = Vec::with_capacity(20);
            body.extend_from_slice(b"isom");
            body.extend_from_slice(&0x200u32.to_be_bytes());
            for brand in [b"isom", b"iso2", b"mp41"] {
                body.extend_from_slice(brand);
            }
            body
        });
        let payload: usize = self.samples.iter().map(Vec::len).sum();
        let chunk_offset = (ftyp.len() + 8) as u32;

        let track = Track {
            width: self.width,
            height: self.height,
            duration: total,
            durations: &durations,
            sizes: self.samples.iter().map(|s| s.len() as u32).collect(),
            chunk_offset,
        };
        let moov = track.moov();

        let mut out = Vec::with_capacity(ftyp.len() + 8 + payload + moov.len());
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&((8 + payload) as u32).to_be_bytes());
        out.extend_from_slice(b"mdat");
        for sample in &self.samples {
            out.extend_from_slice(sample);
        }
        out.extend_from_slice(&moov);
        out
    }
}

#[async_trait]
impl StreamingEncoder for MjpegMp4Stream {
    async fn push_frame(&mut self, canvas: &RgbaImage) -> MotionResult<()> {
        let arrived = Instant::now();
        let jpeg = self.encode_jpeg(canvas)?;
        self.samples.push(jpeg);
        self.arrivals.push(arrived);
        Ok(())
    }

    async fn mark_end(&mut self, _last: &RgbaImage) -> MotionResult<()> {
        self.end = Some(Instant::now());
        Ok(())
    }

    async fn finish(self: Box<Self>) -> MotionResult<Vec<u8>> {
        if self.samples.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.into_mp4())
    }
}

fn ticks(d: Duration) -> u64 {
    let scaled = d.as_nanos() * u128::from(TIMESCALE);
    ((scaled + 500_000_000) / 1_000_000_000) as u64
}

/// Size-prefixed box
fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

/// Box with a zero version/flags word followed by `fields`
fn full_atom(kind: &[u8; 4], flags: u8, fields: &[&[u8]]) -> Vec<u8> {
    let mut body = vec![0, 0, 0, flags];
    for field in fields {
        body.extend_from_slice(field);
    }
    atom(kind, &body)
}

fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    atom(kind, &children.concat())
}

fn matrix() -> Vec<u8> {
    IDENTITY_MATRIX.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Run-length `(count, delta)` pairs for `stts`
fn stts_runs(durations: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &d in durations {
        match runs.last_mut() {
            Some((count, delta)) if *delta == d => *count += 1,
            _ => runs.push((1, d)),
        }
    }
    runs
}

/// The single video track's sample tables
struct Track<'a> {
    width: u32,
    height: u32,
    duration: u32,
    durations: &'a [u32],
    sizes: Vec<u32>,
    chunk_offset: u32,
}

impl Track<'_> {
    fn moov(&self) -> Vec<u8> {
        let mvhd = full_atom(
            b"mvhd",
            0,
            &[
                &[0; 8],
                &TIMESCALE.to_be_bytes(),
                &self.duration.to_be_bytes(),
                &0x0001_0000u32.to_be_bytes(),
                &[0x01, 0x00],
                &[0; 10],
                &matrix(),
                &[0; 24],
                &2u32.to_be_bytes(),
            ],
        );
        container(b"moov", &[mvhd, self.trak()])
    }

    fn trak(&self) -> Vec<u8> {
        let tkhd = full_atom(
            b"tkhd",
            3,
            &[
                &[0; 8],
                &1u32.to_be_bytes(),
                &[0; 4],
                &self.duration.to_be_bytes(),
                &[0; 16],
                &matrix(),
                &(self.width << 16).to_be_bytes(),
                &(self.height << 16).to_be_bytes(),
            ],
        );
        let mdhd = full_atom(
            b"mdhd",
            0,
            &[
                &[0; 8],
                &TIMESCALE.to_be_bytes(),
                &self.duration.to_be_bytes(),
                &0x55c4u16.to_be_bytes(),
                &[0; 2],
            ],
        );
        let hdlr = full_atom(
            b"hdlr",
            0,
            &[&[0; 4], b"vide", &[0; 12], b"snippet-motion\0"],
        );
        let vmhd = full_atom(b"vmhd", 1, &[&[0; 8]]);
        let url = full_atom(b"url ", 1, &[]);
        let dref = full_atom(b"dref", 0, &[&1u32.to_be_bytes(), &url]);
        let dinf = container(b"dinf", &[dref]);
        let minf = container(b"minf", &[vmhd, dinf, self.stbl()]);
        let mdia = container(b"mdia", &[mdhd, hdlr, minf]);
        container(b"trak", &[tkhd, mdia])
    }

    fn stbl(&self) -> Vec<u8> {
        let count = self.sizes.len() as u32;

        let stsd = full_atom(b"stsd", 0, &[&1u32.to_be_bytes(), &self.sample_entry()]);

        let runs = stts_runs(self.durations);
        let mut stts_body = (runs.len() as u32).to_be_bytes().to_vec();
        for (n, delta) in &runs {
            stts_body.extend_from_slice(&n.to_be_bytes());
            stts_body.extend_from_slice(&delta.to_be_bytes());
        }
        let stts = full_atom(b"stts", 0, &[&stts_body]);

        let stsc = full_atom(
            b"stsc",
            0,
            &[
                &1u32.to_be_bytes(),
                &1u32.to_be_bytes(),
                &count.to_be_bytes(),
                &1u32.to_be_bytes(),
            ],
        );

        let sizes: Vec<u8> = self.sizes.iter().flat_map(|s| s.to_be_bytes()).collect();
        let stsz = full_atom(b"stsz", 0, &[&[0; 4], &count.to_be_bytes(), &sizes]);

        let stco = full_atom(
            b"stco",
            0,
            &[&1u32.to_be_bytes(), &self.chunk_offset.to_be_bytes()],
        );

        container(b"stbl", &[stsd, stts, stsc, stsz, stco])
    }

    fn sample_entry(&self) -> Vec<u8> {
        let name = b"Motion JPEG";
        let mut compressor = [0u8; 32];
        compressor[0] = name.len() as u8;
        compressor[1..=name.len()].copy_from_slice(name);

        let mut body = Vec::with_capacity(78);
        body.extend_from_slice(&[0; 6]);
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&[0; 16]);
        body.extend_from_slice(&(self.width.min(0xffff) as u16).to_be_bytes());
        body.extend_from_slice(&(self.height.min(0xffff) as u16).to_be_bytes());
        body.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        body.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&compressor);
        body.extend_from_slice(&24u16.to_be_bytes());
        body.extend_from_slice(&(-1i16).to_be_bytes());
        atom(b"jpeg", &body)
    }
}

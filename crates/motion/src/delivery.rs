//! Handing finished media to the user as a file.

use crate::result::{MotionError, MotionResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Encoded output of one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    /// File contents
    pub bytes: Vec<u8>,
    /// MIME type of the format actually produced
    pub mime: &'static str,
    /// File extension without the dot
    pub extension: &'static str,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// Frames encoded
    pub frame_count: usize,
    /// Nominal playback duration
    pub duration: Duration,
}

impl EncodedMedia {
    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was encoded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reject an encoder result that holds no bytes
pub(crate) fn non_empty(bytes: Vec<u8>, format: &str) -> MotionResult<Vec<u8>> {
    if bytes.is_empty() {
        return Err(MotionError::EncodedOutputEmpty {
            format: format.to_string(),
        });
    }
    Ok(bytes)
}

/// `snippet-motion-<unix-epoch-ms>.<ext>`
#[must_use]
pub fn export_filename(extension: &str, at: DateTime<Utc>) -> String {
    format!("snippet-motion-{}.{extension}", at.timestamp_millis())
}

/// Writes media into an output directory, falling back to a second one
#[derive(Debug, Clone)]
pub struct Delivery {
    output_dir: PathBuf,
    fallback_dir: PathBuf,
}

impl Delivery {
    /// Deliver into `output_dir`, falling back to the system temp directory
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fallback_dir: std::env::temp_dir(),
        }
    }

    /// Override the fallback directory
    #[must_use]
    pub fn with_fallback(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = dir.into();
        self
    }

    /// Primary directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `media` under a timestamped name and return its path.
    ///
    /// # Errors
    ///
    /// `DownloadTrigger` if neither directory accepts the file.
    pub async fn deliver(&self, media: &EncodedMedia) -> MotionResult<PathBuf> {
        let name = export_filename(media.extension, Utc::now());
        match write_into(&self.output_dir, &name, &media.bytes).await {
            Ok(path) => {
                info!(path = %path.display(), bytes = media.len(), "export delivered");
                Ok(path)
            }
            Err(primary) => {
                warn!(
                    error = %primary,
                    fallback = %self.fallback_dir.display(),
                    "delivery failed; using fallback location"
                );
                let path = write_into(&self.fallback_dir, &name, &media.bytes)
                    .await
                    .map_err(|fallback| MotionError::DownloadTrigger {
                        message: format!("{primary}; fallback also failed: {fallback}"),
                    })?;
                info!(path = %path.display(), "export delivered to fallback");
                Ok(path)
            }
        }
    }
}

async fn write_into(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn media() -> EncodedMedia {
        EncodedMedia {
            bytes: b"GIF89a-not-really".to_vec(),
            mime: "image/gif",
            extension: "gif",
            width: 2,
            height: 2,
            frame_count: 1,
            duration: Duration::from_millis(50),
        }
    }

    /// A path under a regular file, which no directory can be created at
    fn blocked_dir(root: &Path) -> PathBuf {
        let blocker = root.join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        blocker.join("out")
    }

    #[test]
    fn test_zero_bytes_rejected_with_format() {
        let err = non_empty(Vec::new(), "webm").unwrap_err();
        assert!(matches!(err, MotionError::EncodedOutputEmpty { ref format } if format == "webm"));
        assert_eq!(non_empty(vec![7], "gif").unwrap(), vec![7]);
    }

    #[test]
    fn test_filename_uses_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            export_filename("mp4", at),
            "snippet-motion-1700000000123.mp4"
        );
        assert_eq!(
            export_filename("webm", at),
            "snippet-motion-1700000000123.webm"
        );
    }

    #[tokio::test]
    async fn test_delivers_into_created_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("exports");
        let path = Delivery::new(&out).deliver(&media()).await.unwrap();

        assert!(path.starts_with(&out));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("snippet-motion-"));
        assert!(name.ends_with(".gif"));
        assert_eq!(std::fs::read(&path).unwrap(), media().bytes);
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_unwritable() {
        let tmp = tempfile::tempdir().unwrap();
        let fallback = tmp.path().join("fallback");
        let delivery = Delivery::new(blocked_dir(tmp.path())).with_fallback(&fallback);

        let path = delivery.deliver(&media()).await.unwrap();
        assert!(path.starts_with(&fallback));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_both_locations_failing_is_download_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocked = blocked_dir(tmp.path());
        let delivery = Delivery::new(&blocked).with_fallback(&blocked);

        let result = delivery.deliver(&media()).await;
        assert!(matches!(result, Err(MotionError::DownloadTrigger { .. })));
    }
}

//! Codecs command handler.

use crate::commands::CodecsArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use serde::Serialize;
use snippet_motion::{select_codec, CodecProbe, FfmpegProbe, VideoCodec};
use std::fmt::Write;

/// One line of the codec listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodecRow {
    /// Codec label
    pub codec: String,
    /// Container extension
    pub container: &'static str,
    /// Encoder that produces it
    pub encoder: &'static str,
    /// Whether this host can encode it
    pub available: bool,
    /// Whether a video export would use it
    pub selected: bool,
}

/// Rows for `preferences` as judged by `probe`
pub fn codec_rows(preferences: &[VideoCodec], probe: &dyn CodecProbe) -> CliResult<Vec<CodecRow>> {
    let selected = select_codec(preferences, probe)?;
    Ok(preferences
        .iter()
        .map(|&codec| CodecRow {
            codec: codec.to_string(),
            container: codec.container().extension(),
            encoder: codec.ffmpeg_encoder().unwrap_or("built-in"),
            available: probe.supports(codec),
            selected: codec == selected,
        })
        .collect())
}

/// Plain-text table, selected codec marked with `*`
#[must_use]
pub fn render_codec_table(rows: &[CodecRow]) -> String {
    let mut out = format!("{:<12}{:<11}{:<13}{}\n", "CODEC", "CONTAINER", "ENCODER", "AVAILABLE");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12}{:<11}{:<13}{}{}",
            row.codec,
            row.container,
            row.encoder,
            if row.available { "yes" } else { "no" },
            if row.selected { "  *" } else { "" }
        );
    }
    out
}

/// Execute the codecs command
pub fn execute_codecs(config: &CliConfig, args: &CodecsArgs) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::export(format!("Failed to create runtime: {e}")))?;
    let probe = rt.block_on(FfmpegProbe::detect());
    if !probe.is_available() {
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
            .info("ffmpeg not found; only the built-in encoder is available");
    }

    let rows = codec_rows(&VideoCodec::PREFERENCE, &probe)?;
    if args.json {
        let json = serde_json::to_string_pretty(&rows)
            .map_err(|e| CliError::export(format!("JSON serialization failed: {e}")))?;
        println!("{json}");
    } else {
        print!("{}", render_codec_table(&rows));
    }
    Ok(())
}

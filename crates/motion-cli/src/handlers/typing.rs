//! Source loading and typing options shared by `export` and `preview`.

use crate::commands::TypingArgs;
use crate::error::{CliError, CliResult};
use snippet_motion::{ExportConfig, PreviewDocument, TypingConfig};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Read the snippet from a file, or stdin for `-`
pub fn read_source(input: &Path) -> CliResult<String> {
    let code = if input == Path::new("-") {
        let mut code = String::new();
        std::io::stdin().read_to_string(&mut code)?;
        code
    } else {
        std::fs::read_to_string(input).map_err(|e| {
            CliError::invalid_argument(format!("cannot read {}: {e}", input.display()))
        })?
    };
    if code.trim().is_empty() {
        return Err(CliError::invalid_argument(format!(
            "{} has no code to animate",
            input.display()
        )));
    }
    Ok(code)
}

/// Requested animation length
pub fn target_duration(args: &TypingArgs) -> CliResult<Duration> {
    match args.duration_ms {
        Some(0) => Err(CliError::invalid_argument("--duration-ms must be positive")),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(args.duration.unwrap_or_default().duration()),
    }
}

/// 1-based `--breakpoint` lines as zero-based line indices
pub fn breakpoint_lines(lines: &[usize]) -> CliResult<BTreeSet<usize>> {
    lines
        .iter()
        .map(|&line| {
            line.checked_sub(1)
                .ok_or_else(|| CliError::invalid_argument("breakpoint lines start at 1"))
        })
        .collect()
}

/// Typing timing fitted to `target`
pub fn typing_config(
    code: &str,
    target: Duration,
    args: &TypingArgs,
    config: &ExportConfig,
) -> CliResult<TypingConfig> {
    let pause = args.pause_ms.map_or(config.pause, Duration::from_millis);
    Ok(TypingConfig::for_target_duration(
        code,
        target,
        breakpoint_lines(&args.breakpoints)?,
        pause,
        config.min_char_delay,
    ))
}

/// Preview page for `code`
pub fn preview_document(
    code: &str,
    typing: TypingConfig,
    args: &TypingArgs,
    background: &str,
) -> PreviewDocument {
    let mut document = PreviewDocument::new(code, typing)
        .with_background(background)
        .with_watermark(args.watermark);
    if let Some(ref title) = args.title {
        document = document.with_title(title.as_str());
    }
    document
}

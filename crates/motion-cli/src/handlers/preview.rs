//! Preview command handler: writes the page the exporter would capture.

use super::typing::{preview_document, read_source, target_duration, typing_config};
use crate::commands::PreviewArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use snippet_motion::ExportConfig;

/// Render the preview HTML for `args`
pub fn render_preview(args: &PreviewArgs, code: &str) -> CliResult<String> {
    let defaults = ExportConfig::default();
    let background = args
        .background
        .clone()
        .unwrap_or_else(|| defaults.background.clone());

    let target = target_duration(&args.typing)?;
    let typing = typing_config(code, target, &args.typing, &defaults)?;
    Ok(preview_document(code, typing, &args.typing, &background).render()?)
}

/// Execute the preview command
pub fn execute_preview(config: &CliConfig, args: &PreviewArgs) -> CliResult<()> {
    let code = read_source(&args.input)?;
    let html = render_preview(args, &code)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, html)?;

    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
        .success(&format!("Preview written to {}", args.output.display()));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use crate::error::CliError;
    use clap::Parser;

    fn preview_args(extra: &[&str]) -> PreviewArgs {
        let mut argv = vec!["snippet-motion", "preview", "main.rs"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Preview(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_render_uses_background() {
        let html = render_preview(&preview_args(&["--background", "#112233"]), "x").unwrap();
        assert!(html.contains("#112233"));
    }

    #[test]
    fn test_bad_background_rejected() {
        let result = render_preview(&preview_args(&["--background", "tomato"]), "x");
        assert!(matches!(result, Err(CliError::Motion(_))));
    }

    #[test]
    fn test_execute_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("main.rs");
        let output = dir.path().join("site").join("preview.html");
        std::fs::write(&input, "fn main() {}").unwrap();

        let args = PreviewArgs {
            input,
            output: output.clone(),
            typing: crate::commands::TypingArgs::default(),
            background: None,
        };
        execute_preview(&CliConfig::new(), &args).unwrap();

        let html = std::fs::read_to_string(output).unwrap();
        assert!(html.contains("snippet-motion-preview"));
    }
}

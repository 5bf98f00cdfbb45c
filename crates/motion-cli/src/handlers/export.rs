//! Export command handler.
//!
//! Orchestrates: read source -> fit typing -> launch Chromium -> export -> close.

use super::typing::{preview_document, read_source, target_duration, typing_config};
use crate::commands::{ExportArgs, ExportFormat};
use crate::config::CliConfig;
use crate::error::CliResult;
use snippet_motion::{BrowserConfig, ExportConfig};

/// Export settings from `--config` with flag overrides applied
pub fn resolve_config(args: &ExportArgs) -> CliResult<ExportConfig> {
    let mut config = match args.config {
        Some(ref path) => ExportConfig::from_yaml_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(profile) = args.profile {
        config = config.with_profile(profile);
    }
    if let Some(aspect) = args.aspect {
        config = config.with_aspect(aspect);
    }
    if let Some(fps) = args.fps {
        config = match args.format {
            ExportFormat::Mp4 => config.with_video_fps(fps),
            ExportFormat::Gif => config.with_gif_fps(fps),
        };
    }
    if !args.codecs.is_empty() {
        config = config.with_codecs(args.codecs.clone());
    }
    if let Some(ref dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Chromium launch settings from the flags
pub fn browser_config(args: &ExportArgs) -> BrowserConfig {
    let mut config = BrowserConfig::default().with_headless(!args.headful);
    if args.no_sandbox {
        config = config.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium {
        config = config.with_chromium_path(path);
    }
    config
}

/// Execute the export command
#[cfg(feature = "browser")]
pub fn execute_export(config: &CliConfig, args: &ExportArgs) -> CliResult<()> {
    use crate::error::CliError;
    use crate::output::ProgressReporter;
    use snippet_motion::{ExportObserver, Exporter, PreviewBrowser};
    use std::sync::Arc;

    let code = read_source(&args.input)?;
    let export_config = resolve_config(args)?;
    let target = target_duration(&args.typing)?;
    let typing = typing_config(&code, target, &args.typing, &export_config)?;
    let document = preview_document(&code, typing, &args.typing, &export_config.background);

    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if config.verbosity.is_verbose() {
        reporter.info(&format!(
            "{} characters over {} ms into {}",
            code.chars().count(),
            target.as_millis(),
            export_config.output_dir.display()
        ));
    }
    reporter.start_progress(match args.format {
        ExportFormat::Mp4 => "Exporting video",
        ExportFormat::Gif => "Exporting GIF",
    });
    let observer: Arc<dyn ExportObserver> = Arc::new(reporter);
    let exporter = Exporter::new(export_config, observer);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::export(format!("Failed to create runtime: {e}")))?;
    let outcome = rt.block_on(async {
        let browser = PreviewBrowser::launch(browser_config(args)).await?;
        let result = match browser.open(&document).await {
            Ok(page) => match args.format {
                ExportFormat::Mp4 => exporter.export_video(&page, &page, target).await,
                ExportFormat::Gif => exporter.export_gif(&page, &page, target).await,
            },
            Err(e) => Err(e),
        };
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser did not close cleanly");
        }
        result
    })?;

    if !config.verbosity.is_quiet() {
        println!("{}", outcome.path.display());
    }
    Ok(())
}

/// Execute the export command
#[cfg(not(feature = "browser"))]
pub fn execute_export(_config: &CliConfig, _args: &ExportArgs) -> CliResult<()> {
    Err(crate::error::CliError::config(
        "built without browser support; rebuild with --features browser",
    ))
}

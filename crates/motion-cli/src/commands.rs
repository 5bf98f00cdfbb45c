//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use snippet_motion::{AspectRatio, DurationPreset, ResolutionProfile, VideoCodec};
use std::path::PathBuf;

/// Snippet Motion: turn a code snippet into a typewriter video or GIF
#[derive(Parser, Debug)]
#[command(name = "snippet-motion")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the typing animation as a video or GIF
    Export(ExportArgs),

    /// Write the standalone preview page as HTML
    Preview(PreviewArgs),

    /// List video codecs and whether this host can encode them
    Codecs(CodecsArgs),
}

/// Output format of `export`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Video (MP4, or WebM when only VP8/VP9 are available)
    #[default]
    #[value(alias = "video")]
    Mp4,
    /// Animated GIF
    Gif,
}

/// Typing options shared by `export` and `preview`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TypingArgs {
    /// Named animation length
    #[arg(short, long, conflicts_with = "duration_ms")]
    pub duration: Option<DurationPreset>,

    /// Animation length in milliseconds
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Pause after this line (1-based, repeatable)
    #[arg(short, long = "breakpoint", value_name = "LINE")]
    pub breakpoints: Vec<usize>,

    /// Length of each breakpoint pause in milliseconds
    #[arg(long)]
    pub pause_ms: Option<u64>,

    /// File name shown in the window title bar
    #[arg(long)]
    pub title: Option<String>,

    /// Show the "Made with Snippet Motion" badge
    #[arg(long)]
    pub watermark: bool,
}

/// Arguments for the export command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportArgs {
    /// Source file to animate ("-" reads stdin)
    pub input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "mp4")]
    pub format: ExportFormat,

    /// Typing options
    #[command(flatten)]
    pub typing: TypingArgs,

    /// Video resolution profile (720p, 1080p, 4k)
    #[arg(long)]
    pub profile: Option<ResolutionProfile>,

    /// Video frame shape (landscape, portrait, square)
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Capture frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Video codec preference (repeatable, first supported wins)
    #[arg(long = "codec", value_name = "CODEC")]
    pub codecs: Vec<VideoCodec>,

    /// Directory the export is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// YAML export configuration; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Chromium binary (auto-detected when omitted)
    #[arg(long, env = "SNIPPET_MOTION_CHROMIUM")]
    pub chromium: Option<PathBuf>,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

/// Arguments for the preview command
#[derive(Parser, Debug)]
pub struct PreviewArgs {
    /// Source file to animate ("-" reads stdin)
    pub input: PathBuf,

    /// HTML file to write
    #[arg(short, long, default_value = "snippet-motion-preview.html")]
    pub output: PathBuf,

    /// Typing options
    #[command(flatten)]
    pub typing: TypingArgs,

    /// Page background color
    #[arg(long)]
    pub background: Option<String>,
}

/// Arguments for the codecs command
#[derive(Parser, Debug)]
pub struct CodecsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test]
        fn test_export_defaults() {
            let cli = Cli::try_parse_from(["snippet-motion", "export", "main.rs"]).unwrap();
            let Commands::Export(args) = cli.command else {
                panic!("expected export command");
            };
            assert_eq!(args.input, PathBuf::from("main.rs"));
            assert_eq!(args.format, ExportFormat::Mp4);
            assert!(args.typing.duration.is_none());
            assert!(args.codecs.is_empty());
            assert!(!args.no_sandbox);
        }

        #[test]
        fn test_export_full_flags() {
            let cli = Cli::try_parse_from([
                "snippet-motion",
                "export",
                "-",
                "--format",
                "gif",
                "--duration",
                "long",
                "--profile",
                "4k",
                "--aspect",
                "square",
                "--fps",
                "24",
                "-b",
                "2",
                "--breakpoint",
                "5",
                "--codec",
                "vp9",
                "--codec",
                "mjpeg",
                "--no-sandbox",
                "--headful",
            ])
            .unwrap();
            let Commands::Export(args) = cli.command else {
                panic!("expected export command");
            };
            assert_eq!(args.format, ExportFormat::Gif);
            assert_eq!(args.typing.duration, Some(DurationPreset::Long));
            assert_eq!(args.profile, Some(ResolutionProfile::Uhd4k));
            assert_eq!(args.aspect, Some(AspectRatio::Square));
            assert_eq!(args.fps, Some(24));
            assert_eq!(args.typing.breakpoints, vec![2, 5]);
            assert_eq!(args.codecs, vec![VideoCodec::Vp9Webm, VideoCodec::MjpegMp4]);
            assert!(args.no_sandbox);
            assert!(args.headful);
        }

        #[test]
        fn test_duration_flags_conflict() {
            let result = Cli::try_parse_from([
                "snippet-motion",
                "export",
                "a.rs",
                "--duration",
                "short",
                "--duration-ms",
                "900",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_unknown_profile_rejected() {
            let result =
                Cli::try_parse_from(["snippet-motion", "export", "a.rs", "--profile", "8k"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_video_alias() {
            let cli =
                Cli::try_parse_from(["snippet-motion", "export", "a.rs", "-f", "video"]).unwrap();
            let Commands::Export(args) = cli.command else {
                panic!("expected export command");
            };
            assert_eq!(args.format, ExportFormat::Mp4);
        }

        #[test]
        fn test_preview_output() {
            let cli =
                Cli::try_parse_from(["snippet-motion", "preview", "a.rs", "-o", "out.html"])
                    .unwrap();
            let Commands::Preview(args) = cli.command else {
                panic!("expected preview command");
            };
            assert_eq!(args.output, PathBuf::from("out.html"));
        }

        #[test]
        fn test_global_flags() {
            let cli =
                Cli::try_parse_from(["snippet-motion", "-vv", "--color", "never", "codecs"])
                    .unwrap();
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.command, Commands::Codecs(_)));
            assert_eq!(ColorChoice::from(cli.color), ColorChoice::Never);
        }
    }
}

//! Snippet Motion CLI
//!
//! ## Usage
//!
//! ```bash
//! snippet-motion export main.rs                   # MP4 into the current directory
//! snippet-motion export main.rs -f gif -d short   # short GIF
//! snippet-motion export - -b 3 < main.rs          # pause after line 3
//! snippet-motion preview main.rs -o preview.html  # inspect the page
//! snippet-motion codecs                           # what this host can encode
//! ```

use clap::Parser;
use snippet_motion_cli::{
    handlers::{execute_codecs, execute_export, execute_preview},
    init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity);

    match cli.command {
        Commands::Export(args) => execute_export(&config, &args),
        Commands::Preview(args) => execute_preview(&config, &args),
        Commands::Codecs(args) => execute_codecs(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

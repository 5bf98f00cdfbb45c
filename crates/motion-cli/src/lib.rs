//! Snippet Motion CLI library
//!
//! Command-line front end for exporting typewriter code animations.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod logging;
mod output;

pub use commands::{
    Cli, CodecsArgs, ColorArg, Commands, ExportArgs, ExportFormat, PreviewArgs, TypingArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use output::{phase_label, ProgressReporter};

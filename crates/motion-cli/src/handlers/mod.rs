//! Command handlers - extracted from main.rs for testability

pub mod codecs;
pub mod export;
pub mod preview;
pub mod typing;

pub use codecs::{codec_rows, execute_codecs, render_codec_table, CodecRow};
pub use export::{browser_config, execute_export, resolve_config};
pub use preview::{execute_preview, render_preview};
pub use typing::{breakpoint_lines, read_source, target_duration, typing_config};

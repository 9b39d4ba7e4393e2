//! Command-line interface.
//!
//! Argument definitions live in `commands`; rendering of reports and
//! messages for the terminal lives in `output`.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, PushArgs};
pub use output::OutputFormatter;

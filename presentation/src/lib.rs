//! Presentation layer for plenum
//!
//! This crate contains the CLI definition and the console and JSON
//! renderings of the live view and outcome reports.

pub mod cli;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat, VoteArg};
pub use output::console::{ConsoleFormatter, JsonFormatter, formatter_for};
pub use output::formatter::OutputFormatter;

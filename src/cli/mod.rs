//! CLI module
//!
//! Command-line interface for paginating pipelines over JSON documents.
//!
//! # Commands
//!
//! - `paginate` - Run a pipeline over a document file and print one page
//! - `defaults` - Print the effective default options

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

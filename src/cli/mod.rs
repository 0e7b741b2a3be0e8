//! CLI module
//!
//! Command-line interface for the daily extraction.
//!
//! # Commands
//!
//! - `run` - Extract both sources into the warehouse
//! - `plan` - Print the API task plan
//! - `periods` - Print monthly periods between two dates
//! - `tables` - List the tables of the database source
//! - `validate` - Check the configuration file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

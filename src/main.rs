// Allow common clippy pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]

//! daily-extract CLI
//!
//! Runs the daily extraction and maps the run summary to the exit code.

use anyhow::Context;
use clap::Parser;
use daily_extract::cli::{Cli, Runner};
use daily_extract::logging;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let runner = Runner::new(cli);

    let _guard = logging::init(&runner.logging_config()).context("Failed to initialize logging")?;

    let code = runner
        .run()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Command failed"))?;

    Ok(ExitCode::from(code))
}

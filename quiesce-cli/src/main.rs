//! CLI entry point for the quiesce termination detector.
//!
//! Initialises logging, parses arguments, runs the requested command and
//! prints the summary to stdout. Exits with status 2 when detection was
//! inconclusive and 1 when the command failed.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use quiesce_cli::{
    cli::{Cli, CliError, render_summary, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

const INCONCLUSIVE: u8 = 2;

/// Runs the command and reports whether termination was detected.
fn try_main() -> Result<bool> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(summary.verdict.terminated())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    match try_main() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(INCONCLUSIVE),
        Err(err) => {
            let code = err
                .downcast_ref::<CliError>()
                .and_then(CliError::code)
                .map(field::display);
            error!(error = %err, code, "command execution failed");
            ExitCode::FAILURE
        }
    }
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}

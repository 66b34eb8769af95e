//! `vibrate` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse arguments**: one positional duration in milliseconds plus
//!    logging and configuration options.
//! 2. **Wire observability**: configure `tracing-subscriber` (text or JSON,
//!    `EnvFilter`) on stderr. All `tracing` events from the workspace flow
//!    through it.
//! 3. **Load configuration**: device nodes and the AIDL protocol generation
//!    from `/etc/vibrate.toml` or `--config`.
//! 4. **Construct infrastructure**: a [`binder::BinderTransport`] injected into
//!    a [`vibrator::Session`], which runs the on → wait → off sequence.
//!
//! ## Exit codes
//!
//! `1` when the arguments or duration are invalid, the configuration cannot be
//! loaded, or no vibrator service could be bound. `0` otherwise, including
//! when the service rejected or failed the on/off requests.

mod args;
mod config;
mod console;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{debug, error};
use vibrator::{DurationMs, Session, ThreadSleep};

use crate::args::{Args, USAGE};
use crate::console::Console;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            if !matches!(
                err.kind(),
                ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument
            ) {
                let _ = err.print();
            }
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(args.log_format, args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!(error = ?err, "vibrate failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut console = Console::stdio();

    let duration = match DurationMs::parse(&args.duration) {
        Ok(duration) => duration,
        Err(err) => {
            debug!(error = %err, "duration rejected");
            console.error("Duration must be a positive integer");
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = config::load_config(args.config.as_deref())?;
    let transport = config.transport();
    let mut session = Session::new(&transport, ThreadSleep, config.domains()?);

    let report = match session.run(duration, &mut console) {
        Ok(report) => report,
        Err(err) => {
            debug!(error = %err, "session setup failed");
            console.error("Failed to initialize vibrator");
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(ExitCode::SUCCESS)
}

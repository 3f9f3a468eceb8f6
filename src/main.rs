#[macro_use]
extern crate derive_more;

#[macro_use]
extern crate tracing;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Args, DisasmError};

mod cli;
mod decoder;
mod disasm;
mod formatter;
mod opcodes;

fn env_filter() -> EnvFilter {
    EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy()
}

/// Logs go to stdout, and additionally as JSON to `log_file` when one is given.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, DisasmError> {
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_filter(env_filter());

    let (json_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .map_err(|source| DisasmError::OpenLog { path: path.to_path_buf(), source })?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().json().with_writer(non_blocking).with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match init_logging(args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli::run(&args) {
        Ok(summary) => {
            info!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

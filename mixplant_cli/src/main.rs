#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `mixplant` command line front end.

mod cli;
mod error_fmt;
mod monitor;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use mixplant_core::error::PlantError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::monitor::StartActions;

/// Console layer on stderr, plus an optional JSON file layer from `[logging]`.
///
/// The returned guard flushes the file writer when dropped; keep it for the
/// whole run.
fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &mixplant_config::Logging,
) -> Option<WorkerGuard> {
    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().with_writer(std::io::stderr).json().boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let mut guard = None;
    let file = logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "mixplant.log".into(), |n| n.to_os_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, g) = tracing_appender::non_blocking(appender);
        guard = Some(g);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
    guard
}

fn run(cli: Cli, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let cfg = mixplant_config::load_path(&cli.config)
        .map_err(|e| PlantError::Config(format!("{e:#}")))?;
    let _log_guard = init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.cmd {
        Commands::Monitor {
            seconds,
            valve,
            fill,
            flush,
        } => {
            let actions = StartActions {
                valves: valve,
                fills: fill,
                flushes: flush,
            };
            monitor::run_monitor(&cfg, seconds, &actions, cli.json, shutdown)
        }
        Commands::SelfCheck => monitor::run_self_check(&cfg, cli.json),
        Commands::AlarmsDemo => monitor::run_alarms_demo(&cfg, cli.json),
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            eprintln!("warning: could not install Ctrl-C handler: {e}");
        }
    }

    if let Err(e) = run(cli, shutdown) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

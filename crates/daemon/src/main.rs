// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden supervisor daemon (wardend)
//!
//! Keeps one remote agent alive: boots it, probes its health on a timer and
//! escalates through restart, rollback and rebirth when it stops answering.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use wd_adapters::{LocalExecutor, RemoteExecutor, SshExecutor};
use wd_daemon::{config, env, lifecycle, ExecutorSettings, LifecycleError, Paths, Settings};

/// Rotate `wardend.log` when it grows past this size at startup.
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept (`wardend.log.1` ..= `wardend.log.N`).
const MAX_ROTATIONS: u32 = 3;

/// Startup marker prefix written to log before anything else.
/// Full format: "--- wardend: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- wardend: starting (pid: ";

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Run { config: Option<PathBuf> },
    Help,
    Version,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation, String> {
    let mut config = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => return Ok(Invocation::Version),
            "--help" | "-h" | "help" => return Ok(Invocation::Help),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("'{arg}' requires a path"))?;
                config = Some(PathBuf::from(path));
            }
            other => match other.strip_prefix("--config=") {
                Some(path) if !path.is_empty() => config = Some(PathBuf::from(path)),
                _ => return Err(format!("unexpected argument '{other}'")),
            },
        }
    }
    Ok(Invocation::Run { config })
}

fn print_help() {
    println!("wardend {}", env!("CARGO_PKG_VERSION"));
    println!("Warden - supervises a remote agent and recovers it when its health checks fail");
    println!();
    println!("USAGE:");
    println!("    wardend [--config PATH]");
    println!();
    println!("The config path defaults to $WARDEN_CONFIG, then <state dir>/warden.toml.");
    println!("The state dir is $WARDEN_STATE_DIR, $XDG_STATE_HOME/warden or");
    println!("~/.local/state/warden.");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>  Configuration file");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version information");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    let config_flag = match parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Version) => {
            println!("wardend {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Run { config }) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("Usage: wardend [--config PATH] | --help | --version");
            std::process::exit(2);
        }
    };

    let state_dir = env::state_dir()?;
    let paths = Paths::new(state_dir);
    let config_path = config::resolve_path(config_flag, &paths.state_dir);

    std::fs::create_dir_all(&paths.state_dir)?;
    rotate_log_if_needed(&paths.log_path);
    write_startup_marker(&paths.log_path)?;
    let log_guard = setup_logging(&paths.log_path)?;

    info!(config = %config_path.display(), "starting wardend");

    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            write_startup_error(&paths.log_path, &e);
            error!("invalid configuration: {}", e);
            eprintln!("error: {e}");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let result = match settings.executor.clone() {
        ExecutorSettings::Ssh(ssh) => serve(&settings, &paths, SshExecutor::new(ssh)).await,
        ExecutorSettings::Local => serve(&settings, &paths, LocalExecutor::new()).await,
    };
    match result {
        Ok(()) => Ok(()),
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("wardend is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&paths.log_path, &e);
            error!("failed to start wardend: {}", e);
            drop(log_guard);
            Err(e.into())
        }
    }
}

/// Run the supervisor until SIGTERM or SIGINT.
async fn serve<E: RemoteExecutor>(
    settings: &Settings,
    paths: &Paths,
    executor: E,
) -> Result<(), LifecycleError> {
    let daemon = lifecycle::startup(settings, paths, executor)?;
    let supervision = daemon.spawn_supervision();
    let maintenance = daemon.spawn_maintenance();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("wardend ready");
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("received SIGINT, shutting down..."),
    }

    supervision.abort();
    maintenance.abort();
    daemon.shutdown();
    info!("wardend stopped");
    Ok(())
}

/// Shift `path` to `path.1` (and older rotations up by one) when it is too large.
fn rotate_log_if_needed(path: &Path) {
    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };
    if meta.len() <= MAX_LOG_SIZE {
        return;
    }
    let rotated = |n: u32| {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    };
    for n in (1..MAX_ROTATIONS).rev() {
        let from = rotated(n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated(n + 1));
        }
    }
    let _ = std::fs::rename(path, rotated(1));
}

/// Append the startup marker (appends to existing log)
fn write_startup_marker(log_path: &Path) -> Result<(), std::io::Error> {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously, so it lands even if the process exits right away.
fn write_startup_error(log_path: &Path, error: &dyn std::fmt::Display) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start wardend: {}", error);
}

fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (Some(dir), Some(file_name)) = (log_path.parent(), log_path.file_name()) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid log path {}", log_path.display()),
        ));
    };
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

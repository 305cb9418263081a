// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, timer loops, shutdown.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wd_adapters::{HealthProbe, HttpHealthProbe, RemoteExecutor, TracedExecutor, TracedProbe};
use wd_core::{PolicyError, SystemClock, UuidIdGen};
use wd_engine::{
    Coordinator, CoordinatorConfig, CoordinatorDeps, ProcessController, Seed, SeedError, Vcs,
};
use wd_storage::{GrowthLog, HealthLog, LogError};

use crate::config::Settings;

/// Coordinator with the production clock and ids, adapters wrapped with tracing
pub type DaemonCoordinator<E, P> =
    Coordinator<TracedExecutor<E>, TracedProbe<P>, SystemClock, UuidIdGen>;

/// Files under the state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/warden)
    pub state_dir: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub health_path: PathBuf,
    pub growth_path: PathBuf,
}

impl Paths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            lock_path: state_dir.join("wardend.pid"),
            log_path: state_dir.join("wardend.log"),
            health_path: state_dir.join("health.jsonl"),
            growth_path: state_dir.join("growth.jsonl"),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: wardend already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to open {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: LogError,
    },

    #[error("bootstrap error: {0}")]
    Seed(#[from] SeedError),

    #[error("failed to build health probe: {0}")]
    Probe(String),

    #[error("invalid recovery policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started supervisor.
pub struct Daemon<E, P> {
    pub paths: Paths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub coordinator: Arc<DaemonCoordinator<E, P>>,
    maintenance_interval: Duration,
}

/// Start the supervisor against the HTTP health endpoint.
pub fn startup<E: RemoteExecutor>(
    settings: &Settings,
    paths: &Paths,
    executor: E,
) -> Result<Daemon<E, HttpHealthProbe>, LifecycleError> {
    let probe = HttpHealthProbe::new(settings.probe.clone())
        .map_err(|e| LifecycleError::Probe(e.to_string()))?;
    startup_with(settings, paths, executor, probe)
}

/// Start the supervisor with an explicit probe.
pub fn startup_with<E: RemoteExecutor, P: HealthProbe>(
    settings: &Settings,
    paths: &Paths,
    executor: E,
    probe: P,
) -> Result<Daemon<E, P>, LifecycleError> {
    match startup_inner(settings, paths, executor, probe) {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // The PID file of a running supervisor is not ours to remove.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                remove_pid_file(&paths.lock_path);
            }
            Err(e)
        }
    }
}

fn startup_inner<E: RemoteExecutor, P: HealthProbe>(
    settings: &Settings,
    paths: &Paths,
    executor: E,
    probe: P,
) -> Result<Daemon<E, P>, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Open without truncating: the file may hold a running supervisor's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    let health = HealthLog::open(&paths.health_path).map_err(|source| LifecycleError::Store {
        path: paths.health_path.clone(),
        source,
    })?;
    let growth = GrowthLog::open(&paths.growth_path).map_err(|source| LifecycleError::Store {
        path: paths.growth_path.clone(),
        source,
    })?;
    let seed = Seed::load(&settings.seed_path, &settings.seed_params)?;

    let executor = TracedExecutor::new(executor);
    let coordinator = Coordinator::new(
        CoordinatorDeps {
            vcs: Vcs::new(executor.clone(), settings.vcs.clone()),
            process: ProcessController::new(executor, settings.process.clone(), seed),
            probe: TracedProbe::new(probe),
            health,
            growth,
        },
        SystemClock,
        UuidIdGen,
        CoordinatorConfig {
            policy: settings.policy.clone(),
        },
    )?;
    coordinator.record_supervisor_start(env!("CARGO_PKG_VERSION"));

    info!(
        state_dir = %paths.state_dir.display(),
        code_dir = %settings.vcs.code_dir,
        "supervisor started"
    );
    Ok(Daemon {
        paths: paths.clone(),
        lock_file,
        coordinator: Arc::new(coordinator),
        maintenance_interval: settings.maintenance_interval,
    })
}

impl<E: RemoteExecutor, P: HealthProbe> Daemon<E, P> {
    /// Boot the agent, then run health checks on the configured interval.
    ///
    /// Each tick runs on its own task so a long recovery action never delays
    /// the timer; ticks that land during one are skipped by the coordinator.
    pub fn spawn_supervision(&self) -> JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            let outcome = coordinator.boot().await;
            info!(?outcome, "boot finished");

            let mut interval = tokio::time::interval(coordinator.policy().health_check_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator.health_tick().await;
                });
            }
        })
    }

    /// Prune health history and promote stable tags on the maintenance interval.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let period = self.maintenance_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                let report = coordinator.maintenance().await;
                debug!(pruned = report.pruned, tagged = ?report.tagged, "maintenance pass finished");
            }
        })
    }

    /// Remove the PID file. The lock is released when `self` drops.
    pub fn shutdown(self) {
        info!("shutting down supervisor");
        remove_pid_file(&self.paths.lock_path);
        info!("supervisor shutdown complete");
    }
}

fn remove_pid_file(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("failed to remove PID file: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

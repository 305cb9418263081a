// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration: `warden.toml`
//!
//! The file is read, `${VAR}` references are expanded from the environment,
//! and the result is parsed and validated into the typed configs of the
//! engine and adapters. Every key has a default except `agent.host`.

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use wd_adapters::{ProbeConfig, SshConfig};
use wd_core::{CommandError, PolicyError, RecoveryPolicy, SafePath};
use wd_engine::{ProcessConfig, SeedParams, VcsConfig, DEFAULT_LIFECYCLE_MARKER};

#[allow(clippy::expect_used)]
static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("constant regex pattern is valid")
});

/// Timeout for a single remote command issued by the engine.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("agent.host is required")]
    MissingHost,

    #[error("agent.host {0:?} contains an unresolved variable")]
    UnresolvedHost(String),

    #[error("agent.{key}: {source}")]
    Path {
        key: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("agent.interpreter {0:?} must be a bare program name")]
    Interpreter(String),

    #[error("invalid recovery policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("supervisor.{0} must be positive")]
    Zero(&'static str),
}

/// How remote commands reach the agent's host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    #[default]
    Ssh,
    /// Run commands with the local shell (agent on the supervisor's host)
    Local,
}

/// `[supervisor]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorSection {
    pub health_check_interval_secs: u64,
    pub max_restart_attempts: u32,
    pub boot_grace_secs: u64,
    pub maintenance_interval_secs: u64,
    pub health_summary_interval_secs: u64,
    pub executor_ready_attempts: u32,
    pub executor_ready_delay_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 10,
            max_restart_attempts: 3,
            boot_grace_secs: 30,
            maintenance_interval_secs: 300,
            health_summary_interval_secs: 600,
            executor_ready_attempts: 15,
            executor_ready_delay_secs: 2,
        }
    }
}

/// `[agent]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSection {
    pub host: String,
    pub transport: Transport,
    pub ssh_user: String,
    pub ssh_key_path: Option<PathBuf>,
    pub ssh_port: u16,
    pub port: u16,
    pub health_path: String,
    pub code_dir: String,
    pub entry_point: String,
    /// File name inside `code_dir` that marks an established agent
    pub lifecycle_marker: String,
    pub interpreter: String,
    pub log_file: String,
    pub backup_dir: String,
    /// Bootstrap template on the supervisor's host; relative to the config file
    pub seed_path: PathBuf,
    pub kernel_url: String,
    pub app_port: u16,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            transport: Transport::Ssh,
            ssh_user: "root".to_string(),
            ssh_key_path: None,
            ssh_port: 22,
            port: 9001,
            health_path: "/health".to_string(),
            code_dir: "/opt/agent/brain".to_string(),
            entry_point: "seed.py".to_string(),
            lifecycle_marker: DEFAULT_LIFECYCLE_MARKER.to_string(),
            interpreter: "python3".to_string(),
            log_file: "/var/log/agent.log".to_string(),
            backup_dir: "/opt/agent/backups".to_string(),
            seed_path: PathBuf::from("seed/seed.py"),
            kernel_url: "http://localhost:8080".to_string(),
            app_port: 9000,
        }
    }
}

/// `[recovery]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySection {
    pub warn_after: u32,
    pub restart_after: u32,
    pub rollback_after: u32,
    pub rebirth_after: u32,
    pub dead_after: u32,
    pub min_stable_secs: u64,
    pub backup_max_mb: u64,
    pub request_timeout_ms: u64,
    pub timeout_ceiling_ms: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            warn_after: 1,
            restart_after: 3,
            rollback_after: 6,
            rebirth_after: 9,
            dead_after: 12,
            min_stable_secs: 300,
            backup_max_mb: 250,
            request_timeout_ms: 5000,
            timeout_ceiling_ms: 8000,
        }
    }
}

/// The file as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub supervisor: SupervisorSection,
    pub agent: AgentSection,
    pub recovery: RecoverySection,
}

/// Where commands go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorSettings {
    Ssh(SshConfig),
    Local,
}

/// Validated configuration, ready to build the supervisor from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub policy: RecoveryPolicy,
    pub executor: ExecutorSettings,
    pub probe: ProbeConfig,
    pub process: ProcessConfig,
    pub vcs: VcsConfig,
    pub seed_path: PathBuf,
    pub seed_params: SeedParams,
    pub maintenance_interval: Duration,
}

/// Replace `${VAR}` with the variable's value. Unset variables stay literal.
pub fn expand_env(raw: &str) -> String {
    ENV_REF
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Resolve the config path: explicit flag, then `$WARDEN_CONFIG`, then the state dir.
pub fn resolve_path(flag: Option<PathBuf>, state_dir: &Path) -> PathBuf {
    flag.or_else(crate::env::config_path)
        .unwrap_or_else(|| state_dir.join("warden.toml"))
}

impl FileConfig {
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(&expand_env(raw)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Validate into [`Settings`]. Relative paths resolve against `base_dir`.
    pub fn validate(self, base_dir: &Path) -> Result<Settings, ConfigError> {
        let Self {
            supervisor,
            agent,
            recovery,
        } = self;

        let host = agent.host.trim().to_string();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if host.contains("${") {
            return Err(ConfigError::UnresolvedHost(host));
        }
        if supervisor.maintenance_interval_secs == 0 {
            return Err(ConfigError::Zero("maintenance_interval_secs"));
        }
        if supervisor.executor_ready_attempts == 0 {
            return Err(ConfigError::Zero("executor_ready_attempts"));
        }

        let policy = RecoveryPolicy {
            health_check_interval: Duration::from_secs(supervisor.health_check_interval_secs),
            warn_after: recovery.warn_after,
            restart_after: recovery.restart_after,
            rollback_after: recovery.rollback_after,
            rebirth_after: recovery.rebirth_after,
            dead_after: recovery.dead_after,
            max_restart_attempts: supervisor.max_restart_attempts,
            min_stable: Duration::from_secs(recovery.min_stable_secs),
            backup_max_mb: recovery.backup_max_mb,
            request_timeout: Duration::from_millis(recovery.request_timeout_ms),
            timeout_ceiling: Duration::from_millis(recovery.timeout_ceiling_ms),
            boot_grace: Duration::from_secs(supervisor.boot_grace_secs),
            health_summary_interval: Duration::from_secs(supervisor.health_summary_interval_secs),
        };
        policy.validate()?;

        let code_dir = safe_path("code_dir", &agent.code_dir)?;
        let backup_dir = safe_path("backup_dir", &agent.backup_dir)?;
        let log_file = safe_path("log_file", &agent.log_file)?;
        if agent.interpreter.is_empty()
            || !agent
                .interpreter
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::Interpreter(agent.interpreter));
        }

        let process = ProcessConfig::new(
            code_dir.clone(),
            &agent.entry_point,
            agent.interpreter,
            log_file,
        )
        .map_err(|source| ConfigError::Path {
            key: "entry_point",
            source,
        })?;
        let mut process = process
            .with_lifecycle_marker(&agent.lifecycle_marker)
            .map_err(|source| ConfigError::Path {
                key: "lifecycle_marker",
                source,
            })?;
        process.max_restart_attempts = policy.max_restart_attempts;
        process.ready_attempts = supervisor.executor_ready_attempts;
        process.ready_delay = Duration::from_secs(supervisor.executor_ready_delay_secs);
        process.command_timeout = COMMAND_TIMEOUT;

        let executor = match agent.transport {
            Transport::Ssh => ExecutorSettings::Ssh(SshConfig {
                host: host.clone(),
                user: agent.ssh_user,
                port: agent.ssh_port,
                key_path: agent.ssh_key_path.map(|p| base_dir.join(p)),
            }),
            Transport::Local => ExecutorSettings::Local,
        };

        let probe = ProbeConfig::new(&host, agent.port, &agent.health_path)
            .with_timeouts(policy.request_timeout, policy.timeout_ceiling);

        let seed_params = SeedParams {
            kernel_url: agent.kernel_url,
            brain_path: code_dir.to_string(),
            seed_port: agent.port,
            app_port: agent.app_port,
        };

        Ok(Settings {
            executor,
            probe,
            process,
            vcs: VcsConfig {
                code_dir,
                backup_dir,
                command_timeout: COMMAND_TIMEOUT,
            },
            seed_path: base_dir.join(agent.seed_path),
            seed_params,
            maintenance_interval: Duration::from_secs(supervisor.maintenance_interval_secs),
            policy,
        })
    }
}

impl Settings {
    /// Load and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        FileConfig::load(path)?.validate(base_dir)
    }
}

fn safe_path(key: &'static str, raw: &str) -> Result<SafePath, ConfigError> {
    SafePath::parse(raw).map_err(|source| ConfigError::Path { key, source })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

//! Runner configuration loading.
//!
//! ```toml
//! [job]
//! tick_timeout_ms = 0
//!
//! [log]
//! level = "info"
//!
//! [remote]
//! servers = ["sequencer-a"]
//! ```

#![allow(missing_docs)]

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::JobError;

/// Upper bound for the pause between ticks.
pub const MAX_TICK_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub tick_timeout: Duration,
    pub log_level: LogLevel,
    pub remote_servers: Vec<SmolStr>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_timeout: Duration::ZERO,
            log_level: LogLevel::Info,
            remote_servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(text: &str) -> Result<Self, JobError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(JobError::InvalidConfig(
                format!("invalid log.level '{text}'").into(),
            )),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            JobError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, JobError> {
        let raw: RunnerToml = toml::from_str(text)
            .map_err(|err| JobError::InvalidConfig(format!("runner.toml: {err}").into()))?;
        raw.into_config()
    }
}

#[derive(Debug, Deserialize)]
struct RunnerToml {
    job: Option<JobSection>,
    log: Option<LogSection>,
    remote: Option<RemoteSection>,
}

#[derive(Debug, Deserialize)]
struct JobSection {
    tick_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LogSection {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteSection {
    servers: Option<Vec<String>>,
}

impl RunnerToml {
    fn into_config(self) -> Result<RunnerConfig, JobError> {
        let mut config = RunnerConfig::default();
        if let Some(ms) = self.job.and_then(|job| job.tick_timeout_ms) {
            if ms > MAX_TICK_TIMEOUT_MS {
                return Err(JobError::InvalidConfig(
                    format!("job.tick_timeout_ms must be at most {MAX_TICK_TIMEOUT_MS}").into(),
                ));
            }
            config.tick_timeout = Duration::from_millis(ms);
        }
        if let Some(level) = self.log.and_then(|log| log.level) {
            config.log_level = LogLevel::parse(&level)?;
        }
        for server in self.remote.and_then(|remote| remote.servers).unwrap_or_default() {
            let server = server.trim();
            if server.is_empty() {
                return Err(JobError::InvalidConfig(
                    "remote.servers entries must not be empty".into(),
                ));
            }
            if config.remote_servers.iter().any(|known| known == server) {
                return Err(JobError::InvalidConfig(
                    format!("duplicate remote server '{server}'").into(),
                ));
            }
            config.remote_servers.push(server.into());
        }
        Ok(config)
    }
}

//! Scheduler configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::scheduler::SchedulerLimits;
use crate::core::AppResult;

/// Environment variable overriding the priority lane ceiling.
pub const ENV_PRIORITY_MAX: &str = "TASK_LANES_PRIORITY_MAX";
/// Environment variable overriding the normal lane ceiling.
pub const ENV_NORMAL_MAX: &str = "TASK_LANES_NORMAL_MAX";
/// Environment variable overriding the tick interval in milliseconds.
pub const ENV_TICK_MS: &str = "TASK_LANES_TICK_MS";
/// Environment variable overriding the session refresh period in ticks.
pub const ENV_SESSION_REFRESH_TICKS: &str = "TASK_LANES_SESSION_REFRESH_TICKS";
/// Environment variable selecting the file store directory.
pub const ENV_STORE_PATH: &str = "TASK_LANES_STORE_PATH";

/// Per-lane settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Concurrency ceiling of the lane.
    pub max_active: usize,
}

impl LaneConfig {
    /// Lane with the given ceiling.
    #[must_use]
    pub const fn new(max_active: usize) -> Self {
        Self { max_active }
    }
}

/// Task store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// JSON-lines file store.
    File {
        /// Directory holding the stream file.
        path: PathBuf,
        /// Stream name used in the file name.
        #[serde(default = "default_stream")]
        stream: String,
    },
}

fn default_stream() -> String {
    "tasks".into()
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_session_refresh_ticks() -> u64 {
    120
}

const fn default_audit_capacity() -> usize {
    1024
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Priority lane settings.
    pub priority: LaneConfig,
    /// Normal lane settings.
    pub normal: LaneConfig,
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Ticks between store session refreshes.
    #[serde(default = "default_session_refresh_ticks")]
    pub session_refresh_ticks: u64,
    /// Store backend.
    #[serde(default = "default_store")]
    pub store: StoreBackendConfig,
    /// Audit events kept in memory; zero disables the audit trail.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

const fn default_store() -> StoreBackendConfig {
    StoreBackendConfig::InMemory
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            priority: LaneConfig::new(2),
            normal: LaneConfig::new(4),
            tick_interval_ms: default_tick_interval_ms(),
            session_refresh_ticks: default_session_refresh_ticks(),
            store: default_store(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.priority.max_active == 0 {
            return Err("priority.max_active must be greater than 0".into());
        }
        if self.normal.max_active == 0 {
            return Err("normal.max_active must be greater than 0".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        if self.session_refresh_ticks == 0 {
            return Err("session_refresh_ticks must be greater than 0".into());
        }
        if let StoreBackendConfig::File { path, stream } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("store.path must not be empty".into());
            }
            if stream.is_empty() {
                return Err("store.stream must not be empty".into());
            }
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `TASK_LANES_*` environment variables, after
    /// loading a `.env` file when one is present.
    ///
    /// # Errors
    ///
    /// Fails when a variable does not parse or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by variables resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Fails when a variable does not parse or the result does not validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> AppResult<Option<T>>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            lookup(name)
                .map(|raw| raw.trim().parse::<T>())
                .transpose()
                .with_context(|| format!("invalid value for {name}"))
        }

        let mut cfg = Self::default();
        if let Some(max) = parsed(&lookup, ENV_PRIORITY_MAX)? {
            cfg.priority.max_active = max;
        }
        if let Some(max) = parsed(&lookup, ENV_NORMAL_MAX)? {
            cfg.normal.max_active = max;
        }
        if let Some(ms) = parsed(&lookup, ENV_TICK_MS)? {
            cfg.tick_interval_ms = ms;
        }
        if let Some(ticks) = parsed(&lookup, ENV_SESSION_REFRESH_TICKS)? {
            cfg.session_refresh_ticks = ticks;
        }
        if let Some(path) = lookup(ENV_STORE_PATH).filter(|p| !p.trim().is_empty()) {
            cfg.store = StoreBackendConfig::File {
                path: PathBuf::from(path),
                stream: default_stream(),
            };
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Capacity limits for the scheduler.
    #[must_use]
    pub const fn limits(&self) -> SchedulerLimits {
        SchedulerLimits {
            priority_max: self.priority.max_active,
            normal_max: self.normal.max_active,
            session_refresh_ticks: self.session_refresh_ticks,
        }
    }
}

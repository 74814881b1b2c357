//! Runtime configuration for taskboard core.
//!
//! # Responsibility
//! - Hold storage, logging, write-retry, and notification tunables.
//! - Overlay `TASKBOARD_*` environment variables on built-in defaults.
//!
//! # Invariants
//! - `Default` values are always usable without any environment.
//! - Invalid environment values are reported, never silently ignored.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// List names seeded into every new board, in position order.
pub const DEFAULT_LIST_NAMES: [&str; 5] = ["Backlog", "Todo", "Progress", "Review", "Done"];

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Retry policy for acquiring the database write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Sleep between attempts, multiplied by the attempt number.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries. Used by tests that assert raw conflicts.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Backoff to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Notification derivation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// A due timestamp closer than this to "now" counts as due soon.
    pub due_soon_window_ms: i64,
    /// Identical dedupe keys inside this window are suppressed.
    pub dedupe_window_ms: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            due_soon_window_ms: DAY_MS,
            dedupe_window_ms: DAY_MS,
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database file. `None` means in-memory.
    pub db_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
    /// SQLite busy timeout applied on every opened connection.
    pub busy_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Lists created for each new board.
    pub default_lists: Vec<String>,
    pub notifications: NotificationConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            default_lists: DEFAULT_LIST_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Error raised when an environment override cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value `{}` for {}", self.value, self.key)
    }
}

impl Error for ConfigError {}

impl CoreConfig {
    /// Builds config from defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from defaults plus overrides resolved by `lookup`.
    ///
    /// Recognized keys: `TASKBOARD_DB`, `TASKBOARD_LOG_LEVEL`,
    /// `TASKBOARD_LOG_DIR`, `TASKBOARD_BUSY_TIMEOUT_MS`,
    /// `TASKBOARD_RETRY_ATTEMPTS`, `TASKBOARD_RETRY_BACKOFF_MS`,
    /// `TASKBOARD_DEFAULT_LISTS` (comma separated).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup("TASKBOARD_DB")) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(lookup("TASKBOARD_LOG_LEVEL")) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup("TASKBOARD_LOG_DIR")) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = non_blank(lookup("TASKBOARD_BUSY_TIMEOUT_MS")) {
            config.busy_timeout_ms = parse_number("TASKBOARD_BUSY_TIMEOUT_MS", value)?;
        }
        if let Some(value) = non_blank(lookup("TASKBOARD_RETRY_ATTEMPTS")) {
            config.retry.max_attempts = parse_number("TASKBOARD_RETRY_ATTEMPTS", value)?;
        }
        if let Some(value) = non_blank(lookup("TASKBOARD_RETRY_BACKOFF_MS")) {
            config.retry.backoff_ms = parse_number("TASKBOARD_RETRY_BACKOFF_MS", value)?;
        }
        if let Some(value) = non_blank(lookup("TASKBOARD_DEFAULT_LISTS")) {
            let names: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                return Err(ConfigError {
                    key: "TASKBOARD_DEFAULT_LISTS",
                    value,
                });
            }
            config.default_lists = names;
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError { key, value })
}

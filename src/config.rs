//! Application-level configuration loading: retry policy and game defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::DEFAULT_COUNTDOWN_SECONDS;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TURN_TIMER_CONFIG_PATH";
/// Write attempts made before a version conflict is reported to the client.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// First backoff delay; attempt `n` waits `base * 2^n`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Backoff schedule used by the optimistic-lock retry driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub retry: RetryPolicy,
    /// Count-down budget applied to freshly created or reset games.
    pub default_countdown_seconds: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        max_attempts = app_config.retry.max_attempts,
                        base_delay_ms = app_config.retry.base_delay.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration document; absent fields keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    retry: RawRetry,
    default_countdown_seconds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = RetryPolicy::default();
        Self {
            retry: RetryPolicy {
                // At least one write must always be attempted.
                max_attempts: value
                    .retry
                    .max_attempts
                    .unwrap_or(defaults.max_attempts)
                    .max(1),
                base_delay: value
                    .retry
                    .base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
            },
            default_countdown_seconds: value
                .default_countdown_seconds
                .filter(|seconds| *seconds > 0)
                .unwrap_or(DEFAULT_COUNTDOWN_SECONDS),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_schedule_is_100_200_400() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        let delays: Vec<_> = (0..3).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, [100, 200, 400]);
    }

    #[test]
    fn huge_attempt_index_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(20));
    }

    #[test]
    fn empty_json_keeps_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.default_countdown_seconds, DEFAULT_COUNTDOWN_SECONDS);
    }

    #[test]
    fn json_overrides_retry_and_countdown() {
        let config = AppConfig::from_json(
            r#"{"retry": {"maxAttempts": 5, "baseDelayMs": 20}, "defaultCountdownSeconds": 90}"#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(20));
        assert_eq!(config.default_countdown_seconds, 90);
    }

    #[test]
    fn zero_values_are_clamped() {
        let config = AppConfig::from_json(
            r#"{"retry": {"maxAttempts": 0}, "defaultCountdownSeconds": 0}"#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.default_countdown_seconds, DEFAULT_COUNTDOWN_SECONDS);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }
}

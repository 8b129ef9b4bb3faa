//! Runtime configuration for the realtime subsystem.
//!
//! Defaults are tuned for a single-process deployment and can be
//! overridden through `TASKLIVE_*` environment variables.

use std::time::Duration;

use crate::error::{TaskliveError, TaskliveResult};

/// Configuration for registries, dispatcher and stream handling.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Maximum simultaneous connections (tabs/devices) per user. The
    /// oldest connection is evicted when the cap is exceeded.
    pub max_connections_per_user: usize,

    /// Budget for a single event write to one connection. Writes that
    /// exceed it mark the connection dead.
    pub write_timeout: Duration,

    /// Interval between `heartbeat` control events on each stream.
    pub heartbeat_interval: Duration,

    /// Capacity of the per-connection outbound buffer. A connection whose
    /// buffer stays full for a whole write timeout is considered hung.
    pub stream_buffer: usize,

    /// Whether the diagnostic endpoints are mounted. Disabled when
    /// `TASKLIVE_ENV=production`.
    pub expose_diagnostics: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_connections_per_user: 3,
            write_timeout: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(30),
            stream_buffer: 32,
            expose_diagnostics: true,
        }
    }
}

impl RealtimeConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `TASKLIVE_MAX_CONNECTIONS`,
    /// `TASKLIVE_WRITE_TIMEOUT_MS`, `TASKLIVE_HEARTBEAT_SECS`,
    /// `TASKLIVE_STREAM_BUFFER`, `TASKLIVE_ENV`. Malformed values are
    /// rejected rather than silently ignored.
    pub fn from_env() -> TaskliveResult<Self> {
        let mut config = Self::default();

        if let Some(cap) = env_parse::<usize>("TASKLIVE_MAX_CONNECTIONS")? {
            config.max_connections_per_user = cap.max(1);
        }
        if let Some(ms) = env_parse::<u64>("TASKLIVE_WRITE_TIMEOUT_MS")? {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("TASKLIVE_HEARTBEAT_SECS")? {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(size) = env_parse::<usize>("TASKLIVE_STREAM_BUFFER")? {
            config.stream_buffer = size.max(1);
        }
        if let Ok(env) = std::env::var("TASKLIVE_ENV") {
            config.expose_diagnostics = !env.eq_ignore_ascii_case("production");
        }

        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> TaskliveResult<Option<T>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|_| {
        TaskliveError::config(format!("{} has unparseable value '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.max_connections_per_user, 3);
        assert_eq!(config.write_timeout, Duration::from_millis(500));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(config.expose_diagnostics);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("TASKLIVE_TEST_GARBAGE", "not-a-number");
        let result = env_parse::<u64>("TASKLIVE_TEST_GARBAGE");
        assert!(result.is_err());
        std::env::remove_var("TASKLIVE_TEST_GARBAGE");
    }
}

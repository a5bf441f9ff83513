//! Application-level configuration loading: timers, queue sizes and limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CONNECT_FOUR_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How long a player waits for a human opponent before the bot steps in.
    pub matchmaking_timeout: Duration,
    /// Pause before the bot answers a human move.
    pub bot_move_delay: Duration,
    /// Period of the disconnect watchdog.
    pub watchdog_interval: Duration,
    /// Silence after which a side is considered gone.
    pub inactivity_timeout: Duration,
    /// Read deadline on a socket; refreshed by every inbound frame.
    pub pong_wait: Duration,
    /// Interval between keepalive pings. Must stay below [`Self::pong_wait`]
    /// and [`Self::inactivity_timeout`].
    pub ping_interval: Duration,
    /// Upper bound on a single socket write.
    pub write_wait: Duration,
    /// Capacity of each session's outbound queue.
    pub outbound_capacity: usize,
    /// Capacity of the analytics event queue.
    pub event_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), ?config, "loaded configuration");
                    config
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            matchmaking_timeout: Duration::from_secs(10),
            bot_move_delay: Duration::from_millis(500),
            watchdog_interval: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(30),
            pong_wait: Duration::from_secs(60),
            ping_interval: Duration::from_secs(25),
            write_wait: Duration::from_secs(10),
            outbound_capacity: 256,
            event_capacity: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
/// JSON representation of the configuration file; every field is optional
/// and durations are expressed in milliseconds.
struct RawConfig {
    matchmaking_timeout_ms: Option<u64>,
    bot_move_delay_ms: Option<u64>,
    watchdog_interval_ms: Option<u64>,
    inactivity_timeout_ms: Option<u64>,
    pong_wait_ms: Option<u64>,
    ping_interval_ms: Option<u64>,
    write_wait_ms: Option<u64>,
    outbound_capacity: Option<usize>,
    event_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let millis = |raw: Option<u64>, fallback: Duration| {
            raw.map(Duration::from_millis).unwrap_or(fallback)
        };

        let pong_wait = millis(value.pong_wait_ms, defaults.pong_wait);
        let inactivity_timeout = millis(value.inactivity_timeout_ms, defaults.inactivity_timeout);
        let mut ping_interval = millis(value.ping_interval_ms, defaults.ping_interval);
        let ceiling = pong_wait.min(inactivity_timeout);
        if ping_interval >= ceiling {
            warn!(
                ?ping_interval,
                ?pong_wait,
                ?inactivity_timeout,
                "ping interval must be shorter than pong wait and inactivity timeout; clamping"
            );
            ping_interval = ceiling * 9 / 10;
        }
        let ping_interval = ping_interval.max(Duration::from_millis(1));

        Self {
            matchmaking_timeout: millis(value.matchmaking_timeout_ms, defaults.matchmaking_timeout),
            bot_move_delay: millis(value.bot_move_delay_ms, defaults.bot_move_delay),
            watchdog_interval: millis(value.watchdog_interval_ms, defaults.watchdog_interval)
                .max(Duration::from_millis(1)),
            inactivity_timeout,
            pong_wait,
            ping_interval,
            write_wait: millis(value.write_wait_ms, defaults.write_wait),
            outbound_capacity: value
                .outbound_capacity
                .unwrap_or(defaults.outbound_capacity)
                .max(1),
            event_capacity: value
                .event_capacity
                .unwrap_or(defaults.event_capacity)
                .max(1),
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
    fn empty_file_yields_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(AppConfig::from(raw), AppConfig::default());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"matchmakingTimeoutMs": 2500, "eventCapacity": 8}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.matchmaking_timeout, Duration::from_millis(2500));
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(30));
    }

    #[test]
    fn ping_interval_is_clamped_below_pong_wait() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"pongWaitMs": 1000, "pingIntervalMs": 5000}"#).unwrap();
        let config = AppConfig::from(raw);
        assert!(config.ping_interval < config.pong_wait);
    }

    #[test]
    fn ping_interval_is_clamped_below_inactivity_timeout() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"inactivityTimeoutMs": 10000, "pingIntervalMs": 20000}"#)
                .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.ping_interval, Duration::from_secs(9));
        assert!(config.ping_interval < config.pong_wait);
    }

    #[test]
    fn default_pings_refresh_activity_before_forfeit() {
        let config = AppConfig::default();
        assert!(config.ping_interval < config.inactivity_timeout);
        assert!(config.ping_interval < config.pong_wait);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<RawConfig>(r#"{"colors": []}"#).is_err());
    }
}

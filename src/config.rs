//! Engine configuration loading and defaults.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse the config file.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration.
///
/// Only `url` and `nickname` are required; everything else defaults to
/// the reference deployment's server-mandated values.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// WebSocket URL of the chat server, e.g. `wss://irc-ws.chat.example.net`.
    pub url: String,
    /// Nickname to register with.
    pub nickname: String,
    /// Opaque auth token sent via PASS; `None` for anonymous connections.
    #[serde(default)]
    pub token: Option<String>,
    /// Capabilities to request with `CAP REQ`. Empty skips negotiation.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Rate limit settings.
    #[serde(default)]
    pub limits: RateLimitConfig,
    /// Timer settings.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Reconnect policy settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl EngineConfig {
    /// Minimal configuration for the given server and nickname.
    pub fn new(url: impl Into<String>, nickname: impl Into<String>) -> Self {
        EngineConfig {
            url: url.into(),
            nickname: nickname.into(),
            token: None,
            capabilities: Vec::new(),
            limits: RateLimitConfig::default(),
            timing: TimingConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Sliding-window rate limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Max chat messages per message window.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    /// Message window, in seconds.
    #[serde(default = "default_message_window_secs")]
    pub message_window_secs: u64,
    /// Max channel joins/parts per join window.
    #[serde(default = "default_join_limit")]
    pub join_limit: usize,
    /// Join window, in seconds.
    #[serde(default = "default_join_window_secs")]
    pub join_window_secs: u64,
    /// Cap on each pending outbound queue; enqueueing past it is rejected.
    #[serde(default = "default_queue_cap")]
    pub queue_cap: usize,
}

impl RateLimitConfig {
    /// The message window as a duration.
    pub fn message_window(&self) -> Duration {
        Duration::from_secs(self.message_window_secs)
    }

    /// The join window as a duration.
    pub fn join_window(&self) -> Duration {
        Duration::from_secs(self.join_window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            message_limit: default_message_limit(),
            message_window_secs: default_message_window_secs(),
            join_limit: default_join_limit(),
            join_window_secs: default_join_window_secs(),
            queue_cap: default_queue_cap(),
        }
    }
}

/// Timer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Interval between outbound queue drain attempts, in milliseconds.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Client-initiated keepalive PING interval, in seconds.
    ///
    /// `None` relies on the server pinging us, which the reference
    /// deployment does.
    #[serde(default)]
    pub keepalive_secs: Option<u64>,
    /// Deadline for auth confirmation after the transport opens, in seconds.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

impl TimingConfig {
    /// The drain tick interval as a duration.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// The keepalive interval as a duration, if enabled.
    pub fn keepalive(&self) -> Option<Duration> {
        self.keepalive_secs.map(Duration::from_secs)
    }

    /// The auth deadline as a duration.
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            drain_interval_ms: default_drain_interval_ms(),
            keepalive_secs: None,
            auth_timeout_secs: default_auth_timeout_secs(),
        }
    }
}

/// Reconnect policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any computed delay, in seconds.
    #[serde(default = "default_cap_delay_secs")]
    pub cap_delay_secs: u64,
    /// Retry attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl ReconnectConfig {
    /// The base delay as a duration.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// The delay cap as a duration.
    pub fn cap_delay(&self) -> Duration {
        Duration::from_secs(self.cap_delay_secs)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            base_delay_ms: default_base_delay_ms(),
            cap_delay_secs: default_cap_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_message_limit() -> usize {
    20
}

fn default_message_window_secs() -> u64 {
    30
}

fn default_join_limit() -> usize {
    50
}

fn default_join_window_secs() -> u64 {
    15
}

fn default_queue_cap() -> usize {
    128
}

fn default_drain_interval_ms() -> u64 {
    500
}

fn default_auth_timeout_secs() -> u64 {
    15
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_cap_delay_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_server_defaults() {
        let config = EngineConfig::new("wss://chat.example.net", "bot");
        assert_eq!(config.limits.message_limit, 20);
        assert_eq!(config.limits.message_window(), Duration::from_secs(30));
        assert_eq!(config.limits.join_limit, 50);
        assert_eq!(config.limits.join_window(), Duration::from_secs(15));
        assert_eq!(config.limits.queue_cap, 128);
        assert_eq!(config.timing.keepalive(), None);
        assert_eq!(config.reconnect.base_delay(), Duration::from_millis(1000));
        assert_eq!(config.reconnect.max_attempts, 8);
    }

    #[test]
    fn toml_partial_override() {
        let raw = r#"
            url = "wss://chat.example.net"
            nickname = "bot"
            token = "opaque-token"
            capabilities = ["message-tags"]

            [limits]
            message_limit = 5

            [reconnect]
            max_attempts = 3
        "#;
        let config: EngineConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.token.as_deref(), Some("opaque-token"));
        assert_eq!(config.limits.message_limit, 5);
        assert_eq!(config.limits.message_window_secs, 30);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.timing.drain_interval(), Duration::from_millis(500));
    }
}

//! Stream Client Settings
//!
//! Configuration types for one streaming session, loaded from environment
//! variables with typed parse helpers and sensible defaults.

use std::time::Duration;

/// API credential for the stream server.
///
/// Accepted at construction and held for a future authentication handshake;
/// the current protocol does not place it into any outbound frame. Debug
/// output is redacted so the credential never lands in logs.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is empty: a session without a
    /// usable credential is a configuration error, not a connection error.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ConfigError::EmptyValue("credential".to_string()));
        }
        Ok(Self(value))
    }

    /// The credential value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Keep-alive ping interval.
    pub heartbeat_interval: Duration,
    /// Keep-alive probe timeout before the connection is considered dead.
    pub heartbeat_timeout: Duration,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Jitter fraction applied to the reconnect delay (0 = none).
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before the session gives up.
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Internal channel capacities.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Capacity of the outbound wire-request channel.
    pub wire_capacity: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self { wire_capacity: 64 }
    }
}

/// Complete configuration for one streaming session.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket URL of the stream server.
    pub ws_url: String,
    /// API credential.
    pub credential: Credential,
    /// Connection settings.
    pub websocket: WebSocketSettings,
    /// Channel capacities.
    pub channels: ChannelSettings,
}

/// Default stream server URL.
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8765";

impl StreamSettings {
    /// Create settings with defaults for everything but the endpoint and
    /// credential.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or non-WebSocket URL.
    pub fn new(ws_url: impl Into<String>, credential: Credential) -> Result<Self, ConfigError> {
        let ws_url = ws_url.into();
        validate_url(&ws_url)?;

        Ok(Self {
            ws_url,
            credential,
            websocket: WebSocketSettings::default(),
            channels: ChannelSettings::default(),
        })
    }

    /// Create settings from environment variables.
    ///
    /// Required: `OPENALGO_API_KEY`. Optional: `OPENALGO_WS_URL` (default
    /// `ws://127.0.0.1:8765`) plus `STREAM_CLIENT_*` overrides for
    /// heartbeat and reconnection behavior.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is missing or empty, or the URL
    /// is not a WebSocket URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENALGO_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENALGO_API_KEY".to_string()))?;
        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("OPENALGO_API_KEY".to_string()));
        }

        let ws_url =
            std::env::var("OPENALGO_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        validate_url(&ws_url)?;

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            heartbeat_interval: parse_env_duration_secs(
                "STREAM_CLIENT_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "STREAM_CLIENT_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout,
            ),
            reconnect_delay: parse_env_duration_secs(
                "STREAM_CLIENT_RECONNECT_DELAY_SECS",
                defaults.reconnect_delay,
            ),
            reconnect_jitter: parse_env_f64(
                "STREAM_CLIENT_RECONNECT_JITTER",
                defaults.reconnect_jitter,
            ),
            max_reconnect_attempts: parse_env_u32(
                "STREAM_CLIENT_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let channels = ChannelSettings {
            wire_capacity: parse_env_usize(
                "STREAM_CLIENT_WIRE_CAPACITY",
                ChannelSettings::default().wire_capacity,
            ),
        };

        Ok(Self {
            ws_url,
            credential: Credential::new(api_key)?,
            websocket,
            channels,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A value that must be non-empty is empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),

    /// The stream URL is not a WebSocket URL.
    #[error("invalid stream URL: {0}")]
    InvalidUrl(String),
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

//! Link configuration parameters
//!
//! All tunable parameters for the controller-side link engine.
//! Defaults match the gateway firmware; values can be overridden from a
//! JSON file (see [`LinkConfig::from_json`]).

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};

/// TCP port the gateway's Wi-Fi bridge listens on unless told otherwise.
pub const GATEWAY_DEFAULT_TCP_PORT: u16 = 3333;

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- Timeouts ---
    /// Maximum time `connect` waits for the transport to open (milliseconds)
    pub connect_timeout_ms: u64,
    /// Maximum time `send` waits for the write to complete (milliseconds)
    pub send_timeout_ms: u64,

    // --- Read loop ---
    /// How long one stream read blocks before the loop re-checks for stop (milliseconds)
    pub read_poll_ms: u64,
    /// Bytes requested per stream read
    pub read_chunk_size: usize,

    // --- Gateway defaults ---
    /// Port sent with `wifi_connect` when the caller gives none
    pub default_tcp_port: u16,
    /// Serial line rate for RFCOMM / USB-serial transports
    pub baud_rate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Timeouts
            connect_timeout_ms: 10_000,
            send_timeout_ms: 3_000,

            // Read loop
            read_poll_ms: 50,
            read_chunk_size: 512,

            // Gateway defaults
            default_tcp_port: GATEWAY_DEFAULT_TCP_PORT,
            baud_rate: 115_200,
        }
    }
}

impl LinkConfig {
    /// Parse and validate a JSON document.  Missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the link engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("connect_timeout_ms must be > 0"));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("send_timeout_ms must be > 0"));
        }
        if self.read_poll_ms == 0 || self.read_poll_ms >= self.send_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "read_poll_ms must be > 0 and below send_timeout_ms",
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed("read_chunk_size must be > 0"));
        }
        if self.default_tcp_port == 0 {
            return Err(ConfigError::ValidationFailed("default_tcp_port must be > 0"));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be > 0"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }
}

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

/// Errors from loading or validating a [`LinkConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    Malformed,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "config is not valid JSON"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

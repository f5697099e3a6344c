//! Client configuration for the session core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunable endpoints and timings for one interview client.
///
/// All durations are stored as plain integers so the struct round-trips
/// through TOML untouched; use the accessor methods to get [`Duration`]s.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Duplex channel endpoint.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// One-shot scoring endpoint invoked at session end.
    #[serde(default = "default_results_url")]
    pub results_url: String,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Reconnect attempts allowed per outage before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Minimum spacing between speech-engine restarts.
    #[serde(default = "default_restart_debounce_ms")]
    pub restart_debounce_ms: u64,
    /// Delay before retrying the engine after a recoverable error.
    #[serde(default = "default_capture_retry_delay_ms")]
    pub capture_retry_delay_ms: u64,
    /// Grace window between clock expiry and session end, long enough for
    /// a final interviewer reply to arrive.
    #[serde(default = "default_expiry_grace_secs")]
    pub expiry_grace_secs: u64,
    /// Keepalive ping interval; `None` disables pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: Option<u64>,
}

fn default_server_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_results_url() -> String {
    "http://localhost:8000/api/v1/interview/end".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_max_reconnect_attempts() -> u32 {
    20
}

fn default_restart_debounce_ms() -> u64 {
    100
}

fn default_capture_retry_delay_ms() -> u64 {
    300
}

fn default_expiry_grace_secs() -> u64 {
    3
}

fn default_ping_interval_secs() -> Option<u64> {
    Some(25)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            results_url: default_results_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            restart_debounce_ms: default_restart_debounce_ms(),
            capture_retry_delay_ms: default_capture_retry_delay_ms(),
            expiry_grace_secs: default_expiry_grace_secs(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the document is not valid TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn restart_debounce(&self) -> Duration {
        Duration::from_millis(self.restart_debounce_ms)
    }

    pub fn capture_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture_retry_delay_ms)
    }

    pub fn expiry_grace(&self) -> Duration {
        Duration::from_secs(self.expiry_grace_secs)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_secs.map(Duration::from_secs)
    }
}

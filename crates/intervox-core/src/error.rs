//! Error types for the Intervox session core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the session core.
///
/// Recoverable conditions (lost connections, capture hiccups) are contained
/// inside their owning component and surfaced as state; the variants here
/// are what command callers and capability implementations see. Nothing in
/// this taxonomy is fatal to the process.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum IntervoxError {
    /// A send was attempted while the channel was not connected.
    /// The message is dropped; this core does no outbound buffering.
    #[error("channel is not connected; message dropped")]
    NotConnected,

    /// The underlying transport failed to connect, send or close.
    #[error("transport error: {0}")]
    Transport(String),

    /// The speech-recognition engine failed to start or stop.
    #[error("speech capture error: {0}")]
    Capture(String),

    /// An inbound envelope could not be decoded. Logged and discarded by
    /// the channel; never crashes the coordinator.
    #[error("malformed inbound envelope: {0}")]
    MalformedEnvelope(String),

    /// The end-of-interview scoring call failed.
    #[error("scoring request failed: {0}")]
    Scoring(String),

    /// Serialization/deserialization error
    #[error("serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntervoxError {
    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Capture error
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means a message was dropped rather than failed.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Check if this is a transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for IntervoxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for IntervoxError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for IntervoxError {
    fn from(err: reqwest::Error) -> Self {
        Self::Scoring(err.to_string())
    }
}

/// A type alias for `Result<T, IntervoxError>`.
pub type Result<T> = std::result::Result<T, IntervoxError>;

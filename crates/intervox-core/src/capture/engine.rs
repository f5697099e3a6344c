//! Capability interface over a continuous speech-recognition engine.

use async_trait::async_trait;

use crate::error::Result;

/// Error codes reported by a speech-recognition engine.
///
/// The set mirrors the engines the client is expected to drive; codes the
/// core does not know are carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorCode {
    NoSpeech,
    AudioCapture,
    NotAllowed,
    Network,
    Aborted,
    Other(String),
}

impl EngineErrorCode {
    /// Maps an engine's raw error string onto the known codes.
    pub fn from_engine(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the controller should retry capture after this error.
    ///
    /// Silence and transient device loss recover on their own; permission
    /// denials and deliberate aborts do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::AudioCapture)
    }
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::Network => write!(f, "network"),
            Self::Aborted => write!(f, "aborted"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Events surfaced by a speech-recognition engine.
///
/// Implementations push these into the channel handed to
/// [`CaptureController::new`](super::CaptureController::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine is listening.
    Started,
    /// A partial recognition result; superseded by the next one.
    Interim { text: String },
    /// A finalized recognition result.
    Final { text: String },
    /// The engine failed; see the code for whether capture can recover.
    Error { code: EngineErrorCode },
    /// The engine terminated on its own.
    Ended,
}

/// An injected continuous speech-recognition capability.
///
/// The core never constructs an engine itself; production code adapts a
/// platform recognizer behind this trait and tests substitute a fake.
/// Implementations must emit [`EngineEvent::Started`] once listening and
/// [`EngineEvent::Ended`] when recognition terminates for any reason other
/// than an error.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Begins continuous recognition.
    async fn start(&self) -> Result<()>;

    /// Stops recognition. Idempotent.
    async fn stop(&self);
}

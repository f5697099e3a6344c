//! Speech-capture lifecycle.
//!
//! The speech-recognition engine itself is an injected capability
//! ([`SpeechEngine`]); this module owns its start/stop/restart lifecycle
//! and keeps the continuous-listening illusion alive over an engine that
//! periodically terminates on its own.

mod controller;
mod engine;

pub use controller::{CaptureController, CaptureEvent, CaptureState, CaptureStatus};
pub use engine::{EngineErrorCode, EngineEvent, SpeechEngine};

//! Session domain module.
//!
//! This module contains the transcript types, the session state models and
//! the coordinator that merges all three event producers (channel, speech
//! capture, clock) into one canonical session state.
//!
//! # Module Structure
//!
//! - `message`: transcript content types (`Utterance`, `Speaker`, ...)
//! - `transcript`: the ordered, deduplicated transcript
//! - `model`: session state types (`SessionPhase`, `SessionSnapshot`, ...)
//! - `coordinator`: the central state machine (`SessionCoordinator`)

mod coordinator;
mod message;
mod model;
mod transcript;

// Re-export public API
pub use coordinator::{SessionCommand, SessionCoordinator, SessionHandle};
pub use message::{Origin, Speaker, Utterance, UtteranceKind};
pub use model::{InterviewOutcome, InterviewSettings, SessionPhase, SessionSnapshot};
pub use transcript::Transcript;

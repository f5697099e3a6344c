//! Session state models.

use intervox_types::{Difficulty, Feedback, Problem};
use serde::{Deserialize, Serialize};

use super::message::Utterance;
use crate::capture::CaptureState;
use crate::channel::ConnectionStatus;

/// Interview lifecycle phase.
///
/// `Active` is the liveness signal every retry loop in the system checks
/// at the moment it fires; once the phase leaves `Active`, no reconnect
/// or capture restart may happen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    NotStarted,
    Active,
    Ended,
}

/// Interview setup chosen before the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSettings {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub time_limit_secs: u32,
}

/// A read-only view of the whole session, published after every state
/// transition for presentation adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub transcript: Vec<Utterance>,
    /// The code under edit, as of the last `update_code`.
    pub code: String,
    pub remaining_secs: u32,
    pub connection: ConnectionStatus,
    pub capture: CaptureState,
    pub problem: Option<Problem>,
    pub settings: Option<InterviewSettings>,
    /// Present once the scoring collaborator has replied after session end.
    pub feedback: Option<Feedback>,
    /// Last recoverable failure, surfaced as status rather than an error.
    pub last_error: Option<String>,
}

/// The frozen result of one session, handed to the results collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewOutcome {
    pub problem: Option<Problem>,
    pub code: String,
    pub transcript: Vec<Utterance>,
    pub elapsed_seconds: u64,
    pub feedback: Option<Feedback>,
}

//! Transcript content types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// The local participant.
    Candidate,
    /// The remote participant.
    Interviewer,
}

/// How an utterance entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Typed,
    Spoken,
}

/// Optional classification of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceKind {
    Question,
    Hint,
    Clarification,
    Feedback,
    /// A client-synthesized announcement, e.g. the time's-up message.
    Notice,
}

impl UtteranceKind {
    /// Maps the server's `messageType` field onto a kind.
    pub fn from_message_type(message_type: Option<&str>) -> Option<Self> {
        match message_type? {
            "question" => Some(Self::Question),
            "hint" => Some(Self::Hint),
            "clarification" => Some(Self::Clarification),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// One atomic unit of transcript content. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Opaque unique token, generated client-side.
    pub id: String,
    pub speaker: Speaker,
    pub text: String,
    /// Ordering key: the authoritative server timestamp when present,
    /// else the local enqueue time.
    pub occurred_at: DateTime<Utc>,
    pub origin: Origin,
    #[serde(default)]
    pub kind: Option<UtteranceKind>,
}

impl Utterance {
    fn new(
        speaker: Speaker,
        text: impl Into<String>,
        occurred_at: DateTime<Utc>,
        origin: Origin,
        kind: Option<UtteranceKind>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            speaker,
            text: text.into(),
            occurred_at,
            origin,
            kind,
        }
    }

    /// A message the candidate typed just now.
    pub fn candidate_typed(text: impl Into<String>) -> Self {
        Self::new(Speaker::Candidate, text, Utc::now(), Origin::Typed, None)
    }

    /// A finalized speech result from the candidate.
    pub fn candidate_spoken(text: impl Into<String>) -> Self {
        Self::new(Speaker::Candidate, text, Utc::now(), Origin::Spoken, None)
    }

    /// An interviewer message, stamped with the server's timestamp.
    pub fn interviewer(
        text: impl Into<String>,
        kind: Option<UtteranceKind>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(Speaker::Interviewer, text, occurred_at, Origin::Typed, kind)
    }

    /// A client-synthesized notice shown and forwarded as a normal chat
    /// message.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(
            Speaker::Candidate,
            text,
            Utc::now(),
            Origin::Typed,
            Some(UtteranceKind::Notice),
        )
    }
}

/// Parses the server's ISO-8601 timestamps.
///
/// The service emits `datetime.now().isoformat()` without a timezone
/// offset, so both offset and naive forms are accepted.
pub(crate) fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_naive_and_offset_timestamps() {
        assert!(parse_server_timestamp("2025-01-01T10:30:00.123456").is_some());
        assert!(parse_server_timestamp("2025-01-01T10:30:00+00:00").is_some());
        assert!(parse_server_timestamp("2025-01-01T10:30:00").is_some());
        assert!(parse_server_timestamp("not a timestamp").is_none());
    }

    #[test]
    fn message_type_mapping() {
        assert_eq!(
            UtteranceKind::from_message_type(Some("hint")),
            Some(UtteranceKind::Hint)
        );
        assert_eq!(UtteranceKind::from_message_type(Some("response")), None);
        assert_eq!(UtteranceKind::from_message_type(None), None);
    }

    #[test]
    fn utterances_get_unique_ids() {
        let a = Utterance::candidate_typed("one");
        let b = Utterance::candidate_typed("one");
        assert_ne!(a.id, b.id);
    }
}

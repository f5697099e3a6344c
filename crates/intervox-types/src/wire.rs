//! Wire envelopes for the duplex interview channel.
//!
//! Field names follow the server's JSON protocol verbatim (`codeContext`,
//! `isFinal`, tagged `type`), so these types serialize straight onto the
//! socket without an adaptation layer.

use serde::{Deserialize, Serialize};

/// A single outbound message from the client to the interview service.
///
/// Every content-bearing envelope carries `code_context`: the candidate's
/// editor contents at the moment the envelope is transmitted. The channel
/// stamps this field at send time; callers never fill it in themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    /// A typed chat message.
    Chat {
        message: String,
        #[serde(rename = "codeContext")]
        code_context: String,
    },
    /// A spoken utterance, interim or final.
    Speech {
        data: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
        #[serde(rename = "codeContext")]
        code_context: String,
    },
    /// Keepalive probe; the server answers with `pong`.
    Ping,
}

/// Where a `user_message` echo originated on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechSource {
    Speech,
    Text,
}

/// A single inbound message from the interview service.
///
/// Timestamps arrive as ISO-8601 strings. The server emits them without a
/// timezone offset, so they are kept as strings here and parsed leniently
/// by the transcript merge logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// Echo of the client's own chat or speech send.
    UserMessage {
        message: String,
        timestamp: String,
        #[serde(default)]
        source: Option<SpeechSource>,
    },
    /// An interviewer utterance.
    AiMessage {
        message: String,
        timestamp: String,
        #[serde(default, rename = "messageType")]
        message_type: Option<String>,
    },
    /// Echo of an interim speech result; display-only.
    InterimSpeech {
        message: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// Keepalive acknowledgement.
    Pong,
}

//! Shared protocol-facing types for the Intervox interview client.
//!
//! This crate holds the types that cross the process boundary: the wire
//! envelopes exchanged over the duplex channel, the `Problem` entity the
//! app shell injects at interview start, and the `Feedback` evaluation
//! returned by the scoring endpoint at session end.
//!
//! Domain types that never leave the client (utterances, transcript,
//! session state) live in `intervox-core`.

pub mod feedback;
pub mod problem;
pub mod wire;

pub use feedback::{Feedback, Recommendation};
pub use problem::{Difficulty, Problem};
pub use wire::{ClientEnvelope, ServerEnvelope, SpeechSource};

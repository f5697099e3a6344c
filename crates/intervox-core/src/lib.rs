//! Session core for live voice-and-text mock interviews.
//!
//! The hard problem this crate solves is not rendering but keeping one
//! coherent session state consistent across three independent,
//! failure-prone producers: a continuous speech-recognition engine, a
//! duplex network channel and local user actions (typed messages, code
//! edits, timers).
//!
//! The moving parts, leaf first:
//!
//! - [`clock::Clock`]: one-second countdown with a one-shot expiry.
//! - [`capture::CaptureController`]: owns an injected speech engine's
//!   start/stop/restart lifecycle.
//! - [`channel::Channel`]: one logical duplex connection with a
//!   reconnection policy, over an injected transport.
//! - [`session::SessionCoordinator`]: the central state machine that
//!   merges everything into one canonical transcript.
//!
//! The recognition engine, the transport and the results collaborator are
//! all capability traits injected at construction, so the whole core runs
//! against fakes in tests.

pub mod capture;
pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod results;
pub mod session;

// Re-export common error type
pub use error::{IntervoxError, Result};

//! Capability interface over a duplex transport.

use async_trait::async_trait;

use crate::error::Result;

/// Events surfaced by a transport connection.
///
/// Implementations push these into the channel handed to
/// [`Channel::new`](super::Channel::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and writable.
    Opened,
    /// A raw inbound frame.
    Message(String),
    /// The connection closed, cleanly or not.
    Closed,
    /// A transport-level failure; usually followed by `Closed`.
    Error(String),
}

/// An injected socket-like transport.
///
/// The core never constructs a transport itself; production code adapts a
/// concrete socket behind this trait and tests substitute a fake.
/// Implementations must emit [`TransportEvent::Opened`] once a `connect`
/// succeeds and [`TransportEvent::Closed`] when the connection drops.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the connection.
    async fn connect(&self) -> Result<()>;

    /// Writes one frame. Only valid while open.
    async fn send(&self, payload: String) -> Result<()>;

    /// Closes the connection. Idempotent.
    async fn close(&self);
}

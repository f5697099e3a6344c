//! The duplex channel to the interview service, with reconnection.

mod transport;

pub use transport::{Transport, TransportEvent};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use intervox_types::wire::{ClientEnvelope, ServerEnvelope};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::{IntervoxError, Result};
use crate::session::SessionPhase;

/// Connection status, owned exclusively by the channel.
///
/// Observers read it through [`Channel::subscribe_status`]; only the
/// channel itself transitions it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events the channel forwards to the session coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Inbound(ServerEnvelope),
    Closed,
    Error(String),
}

/// A content-bearing outbound message.
///
/// The code context is deliberately absent here: the channel stamps the
/// freshest editor snapshot onto the envelope at transmission time, so a
/// send requested before an edit still carries the post-edit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Chat { message: String },
    Speech { text: String, is_final: bool },
}

/// One logical duplex connection with a fixed-interval reconnection policy.
///
/// On an unexpected close while the session is Active the channel
/// schedules exactly one retry; the retry re-checks session liveness when
/// its delay elapses and gives up once the session has ended or the
/// attempt cap is reached. A user-initiated [`close`](Channel::close)
/// cancels any pending retry outright.
pub struct Channel {
    shared: Arc<ChannelShared>,
    pump: JoinHandle<()>,
}

struct ChannelShared {
    /// Session-scoped identity, fixed at construction.
    session_id: String,
    transport: Arc<dyn Transport>,
    status: watch::Sender<ConnectionStatus>,
    /// Live view of the editor contents, read at send time.
    code: watch::Receiver<String>,
    /// Live view of the session phase, read at retry-fire time.
    phase: watch::Receiver<SessionPhase>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    retry: Mutex<Option<JoinHandle<()>>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    attempts: AtomicU32,
    /// Set by `close()`; a closed channel never reconnects.
    closed_by_user: AtomicBool,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    ping_interval: Option<Duration>,
}

impl Channel {
    /// Wires a channel around an injected transport.
    ///
    /// `transport_events` is the stream the transport implementation
    /// pushes into; `code` and `phase` are live views owned by the
    /// coordinator.
    pub fn new(
        session_id: String,
        transport: Arc<dyn Transport>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        code: watch::Receiver<String>,
        phase: watch::Receiver<SessionPhase>,
        events: mpsc::UnboundedSender<ChannelEvent>,
        config: &ClientConfig,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let shared = Arc::new(ChannelShared {
            session_id,
            transport,
            status,
            code,
            phase,
            events,
            retry: Mutex::new(None),
            keepalive: Mutex::new(None),
            attempts: AtomicU32::new(0),
            closed_by_user: AtomicBool::new(false),
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            ping_interval: config.ping_interval(),
        });
        let pump = tokio::spawn(Arc::clone(&shared).pump(transport_events));
        Self { shared, pump }
    }

    /// Opens the connection. Idempotent: a call while Connecting or
    /// Connected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the dial fails; a retry is still
    /// scheduled when the session is Active.
    pub async fn connect(&self) -> Result<()> {
        self.shared.closed_by_user.store(false, Ordering::SeqCst);
        ChannelShared::try_connect(&self.shared).await
    }

    /// Sends one message, stamping the current code snapshot onto the
    /// envelope at this moment.
    ///
    /// # Errors
    ///
    /// `NotConnected` while the channel is not Connected; the message is
    /// dropped, not buffered.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        if *self.shared.status.borrow() != ConnectionStatus::Connected {
            return Err(IntervoxError::NotConnected);
        }
        let code_context = self.shared.code.borrow().clone();
        let envelope = match message {
            OutboundMessage::Chat { message } => ClientEnvelope::Chat {
                message,
                code_context,
            },
            OutboundMessage::Speech { text, is_final } => ClientEnvelope::Speech {
                data: text,
                is_final,
                code_context,
            },
        };
        self.shared.transport.send(serde_json::to_string(&envelope)?).await
    }

    /// Closes the connection and cancels any pending retry and keepalive.
    pub async fn close(&self) {
        self.shared.closed_by_user.store(true, Ordering::SeqCst);
        self.shared.cancel_retry();
        self.shared.cancel_keepalive();
        self.shared.transport.close().await;
        self.shared.status.send_replace(ConnectionStatus::Disconnected);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Live view of the connection status for observers.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.pump.abort();
        self.shared.cancel_retry();
        self.shared.cancel_keepalive();
    }
}

impl ChannelShared {
    async fn pump(self: Arc<Self>, mut transport_events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = transport_events.recv().await {
            match event {
                TransportEvent::Opened => Self::on_opened(&self),
                TransportEvent::Message(raw) => self.on_message(raw),
                TransportEvent::Closed => Self::on_closed(&self),
                TransportEvent::Error(message) => {
                    tracing::warn!(session_id = %self.session_id, "transport error: {message}");
                    let _ = self.events.send(ChannelEvent::Error(message));
                }
            }
        }
    }

    async fn try_connect(this: &Arc<Self>) -> Result<()> {
        let current = *this.status.borrow();
        if matches!(
            current,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return Ok(());
        }
        this.status.send_replace(ConnectionStatus::Connecting);
        match this.transport.connect().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(session_id = %this.session_id, "connect failed: {err}");
                Self::on_connect_lost(this);
                Err(err)
            }
        }
    }

    fn on_opened(this: &Arc<Self>) {
        this.cancel_retry();
        this.attempts.store(0, Ordering::SeqCst);
        this.status.send_replace(ConnectionStatus::Connected);
        tracing::info!(session_id = %this.session_id, "channel connected");
        let _ = this.events.send(ChannelEvent::Opened);
        Self::start_keepalive(this);
    }

    fn on_message(&self, raw: String) {
        match serde_json::from_str::<ServerEnvelope>(&raw) {
            Ok(envelope) => {
                let _ = self.events.send(ChannelEvent::Inbound(envelope));
            }
            Err(err) => {
                // Discarded, never fatal.
                tracing::warn!(
                    session_id = %self.session_id,
                    "discarding malformed inbound envelope: {err}"
                );
            }
        }
    }

    fn on_closed(this: &Arc<Self>) {
        this.cancel_keepalive();
        let _ = this.events.send(ChannelEvent::Closed);
        Self::on_connect_lost(this);
    }

    /// Shared tail of "the transport went away": reconnect while the
    /// session is Active, otherwise settle into Disconnected.
    fn on_connect_lost(this: &Arc<Self>) {
        if this.closed_by_user.load(Ordering::SeqCst)
            || *this.phase.borrow() != SessionPhase::Active
        {
            this.status.send_replace(ConnectionStatus::Disconnected);
            return;
        }
        this.status.send_replace(ConnectionStatus::Reconnecting);
        Self::schedule_retry(this);
    }

    /// Schedules at most one retry per closure.
    fn schedule_retry(this: &Arc<Self>) {
        let mut retry = this.retry.lock().unwrap();
        if retry.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let attempt = this.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > this.max_reconnect_attempts {
            tracing::warn!(
                session_id = %this.session_id,
                "giving up after {} reconnect attempts",
                this.max_reconnect_attempts
            );
            this.status.send_replace(ConnectionStatus::Disconnected);
            return;
        }

        tracing::debug!(
            session_id = %this.session_id,
            "scheduling reconnect attempt {attempt} in {:?}",
            this.reconnect_delay
        );
        let shared = Arc::clone(this);
        *retry = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.reconnect_delay).await;
            // Release our own slot so a failed attempt can reschedule.
            *shared.retry.lock().unwrap() = None;

            // Liveness is checked now, not when the retry was scheduled.
            if shared.closed_by_user.load(Ordering::SeqCst)
                || *shared.phase.borrow() != SessionPhase::Active
            {
                shared.status.send_replace(ConnectionStatus::Disconnected);
                return;
            }
            shared.status.send_replace(ConnectionStatus::Connecting);
            if let Err(err) = shared.transport.connect().await {
                tracing::warn!(session_id = %shared.session_id, "reconnect failed: {err}");
                shared.status.send_replace(ConnectionStatus::Reconnecting);
                Self::schedule_retry(&shared);
            }
        }));
    }

    fn cancel_retry(&self) {
        if let Some(handle) = self.retry.lock().unwrap().take() {
            handle.abort();
        }
    }

    fn start_keepalive(this: &Arc<Self>) {
        let Some(interval) = this.ping_interval else {
            return;
        };
        let mut keepalive = this.keepalive.lock().unwrap();
        if keepalive.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let shared = Arc::clone(this);
        *keepalive = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if *shared.status.borrow() != ConnectionStatus::Connected {
                    break;
                }
                let payload = match serde_json::to_string(&ClientEnvelope::Ping) {
                    Ok(payload) => payload,
                    Err(_) => break,
                };
                if let Err(err) = shared.transport.send(payload).await {
                    tracing::debug!(session_id = %shared.session_id, "keepalive send failed: {err}");
                    break;
                }
            }
        }));
    }

    fn cancel_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().unwrap().take() {
            handle.abort();
        }
    }
}

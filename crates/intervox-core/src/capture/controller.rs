//! Speech-capture lifecycle controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::{EngineErrorCode, EngineEvent, SpeechEngine};
use crate::channel::ConnectionStatus;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::session::SessionPhase;

/// Lifecycle status of the capture controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Listening,
    Errored,
}

/// Observable capture state: status plus the transient interim text.
///
/// Interim text is display-only. It is overwritten on every partial
/// result and cleared when a final result lands or capture stops; it
/// never enters the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureState {
    pub status: CaptureStatus,
    pub interim_text: String,
}

/// Events the controller forwards to the session coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Listening,
    Interim { text: String },
    Final { text: String },
    Error { code: EngineErrorCode },
    Ended,
}

struct CaptureShared {
    /// True between `start()` and `stop()`; a pending auto-restart
    /// re-reads this after its delay, so `stop()` suppresses it.
    wants_capture: AtomicBool,
    state: watch::Sender<CaptureState>,
}

impl CaptureShared {
    fn set_status(&self, status: CaptureStatus) {
        self.state.send_modify(|state| state.status = status);
    }

    fn set_interim(&self, text: String) {
        self.state.send_modify(|state| state.interim_text = text);
    }

    fn clear_interim(&self) {
        self.state.send_modify(|state| state.interim_text.clear());
    }
}

/// Owns a [`SpeechEngine`]'s start/stop/restart lifecycle.
///
/// The engine terminates on its own every so often; the controller
/// restarts it to keep the continuous-listening illusion, but only while
/// the session is Active and the channel is Connected (both read live at
/// the moment of the restart, not when it was scheduled), and never more
/// often than the configured debounce spacing allows. An engine that fires
/// "ended" immediately after "start" therefore cannot create a tight
/// restart loop.
pub struct CaptureController {
    engine: Arc<dyn SpeechEngine>,
    shared: Arc<CaptureShared>,
    state_rx: watch::Receiver<CaptureState>,
    worker: JoinHandle<()>,
}

impl CaptureController {
    /// Wires a controller around an injected engine.
    ///
    /// `engine_events` is the stream the engine implementation pushes into;
    /// `phase` and `connection` are live views used as the restart guard.
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        phase: watch::Receiver<SessionPhase>,
        connection: watch::Receiver<ConnectionStatus>,
        events: mpsc::UnboundedSender<CaptureEvent>,
        config: &ClientConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(CaptureState::default());
        let shared = Arc::new(CaptureShared {
            wants_capture: AtomicBool::new(false),
            state: state_tx,
        });

        let worker = CaptureWorker {
            engine: Arc::clone(&engine),
            engine_events,
            phase,
            connection,
            events,
            shared: Arc::clone(&shared),
            restart_debounce: config.restart_debounce(),
            error_retry_delay: config.capture_retry_delay(),
            last_started: None,
        };
        let worker = tokio::spawn(worker.run());

        Self {
            engine,
            shared,
            state_rx,
            worker,
        }
    }

    /// Begins capture. No-op while already listening.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if recognition cannot start.
    pub async fn start(&self) -> Result<()> {
        if self.state().status == CaptureStatus::Listening {
            return Ok(());
        }
        self.shared.wants_capture.store(true, Ordering::SeqCst);
        self.engine.start().await
    }

    /// Stops capture, clears interim text and suppresses any pending
    /// auto-restart.
    pub async fn stop(&self) {
        self.shared.wants_capture.store(false, Ordering::SeqCst);
        self.engine.stop().await;
        self.shared.state.send_replace(CaptureState::default());
    }

    pub fn state(&self) -> CaptureState {
        self.state_rx.borrow().clone()
    }

    /// Live view of the capture state for presentation adapters.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state_rx.clone()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct CaptureWorker {
    engine: Arc<dyn SpeechEngine>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    phase: watch::Receiver<SessionPhase>,
    connection: watch::Receiver<ConnectionStatus>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    shared: Arc<CaptureShared>,
    restart_debounce: Duration,
    error_retry_delay: Duration,
    last_started: Option<Instant>,
}

impl CaptureWorker {
    async fn run(mut self) {
        while let Some(event) = self.engine_events.recv().await {
            match event {
                EngineEvent::Started => {
                    self.last_started = Some(Instant::now());
                    self.shared.set_status(CaptureStatus::Listening);
                    let _ = self.events.send(CaptureEvent::Listening);
                }
                EngineEvent::Interim { text } => {
                    self.shared.set_interim(text.clone());
                    let _ = self.events.send(CaptureEvent::Interim { text });
                }
                EngineEvent::Final { text } => {
                    self.shared.clear_interim();
                    let _ = self.events.send(CaptureEvent::Final { text });
                }
                EngineEvent::Ended => {
                    self.shared.state.send_replace(CaptureState::default());
                    let _ = self.events.send(CaptureEvent::Ended);
                    self.restart_after(self.debounce_wait()).await;
                }
                EngineEvent::Error { code } => {
                    tracing::warn!("speech engine error: {code}");
                    self.shared.set_status(CaptureStatus::Errored);
                    self.shared.clear_interim();
                    let _ = self.events.send(CaptureEvent::Error { code: code.clone() });
                    if code.is_recoverable() {
                        self.restart_after(self.error_retry_delay).await;
                    }
                }
            }
        }
    }

    /// Time still owed to the minimum restart spacing.
    fn debounce_wait(&self) -> Duration {
        match self.last_started {
            Some(started) => self.restart_debounce.saturating_sub(started.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Restarts the engine after `delay`, re-checking liveness once the
    /// delay has elapsed rather than when the restart was scheduled.
    async fn restart_after(&mut self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.shared.wants_capture.load(Ordering::SeqCst) {
            return;
        }
        if *self.phase.borrow() != SessionPhase::Active
            || *self.connection.borrow() != ConnectionStatus::Connected
        {
            tracing::debug!("skipping capture restart: session or channel no longer live");
            return;
        }
        if let Err(err) = self.engine.start().await {
            tracing::warn!("capture restart failed: {err}");
            self.shared.set_status(CaptureStatus::Errored);
        }
    }
}

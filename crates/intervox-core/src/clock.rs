//! Monotonic countdown clock for the interview time limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events emitted by a running [`Clock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    /// One second elapsed; `remaining` seconds are left.
    Tick { remaining: u32 },
    /// The countdown reached zero. Emitted exactly once per run; the clock
    /// stops itself immediately afterwards, so a second expiry cannot fire
    /// while the first is being handled.
    Expired,
}

/// A one-second countdown timer.
///
/// `start` aborts any previous run, so the clock can be reused across
/// sessions. The remaining time is readable at any point without waiting
/// for the next tick.
pub struct Clock {
    events: mpsc::UnboundedSender<ClockEvent>,
    remaining: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl Clock {
    /// Creates a stopped clock that will emit events on `events`.
    pub fn new(events: mpsc::UnboundedSender<ClockEvent>) -> Self {
        Self {
            events,
            remaining: Arc::new(AtomicU32::new(0)),
            task: None,
        }
    }

    /// Starts (or restarts) the countdown at `seconds`.
    ///
    /// A zero-second countdown expires immediately.
    pub fn start(&mut self, seconds: u32) {
        self.stop();
        self.remaining.store(seconds, Ordering::SeqCst);

        if seconds == 0 {
            let _ = self.events.send(ClockEvent::Expired);
            return;
        }

        let events = self.events.clone();
        let remaining = Arc::clone(&self.remaining);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let left = remaining.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
                if events.send(ClockEvent::Tick { remaining: left }).is_err() {
                    break;
                }
                if left == 0 {
                    let _ = events.send(ClockEvent::Expired);
                    break;
                }
            }
        }));
    }

    /// Cancels the countdown without emitting further events.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Seconds left on the countdown.
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

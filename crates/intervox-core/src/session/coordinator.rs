//! The central session state machine.

use std::sync::Arc;

use intervox_types::{Problem, ServerEnvelope};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

use super::message::{parse_server_timestamp, Utterance, UtteranceKind};
use super::model::{InterviewOutcome, InterviewSettings, SessionPhase, SessionSnapshot};
use super::transcript::Transcript;
use crate::capture::{CaptureController, CaptureEvent, CaptureState, CaptureStatus, EngineEvent, SpeechEngine};
use crate::channel::{Channel, ChannelEvent, ConnectionStatus, OutboundMessage, Transport, TransportEvent};
use crate::clock::{Clock, ClockEvent};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::results::ResultsCollaborator;

/// Commands accepted by a running coordinator, sent via [`SessionHandle`].
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start {
        problem: Problem,
        settings: InterviewSettings,
    },
    End,
    UpdateCode(String),
    SendText(String),
}

/// Events the coordinator schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalEvent {
    /// The post-expiry grace window elapsed.
    GraceElapsed,
}

/// Cheap handle for presentation adapters: commands in, snapshots out.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn start_interview(&self, problem: Problem, settings: InterviewSettings) {
        self.command(SessionCommand::Start { problem, settings });
    }

    pub fn end_interview(&self) {
        self.command(SessionCommand::End);
    }

    pub fn update_code(&self, text: impl Into<String>) {
        self.command(SessionCommand::UpdateCode(text.into()));
    }

    pub fn send_text_message(&self, text: impl Into<String>) {
        self.command(SessionCommand::SendText(text.into()));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Live view of the session; yields on every state transition.
    pub fn updates(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    fn command(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("session coordinator is gone; command dropped");
        }
    }
}

/// Owns the canonical transcript, the code-under-edit snapshot and the
/// interview lifecycle, merging channel, capture and clock events into one
/// ordered state.
///
/// All state transitions happen inside discrete handlers multiplexed by
/// [`run`](Self::run), so they never overlap; the hazards are ordering and
/// staleness, not data races. Values that may go stale between scheduling
/// and dispatch (code snapshot, session phase, connection status) are read
/// through `watch` cells at dispatch time.
pub struct SessionCoordinator {
    config: ClientConfig,
    session_id: String,
    phase: watch::Sender<SessionPhase>,
    code: watch::Sender<String>,
    snapshot: watch::Sender<SessionSnapshot>,
    transcript: Transcript,
    settings: Option<InterviewSettings>,
    problem: Option<Problem>,
    feedback: Option<intervox_types::Feedback>,
    last_error: Option<String>,
    started_at: Option<Instant>,
    elapsed_seconds: u64,
    channel: Channel,
    capture: CaptureController,
    clock: Clock,
    results: Arc<dyn ResultsCollaborator>,
    connection: watch::Receiver<ConnectionStatus>,
    capture_state: watch::Receiver<CaptureState>,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    capture_events: mpsc::UnboundedReceiver<CaptureEvent>,
    clock_events: mpsc::UnboundedReceiver<ClockEvent>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
}

impl SessionCoordinator {
    /// Wires a coordinator around the injected capabilities.
    ///
    /// `transport_events` and `engine_events` are the streams the
    /// respective capability implementations push into.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        engine: Arc<dyn SpeechEngine>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        results: Arc<dyn ResultsCollaborator>,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let (phase, phase_rx) = watch::channel(SessionPhase::NotStarted);
        let (code, code_rx) = watch::channel(String::new());
        let (snapshot, _) = watch::channel(SessionSnapshot::default());

        let (channel_tx, channel_events) = mpsc::unbounded_channel();
        let channel = Channel::new(
            session_id.clone(),
            transport,
            transport_events,
            code_rx,
            phase_rx.clone(),
            channel_tx,
            &config,
        );
        let connection = channel.subscribe_status();

        let (capture_tx, capture_events) = mpsc::unbounded_channel();
        let capture = CaptureController::new(
            engine,
            engine_events,
            phase_rx,
            channel.subscribe_status(),
            capture_tx,
            &config,
        );
        let capture_state = capture.subscribe();

        let (clock_tx, clock_events) = mpsc::unbounded_channel();
        let clock = Clock::new(clock_tx);

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        Self {
            config,
            session_id,
            phase,
            code,
            snapshot,
            transcript: Transcript::new(),
            settings: None,
            problem: None,
            feedback: None,
            last_error: None,
            started_at: None,
            elapsed_seconds: 0,
            channel,
            capture,
            clock,
            results,
            connection,
            capture_state,
            channel_events,
            capture_events,
            clock_events,
            internal_tx,
            internal_rx,
        }
    }

    /// Spawns the coordinator onto the runtime and returns a command
    /// handle for it.
    pub fn spawn(self) -> SessionHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let snapshot = self.snapshot.subscribe();
        tokio::spawn(self.run(commands_rx));
        SessionHandle { commands, snapshot }
    }

    /// Dispatches commands and producer events until every source closes.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.handle_command(command).await,
                Some(event) = self.channel_events.recv() => self.handle_channel_event(event).await,
                Some(event) = self.capture_events.recv() => self.handle_capture_event(event).await,
                Some(event) = self.clock_events.recv() => self.handle_clock_event(event).await,
                Some(event) = self.internal_rx.recv() => self.handle_internal_event(event).await,
                else => break,
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start { problem, settings } => {
                if let Err(err) = self.start_interview(problem, settings).await {
                    tracing::warn!(session_id = %self.session_id, "start failed: {err}");
                }
            }
            SessionCommand::End => self.end_interview().await,
            SessionCommand::UpdateCode(text) => self.update_code(text),
            SessionCommand::SendText(text) => {
                // Drops are surfaced on the snapshot; see send_text_message.
                let _ = self.send_text_message(&text).await;
            }
        }
    }

    /// Begins the interview. Guarded to run at most once per session;
    /// re-invocation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the initial dial fails. The
    /// channel's retry policy still applies afterwards.
    pub async fn start_interview(
        &mut self,
        problem: Problem,
        settings: InterviewSettings,
    ) -> Result<()> {
        if *self.phase.borrow() != SessionPhase::NotStarted {
            tracing::debug!(session_id = %self.session_id, "interview already started; ignoring");
            return Ok(());
        }
        tracing::info!(session_id = %self.session_id, problem = %problem.title, "starting interview");

        self.phase.send_replace(SessionPhase::Active);
        self.transcript.clear();
        self.transcript.append(Utterance::interviewer(
            format!(
                "Hi, I'm your interviewer today. Let's dig into \"{}\". \
                 Before writing any code, walk me through how you would approach it.",
                problem.title
            ),
            Some(UtteranceKind::Question),
            chrono::Utc::now(),
        ));
        self.problem = Some(problem);
        self.clock.start(settings.time_limit_secs);
        self.settings = Some(settings);
        self.started_at = Some(Instant::now());
        self.publish();

        // Capture starts once the channel reports Opened.
        self.channel.connect().await
    }

    /// Ends the interview and hands the frozen outcome to the results
    /// collaborator. Idempotent.
    pub async fn end_interview(&mut self) {
        if !self.freeze().await {
            return;
        }
        self.hand_off().await;
    }

    /// Replaces the code snapshot atomically. Never sends anything.
    pub fn update_code(&mut self, text: impl Into<String>) {
        self.code.send_replace(text.into());
        self.publish();
    }

    /// Appends a typed message optimistically and forwards it.
    ///
    /// Blank input is a no-op.
    ///
    /// # Errors
    ///
    /// `NotConnected` when the channel is down; the message stays in the
    /// local transcript but was dropped on the wire.
    pub async fn send_text_message(&mut self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        self.transcript.append(Utterance::candidate_typed(trimmed));
        self.publish();
        self.forward(OutboundMessage::Chat {
            message: trimmed.to_string(),
        })
        .await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => {
                self.last_error = None;
                if *self.phase.borrow() == SessionPhase::Active
                    && self.capture.state().status != CaptureStatus::Listening
                {
                    if let Err(err) = self.capture.start().await {
                        tracing::warn!(session_id = %self.session_id, "capture start failed: {err}");
                        self.last_error = Some(err.to_string());
                    }
                }
                self.publish();
            }
            ChannelEvent::Inbound(envelope) => self.merge_inbound(envelope).await,
            ChannelEvent::Closed => self.publish(),
            ChannelEvent::Error(message) => {
                // Reported, not fatal; the channel retries on its own.
                self.last_error = Some(message);
                self.publish();
            }
        }
    }

    async fn merge_inbound(&mut self, envelope: ServerEnvelope) {
        if *self.phase.borrow() != SessionPhase::Active {
            tracing::debug!(session_id = %self.session_id, "session not active; inbound ignored");
            return;
        }
        match envelope {
            ServerEnvelope::AiMessage {
                message,
                timestamp,
                message_type,
            } => {
                let occurred_at =
                    parse_server_timestamp(&timestamp).unwrap_or_else(chrono::Utc::now);
                let kind = UtteranceKind::from_message_type(message_type.as_deref());
                self.transcript
                    .insert_ordered(Utterance::interviewer(message, kind, occurred_at));
                self.publish();
            }
            ServerEnvelope::UserMessage { .. } => {
                // Echo of our own send; the optimistic append is canonical.
                tracing::debug!(session_id = %self.session_id, "skipping user_message echo");
            }
            ServerEnvelope::InterimSpeech { .. } => {
                // The local engine's interim text is authoritative.
            }
            ServerEnvelope::Pong => {
                tracing::debug!(session_id = %self.session_id, "keepalive pong");
            }
        }
    }

    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Final { text } => {
                if *self.phase.borrow() != SessionPhase::Active {
                    return;
                }
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                // A finalized speech result is handled exactly like a
                // typed send.
                self.transcript.append(Utterance::candidate_spoken(trimmed));
                self.publish();
                let _ = self
                    .forward(OutboundMessage::Speech {
                        text: trimmed.to_string(),
                        is_final: true,
                    })
                    .await;
            }
            CaptureEvent::Error { code } => {
                // Reported, not fatal; the controller retries on its own.
                self.last_error = Some(format!("speech capture: {code}"));
                self.publish();
            }
            CaptureEvent::Listening | CaptureEvent::Interim { .. } | CaptureEvent::Ended => {
                self.publish();
            }
        }
    }

    async fn handle_clock_event(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::Tick { .. } => self.publish(),
            ClockEvent::Expired => {
                if *self.phase.borrow() != SessionPhase::Active {
                    return;
                }
                tracing::info!(session_id = %self.session_id, "time limit reached");
                let notice = "Time is up. Let's stop here and review how you did.";
                self.transcript.append(Utterance::notice(notice));
                self.publish();
                let _ = self
                    .forward(OutboundMessage::Chat {
                        message: notice.to_string(),
                    })
                    .await;

                // Leave a grace window for a final interviewer reply.
                let internal = self.internal_tx.clone();
                let grace = self.config.expiry_grace();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let _ = internal.send(InternalEvent::GraceElapsed);
                });
            }
        }
    }

    async fn handle_internal_event(&mut self, event: InternalEvent) {
        match event {
            // A user-issued end during the grace window already froze the
            // session; freeze() then reports false and this is a no-op.
            InternalEvent::GraceElapsed => self.end_interview().await,
        }
    }

    /// Freezes the session: phase to Ended, producers stopped, pending
    /// retries cancelled. Returns false when there was nothing to freeze.
    async fn freeze(&mut self) -> bool {
        if *self.phase.borrow() != SessionPhase::Active {
            return false;
        }
        tracing::info!(session_id = %self.session_id, "ending interview");
        self.phase.send_replace(SessionPhase::Ended);
        self.elapsed_seconds = self
            .started_at
            .map(|started| started.elapsed().as_secs())
            .unwrap_or(0);
        self.clock.stop();
        self.capture.stop().await;
        self.channel.close().await;
        self.publish();
        true
    }

    async fn hand_off(&mut self) {
        let outcome = InterviewOutcome {
            problem: self.problem.clone(),
            code: self.code.borrow().clone(),
            transcript: self.transcript.entries().to_vec(),
            elapsed_seconds: self.elapsed_seconds,
            feedback: None,
        };
        match self.results.deliver(outcome).await {
            Ok(Some(feedback)) => {
                self.feedback = Some(feedback);
                self.publish();
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, "results hand-off failed: {err}");
                self.last_error = Some(err.to_string());
                self.publish();
            }
        }
    }

    async fn forward(&mut self, message: OutboundMessage) -> Result<()> {
        match self.channel.send(message).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, "outbound message dropped: {err}");
                self.last_error = Some(err.to_string());
                self.publish();
                Err(err)
            }
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            phase: *self.phase.borrow(),
            transcript: self.transcript.entries().to_vec(),
            code: self.code.borrow().clone(),
            remaining_secs: self.clock.remaining(),
            connection: *self.connection.borrow(),
            capture: self.capture_state.borrow().clone(),
            problem: self.problem.clone(),
            settings: self.settings.clone(),
            feedback: self.feedback.clone(),
            last_error: self.last_error.clone(),
        };
        self.snapshot.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use intervox_types::{Difficulty, Feedback, Recommendation};

    use super::*;
    use crate::error::IntervoxError;

    struct FakeTransport {
        events: mpsc::UnboundedSender<TransportEvent>,
        sent: Mutex<Vec<String>>,
        connects: AtomicU32,
    }

    impl FakeTransport {
        fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
            Self {
                events,
                sent: Mutex::new(Vec::new()),
                connects: AtomicU32::new(0),
            }
        }

        fn sent(&self) -> Vec<serde_json::Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|raw| serde_json::from_str(raw).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&self) -> crate::error::Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let _ = self.events.send(TransportEvent::Opened);
            Ok(())
        }

        async fn send(&self, payload: String) -> crate::error::Result<()> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        async fn close(&self) {
            let _ = self.events.send(TransportEvent::Closed);
        }
    }

    struct FakeEngine {
        events: mpsc::UnboundedSender<EngineEvent>,
        starts: AtomicU32,
    }

    #[async_trait]
    impl SpeechEngine for FakeEngine {
        async fn start(&self) -> crate::error::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            let _ = self.events.send(EngineEvent::Started);
            Ok(())
        }

        async fn stop(&self) {}
    }

    struct FakeResults {
        delivered: Mutex<Vec<InterviewOutcome>>,
        respond_with_feedback: AtomicBool,
    }

    impl FakeResults {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                respond_with_feedback: AtomicBool::new(true),
            }
        }

        fn delivered(&self) -> Vec<InterviewOutcome> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultsCollaborator for FakeResults {
        async fn deliver(
            &self,
            outcome: InterviewOutcome,
        ) -> crate::error::Result<Option<Feedback>> {
            self.delivered.lock().unwrap().push(outcome);
            if self.respond_with_feedback.load(Ordering::SeqCst) {
                Ok(Some(Feedback {
                    clarification: 4,
                    reasoning: 4,
                    solution: 3,
                    total: 11,
                    recommendation: Recommendation::Hire,
                    explanation: "Good communication throughout.".to_string(),
                }))
            } else {
                Err(IntervoxError::Scoring("evaluator offline".to_string()))
            }
        }
    }

    struct Fixture {
        handle: SessionHandle,
        updates: watch::Receiver<SessionSnapshot>,
        transport: Arc<FakeTransport>,
        transport_tx: mpsc::UnboundedSender<TransportEvent>,
        engine: Arc<FakeEngine>,
        engine_tx: mpsc::UnboundedSender<EngineEvent>,
        results: Arc<FakeResults>,
    }

    fn fixture() -> Fixture {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport::new(transport_tx.clone()));
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(FakeEngine {
            events: engine_tx.clone(),
            starts: AtomicU32::new(0),
        });
        let results = Arc::new(FakeResults::new());
        let coordinator = SessionCoordinator::new(
            ClientConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            transport_rx,
            Arc::clone(&engine) as Arc<dyn SpeechEngine>,
            engine_rx,
            Arc::clone(&results) as Arc<dyn ResultsCollaborator>,
        );
        let updates = coordinator.subscribe();
        let handle = coordinator.spawn();
        Fixture {
            handle,
            updates,
            transport,
            transport_tx,
            engine,
            engine_tx,
            results,
        }
    }

    fn problem() -> Problem {
        Problem {
            id: 1,
            title: "Two Sum".to_string(),
            description: Some("Given an array of integers...".to_string()),
            difficulty: Difficulty::Easy,
            is_premium: false,
            url: None,
            solution_link: None,
            companies: vec!["Initech".to_string()],
            related_topics: vec!["Array".to_string()],
            similar_questions: None,
        }
    }

    fn settings(time_limit_secs: u32) -> InterviewSettings {
        InterviewSettings {
            difficulty: Some(Difficulty::Easy),
            topic: None,
            company: None,
            time_limit_secs,
        }
    }

    async fn wait_until<F>(
        rx: &mut watch::Receiver<SessionSnapshot>,
        mut pred: F,
    ) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("coordinator dropped");
        }
    }

    async fn start_and_connect(fx: &mut Fixture, time_limit_secs: u32) {
        fx.handle.start_interview(problem(), settings(time_limit_secs));
        wait_until(&mut fx.updates, |snap| {
            snap.phase == SessionPhase::Active && snap.connection == ConnectionStatus::Connected
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_leaves_one_opening_utterance() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;
        fx.handle.start_interview(problem(), settings(300));
        fx.handle.send_text_message("hello");

        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.transcript.len() == 2).await;
        assert_eq!(
            snapshot.transcript[0].kind,
            Some(UtteranceKind::Question)
        );
        assert_eq!(snapshot.transcript[1].text, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn interleaved_typed_and_spoken_sends_all_land_once() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;

        fx.handle.send_text_message("typed one");
        fx.engine_tx
            .send(EngineEvent::Final {
                text: "spoken one".to_string(),
            })
            .unwrap();
        fx.handle.send_text_message("   ");
        fx.handle.send_text_message("typed two");
        fx.engine_tx
            .send(EngineEvent::Final {
                text: "spoken two".to_string(),
            })
            .unwrap();

        // Opening + four completed (non-blank) sends.
        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.transcript.len() == 5).await;
        let texts: Vec<_> = snapshot
            .transcript
            .iter()
            .map(|u| u.text.as_str())
            .collect();
        assert!(texts.contains(&"typed one"));
        assert!(texts.contains(&"spoken two"));

        let frames = fx.transport.sent();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.iter().filter(|f| f["type"] == "speech").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_envelopes_carry_the_freshest_code() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;

        fx.handle.update_code("a");
        fx.handle.update_code("b");
        fx.handle.send_text_message("go");

        wait_until(&mut fx.updates, |snap| snap.transcript.len() == 2).await;
        let frames = fx.transport.sent();
        let chat = frames.iter().find(|f| f["type"] == "chat").unwrap();
        assert_eq!(chat["codeContext"], "b");
    }

    #[tokio::test(start_paused = true)]
    async fn interim_speech_never_enters_the_transcript() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;

        fx.engine_tx
            .send(EngineEvent::Interim {
                text: "use a ha".to_string(),
            })
            .unwrap();
        let snapshot = wait_until(&mut fx.updates, |snap| {
            snap.capture.interim_text == "use a ha"
        })
        .await;
        assert_eq!(snapshot.transcript.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn user_message_echo_is_not_duplicated() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;

        fx.handle.send_text_message("my answer");
        wait_until(&mut fx.updates, |snap| snap.transcript.len() == 2).await;

        fx.transport_tx
            .send(TransportEvent::Message(
                r#"{"type":"user_message","message":"my answer","timestamp":"2025-01-01T10:00:00","source":"text"}"#
                    .to_string(),
            ))
            .unwrap();
        fx.transport_tx
            .send(TransportEvent::Message(
                r#"{"type":"ai_message","message":"why a hash map?","timestamp":"2025-01-01T10:00:01"}"#
                    .to_string(),
            ))
            .unwrap();

        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.transcript.len() == 3).await;
        assert_eq!(snapshot.transcript[2].text, "why a hash map?");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_interviewer_message_is_sorted_in() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;
        fx.handle.send_text_message("first");
        wait_until(&mut fx.updates, |snap| snap.transcript.len() == 2).await;

        // Timestamped well before anything local.
        fx.transport_tx
            .send(TransportEvent::Message(
                r#"{"type":"ai_message","message":"belated","timestamp":"2000-01-01T00:00:00"}"#
                    .to_string(),
            ))
            .unwrap();
        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.transcript.len() == 3).await;
        assert_eq!(snapshot.transcript[0].text, "belated");
        assert_eq!(snapshot.transcript[2].text, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_sends_notice_then_ends_after_grace() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 1).await;

        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.phase == SessionPhase::Ended).await;
        assert!(
            snapshot
                .transcript
                .iter()
                .any(|u| u.kind == Some(UtteranceKind::Notice))
        );
        assert_eq!(snapshot.connection, ConnectionStatus::Disconnected);
        assert_eq!(snapshot.capture.status, CaptureStatus::Idle);

        let delivered = fx.results.delivered();
        assert_eq!(delivered.len(), 1);
        // One second on the clock plus the three-second grace window.
        assert_eq!(delivered[0].elapsed_seconds, 4);

        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.feedback.is_some()).await;
        assert_eq!(
            snapshot.feedback.unwrap().recommendation,
            Recommendation::Hire
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ending_freezes_the_transcript_and_hands_off_once() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;
        fx.handle.update_code("fn main() {}");
        fx.handle.send_text_message("done");
        wait_until(&mut fx.updates, |snap| snap.transcript.len() == 2).await;

        fx.handle.end_interview();
        fx.handle.end_interview();
        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.phase == SessionPhase::Ended).await;
        let frozen_len = snapshot.transcript.len();

        // Late producer events must not mutate the frozen transcript.
        fx.engine_tx
            .send(EngineEvent::Final {
                text: "late speech".to_string(),
            })
            .unwrap();
        fx.transport_tx
            .send(TransportEvent::Message(
                r#"{"type":"ai_message","message":"late","timestamp":"2025-01-01T10:00:00"}"#
                    .to_string(),
            ))
            .unwrap();
        wait_until(&mut fx.updates, |snap| snap.feedback.is_some()).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        assert_eq!(fx.handle.snapshot().transcript.len(), frozen_len);
        let delivered = fx.results.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].code, "fn main() {}");
        assert_eq!(fx.engine.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn typed_input_is_kept_while_the_channel_is_down() {
        let mut fx = fixture();
        start_and_connect(&mut fx, 300).await;

        // Channel drops; reconnect is pending but not yet fired.
        fx.transport_tx.send(TransportEvent::Closed).unwrap();
        wait_until(&mut fx.updates, |snap| {
            snap.connection == ConnectionStatus::Reconnecting
        })
        .await;

        fx.handle.send_text_message("still here");
        let snapshot = wait_until(&mut fx.updates, |snap| {
            snap.transcript.len() == 2 && snap.last_error.is_some()
        })
        .await;
        assert_eq!(snapshot.transcript[1].text, "still here");
        // Nothing reached the wire while disconnected.
        assert!(fx.transport.sent().iter().all(|f| f["type"] != "chat"));
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_failure_is_surfaced_not_fatal() {
        let mut fx = fixture();
        fx.results
            .respond_with_feedback
            .store(false, Ordering::SeqCst);
        start_and_connect(&mut fx, 300).await;

        fx.handle.end_interview();
        let snapshot =
            wait_until(&mut fx.updates, |snap| snap.last_error.is_some()).await;
        assert_eq!(snapshot.phase, SessionPhase::Ended);
        assert!(snapshot.feedback.is_none());
    }
}

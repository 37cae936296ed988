//! Session controller: the single owner of session state
//!
//! All state transitions run inside one task that processes commands from
//! the [`SessionHandle`] and events from the current transport connection,
//! so a `stop()` can never race an in-flight message handler. Capture
//! frames do not pass through the controller: a per-session forwarding task
//! encodes and sends them directly, tagged with the session's live flag so
//! a superseded session's frames are discarded instead of leaking into the
//! next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::pcm;
use crate::audio::{AudioFrame, CaptureBackend, PlaybackScheduler, WavDump};
use crate::transport::{
    ServerEvent, SessionTransport, TransportConnector, TransportEvent, WireAudioChunk,
};

use super::config::SessionConfig;
use super::state::{Message, Role, SessionStatus, VoiceState};
use super::transcript::{Direction, TranscriptAggregator};

/// Result of a connection attempt, bounded by the connect timeout
type ConnectOutcome = Result<(Box<dyn SessionTransport>, mpsc::Receiver<TransportEvent>)>;

/// Commands accepted by the controller task
enum Command {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    SendText(String, oneshot::Sender<()>),
}

/// State readable from outside the controller task
struct Shared {
    status: Mutex<SessionStatus>,
    listening: AtomicBool,
    messages: Mutex<Vec<Message>>,
    transcripts: Mutex<TranscriptAggregator>,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: Mutex::new(SessionStatus::Disconnected),
            listening: AtomicBool::new(false),
            messages: Mutex::new(Vec::new()),
            transcripts: Mutex::new(TranscriptAggregator::new()),
        }
    }
}

/// Resources of the one active session
struct ActiveSession {
    id: Uuid,
    transport: Arc<dyn SessionTransport>,
    events: mpsc::Receiver<TransportEvent>,
    /// Cleared on teardown; in-flight sends for this session check it
    live: Arc<AtomicBool>,
    forward_task: Option<JoinHandle<()>>,
}

/// Caller-facing handle to a running controller
///
/// Cheap to clone; all methods are safe to call from any task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    scheduler: Arc<PlaybackScheduler>,
}

impl SessionHandle {
    /// Start a session, tearing down any previous one first
    ///
    /// Resolves once the connection attempt has been launched; the outcome
    /// is visible through `status()`.
    pub async fn start(&self) -> Result<()> {
        self.command(Command::Start).await
    }

    /// Stop the session; idempotent from any state
    ///
    /// Issued while `Connecting`, this cancels the in-flight attempt
    /// rather than waiting for it to resolve.
    pub async fn stop(&self) -> Result<()> {
        self.command(Command::Stop).await
    }

    /// Send a typed user message; ignored unless connected
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.command(move |ack| Command::SendText(text, ack)).await
    }

    /// Current connection status
    pub fn status(&self) -> SessionStatus {
        self.shared
            .status
            .lock()
            .map(|status| *status)
            .unwrap_or(SessionStatus::Error)
    }

    /// Derived projection of the live session, recomputed on every call
    pub fn voice_state(&self) -> VoiceState {
        VoiceState {
            is_listening: self.shared.listening.load(Ordering::SeqCst),
            is_speaking: self.scheduler.is_speaking(),
            status: self.status(),
        }
    }

    /// Snapshot of the conversation log
    pub fn messages(&self) -> Vec<Message> {
        self.shared
            .messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Accumulated partial transcript for a direction (live, unflushed)
    pub fn partial_transcript(&self, direction: Direction) -> String {
        self.shared
            .transcripts
            .lock()
            .map(|transcripts| transcripts.peek(direction).to_string())
            .unwrap_or_default()
    }

    async fn command(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.commands
            .send(make(ack_tx))
            .await
            .map_err(|_| anyhow!("Session controller is no longer running"))?;

        ack_rx
            .await
            .map_err(|_| anyhow!("Session controller dropped the command"))?;

        Ok(())
    }
}

/// Owns the session lifecycle state machine and coordinates capture,
/// transport, playback, and transcript flushing
pub struct SessionController {
    config: SessionConfig,
    capture: Box<dyn CaptureBackend>,
    scheduler: Arc<PlaybackScheduler>,
    connector: Arc<dyn TransportConnector>,
    shared: Arc<Shared>,
    commands: mpsc::Receiver<Command>,
    session: Option<ActiveSession>,
    /// In-flight connection attempt; aborted by stop or a superseding start
    connecting: Option<JoinHandle<ConnectOutcome>>,
}

impl SessionController {
    /// Spawn the controller task and return its handle
    pub fn spawn(
        config: SessionConfig,
        capture: Box<dyn CaptureBackend>,
        scheduler: Arc<PlaybackScheduler>,
        connector: Box<dyn TransportConnector>,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let shared = Arc::new(Shared::new());

        let controller = Self {
            config,
            capture,
            scheduler: Arc::clone(&scheduler),
            connector: Arc::from(connector),
            shared: Arc::clone(&shared),
            commands: command_rx,
            session: None,
            connecting: None,
        };

        tokio::spawn(controller.run());

        SessionHandle {
            commands: command_tx,
            shared,
            scheduler,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // All handles dropped; shut down cleanly
                        self.teardown(SessionStatus::Disconnected).await;
                        break;
                    }
                },
                outcome = Self::next_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_finished(outcome).await;
                },
                event = Self::next_event(&mut self.session) => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        // Event stream ended without an explicit close
                        debug!("Transport event stream ended");
                        self.teardown(SessionStatus::Disconnected).await;
                    }
                },
            }
        }

        debug!("Session controller stopped");
    }

    /// Next event from the active session, or pending forever when idle
    async fn next_event(session: &mut Option<ActiveSession>) -> Option<TransportEvent> {
        match session {
            Some(session) => session.events.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Result of the in-flight connect, or pending forever when idle
    async fn next_connect(
        connecting: &mut Option<JoinHandle<ConnectOutcome>>,
    ) -> Result<ConnectOutcome, JoinError> {
        match connecting {
            Some(task) => task.await,
            None => std::future::pending().await,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(ack) => {
                self.start_session().await;
                let _ = ack.send(());
            }
            Command::Stop(ack) => {
                self.teardown(SessionStatus::Disconnected).await;
                let _ = ack.send(());
            }
            Command::SendText(text, ack) => {
                self.send_text(text).await;
                let _ = ack.send(());
            }
        }
    }

    /// Tear down any prior session, then launch a new connection attempt
    ///
    /// The attempt runs as its own task so the controller keeps processing
    /// commands while `Connecting`; a `stop()` or superseding `start()`
    /// cancels it instead of queueing behind it.
    async fn start_session(&mut self) {
        // Prior resources are released deterministically before anything
        // new is acquired
        self.teardown(SessionStatus::Disconnected).await;

        self.set_status(SessionStatus::Connecting);
        info!("Starting session");

        let connector = Arc::clone(&self.connector);
        let connect_timeout = self.config.connect_timeout;

        self.connecting = Some(tokio::spawn(async move {
            match tokio::time::timeout(connect_timeout, connector.connect()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("Connect timed out after {:?}", connect_timeout)),
            }
        }));
    }

    /// The connection attempt resolved while still current
    async fn on_connect_finished(&mut self, outcome: Result<ConnectOutcome, JoinError>) {
        let (transport, events) = match outcome {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                error!("Transport connect failed: {}", e);
                self.set_status(SessionStatus::Error);
                return;
            }
            Err(e) => {
                error!("Connect task failed: {}", e);
                self.set_status(SessionStatus::Error);
                return;
            }
        };

        self.scheduler.reset();

        self.session = Some(ActiveSession {
            id: Uuid::new_v4(),
            transport: Arc::from(transport),
            events,
            live: Arc::new(AtomicBool::new(true)),
            forward_task: None,
        });
    }

    /// Cancel the in-flight connection attempt, if any
    ///
    /// If the attempt already produced a transport by the time the abort
    /// lands, that transport is closed in the background; nothing from an
    /// abandoned attempt ever reaches the controller.
    fn abandon_connect(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();

            tokio::spawn(async move {
                if let Ok(Ok((transport, _events))) = task.await {
                    debug!("Closing transport from abandoned connect attempt");
                    let _ = transport.close().await;
                }
            });

            info!("Abandoned in-flight connect attempt");
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open().await,
            TransportEvent::Message(event) => self.on_message(event),
            TransportEvent::Error(e) => {
                error!("Transport error: {}", e);
                self.teardown(SessionStatus::Error).await;
            }
            TransportEvent::Closed(reason) => {
                info!(
                    "Transport closed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.teardown(SessionStatus::Disconnected).await;
            }
        }
    }

    /// Transport confirmed open: begin capture and start forwarding
    ///
    /// Capture starts only now, so no frame is ever produced for a
    /// half-initialized channel.
    async fn on_open(&mut self) {
        if self.session.is_none() {
            return;
        }

        let frames = match self.capture.start().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("Microphone unavailable: {}", e);
                self.teardown(SessionStatus::Error).await;
                return;
            }
        };

        let dump = match &self.config.dump_path {
            Some(path) => match WavDump::create(path, self.config.capture_sample_rate) {
                Ok(dump) => Some(dump),
                Err(e) => {
                    warn!("Capture dump disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        let Some(session) = &mut self.session else {
            return;
        };

        let transport = Arc::clone(&session.transport);
        let live = Arc::clone(&session.live);
        let session_id = session.id;

        session.forward_task = Some(tokio::spawn(forward_frames(
            frames, transport, live, session_id, dump,
        )));

        self.shared.listening.store(true, Ordering::SeqCst);
        self.set_status(SessionStatus::Connected);
        info!("Session {} connected", session_id);
    }

    fn on_message(&mut self, event: ServerEvent) {
        if event.interrupted {
            info!("Remote interruption: cancelling playback");
            self.scheduler.interrupt();
        }

        if let Some(chunk) = &event.audio {
            // One undecodable chunk must not affect the queue around it
            if let Err(e) = self.scheduler.enqueue_chunk(chunk) {
                warn!("Dropping undecodable audio chunk: {}", e);
            }
        }

        if event.input_transcription.is_some() || event.output_transcription.is_some() {
            if let Ok(mut transcripts) = self.shared.transcripts.lock() {
                if let Some(fragment) = &event.input_transcription {
                    transcripts.append(Direction::Input, fragment);
                }
                if let Some(fragment) = &event.output_transcription {
                    transcripts.append(Direction::Output, fragment);
                }
            }
        }

        if event.turn_complete {
            self.on_turn_complete();
        }
    }

    /// Flush the assistant's transcript into the log and clear both buffers
    fn on_turn_complete(&mut self) {
        let Ok(mut transcripts) = self.shared.transcripts.lock() else {
            return;
        };

        if let Some(text) = transcripts.flush(Direction::Output) {
            debug!("Turn complete: {} chars of assistant text", text.len());
            if let Ok(mut messages) = self.shared.messages.lock() {
                messages.push(Message::new(Role::Assistant, text));
            }
        } else {
            debug!("Turn complete with empty transcript; nothing to append");
        }

        transcripts.clear();
    }

    async fn send_text(&mut self, text: String) {
        let status = self.status();
        if status != SessionStatus::Connected {
            warn!("Ignoring send_text while {:?}", status);
            return;
        }

        let Some(session) = &self.session else {
            return;
        };

        // Optimistic append; delivery is not acknowledged
        if let Ok(mut messages) = self.shared.messages.lock() {
            messages.push(Message::new(Role::User, text.clone()));
        }

        if let Err(e) = session.transport.send_text(text).await {
            warn!("Failed to send text: {}", e);
        }
    }

    /// Release every session resource and land in the given status
    ///
    /// Safe to call with no session active; stopping stopped resources is
    /// always a success.
    async fn teardown(&mut self, status: SessionStatus) {
        self.abandon_connect();

        if let Some(mut session) = self.session.take() {
            // Mark stale first so in-flight sends are discarded
            session.live.store(false, Ordering::SeqCst);

            if let Err(e) = session.transport.close().await {
                warn!("Transport close failed: {}", e);
            }

            if let Err(e) = self.capture.stop().await {
                warn!("Capture stop failed: {}", e);
            }
            self.shared.listening.store(false, Ordering::SeqCst);

            if let Some(task) = session.forward_task.take() {
                if let Err(e) = task.await {
                    error!("Capture forwarding task panicked: {}", e);
                }
            }

            self.scheduler.interrupt();

            if let Ok(mut transcripts) = self.shared.transcripts.lock() {
                transcripts.clear();
            }

            info!("Session {} torn down", session.id);
        } else {
            let _ = self.capture.stop().await;
            self.shared.listening.store(false, Ordering::SeqCst);
        }

        self.set_status(status);
    }

    fn status(&self) -> SessionStatus {
        self.shared
            .status
            .lock()
            .map(|status| *status)
            .unwrap_or(SessionStatus::Error)
    }

    fn set_status(&self, status: SessionStatus) {
        if let Ok(mut current) = self.shared.status.lock() {
            if *current != status {
                debug!("Session status: {:?} -> {:?}", *current, status);
                *current = status;
            }
        }
    }
}

/// Encode captured frames and forward them to the transport
///
/// Runs per session. Send failures are logged and swallowed so a transient
/// transport error never terminates the capture pipeline; the loop ends
/// when capture stops or the session is superseded.
async fn forward_frames(
    mut frames: mpsc::Receiver<AudioFrame>,
    transport: Arc<dyn SessionTransport>,
    live: Arc<AtomicBool>,
    session_id: Uuid,
    mut dump: Option<WavDump>,
) {
    debug!("Capture forwarding started for session {}", session_id);

    while let Some(frame) = frames.recv().await {
        if !live.load(Ordering::SeqCst) {
            break;
        }

        let samples = pcm::f32_to_pcm16(&frame.samples);

        if let Some(dump) = dump.as_mut() {
            if let Err(e) = dump.write_samples(&samples) {
                warn!("Capture dump write failed: {}", e);
            }
        }

        let chunk = WireAudioChunk::from_samples(&samples, frame.sample_rate);

        if let Err(e) = transport.send_audio(chunk).await {
            warn!("Failed to send audio chunk: {}", e);
        }
    }

    if let Some(dump) = dump.take() {
        if let Err(e) = dump.finish() {
            warn!("Capture dump finalize failed: {}", e);
        }
    }

    debug!("Capture forwarding stopped for session {}", session_id);
}

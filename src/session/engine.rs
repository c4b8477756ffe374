//! Wake word session engine
//!
//! A single task owns the recognizer, the detector and all restart state.
//! Handles talk to it over a command channel; recognizer events arrive on a
//! second channel tagged with the session that produced them. Everything is
//! processed in arrival order, one message at a time.
//!
//! ```text
//! Idle ──start──▶ Listening ──end──▶ (fast restart) ──▶ Listening
//!                    │
//!                    ├── recoverable error ──▶ backoff ──▶ Listening
//!                    ├── retries exhausted ──▶ Idle
//!                    └── permission / fatal ──▶ Idle
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::retry::RetryPolicy;
use super::state::{EngineEvent, ListeningState, NoiseEstimator};
use crate::config::EngineConfig;
use crate::recognizer::{
    ErrorClass, Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerSink,
};
use crate::wake::{PhraseCatalogue, Sensitivity, WakeWordDetector, normalize};
use crate::{Error, Result};

enum Command {
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    Destroy(oneshot::Sender<()>),
    SetSensitivity(Sensitivity, oneshot::Sender<()>),
    SetLanguage(String, oneshot::Sender<Result<()>>),
    SetWakeWords(PhraseCatalogue, oneshot::Sender<()>),
}

/// Handle to a running wake word engine
///
/// Cheap to clone. All clones drive the same engine; the engine shuts down
/// when [`destroy`](Self::destroy) is called or every handle is dropped.
#[derive(Debug, Clone)]
pub struct WakeWordEngine {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ListeningState>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(_) => write!(f, "Start"),
            Self::Stop(_) => write!(f, "Stop"),
            Self::Destroy(_) => write!(f, "Destroy"),
            Self::SetSensitivity(level, _) => write!(f, "SetSensitivity({level})"),
            Self::SetLanguage(code, _) => write!(f, "SetLanguage({code})"),
            Self::SetWakeWords(catalogue, _) => write!(f, "SetWakeWords({})", catalogue.len()),
        }
    }
}

impl WakeWordEngine {
    /// Spawn an engine driving `recognizer`
    ///
    /// The engine starts idle. Events are delivered in order on the returned
    /// receiver, which closes once the engine is destroyed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` if the recognizer is unavailable, or
    /// `Error::Config` if the configured wake words leave an empty catalogue
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime
    pub fn spawn<R>(
        config: EngineConfig,
        mut recognizer: R,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>)>
    where
        R: Recognizer + 'static,
    {
        if !recognizer.is_supported() {
            return Err(Error::Unsupported(
                "no speech recognizer is available in this environment".to_string(),
            ));
        }

        let catalogue = match &config.wake_words {
            Some(words) => PhraseCatalogue::new(words)?,
            None => PhraseCatalogue::default(),
        };

        recognizer.set_language(&config.language);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (recognizer_tx, recognizer_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ListeningState::idle(config.sensitivity));

        tracing::info!(
            language = %config.language,
            sensitivity = %config.sensitivity,
            phrases = catalogue.len(),
            "wake word engine created"
        );

        let actor = Actor {
            detector: WakeWordDetector::new(catalogue, config.sensitivity),
            recognizer,
            language: config.language,
            retry: config.retry,
            fast_restart: config.fast_restart,
            events: event_tx,
            state: state_tx,
            recognizer_tx,
            generation: 0,
            listening: false,
            session_active: false,
            restart_at: None,
            retry_count: 0,
            streak_reported: false,
            noise: NoiseEstimator::default(),
        };

        tokio::spawn(actor.run(command_rx, recognizer_rx));

        Ok((
            Self {
                commands: command_tx,
                state: state_rx,
            },
            event_rx,
        ))
    }

    /// Start listening; a no-op if already listening
    ///
    /// # Errors
    ///
    /// Returns the recognizer error if the first session cannot start and
    /// the failure is not retryable, or `Error::EngineClosed`
    pub async fn start(&self) -> Result<()> {
        self.request(Command::Start).await?
    }

    /// Stop listening and cancel any pending restart
    ///
    /// # Errors
    ///
    /// Returns `Error::EngineClosed` if the engine was destroyed
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Tear the engine down; no event is delivered afterwards
    ///
    /// # Errors
    ///
    /// Returns `Error::EngineClosed` if the engine was already destroyed
    pub async fn destroy(&self) -> Result<()> {
        self.request(Command::Destroy).await
    }

    /// Switch sensitivity without restarting the recognizer
    ///
    /// # Errors
    ///
    /// Returns `Error::EngineClosed` if the engine was destroyed
    pub async fn set_sensitivity(&self, level: Sensitivity) -> Result<()> {
        self.request(|reply| Command::SetSensitivity(level, reply)).await
    }

    /// Change the recognizer locale, restarting the session if listening
    ///
    /// # Errors
    ///
    /// Returns the recognizer error if the restarted session fails
    /// permanently, or `Error::EngineClosed`
    pub async fn set_language(&self, code: impl Into<String>) -> Result<()> {
        let code = code.into();
        self.request(|reply| Command::SetLanguage(code, reply)).await?
    }

    /// Replace the wake phrase catalogue
    ///
    /// Takes effect from the next transcript; the match streak is cleared and
    /// the recognizer keeps running.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no usable phrase remains, or
    /// `Error::EngineClosed`
    pub async fn set_wake_words<I, S>(&self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let catalogue = PhraseCatalogue::new(words)?;
        self.request(|reply| Command::SetWakeWords(catalogue, reply)).await
    }

    /// Current sensitivity level
    #[must_use]
    pub fn sensitivity(&self) -> Sensitivity {
        self.state.borrow().sensitivity
    }

    /// Whether the engine is listening
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.borrow().is_listening
    }

    /// Snapshot of the listening state
    #[must_use]
    pub fn state(&self) -> ListeningState {
        self.state.borrow().clone()
    }

    /// Watch the listening state
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ListeningState> {
        self.state.clone()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| Error::EngineClosed)?;
        reply_rx.await.map_err(|_| Error::EngineClosed)
    }
}

struct Actor<R> {
    recognizer: R,
    detector: WakeWordDetector,
    language: String,
    retry: RetryPolicy,
    fast_restart: Duration,
    events: mpsc::UnboundedSender<EngineEvent>,
    state: watch::Sender<ListeningState>,
    recognizer_tx: mpsc::UnboundedSender<(u64, RecognizerEvent)>,
    /// Session id handed to the recognizer; bumped whenever a session is
    /// replaced or abandoned so its late events are dropped
    generation: u64,
    listening: bool,
    session_active: bool,
    restart_at: Option<Instant>,
    retry_count: u32,
    streak_reported: bool,
    noise: NoiseEstimator,
}

impl<R: Recognizer> Actor<R> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut recognizer_rx: mpsc::UnboundedReceiver<(u64, RecognizerEvent)>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Destroy(reply)) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("all engine handles dropped");
                        self.teardown();
                        break;
                    }
                },

                Some((session, event)) = recognizer_rx.recv() => {
                    if session == self.generation && self.session_active {
                        self.handle_recognizer(event);
                    } else {
                        tracing::trace!(session, current = self.generation, "stale recognizer event dropped");
                    }
                }

                () = tokio::time::sleep_until(self.restart_at.unwrap_or_else(Instant::now)),
                    if self.restart_at.is_some() =>
                {
                    self.restart_at = None;
                    if let Err(e) = self.launch() {
                        tracing::debug!(error = %e, "restart abandoned");
                    }
                }
            }
        }

        tracing::info!("wake word engine destroyed");
    }

    fn handle_command(&mut self, command: Command) {
        tracing::trace!(?command, "engine command");

        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(());
            }
            Command::SetSensitivity(level, reply) => {
                self.set_sensitivity(level);
                let _ = reply.send(());
            }
            Command::SetLanguage(code, reply) => {
                let _ = reply.send(self.set_language(code));
            }
            Command::SetWakeWords(catalogue, reply) => {
                tracing::info!(phrases = catalogue.len(), "wake phrase catalogue replaced");
                self.detector.set_catalogue(catalogue);
                let _ = reply.send(());
            }
            // handled by the run loop
            Command::Destroy(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.listening {
            return Ok(());
        }

        tracing::info!(language = %self.language, "wake word listening started");

        self.listening = true;
        self.retry_count = 0;
        self.streak_reported = false;
        self.detector.reset();

        let result = self.launch();
        self.publish_state();
        result
    }

    fn stop(&mut self) {
        if !self.listening && self.restart_at.is_none() {
            return;
        }

        tracing::info!("wake word listening stopped");

        self.restart_at = None;
        self.invalidate_session();
        self.recognizer.stop();
        self.listening = false;
        self.retry_count = 0;
        self.streak_reported = false;
        self.detector.reset();
        self.publish_state();
    }

    fn set_sensitivity(&mut self, level: Sensitivity) {
        tracing::info!(
            from = %self.detector.sensitivity(),
            to = %level,
            "sensitivity changed"
        );

        self.detector.set_sensitivity(level);
        self.emit(EngineEvent::SensitivityChanged(level));
        self.publish_state();
    }

    fn set_language(&mut self, code: String) -> Result<()> {
        tracing::info!(from = %self.language, to = %code, "recognizer language changed");
        self.language = code;

        if !self.listening {
            self.recognizer.set_language(&self.language);
            return Ok(());
        }

        // a running recognizer cannot switch locale; cycle the session
        self.restart_at = None;
        self.invalidate_session();
        self.recognizer.stop();
        self.recognizer.set_language(&self.language);
        self.detector.reset();

        let result = self.launch();
        self.publish_state();
        result
    }

    /// Begin a new recognizer session
    ///
    /// Only fails when the engine halted on a permission or fatal error.
    fn launch(&mut self) -> Result<()> {
        if self.recognizer.is_listening() {
            self.recognizer.abort();
        }

        self.generation += 1;
        let sink = RecognizerSink::new(self.generation, self.recognizer_tx.clone());

        match self.recognizer.start(sink) {
            Ok(()) => {
                tracing::debug!(session = self.generation, "recognizer session started");
                self.session_active = true;
                self.publish_state();
                Ok(())
            }
            Err(code) => {
                tracing::warn!(session = self.generation, %code, "recognizer failed to start");
                self.session_active = false;

                match code.class() {
                    ErrorClass::Recoverable => {
                        self.schedule_retry(&code);
                        Ok(())
                    }
                    ErrorClass::Permission | ErrorClass::Fatal => {
                        self.fail(&code);
                        Err(code.into())
                    }
                }
            }
        }
    }

    fn handle_recognizer(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Result {
                transcript,
                is_final,
            } => self.handle_transcript(&transcript, is_final),
            RecognizerEvent::Error(code) => self.handle_error(&code),
            RecognizerEvent::End => self.handle_end(),
        }
    }

    fn handle_transcript(&mut self, transcript: &str, is_final: bool) {
        // the session is healthy again
        self.retry_count = 0;
        self.streak_reported = false;

        let now = Instant::now().into_std();
        if let Some(detection) = self.detector.evaluate(transcript, is_final, now) {
            self.emit(EngineEvent::WakeWordDetected(detection));
            self.publish_state();
            return;
        }

        let heard_chatter = self
            .detector
            .last_result()
            .is_some_and(|r| !r.matched && !normalize(transcript).is_empty());
        if heard_chatter {
            self.noise.chatter();
            self.publish_state();
        }
    }

    fn handle_error(&mut self, code: &RecognizerErrorCode) {
        if code.is_benign() {
            tracing::debug!(%code, "recognizer paused");
            if *code == RecognizerErrorCode::NoSpeech {
                self.noise.silence();
                self.publish_state();
            }
            // the session's end event restarts it
            return;
        }

        match code.class() {
            ErrorClass::Permission | ErrorClass::Fatal => self.fail(code),
            ErrorClass::Recoverable => {
                self.invalidate_session();
                self.recognizer.abort();
                self.schedule_retry(code);
            }
        }
    }

    fn handle_end(&mut self) {
        tracing::debug!(session = self.generation, "recognizer session ended");
        self.session_active = false;

        // sessions that hit a retryable error are invalidated before their
        // end arrives, so reaching here means this one ran cleanly
        self.retry_count = 0;
        self.streak_reported = false;

        if self.listening && self.restart_at.is_none() {
            self.restart_at = Some(Instant::now() + self.fast_restart);
        }

        self.publish_state();
    }

    fn schedule_retry(&mut self, code: &RecognizerErrorCode) {
        if !self.retry.allows(self.retry_count) {
            let err = Error::RetriesExhausted {
                attempts: self.retry_count,
            };
            tracing::error!(%code, attempts = self.retry_count, "recognizer retries exhausted");
            self.halt();
            self.emit(EngineEvent::Error(err.to_string()));
            return;
        }

        let delay = self.retry.delay_for_attempt(self.retry_count);
        self.retry_count += 1;

        tracing::warn!(
            %code,
            attempt = self.retry_count,
            max_retries = self.retry.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "recognizer failed, restarting"
        );

        if !self.streak_reported && !code.is_benign() {
            self.streak_reported = true;
            self.emit(EngineEvent::Error(code.user_message()));
        }

        self.restart_at = Some(Instant::now() + delay);
        self.publish_state();
    }

    /// Stop on an error that retrying cannot fix
    fn fail(&mut self, code: &RecognizerErrorCode) {
        tracing::error!(%code, class = ?code.class(), "wake word listening stopped");
        self.halt();
        self.emit(EngineEvent::Error(code.user_message()));
    }

    fn halt(&mut self) {
        self.restart_at = None;
        self.invalidate_session();
        self.recognizer.abort();
        self.listening = false;
        self.retry_count = 0;
        self.streak_reported = false;
        self.detector.reset();
        self.publish_state();
    }

    fn teardown(&mut self) {
        self.restart_at = None;
        self.invalidate_session();
        self.recognizer.abort();
        self.listening = false;
        self.state.send_replace(self.snapshot());
    }

    fn invalidate_session(&mut self) {
        self.generation += 1;
        self.session_active = false;
    }

    fn snapshot(&self) -> ListeningState {
        ListeningState {
            is_listening: self.listening,
            sensitivity: self.detector.sensitivity(),
            detection_count: self.detector.detection_count(),
            last_detection_time: self.detector.last_detection_time(),
            noise_level: self.noise.level(),
            recognition_active: self.session_active,
        }
    }

    /// Push the current snapshot if it changed
    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        let changed = self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                current.clone_from(&snapshot);
                true
            }
        });

        if changed {
            self.emit(EngineEvent::ListeningStateChanged(snapshot));
        }
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("engine event receiver dropped");
        }
    }
}

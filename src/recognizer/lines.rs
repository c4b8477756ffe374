//! Line-protocol recognizer
//!
//! Feeds transcripts from a stream of text lines, one event per line:
//!
//! ```text
//! > hey ki        interim transcript
//! hey kiaan       final transcript
//! ! no-speech     recognizer error code
//!                 (blank) end of utterance
//! ```
//!
//! Useful for piping the output of an external speech-to-text tool into the
//! engine, and for replaying recorded sessions.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::{Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerSink};

/// Recognizer that reads protocol lines from a channel
pub struct LineRecognizer {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
    closed: Arc<watch::Sender<bool>>,
    language: String,
    task: Option<JoinHandle<()>>,
}

impl LineRecognizer {
    /// Create a recognizer over a channel of protocol lines
    #[must_use]
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            closed: Arc::new(watch::Sender::new(false)),
            language: "en-US".to_string(),
            task: None,
        }
    }

    /// Current locale
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Flips to `true` once the line source is exhausted and the final
    /// session has delivered its end event
    #[must_use]
    pub fn input_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Parse one protocol line
    #[must_use]
    pub fn parse_line(line: &str) -> RecognizerEvent {
        let line = line.trim();

        if line.is_empty() {
            RecognizerEvent::End
        } else if let Some(rest) = line.strip_prefix('>') {
            RecognizerEvent::Result {
                transcript: rest.trim().to_string(),
                is_final: false,
            }
        } else if let Some(rest) = line.strip_prefix('!') {
            RecognizerEvent::Error(RecognizerErrorCode::parse(rest))
        } else {
            RecognizerEvent::Result {
                transcript: line.to_string(),
                is_final: true,
            }
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Recognizer for LineRecognizer {
    fn start(&mut self, sink: RecognizerSink) -> Result<(), RecognizerErrorCode> {
        self.cancel();

        let lines = Arc::clone(&self.lines);
        let closed = Arc::clone(&self.closed);
        let language = self.language.clone();
        tracing::debug!(session = sink.session(), %language, "line recognizer session started");

        self.task = Some(tokio::spawn(async move {
            let mut lines = lines.lock().await;
            loop {
                let Some(line) = lines.recv().await else {
                    sink.end();
                    closed.send_replace(true);
                    break;
                };

                let event = Self::parse_line(&line);
                let ended = event == RecognizerEvent::End;
                sink.send(event);
                if ended {
                    break;
                }
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        self.cancel();
    }

    fn abort(&mut self) {
        self.cancel();
    }

    fn set_language(&mut self, code: &str) {
        self.language = code.to_string();
    }

    fn is_listening(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LineRecognizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Speech recognizer collaborator
//!
//! The engine never transcribes audio itself. A [`Recognizer`] produces
//! transcripts and lifecycle events through a [`RecognizerSink`]; the
//! engine owns when it starts and stops.

mod lines;

pub use lines::LineRecognizer;

use tokio::sync::mpsc;

/// Error codes reported by a recognizer session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecognizerErrorCode {
    /// No speech heard before the recognizer timed out
    NoSpeech,
    /// Session aborted, usually by an intentional mode switch
    Aborted,
    /// No usable microphone
    AudioCapture,
    /// Network failure talking to the recognition service
    Network,
    /// Microphone permission refused
    NotAllowed,
    /// Recognition service refused by policy
    ServiceNotAllowed,
    /// Grammar rejected by the recognizer
    BadGrammar,
    /// Locale not supported by the recognizer
    LanguageNotSupported,
    /// Any other code
    Other(String),
}

/// How the engine reacts to an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// User action required; never retried
    Permission,
    /// Not retried
    Fatal,
    /// Retried with backoff
    Recoverable,
}

impl RecognizerErrorCode {
    /// Parse a recognizer's string code
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "bad-grammar" => Self::BadGrammar,
            "language-not-supported" => Self::LanguageNotSupported,
            other => Self::Other(other.to_string()),
        }
    }

    /// Classify for recovery
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotAllowed | Self::ServiceNotAllowed => ErrorClass::Permission,
            Self::AudioCapture | Self::BadGrammar | Self::LanguageNotSupported => {
                ErrorClass::Fatal
            }
            Self::NoSpeech | Self::Aborted | Self::Network | Self::Other(_) => {
                ErrorClass::Recoverable
            }
        }
    }

    /// Expected during continuous listening; never surfaced to consumers
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }

    /// Message shown to the user for this error
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAllowed | Self::ServiceNotAllowed => {
                "Microphone access was denied. Allow microphone access to use the wake word."
                    .to_string()
            }
            Self::AudioCapture => "No microphone was found for wake word listening.".to_string(),
            Self::LanguageNotSupported => {
                "The selected language is not supported for wake word listening.".to_string()
            }
            Self::BadGrammar => "The speech recognizer rejected its configuration.".to_string(),
            Self::Network => {
                "Wake word listening lost its network connection; retrying.".to_string()
            }
            Self::NoSpeech | Self::Aborted => "Wake word listening paused.".to_string(),
            Self::Other(code) => format!("Wake word listening was interrupted ({code}); retrying."),
        }
    }
}

impl std::fmt::Display for RecognizerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::Aborted => write!(f, "aborted"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::Network => write!(f, "network"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::ServiceNotAllowed => write!(f, "service-not-allowed"),
            Self::BadGrammar => write!(f, "bad-grammar"),
            Self::LanguageNotSupported => write!(f, "language-not-supported"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

impl From<RecognizerErrorCode> for crate::Error {
    fn from(code: RecognizerErrorCode) -> Self {
        match code.class() {
            ErrorClass::Permission => Self::PermissionDenied(code.user_message()),
            ErrorClass::Fatal => Self::Recognizer(code.user_message()),
            ErrorClass::Recoverable => Self::RecognizerTransient(code.to_string()),
        }
    }
}

/// Event produced by a running recognizer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A transcript; interim results may still change
    Result { transcript: String, is_final: bool },
    /// The session failed
    Error(RecognizerErrorCode),
    /// The session ended
    End,
}

/// Where a recognizer session delivers its events
///
/// Each session gets its own sink. Events from a session the engine has
/// already stopped or replaced are discarded.
#[derive(Debug, Clone)]
pub struct RecognizerSink {
    session: u64,
    tx: mpsc::UnboundedSender<(u64, RecognizerEvent)>,
}

impl RecognizerSink {
    pub(crate) const fn new(session: u64, tx: mpsc::UnboundedSender<(u64, RecognizerEvent)>) -> Self {
        Self { session, tx }
    }

    /// Session this sink belongs to
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// Deliver a transcript
    pub fn result(&self, transcript: impl Into<String>, is_final: bool) {
        self.send(RecognizerEvent::Result {
            transcript: transcript.into(),
            is_final,
        });
    }

    /// Deliver an error code
    pub fn error(&self, code: RecognizerErrorCode) {
        self.send(RecognizerEvent::Error(code));
    }

    /// Signal end of session
    pub fn end(&self) {
        self.send(RecognizerEvent::End);
    }

    /// Deliver any event
    pub fn send(&self, event: RecognizerEvent) {
        // engine gone; nothing left to notify
        let _ = self.tx.send((self.session, event));
    }
}

/// A continuous speech recognizer
///
/// Implementations must deliver events through the sink in the order they
/// happen and must not block in any method.
pub trait Recognizer: Send {
    /// Whether recognition is available at all in this environment
    fn is_supported(&self) -> bool {
        true
    }

    /// Start a session delivering events to `sink`
    ///
    /// # Errors
    ///
    /// Returns the recognizer's error code if the session cannot start
    fn start(&mut self, sink: RecognizerSink) -> std::result::Result<(), RecognizerErrorCode>;

    /// Stop gracefully, letting pending results through
    fn stop(&mut self);

    /// Stop immediately, discarding pending results
    fn abort(&mut self);

    /// Change the recognition locale; only takes effect on the next start
    fn set_language(&mut self, code: &str);

    /// Whether a session is currently running
    fn is_listening(&self) -> bool;
}

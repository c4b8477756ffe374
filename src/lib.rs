//! Kiaan Wake - wake word detection over a continuous speech recognizer
//!
//! This library turns a stream of partial and final transcripts into
//! reliable "the user said the wake phrase" events:
//! - Text normalization and phonetic keys
//! - Four-pass matching (exact, phonetic, fuzzy, subsequence)
//! - Sensitivity-tuned accumulation and cooldown
//! - A recognizer session engine with fast restart and backoff
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Speech Recognizer                     │
//! │   result(transcript, is_final)  │  error  │  end    │
//! └────────────────────┬────────────────────────────────┘
//!                      │ (session, event)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 WakeWordEngine                       │
//! │   Session state  │  Restart / backoff  │  Noise     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               WakeWordDetector                       │
//! │   Matcher  │  Accumulator  │  Cooldown              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod recognizer;
pub mod session;
pub mod wake;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use recognizer::{
    ErrorClass, LineRecognizer, Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerSink,
};
pub use session::{EngineEvent, ListeningState, RetryPolicy, WakeWordEngine};
pub use wake::{
    DetectionEvent, MatchKind, MatchResult, PhraseCatalogue, Sensitivity, SensitivityProfile,
    WakePhrase, WakeWordDetector, extract_command, match_transcript,
};

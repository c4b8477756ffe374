//! Error types for the wake word engine

use thiserror::Error;

/// Result type alias for wake word engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the wake word engine
///
/// Matching never fails; every variant here comes from configuration,
/// the recognizer collaborator, or the engine lifecycle.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone or speech consent was refused
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// Speech recognition is unavailable in this environment
    #[error("speech recognition unsupported: {0}")]
    Unsupported(String),

    /// Recoverable recognizer failure (network blip, timeout, abort)
    #[error("speech recognizer interrupted: {0}")]
    RecognizerTransient(String),

    /// Transient failures exceeded the retry cap
    #[error("wake word listening stopped after multiple failures ({attempts} attempts); restart required")]
    RetriesExhausted {
        /// Number of restart attempts made in the failure streak
        attempts: u32,
    },

    /// Non-recoverable recognizer failure
    #[error("speech recognizer error: {0}")]
    Recognizer(String),

    /// The engine was destroyed
    #[error("wake word engine is closed")]
    EngineClosed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

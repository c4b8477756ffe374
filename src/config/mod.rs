//! Engine configuration
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::time::Duration;

use crate::session::RetryPolicy;
use crate::wake::Sensitivity;
use crate::{Error, Result};

pub use file::{WakeConfigFile, config_file_path, load_config_file, read_config_file};

/// Default recognizer locale
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default delay before restarting a session that ended normally
pub const DEFAULT_FAST_RESTART: Duration = Duration::from_millis(50);

/// Wake word engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Recognizer locale, passed through to the recognizer untouched
    pub language: String,
    /// Custom wake phrases; `None` uses the default catalogue
    pub wake_words: Option<Vec<String>>,
    pub sensitivity: Sensitivity,
    pub retry: RetryPolicy,
    /// Gap between a session ending and the next one starting
    pub fast_restart: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            wake_words: None,
            sensitivity: Sensitivity::default(),
            retry: RetryPolicy::default(),
            fast_restart: DEFAULT_FAST_RESTART,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a sensitivity value is not a known level
    pub fn load() -> Result<Self> {
        Self::from_sources(load_config_file(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a sensitivity value is not a known level
    pub fn from_sources(
        fc: WakeConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let language = env("KIAAN_WAKE_LANGUAGE")
            .filter(|l| !l.trim().is_empty())
            .or(fc.language)
            .unwrap_or(defaults.language);

        let sensitivity = match env("KIAAN_WAKE_SENSITIVITY").or(fc.sensitivity) {
            Some(level) => level.parse()?,
            None => defaults.sensitivity,
        };

        let wake_words = env("KIAAN_WAKE_WORDS")
            .map(|words| {
                words
                    .split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|words| !words.is_empty())
            .or(fc.wake_words);

        let retry = RetryPolicy {
            max_retries: fc.retry.max_retries.unwrap_or(defaults.retry.max_retries),
            base_delay: fc
                .retry
                .base_delay_ms
                .map_or(defaults.retry.base_delay, Duration::from_millis),
            max_delay: fc
                .retry
                .max_delay_ms
                .map_or(defaults.retry.max_delay, Duration::from_millis),
        };

        if retry.max_delay < retry.base_delay {
            return Err(Error::Config(format!(
                "retry max_delay ({}ms) is shorter than base_delay ({}ms)",
                retry.max_delay.as_millis(),
                retry.base_delay.as_millis()
            )));
        }

        let fast_restart = fc
            .retry
            .fast_restart_ms
            .map_or(defaults.fast_restart, Duration::from_millis);

        tracing::debug!(
            %language,
            %sensitivity,
            custom_phrases = wake_words.as_ref().map_or(0, Vec::len),
            max_retries = retry.max_retries,
            "engine config loaded"
        );

        Ok(Self {
            language,
            wake_words,
            sensitivity,
            retry,
            fast_restart,
        })
    }
}

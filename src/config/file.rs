//! TOML configuration file loading
//!
//! Supports `~/.config/kiaan/wake/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct WakeConfigFile {
    /// Recognizer locale (e.g. "en-US", "hi-IN")
    #[serde(default)]
    pub language: Option<String>,

    /// Sensitivity level ("ultra", "high", "medium", "low")
    #[serde(default)]
    pub sensitivity: Option<String>,

    /// Custom wake phrases, replacing the default catalogue
    #[serde(default)]
    pub wake_words: Option<Vec<String>>,

    /// Recognizer restart tuning
    #[serde(default)]
    pub retry: RetryFileConfig,
}

/// Restart and backoff configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,

    /// Delay before restarting after a session ends normally
    pub fast_restart_ms: Option<u64>,
}

/// Load config from the default path, returning defaults if missing or invalid
#[must_use]
pub fn load_config_file() -> WakeConfigFile {
    let Some(path) = config_file_path() else {
        return WakeConfigFile::default();
    };

    load_config_from(&path)
}

/// Load config from `path`, returning defaults if missing or invalid
#[must_use]
pub fn load_config_from(path: &Path) -> WakeConfigFile {
    if !path.exists() {
        return WakeConfigFile::default();
    }

    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            WakeConfigFile::default()
        }
    }
}

/// Read and parse the config file at `path`
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read, or `Error::Toml` if it is
/// not a valid config file
pub fn read_config_file(path: &Path) -> Result<WakeConfigFile> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse config file contents
///
/// # Errors
///
/// Returns `Error::Toml` on malformed TOML or mistyped keys
pub fn parse_config(content: &str) -> Result<WakeConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/kiaan/wake/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("kiaan")
            .join("wake")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let file: WakeConfigFile = toml::from_str(
            r#"
            language = "hi-IN"
            sensitivity = "high"
            wake_words = ["hey kiaan", "namaste kiaan"]

            [retry]
            max_retries = 3
            base_delay_ms = 500
            fast_restart_ms = 20
            "#,
        )
        .unwrap();

        assert_eq!(file.language.as_deref(), Some("hi-IN"));
        assert_eq!(file.sensitivity.as_deref(), Some("high"));
        assert_eq!(file.wake_words.as_ref().map(Vec::len), Some(2));
        assert_eq!(file.retry.max_retries, Some(3));
        assert_eq!(file.retry.base_delay_ms, Some(500));
        assert_eq!(file.retry.max_delay_ms, None);
        assert_eq!(file.retry.fast_restart_ms, Some(20));
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let file: WakeConfigFile = toml::from_str("").unwrap();
        assert!(file.language.is_none());
        assert!(file.wake_words.is_none());
        assert!(file.retry.max_retries.is_none());
    }

    #[test]
    fn test_missing_path_gives_defaults() {
        let file = load_config_from(Path::new("/nonexistent/kiaan/wake/config.toml"));
        assert!(file.sensitivity.is_none());
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = read_config_file(Path::new("/nonexistent/kiaan/wake/config.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let result = parse_config("sensitivity = [\"high\"");
        assert!(matches!(result, Err(crate::Error::Toml(_))));

        let result = parse_config("[retry]\nmax_retries = \"five\"");
        assert!(matches!(result, Err(crate::Error::Toml(_))));
    }

    #[test]
    fn test_config_path_suffix() {
        if let Some(path) = config_file_path() {
            assert!(path.ends_with("kiaan/wake/config.toml"));
        }
    }
}

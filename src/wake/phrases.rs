//! Wake phrase catalogue and recognizer misspelling table

use std::collections::HashSet;
use std::sync::Arc;

use super::normalize::{normalize, phonetic_keys};
use crate::{Error, Result};

/// Activation phrases used when no catalogue is configured
///
/// Casual greetings plus the cultural variants users actually say.
pub const DEFAULT_WAKE_WORDS: &[&str] = &[
    "hey kiaan",
    "hi kiaan",
    "hello kiaan",
    "ok kiaan",
    "okay kiaan",
    "yo kiaan",
    "namaste kiaan",
    "kiaan ji",
];

/// Known recognizer misspellings, keyed by the canonical token
const VARIANTS: &[(&str, &[&str])] = &[
    (
        "kiaan",
        &[
            "kian", "kion", "keaan", "kiyan", "kiyaan", "kyan", "kyaan", "keyan", "kean", "keon",
            "kiann", "qian",
        ],
    ),
    ("hey", &["hay", "hei", "hae"]),
    ("okay", &["ok", "okey", "okie"]),
    ("ok", &["okay", "okey"]),
    ("namaste", &["namastey", "namasthe", "namastay"]),
    ("hello", &["helo", "hallo", "hullo"]),
];

/// A wake phrase with its phonetic keys precomputed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakePhrase {
    text: String,
    words: Vec<String>,
    phonetic: Vec<String>,
}

impl WakePhrase {
    /// Build a phrase from raw text, normalizing it
    ///
    /// Returns `None` when nothing alphabetic remains.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let text = normalize(raw);
        if text.is_empty() {
            return None;
        }

        let words = text.split(' ').map(ToString::to_string).collect();
        let phonetic = phonetic_keys(&text);

        Some(Self {
            text,
            words,
            phonetic,
        })
    }

    /// Normalized phrase text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Phrase words
    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Per-word phonetic keys
    #[must_use]
    pub fn phonetic(&self) -> &[String] {
        &self.phonetic
    }

    /// Number of words in the phrase
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl std::fmt::Display for WakePhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered, de-duplicated set of wake phrases
#[derive(Debug, Clone)]
pub struct PhraseCatalogue {
    phrases: Vec<Arc<WakePhrase>>,
}

impl PhraseCatalogue {
    /// Build a catalogue from raw phrases
    ///
    /// Phrases are normalized; duplicates and empty phrases are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no usable phrase remains
    pub fn new<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let phrases: Vec<Arc<WakePhrase>> = raw
            .into_iter()
            .filter_map(|p| WakePhrase::new(p.as_ref()))
            .filter(|p| seen.insert(p.text.clone()))
            .map(Arc::new)
            .collect();

        if phrases.is_empty() {
            return Err(Error::Config("wake word catalogue is empty".to_string()));
        }

        tracing::debug!(
            phrases = ?phrases.iter().map(|p| p.text()).collect::<Vec<_>>(),
            "wake phrase catalogue built"
        );

        Ok(Self { phrases })
    }

    /// Iterate phrases in catalogue order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WakePhrase>> {
        self.phrases.iter()
    }

    /// Number of phrases
    #[must_use]
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Always false; construction rejects empty catalogues
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl Default for PhraseCatalogue {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_WAKE_WORDS
                .iter()
                .filter_map(|p| WakePhrase::new(p))
                .map(Arc::new)
                .collect(),
        }
    }
}

/// Canonical token → known recognizer misspellings
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneticVariantTable;

impl PhoneticVariantTable {
    /// Misspellings recorded for `token`, empty if it is not brittle
    #[must_use]
    pub fn variants(self, token: &str) -> &'static [&'static str] {
        match VARIANTS.iter().find(|(canonical, _)| *canonical == token) {
            Some((_, variants)) => *variants,
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_phrase_precomputes_keys() {
        let phrase = WakePhrase::new("  Hey, KIAAN ").unwrap();
        assert_eq!(phrase.text(), "hey kiaan");
        assert_eq!(phrase.words(), &["hey", "kiaan"]);
        assert_eq!(phrase.phonetic(), &["hay", "kan"]);
        assert_eq!(phrase.word_count(), 2);
    }

    #[test]
    fn test_wake_phrase_rejects_empty() {
        assert!(WakePhrase::new("!!!").is_none());
    }

    #[test]
    fn test_catalogue_dedups_and_normalizes() {
        let catalogue = PhraseCatalogue::new(["Hey Kiaan", "hey kiaan!", "", "Hi Kiaan"]).unwrap();
        let texts: Vec<&str> = catalogue.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["hey kiaan", "hi kiaan"]);
    }

    #[test]
    fn test_empty_catalogue_is_config_error() {
        let result = PhraseCatalogue::new(["", "?!"]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_catalogue() {
        let catalogue = PhraseCatalogue::default();
        assert_eq!(catalogue.len(), DEFAULT_WAKE_WORDS.len());
        assert!(catalogue.iter().any(|p| p.text() == "hey kiaan"));
    }

    #[test]
    fn test_variant_table() {
        let table = PhoneticVariantTable;
        assert!(table.variants("kiaan").contains(&"kian"));
        assert!(!table.variants("hey").is_empty());
        assert!(table.variants("weather").is_empty());
    }
}

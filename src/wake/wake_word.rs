//! Wake word detection
//!
//! Accumulates matches across recognizer events and decides the exact
//! moment a detection fires. One detector belongs to one recognition
//! stream; events must be fed in arrival order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::distance::levenshtein;
use super::matcher::{MatchKind, MatchResult, match_transcript};
use super::normalize::normalize;
use super::phrases::{PhraseCatalogue, WakePhrase};
use super::sensitivity::{Sensitivity, SensitivityProfile};

/// Interim hits at or above this confidence fire without waiting for more evidence
const INTERIM_FAST_PATH: f32 = 0.85;

/// Interim hits need this many consecutive matches on the accumulated-evidence path
const ACCUMULATED_MIN: u32 = 2;

/// A confirmed wake word detection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    /// Catalogue phrase that fired
    pub phrase: String,
    pub confidence: f32,
    #[serde(rename = "matchType")]
    pub kind: MatchKind,
    /// Time from the first hint of this phrase to firing
    pub latency_ms: u64,
    /// Raw transcript that fired
    pub transcript: String,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    /// Encode as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the event cannot be encoded
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Consecutive-match tracking between recognizer events
#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    pub consecutive_count: u32,
    pub last_phrase: Option<Arc<WakePhrase>>,
    pub first_hint: Option<Instant>,
}

/// Detects wake phrases in a stream of transcripts
#[derive(Debug)]
pub struct WakeWordDetector {
    catalogue: PhraseCatalogue,
    sensitivity: Sensitivity,
    accumulator: AccumulatorState,
    last_result: Option<MatchResult>,
    last_detection: Option<Instant>,
    last_detection_time: Option<DateTime<Utc>>,
    detection_count: u64,
}

impl WakeWordDetector {
    /// Create a detector over `catalogue` at the given sensitivity
    #[must_use]
    pub fn new(catalogue: PhraseCatalogue, sensitivity: Sensitivity) -> Self {
        tracing::debug!(
            phrases = catalogue.len(),
            %sensitivity,
            "wake word detector initialized"
        );

        Self {
            catalogue,
            sensitivity,
            accumulator: AccumulatorState::default(),
            last_result: None,
            last_detection: None,
            last_detection_time: None,
            detection_count: 0,
        }
    }

    /// Evaluate one recognizer event
    ///
    /// Returns the detection if this event fires one. A single call fires at
    /// most once.
    pub fn evaluate(
        &mut self,
        transcript: &str,
        is_final: bool,
        now: Instant,
    ) -> Option<DetectionEvent> {
        let profile = self.sensitivity.profile();

        if self.in_cooldown(now, profile.cooldown) {
            self.last_result = None;
            return None;
        }

        let result = match_transcript(transcript, &self.catalogue, profile);
        self.last_result = Some(result.clone());

        let Some(phrase) = result.phrase.filter(|_| result.matched) else {
            if self.accumulator.last_phrase.is_some() {
                tracing::trace!("match streak broken");
                self.reset();
            }
            return None;
        };

        if self.accumulator.last_phrase.as_ref() == Some(&phrase) {
            self.accumulator.consecutive_count += 1;
        } else {
            self.accumulator = AccumulatorState {
                consecutive_count: 1,
                last_phrase: Some(Arc::clone(&phrase)),
                first_hint: Some(now),
            };
        }

        let count = self.accumulator.consecutive_count;
        tracing::debug!(
            phrase = %phrase,
            kind = %result.kind,
            confidence = result.confidence,
            count,
            is_final,
            "wake phrase candidate"
        );

        if !should_fire(profile, is_final, count, result.confidence) {
            return None;
        }

        let first_hint = self.accumulator.first_hint.unwrap_or(now);
        let latency = now.saturating_duration_since(first_hint);
        let timestamp = Utc::now();

        self.reset();
        self.last_detection = Some(now);
        self.last_detection_time = Some(timestamp);
        self.detection_count += 1;

        let event = DetectionEvent {
            phrase: phrase.text().to_string(),
            confidence: result.confidence,
            kind: result.kind,
            latency_ms: duration_ms(latency),
            transcript: transcript.to_string(),
            timestamp,
        };

        tracing::info!(
            phrase = %event.phrase,
            kind = %event.kind,
            confidence = event.confidence,
            latency_ms = event.latency_ms,
            "wake word detected"
        );

        Some(event)
    }

    fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_detection
            .is_some_and(|last| now.saturating_duration_since(last) < cooldown)
    }

    /// Clear the consecutive-match streak
    pub fn reset(&mut self) {
        self.accumulator = AccumulatorState::default();
    }

    /// Switch sensitivity; the streak is cleared so thresholds never mix
    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.sensitivity = sensitivity;
        self.reset();
    }

    /// Replace the phrase catalogue and clear the streak
    pub fn set_catalogue(&mut self, catalogue: PhraseCatalogue) {
        self.catalogue = catalogue;
        self.reset();
    }

    /// Current sensitivity level
    #[must_use]
    pub const fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    /// Active phrase catalogue
    #[must_use]
    pub const fn catalogue(&self) -> &PhraseCatalogue {
        &self.catalogue
    }

    /// Consecutive matches of the currently tracked phrase
    #[must_use]
    pub const fn consecutive_count(&self) -> u32 {
        self.accumulator.consecutive_count
    }

    /// Phrase currently being tracked
    #[must_use]
    pub fn tracked_phrase(&self) -> Option<&WakePhrase> {
        self.accumulator.last_phrase.as_deref()
    }

    /// Match result of the last evaluation, `None` if it was skipped by cooldown
    #[must_use]
    pub const fn last_result(&self) -> Option<&MatchResult> {
        self.last_result.as_ref()
    }

    /// Detections fired so far
    #[must_use]
    pub const fn detection_count(&self) -> u64 {
        self.detection_count
    }

    /// Wall-clock time of the last detection
    #[must_use]
    pub fn last_detection_time(&self) -> Option<DateTime<Utc>> {
        self.last_detection_time
    }
}

/// Firing rules, checked in order
fn should_fire(profile: &SensitivityProfile, is_final: bool, count: u32, confidence: f32) -> bool {
    if !is_final && !profile.allow_interim {
        return false;
    }
    if count < profile.required_consecutive {
        return false;
    }
    if !is_final && confidence >= INTERIM_FAST_PATH {
        return true;
    }
    if is_final {
        return confidence >= profile.exact_threshold;
    }
    count >= ACCUMULATED_MIN && confidence >= profile.fuzzy_threshold
}

/// Strip the detected phrase and anything before it, returning what follows
///
/// The phrase is aligned against the transcript word by word on normalized
/// text, taking the closest window so near-miss detections ("hey kian play
/// music") still split. The returned command keeps the transcript's own
/// words. Without a close window the whole transcript is the command.
///
/// Used after a detection to hand the rest of the utterance on as a command.
#[must_use]
pub fn extract_command(transcript: &str, phrase: &str) -> String {
    let phrase = normalize(phrase);
    let phrase_words: Vec<&str> = phrase.split(' ').filter(|w| !w.is_empty()).collect();

    let tokens: Vec<(&str, String)> = transcript
        .split_whitespace()
        .map(|raw| (raw, normalize(raw)))
        .filter(|(_, word)| !word.is_empty())
        .collect();

    let width = phrase_words.len();
    if width == 0 || tokens.len() < width {
        return transcript.trim().to_string();
    }

    let phrase_len: usize = phrase_words.iter().map(|w| w.chars().count()).sum();
    let closest = (0..=tokens.len() - width)
        .map(|start| {
            let distance: usize = phrase_words
                .iter()
                .zip(&tokens[start..start + width])
                .map(|(p, (_, t))| levenshtein(p, t))
                .sum();
            (distance, start)
        })
        .min_by_key(|&(distance, _)| distance);

    match closest {
        Some((distance, start)) if distance * 2 <= phrase_len => tokens[start + width..]
            .iter()
            .map(|(raw, _)| *raw)
            .collect::<Vec<_>>()
            .join(" ")
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .to_string(),
        _ => transcript.trim().to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

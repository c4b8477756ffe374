//! Listening state snapshots and engine events

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::wake::{DetectionEvent, Sensitivity};

/// Snapshot of the engine, pushed after every state transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningState {
    /// Engine wants to be listening (false when idle or stopped)
    pub is_listening: bool,
    pub sensitivity: Sensitivity,
    pub detection_count: u64,
    pub last_detection_time: Option<DateTime<Utc>>,
    /// Share of recent recognizer activity that was speech without a wake phrase
    pub noise_level: f32,
    /// A recognizer session is currently running
    pub recognition_active: bool,
}

impl ListeningState {
    pub(crate) const fn idle(sensitivity: Sensitivity) -> Self {
        Self {
            is_listening: false,
            sensitivity,
            detection_count: 0,
            last_detection_time: None,
            noise_level: 0.0,
            recognition_active: false,
        }
    }
}

/// Event delivered to engine consumers, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A wake phrase was detected
    WakeWordDetected(DetectionEvent),
    /// A user-facing error message
    Error(String),
    /// Sensitivity changed
    SensitivityChanged(Sensitivity),
    /// Listening state changed
    ListeningStateChanged(ListeningState),
}

impl EngineEvent {
    /// Encode as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the event cannot be encoded
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Smoothing for the noise estimate
const NOISE_ALPHA: f32 = 0.2;

/// Exponential moving average of "heard something that was not a wake phrase"
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseEstimator {
    level: f32,
}

impl NoiseEstimator {
    /// Recognizer heard nothing
    pub fn silence(&mut self) {
        self.observe(0.0);
    }

    /// Recognizer heard speech that matched no phrase
    pub fn chatter(&mut self) {
        self.observe(1.0);
    }

    fn observe(&mut self, sample: f32) {
        self.level = self.level.mul_add(1.0 - NOISE_ALPHA, sample * NOISE_ALPHA);
    }

    /// Current estimate in `[0, 1]`
    #[must_use]
    pub const fn level(&self) -> f32 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_rises_with_chatter_and_decays_with_silence() {
        let mut noise = NoiseEstimator::default();
        assert!(noise.level().abs() < f32::EPSILON);

        for _ in 0..10 {
            noise.chatter();
        }
        let noisy = noise.level();
        assert!(noisy > 0.8 && noisy <= 1.0, "{noisy}");

        noise.silence();
        assert!(noise.level() < noisy);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = EngineEvent::SensitivityChanged(Sensitivity::Low)
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"type":"sensitivityChanged","payload":"low"}"#);
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let state = ListeningState::idle(Sensitivity::High);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isListening"], false);
        assert_eq!(json["sensitivity"], "high");
        assert_eq!(json["recognitionActive"], false);
    }
}

//! Transcript-level wake word matching
//!
//! Data flows leaf to root: normalize → distance → matcher → detector.

mod distance;
mod matcher;
mod normalize;
mod phrases;
mod sensitivity;
mod wake_word;

pub use distance::levenshtein;
pub use matcher::{MatchKind, MatchResult, match_transcript};
pub use normalize::{normalize, phonetic_key, phonetic_keys};
pub use phrases::{DEFAULT_WAKE_WORDS, PhoneticVariantTable, PhraseCatalogue, WakePhrase};
pub use sensitivity::{Sensitivity, SensitivityProfile};
pub use wake_word::{AccumulatorState, DetectionEvent, WakeWordDetector, extract_command};

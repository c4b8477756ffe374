//! Multi-pass wake phrase matcher
//!
//! Four passes run in a fixed order and the first pass that accepts any
//! catalogue phrase wins, even when a later pass would score higher:
//!
//! 1. exact substring
//! 2. phonetic (known misspellings, then per-word phonetic keys)
//! 3. Levenshtein-fuzzy sliding window
//! 4. in-order subsequence alignment
//!
//! Everything here is pure and deterministic.

use std::sync::Arc;

use serde::Serialize;

use super::distance::{levenshtein, longer_len, within_ratio};
use super::normalize::{normalize, phonetic_key};
use super::phrases::{PhoneticVariantTable, PhraseCatalogue, WakePhrase};
use super::sensitivity::SensitivityProfile;

/// Confidence for a cataloged misspelling hit
const VARIANT_CONFIDENCE: f32 = 0.9;

/// Confidence multipliers per pass
const PHONETIC_WEIGHT: f32 = 0.85;
const FUZZY_WEIGHT: f32 = 0.8;
const SUBSEQUENCE_WEIGHT: f32 = 0.7;

/// Largest phonetic key distance, as a share of the longer key
const PHONETIC_KEY_RATIO: f32 = 0.3;

/// Largest word distance for subsequence alignment, as a share of the longer word
const ALIGNMENT_RATIO: f32 = 0.4;

/// Which pass produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Phonetic,
    Fuzzy,
    Subsequence,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Phonetic => write!(f, "phonetic"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::Subsequence => write!(f, "subsequence"),
        }
    }
}

/// Outcome of matching one transcript against the catalogue
///
/// When `matched` is false, `kind` is `Exact` and carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched: bool,
    pub confidence: f32,
    #[serde(rename = "matchType")]
    pub kind: MatchKind,
    #[serde(rename = "matchedPhrase", serialize_with = "phrase_text")]
    pub phrase: Option<Arc<WakePhrase>>,
}

impl MatchResult {
    /// The negative result
    #[must_use]
    pub const fn no_match() -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            kind: MatchKind::Exact,
            phrase: None,
        }
    }
}

fn phrase_text<S: serde::Serializer>(
    phrase: &Option<Arc<WakePhrase>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match phrase {
        Some(p) => s.serialize_some(p.text()),
        None => s.serialize_none(),
    }
}

/// A transcript prepared once for every pass
struct Transcript {
    text: String,
    words: Vec<String>,
    keys: Vec<String>,
}

impl Transcript {
    fn new(raw: &str) -> Self {
        let text = normalize(raw);
        let words: Vec<String> = text
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(ToString::to_string)
            .collect();
        let keys = words.iter().map(|w| phonetic_key(w)).collect();

        Self { text, words, keys }
    }
}

type Pass = fn(&Transcript, &WakePhrase, &SensitivityProfile) -> Option<f32>;

const PASSES: [(MatchKind, Pass); 4] = [
    (MatchKind::Exact, exact_pass),
    (MatchKind::Phonetic, phonetic_pass),
    (MatchKind::Fuzzy, fuzzy_pass),
    (MatchKind::Subsequence, subsequence_pass),
];

/// Match `transcript` against every phrase in `catalogue`
///
/// Within a pass the highest confidence wins; ties go to the phrase with
/// more words, then to catalogue order.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn match_transcript(
    transcript: &str,
    catalogue: &PhraseCatalogue,
    profile: &SensitivityProfile,
) -> MatchResult {
    let input = Transcript::new(transcript);
    if input.words.is_empty() {
        return MatchResult::no_match();
    }

    for (kind, pass) in PASSES {
        let mut best: Option<(f32, &Arc<WakePhrase>)> = None;

        for phrase in catalogue.iter() {
            let Some(confidence) = pass(&input, phrase, profile) else {
                continue;
            };

            let better = best.is_none_or(|(c, p)| {
                confidence > c || (confidence == c && phrase.word_count() > p.word_count())
            });
            if better {
                best = Some((confidence, phrase));
            }
        }

        if let Some((confidence, phrase)) = best {
            tracing::trace!(
                transcript = %input.text,
                phrase = %phrase,
                %kind,
                confidence,
                "wake phrase matched"
            );
            return MatchResult {
                matched: true,
                confidence,
                kind,
                phrase: Some(Arc::clone(phrase)),
            };
        }
    }

    MatchResult::no_match()
}

fn exact_pass(input: &Transcript, phrase: &WakePhrase, _: &SensitivityProfile) -> Option<f32> {
    input.text.contains(phrase.text()).then_some(1.0)
}

fn phonetic_pass(
    input: &Transcript,
    phrase: &WakePhrase,
    profile: &SensitivityProfile,
) -> Option<f32> {
    if VARIANT_CONFIDENCE >= profile.phonetic_threshold && contains_variant(input, phrase) {
        return Some(VARIANT_CONFIDENCE);
    }

    let score = best_window(input.keys.len(), phrase.word_count(), |start| {
        let window = &input.keys[start..start + phrase.word_count()];
        let total: f32 = phrase
            .phonetic()
            .iter()
            .zip(window)
            .map(|(p, t)| key_similarity(p, t))
            .sum();
        Some(total / len_f32(phrase.word_count()))
    })?;

    (score >= profile.phonetic_threshold).then_some(score * PHONETIC_WEIGHT)
}

/// Substitute one brittle word at a time with each of its known misspellings
fn contains_variant(input: &Transcript, phrase: &WakePhrase) -> bool {
    let table = PhoneticVariantTable;
    let words = phrase.words();

    words.iter().enumerate().any(|(i, word)| {
        table.variants(word).iter().any(|variant| {
            let candidate = words
                .iter()
                .enumerate()
                .map(|(j, w)| if i == j { *variant } else { w.as_str() })
                .collect::<Vec<_>>()
                .join(" ");
            input.text.contains(&candidate)
        })
    })
}

fn key_similarity(phrase_key: &str, transcript_key: &str) -> f32 {
    if phrase_key == transcript_key {
        return 1.0;
    }

    within_ratio(phrase_key, transcript_key, PHONETIC_KEY_RATIO).map_or(0.0, |d| {
        1.0 - len_f32(d) / len_f32(longer_len(phrase_key, transcript_key))
    })
}

fn fuzzy_pass(input: &Transcript, phrase: &WakePhrase, profile: &SensitivityProfile) -> Option<f32> {
    let similarity = best_window(input.words.len(), phrase.word_count(), |start| {
        let window = &input.words[start..start + phrase.word_count()];
        let (distance, max_len) = phrase
            .words()
            .iter()
            .zip(window)
            .fold((0, 0), |(d, m), (p, t)| {
                (d + levenshtein(p, t), m + longer_len(p, t))
            });

        if distance > profile.max_levenshtein_distance || max_len == 0 {
            return None;
        }
        Some(1.0 - len_f32(distance) / len_f32(max_len))
    })?;

    (similarity >= profile.fuzzy_threshold).then_some(similarity * FUZZY_WEIGHT)
}

/// Greedy in-order alignment; skipped transcript words cost nothing
fn subsequence_pass(
    input: &Transcript,
    phrase: &WakePhrase,
    profile: &SensitivityProfile,
) -> Option<f32> {
    let mut cursor = 0;
    let mut matched = 0usize;

    for word in phrase.words() {
        let hit = input.words[cursor..]
            .iter()
            .position(|t| within_ratio(word, t, ALIGNMENT_RATIO).is_some());
        if let Some(offset) = hit {
            matched += 1;
            cursor += offset + 1;
        }
    }

    let fraction = len_f32(matched) / len_f32(phrase.word_count());
    (fraction >= profile.subsequence_threshold).then_some(fraction * SUBSEQUENCE_WEIGHT)
}

/// Highest score over every window of `width` words
fn best_window(len: usize, width: usize, score: impl Fn(usize) -> Option<f32>) -> Option<f32> {
    if width == 0 || len < width {
        return None;
    }

    (0..=len - width)
        .filter_map(score)
        .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
}

#[allow(clippy::cast_precision_loss)]
fn len_f32(n: usize) -> f32 {
    n as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wake::Sensitivity;

    fn medium() -> &'static SensitivityProfile {
        Sensitivity::Medium.profile()
    }

    #[test]
    fn test_every_phrase_matches_itself_exactly() {
        let catalogue = PhraseCatalogue::default();
        for level in Sensitivity::ALL {
            for phrase in catalogue.iter() {
                let result = match_transcript(phrase.text(), &catalogue, level.profile());
                assert!(result.matched, "{phrase} at {level}");
                assert_eq!(result.kind, MatchKind::Exact);
                assert!((result.confidence - 1.0).abs() < f32::EPSILON);
                assert_eq!(result.phrase.as_deref(), Some(phrase.as_ref()));
            }
        }
    }

    #[test]
    fn test_exact_inside_longer_transcript() {
        let catalogue = PhraseCatalogue::default();
        let result = match_transcript("Um, hey Kiaan, what's the weather?", &catalogue, medium());
        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.phrase.unwrap().text(), "hey kiaan");
    }

    #[test]
    fn test_cataloged_misspelling_is_phonetic() {
        let catalogue = PhraseCatalogue::default();
        let result = match_transcript("hey kian", &catalogue, medium());
        assert!(result.matched);
        assert_eq!(result.kind, MatchKind::Phonetic);
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(result.phrase.unwrap().text(), "hey kiaan");
    }

    #[test]
    fn test_phonetic_key_window() {
        let catalogue = PhraseCatalogue::new(["hello computer"]).unwrap();
        // "compuder" differs from "computer" by one letter in its phonetic key
        let result = match_transcript("well hello compuder", &catalogue, medium());
        assert_eq!(result.kind, MatchKind::Phonetic);
        let expected = (1.0 + 7.0 / 8.0) / 2.0 * 0.85;
        assert!((result.confidence - expected).abs() < 1e-5, "{}", result.confidence);
    }

    #[test]
    fn test_fuzzy_window() {
        let catalogue = PhraseCatalogue::new(["hey kiaan"]).unwrap();
        // key "kam" is a third away from "kan", too far for the phonetic pass
        let result = match_transcript("hey kiaam", &catalogue, medium());
        assert_eq!(result.kind, MatchKind::Fuzzy);
        let expected = (1.0 - 1.0 / 8.0) * 0.8;
        assert!((result.confidence - expected).abs() < 1e-5, "{}", result.confidence);
    }

    #[test]
    fn test_fuzzy_respects_max_distance() {
        let catalogue = PhraseCatalogue::new(["hey kiaan"]).unwrap();
        // two edits: within high (3) but not low (1)
        let high = match_transcript("hay kiaam", &catalogue, Sensitivity::High.profile());
        assert_eq!(high.kind, MatchKind::Fuzzy);
        let low = match_transcript("hay kiaam", &catalogue, Sensitivity::Low.profile());
        assert_eq!(low.kind, MatchKind::Subsequence);
    }

    #[test]
    fn test_subsequence_skips_filler_words() {
        let catalogue = PhraseCatalogue::new(["hey kiaan"]).unwrap();
        let result = match_transcript("hey um so kiaan", &catalogue, medium());
        assert_eq!(result.kind, MatchKind::Subsequence);
        assert!((result.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_exact_pass_takes_priority_across_phrases() {
        // "hey kian" exact-matches the second phrase; the phonetic hit on the
        // first phrase is never considered
        let catalogue = PhraseCatalogue::new(["hey kiaan", "hey kian"]).unwrap();
        let result = match_transcript("hey kian", &catalogue, medium());
        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.phrase.unwrap().text(), "hey kian");
    }

    #[test]
    fn test_longer_phrase_wins_ties() {
        let catalogue = PhraseCatalogue::new(["kiaan", "hey kiaan"]).unwrap();
        let result = match_transcript("hey kiaan", &catalogue, medium());
        assert_eq!(result.phrase.unwrap().text(), "hey kiaan");
    }

    #[test]
    fn test_unrelated_transcripts_do_not_match() {
        let catalogue = PhraseCatalogue::default();
        for transcript in [
            "the weather is nice today",
            "please turn off the lights",
            "what time does the store close",
            "",
            "!!!",
        ] {
            for level in [Sensitivity::Medium, Sensitivity::Low] {
                let result = match_transcript(transcript, &catalogue, level.profile());
                assert!(!result.matched, "{transcript:?} at {level}");
                assert_eq!(result, MatchResult::no_match());
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let catalogue = PhraseCatalogue::default();
        let a = match_transcript("hay kyan there", &catalogue, medium());
        let b = match_transcript("hay kyan there", &catalogue, medium());
        assert_eq!(a, b);
    }

    /// Cheap deterministic generator for noisy transcripts
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            ((self.0 >> 33) as usize) % bound
        }
    }

    #[test]
    fn test_long_noisy_transcripts_only_reach_subsequence() {
        // Scattered partial words ("hay" … "kin") align in order across a long
        // transcript. The alignment does not penalize skipped words, so these
        // can match, but only through the weakest pass.
        let filler = [
            "so", "we", "went", "to", "market", "and", "bought", "bread", "milk", "then",
            "drove", "back", "across", "river", "before", "dinner", "later", "tonight",
        ];
        let partials = ["hay", "kin", "kan", "hy", "kiann"];
        let catalogue = PhraseCatalogue::new(["hey kiaan"]).unwrap();
        let mut rng = Lcg(7);

        for _ in 0..200 {
            let len = 40 + rng.next(80);
            let words: Vec<&str> = (0..len)
                .map(|_| {
                    if rng.next(10) == 0 {
                        partials[rng.next(partials.len())]
                    } else {
                        filler[rng.next(filler.len())]
                    }
                })
                .collect();
            let transcript = words.join(" ");

            for level in Sensitivity::ALL {
                let profile = level.profile();
                let result = match_transcript(&transcript, &catalogue, profile);
                if !result.matched {
                    continue;
                }
                if result.kind == MatchKind::Subsequence {
                    assert!(result.confidence <= SUBSEQUENCE_WEIGHT + f32::EPSILON);
                    // never enough for a final transcript to fire at medium or low
                    if matches!(level, Sensitivity::Medium | Sensitivity::Low) {
                        assert!(result.confidence < profile.exact_threshold);
                    }
                }
            }
        }
    }
}

//! Transcript normalization and phonetic keys
//!
//! Recognizers misspell names in predictable ways ("kiaan" → "kian", "keaan").
//! A phonetic key folds those spellings together so they compare equal.

/// Digraphs folded to a single consonant, applied in this order
const DIGRAPHS: [(&str, &str); 9] = [
    ("ph", "f"),
    ("ck", "k"),
    ("th", "t"),
    ("sh", "s"),
    ("ch", "k"),
    ("wh", "w"),
    ("gh", "g"),
    ("kn", "n"),
    ("wr", "r"),
];

const fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Lowercase `raw`, drop every non-alphabetic character and collapse
/// whitespace runs to single interior spaces.
///
/// Punctuation is removed rather than replaced, so "kiaan's" becomes "kiaans".
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphabetic() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }

    out
}

/// Derive the phonetic key of a single word
///
/// Steps, in order: digraph folding, doubled-letter collapsing, vowel runs
/// collapsed to a single `a`, and a trailing vowel stripped. Input is
/// expected to be normalized already.
#[must_use]
pub fn phonetic_key(word: &str) -> String {
    let mut folded = word.to_string();
    for (from, to) in DIGRAPHS {
        if folded.contains(from) {
            folded = folded.replace(from, to);
        }
    }

    let mut key = String::with_capacity(folded.len());
    let mut prev: Option<char> = None;
    for c in folded.chars() {
        if prev == Some(c) {
            continue;
        }
        prev = Some(c);

        if is_vowel(c) {
            if !key.ends_with('a') {
                key.push('a');
            }
        } else {
            key.push(c);
        }
    }

    if key.ends_with('a') {
        key.pop();
    }

    key
}

/// Phonetic keys for every word of an already-normalized phrase
#[must_use]
pub fn phonetic_keys(normalized: &str) -> Vec<String> {
    normalized.split(' ').filter(|w| !w.is_empty()).map(phonetic_key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize(" Hey,  KIAAN!! "), "hey kiaan");
        assert_eq!(normalize("Hey\tthere\n  Kiaan."), "hey there kiaan");
        assert_eq!(normalize("kiaan's"), "kiaans");
    }

    #[test]
    fn test_normalize_all_punctuation_is_empty() {
        assert_eq!(normalize("?!... ,, 123"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_drops_digits_between_words() {
        assert_eq!(normalize("hey 42 kiaan"), "hey kiaan");
    }

    #[test]
    fn test_phonetic_key_folds_spellings() {
        assert_eq!(phonetic_key("kiaan"), "kan");
        assert_eq!(phonetic_key("kian"), "kan");
        assert_eq!(phonetic_key("keaan"), "kan");
        assert_eq!(phonetic_key("kion"), "kan");
    }

    #[test]
    fn test_phonetic_key_digraphs() {
        assert_eq!(phonetic_key("phone"), "fan");
        assert_eq!(phonetic_key("knight"), "nagt");
        assert_eq!(phonetic_key("write"), "rat");
        assert_eq!(phonetic_key("check"), "kak");
    }

    #[test]
    fn test_phonetic_key_doubles_and_trailing_vowel() {
        assert_eq!(phonetic_key("hello"), "hal");
        assert_eq!(phonetic_key("computer"), "campatar");
        assert_eq!(phonetic_key("hey"), "hay");
        assert_eq!(phonetic_key("a"), "");
    }

    #[test]
    fn test_phonetic_keys_per_word() {
        assert_eq!(phonetic_keys("hey kiaan"), vec!["hay", "kan"]);
        assert!(phonetic_keys("").is_empty());
    }
}

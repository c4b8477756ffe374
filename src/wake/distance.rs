//! Levenshtein edit distance

/// Edit distance between two strings over Unicode code points
///
/// Insert, delete and substitute each cost 1. Symmetric, and an empty
/// input yields the length of the other string.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Length of the longer string, in code points
#[must_use]
pub fn longer_len(a: &str, b: &str) -> usize {
    a.chars().count().max(b.chars().count())
}

/// Whether `a` and `b` differ by at most `ratio` of the longer length
///
/// Returns the distance when it is within bounds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn within_ratio(a: &str, b: &str, ratio: f32) -> Option<usize> {
    let distance = levenshtein(a, b);
    let bound = longer_len(a, b) as f32 * ratio;

    (distance as f32 <= bound).then_some(distance)
}

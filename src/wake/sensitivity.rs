//! Sensitivity levels and their detection profiles

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named precision/recall tradeoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Fires on the faintest resemblance
    Ultra,
    /// Favors recall
    High,
    /// Balanced
    #[default]
    Medium,
    /// Favors precision
    Low,
}

impl Sensitivity {
    /// All levels, most to least sensitive
    pub const ALL: [Self; 4] = [Self::Ultra, Self::High, Self::Medium, Self::Low];

    /// Detection profile for this level
    #[must_use]
    pub fn profile(self) -> &'static SensitivityProfile {
        match self {
            Self::Ultra => &ULTRA,
            Self::High => &HIGH,
            Self::Medium => &MEDIUM,
            Self::Low => &LOW,
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ultra" => Ok(Self::Ultra),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(crate::Error::Config(format!(
                "unknown sensitivity '{other}' (expected ultra, high, medium or low)"
            ))),
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ultra => write!(f, "ultra"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Thresholds and timing for one sensitivity level
///
/// Every threshold, the cooldown and the consecutive-match requirement grow
/// from `ultra` to `low`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityProfile {
    /// Minimum confidence for an exact hit, and for final transcripts to fire
    pub exact_threshold: f32,
    /// Minimum averaged phonetic window score
    pub phonetic_threshold: f32,
    /// Minimum normalized similarity for the fuzzy pass, and for accumulated interim hits
    pub fuzzy_threshold: f32,
    /// Minimum matched-word fraction for the subsequence pass
    pub subsequence_threshold: f32,
    /// Minimum time between two detections
    #[serde(serialize_with = "duration_ms::serialize")]
    pub cooldown: Duration,
    /// Consecutive matches of the same phrase before firing
    pub required_consecutive: u32,
    /// Whether interim transcripts may fire
    pub allow_interim: bool,
    /// Largest summed edit distance accepted by the fuzzy pass
    pub max_levenshtein_distance: usize,
}

static ULTRA: SensitivityProfile = SensitivityProfile {
    exact_threshold: 0.6,
    phonetic_threshold: 0.55,
    fuzzy_threshold: 0.5,
    subsequence_threshold: 0.5,
    cooldown: Duration::from_millis(1000),
    required_consecutive: 1,
    allow_interim: true,
    max_levenshtein_distance: 4,
};

static HIGH: SensitivityProfile = SensitivityProfile {
    exact_threshold: 0.7,
    phonetic_threshold: 0.65,
    fuzzy_threshold: 0.6,
    subsequence_threshold: 0.65,
    cooldown: Duration::from_millis(1500),
    required_consecutive: 1,
    allow_interim: true,
    max_levenshtein_distance: 3,
};

static MEDIUM: SensitivityProfile = SensitivityProfile {
    exact_threshold: 0.8,
    phonetic_threshold: 0.72,
    fuzzy_threshold: 0.7,
    subsequence_threshold: 0.8,
    cooldown: Duration::from_millis(2000),
    required_consecutive: 2,
    allow_interim: true,
    max_levenshtein_distance: 2,
};

static LOW: SensitivityProfile = SensitivityProfile {
    exact_threshold: 0.9,
    phonetic_threshold: 0.8,
    fuzzy_threshold: 0.78,
    subsequence_threshold: 0.9,
    cooldown: Duration::from_millis(3000),
    required_consecutive: 2,
    allow_interim: false,
    max_levenshtein_distance: 1,
};

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_tighten_from_ultra_to_low() {
        for pair in Sensitivity::ALL.windows(2) {
            let (looser, stricter) = (pair[0].profile(), pair[1].profile());
            assert!(looser.exact_threshold < stricter.exact_threshold);
            assert!(looser.phonetic_threshold < stricter.phonetic_threshold);
            assert!(looser.fuzzy_threshold < stricter.fuzzy_threshold);
            assert!(looser.subsequence_threshold < stricter.subsequence_threshold);
            assert!(looser.cooldown < stricter.cooldown);
            assert!(looser.required_consecutive <= stricter.required_consecutive);
            assert!(looser.max_levenshtein_distance >= stricter.max_levenshtein_distance);
        }
    }

    #[test]
    fn test_sensitivity_parse() {
        assert_eq!("ULTRA".parse::<Sensitivity>().unwrap(), Sensitivity::Ultra);
        assert_eq!(" low ".parse::<Sensitivity>().unwrap(), Sensitivity::Low);
        assert!("extreme".parse::<Sensitivity>().is_err());
    }

    #[test]
    fn test_sensitivity_display_roundtrip() {
        for level in Sensitivity::ALL {
            assert_eq!(level.to_string().parse::<Sensitivity>().unwrap(), level);
        }
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(Sensitivity::default(), Sensitivity::Medium);
        assert_eq!(Sensitivity::default().profile().required_consecutive, 2);
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Fixed-point scale applied to every score before comparison.
pub const SCORE_SCALE: i64 = 1_000_000;

/// A score rounded to six decimal places and stored as an integer.
///
/// Two scores within `1e-6` of each other collapse to the same key, so ties
/// are detected by plain integer equality and never by float comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScoreKey(i64);

impl ScoreKey {
    /// Returns `None` for NaN, infinities and values outside the key range.
    pub fn from_score(score: f64) -> Option<Self> {
        if !score.is_finite() {
            return None;
        }
        let scaled = (score * SCORE_SCALE as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn to_score(self) -> f64 {
        self.0 as f64 / SCORE_SCALE as f64
    }
}

impl fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCORE_SCALE;
        let frac = (self.0 % SCORE_SCALE).abs();
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let sign = if self.0 < 0 && whole == 0 { "-" } else { "" };
        let digits = format!("{frac:06}");
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for ScoreKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_score())
    }
}

impl<'de> Deserialize<'de> for ScoreKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let score = f64::deserialize(deserializer)?;
        Self::from_score(score)
            .ok_or_else(|| serde::de::Error::custom(format!("score {score} is not finite")))
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An exact non-negative ratio such as a pass multiple (`17/10`) or a cap
/// ratio (`3/10`).
///
/// Counts derived from a multiple are computed with integer arithmetic, so
/// `floor(50 * 1.2)` is always 60 and `3 * 8/3` is always 8.
#[derive(Debug, Clone, Copy)]
pub struct Multiple {
    num: u64,
    den: u64,
}

impl Multiple {
    pub const ONE: Multiple = Multiple { num: 1, den: 1 };

    pub fn new(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        Some(Self::reduced(num as u128, den as u128))
    }

    pub const fn whole(value: u64) -> Self {
        Self { num: value, den: 1 }
    }

    fn reduced(num: u128, den: u128) -> Self {
        let divisor = gcd(num, den).max(1);
        Self {
            num: (num / divisor) as u64,
            den: (den / divisor) as u64,
        }
    }

    pub fn numerator(self) -> u64 {
        self.num
    }

    pub fn denominator(self) -> u64 {
        self.den
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// `floor(n * self)`
    pub fn floor_of(self, n: u64) -> u64 {
        (n as u128 * self.num as u128 / self.den as u128) as u64
    }

    /// `ceil(n * self)`
    pub fn ceil_of(self, n: u64) -> u64 {
        (n as u128 * self.num as u128).div_ceil(self.den as u128) as u64
    }

    pub fn times(self, other: Multiple) -> Multiple {
        Self::reduced(
            self.num as u128 * other.num as u128,
            self.den as u128 * other.den as u128,
        )
    }

    pub fn min(self, other: Multiple) -> Multiple {
        if other < self {
            other
        } else {
            self
        }
    }

    pub fn percent(self) -> Multiple {
        self.times(Multiple::whole(100))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

impl PartialEq for Multiple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Multiple {}

impl PartialOrd for Multiple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Multiple {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as u128 * other.den as u128;
        let rhs = other.num as u128 * self.den as u128;
        lhs.cmp(&rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMultipleError(String);

impl fmt::Display for ParseMultipleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid multiple '{}': expected a decimal like \"1.5\"", self.0)
    }
}

impl std::error::Error for ParseMultipleError {}

impl FromStr for Multiple {
    type Err = ParseMultipleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let err = || ParseMultipleError(raw.to_string());
        let text = raw.trim();
        let (whole, frac) = match text.split_once('.') {
            Some((_, "")) => return Err(err()),
            Some((whole, frac)) => (whole, frac),
            None => (text, ""),
        };
        if whole.is_empty() || frac.len() > 9 {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }

        let den = 10u64.pow(frac.len() as u32);
        let whole: u64 = whole.parse().map_err(|_| err())?;
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| err())?
        };
        let num = whole
            .checked_mul(den)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(err)?;
        Multiple::new(num, den).ok_or_else(err)
    }
}

impl fmt::Display for Multiple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            return write!(f, "{}", self.num);
        }
        let text = format!("{:.4}", self.as_f64());
        write!(f, "{}", text.trim_end_matches('0').trim_end_matches('.'))
    }
}

impl Serialize for Multiple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMultiple {
    Whole(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for Multiple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawMultiple::deserialize(deserializer)? {
            RawMultiple::Whole(value) => Ok(Multiple::whole(value)),
            RawMultiple::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::bonus::{BonusFamily, BonusRule};
use crate::multiple::Multiple;

const BUILTIN_POLICY: &str = include_str!("../../../policies/default.toml");
const BUILTIN_NAME: &str = "builtin";

/// Environment variable naming a policy file to use instead of the builtin.
pub const POLICY_ENV: &str = "PASSLINE_POLICY";

static BUILTIN: OnceCell<Policy> = OnceCell::new();

/// Regulatory constants behind every threshold and cap.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(skip)]
    name: String,
    schema_version: u32,
    threshold: ThresholdPolicy,
    bonus: BonusPolicy,
    #[serde(default)]
    competitors: CompetitorLimits,
    #[serde(default)]
    prediction: PredictionPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdPolicy {
    /// Inner "likely" boundary never exceeds this multiple.
    pub likely_cap: Multiple,
    /// Outer "challenge" boundary as a factor of the pass multiple.
    pub challenge_factor: Multiple,
    /// Graduated multiples, largest `min_recruit` first.
    pub multiples: Vec<MultipleBand>,
    /// Absolute pass counts for cohorts below the smallest band.
    pub small_cohort: Vec<SmallCohortRow>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultipleBand {
    pub min_recruit: u64,
    pub multiple: Multiple,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmallCohortRow {
    pub recruit: u64,
    pub pass_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BonusPolicy {
    veteran: BonusRuleConfig,
    hero: BonusRuleConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BonusRuleConfig {
    min_recruit: u64,
    cap_ratio: Multiple,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompetitorLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for CompetitorLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionPolicy {
    /// Predictions over fewer participants than this (or than the pass
    /// count) carry a low-sample disclaimer.
    pub low_sample_floor: usize,
}

impl Default for PredictionPolicy {
    fn default() -> Self {
        Self {
            low_sample_floor: 10,
        }
    }
}

impl Policy {
    pub fn builtin() -> Result<Self> {
        BUILTIN
            .get_or_try_init(|| Self::from_toml_str(BUILTIN_NAME, BUILTIN_POLICY))
            .cloned()
    }

    pub fn from_toml_str(name: &str, text: &str) -> Result<Self> {
        let mut policy: Policy =
            toml::from_str(text).with_context(|| format!("Failed to parse policy '{name}'"))?;
        policy.name = name.to_string();
        policy
            .validate()
            .with_context(|| format!("Invalid policy '{name}'"))?;
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy {}", path.display()))?;
        Self::from_toml_str(&path.display().to_string(), &text)
    }

    /// Explicit path, then [`POLICY_ENV`], then the builtin policy.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(POLICY_ENV) {
            Some(path) if !path.is_empty() => {
                log::debug!("Using policy from {POLICY_ENV}");
                Self::load(Path::new(&path))
            }
            _ => Self::builtin(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> &ThresholdPolicy {
        &self.threshold
    }

    pub fn competitors(&self) -> CompetitorLimits {
        self.competitors
    }

    pub fn prediction(&self) -> PredictionPolicy {
        self.prediction
    }

    /// Cap rule for a bonus family; `None` for [`BonusFamily::None`].
    pub fn bonus_rule(&self, family: BonusFamily) -> Option<BonusRule> {
        let config = match family {
            BonusFamily::None => return None,
            BonusFamily::Veteran => self.bonus.veteran,
            BonusFamily::Hero => self.bonus.hero,
        };
        Some(BonusRule {
            family,
            min_recruit: config.min_recruit,
            cap_ratio: config.cap_ratio,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.schema_version != 1 {
            bail!(
                "schema_version {} is not supported (expected 1)",
                self.schema_version
            );
        }
        self.threshold.validate()?;

        for (path, rule) in [
            ("bonus.veteran", self.bonus.veteran),
            ("bonus.hero", self.bonus.hero),
        ] {
            if rule.cap_ratio == Multiple::whole(0) || rule.cap_ratio > Multiple::ONE {
                bail!("{path}.cap_ratio must be in (0, 1], got {}", rule.cap_ratio);
            }
        }

        let limits = self.competitors;
        if limits.default_limit == 0 || limits.default_limit > limits.max_limit {
            bail!(
                "competitors.default_limit must be in [1, max_limit={}], got {}",
                limits.max_limit,
                limits.default_limit
            );
        }
        Ok(())
    }
}

impl ThresholdPolicy {
    fn validate(&self) -> Result<()> {
        if self.likely_cap < Multiple::ONE {
            bail!("threshold.likely_cap must be >= 1, got {}", self.likely_cap);
        }
        if self.challenge_factor < Multiple::ONE {
            bail!(
                "threshold.challenge_factor must be >= 1, got {}",
                self.challenge_factor
            );
        }

        let smallest = self
            .multiples
            .last()
            .ok_or_else(|| anyhow!("threshold.multiples must not be empty"))?;
        for pair in self.multiples.windows(2) {
            if pair[0].min_recruit <= pair[1].min_recruit {
                bail!(
                    "threshold.multiples must be ordered by descending min_recruit ({} before {})",
                    pair[0].min_recruit,
                    pair[1].min_recruit
                );
            }
        }
        for band in &self.multiples {
            if band.multiple < Multiple::ONE {
                bail!(
                    "threshold.multiples: multiple for min_recruit {} must be >= 1, got {}",
                    band.min_recruit,
                    band.multiple
                );
            }
        }
        if smallest.min_recruit == 0 {
            bail!("threshold.multiples: min_recruit must be positive");
        }

        for recruit in 1..smallest.min_recruit {
            let row = self
                .small_cohort
                .iter()
                .find(|row| row.recruit == recruit)
                .ok_or_else(|| {
                    anyhow!("threshold.small_cohort has no entry for recruit {recruit}")
                })?;
            if row.pass_count < row.recruit {
                bail!(
                    "threshold.small_cohort: pass_count {} is below recruit {}",
                    row.pass_count,
                    row.recruit
                );
            }
        }
        Ok(())
    }
}

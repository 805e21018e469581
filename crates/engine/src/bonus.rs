//! Bonus-point categories and the cap on candidates who pass only because
//! of a bonus.
//!
//! A candidate "passes by bonus" when they are inside the pass count ranked
//! by final score but outside it ranked by raw score. For each bonus family
//! the number of such candidates may not exceed `floor(recruit * cap_ratio)`.
//!
//! The check runs against whatever cohort snapshot the caller loaded. Two
//! submissions validated concurrently can each see a cohort without the
//! other and both be accepted, ending up over the cap once stored. The cap
//! is therefore advisory unless the caller serializes validate-then-write
//! per cohort key.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cohort::{CohortMember, SubmissionId};
use crate::error::{EngineError, Result};
use crate::multiple::Multiple;
use crate::policy::Policy;
use crate::score_key::ScoreKey;
use crate::threshold::{positive_recruit, ThresholdCalculator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    #[default]
    None,
    /// 취업지원대상자 10%
    Veteran10,
    /// 취업지원대상자 5%
    Veteran5,
    /// 의사상자 5%
    Hero5,
    /// 의사상자 3%
    Hero3,
}

impl BonusType {
    pub const ALL: [BonusType; 5] = [
        BonusType::None,
        BonusType::Veteran10,
        BonusType::Veteran5,
        BonusType::Hero5,
        BonusType::Hero3,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            BonusType::None => "none",
            BonusType::Veteran10 => "veteran10",
            BonusType::Veteran5 => "veteran5",
            BonusType::Hero5 => "hero5",
            BonusType::Hero3 => "hero3",
        }
    }

    pub const fn rate_percent(self) -> u32 {
        match self {
            BonusType::None => 0,
            BonusType::Veteran10 => 10,
            BonusType::Veteran5 | BonusType::Hero5 => 5,
            BonusType::Hero3 => 3,
        }
    }

    pub const fn family(self) -> BonusFamily {
        family_of(self)
    }

    /// `raw * (1 + rate)`
    pub fn apply(self, raw_score: f64) -> f64 {
        raw_score * f64::from(100 + self.rate_percent()) / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusFamily {
    None,
    Veteran,
    Hero,
}

impl BonusFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            BonusFamily::None => "none",
            BonusFamily::Veteran => "veteran",
            BonusFamily::Hero => "hero",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BonusFamily::None => "없음",
            BonusFamily::Veteran => "취업지원대상자",
            BonusFamily::Hero => "의사상자",
        }
    }
}

impl fmt::Display for BonusFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const fn family_of(bonus: BonusType) -> BonusFamily {
    match bonus {
        BonusType::None => BonusFamily::None,
        BonusType::Veteran10 | BonusType::Veteran5 => BonusFamily::Veteran,
        BonusType::Hero5 | BonusType::Hero3 => BonusFamily::Hero,
    }
}

/// Eligibility gate and cap for one bonus family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BonusRule {
    pub family: BonusFamily,
    pub min_recruit: u64,
    pub cap_ratio: Multiple,
}

impl BonusRule {
    pub fn cap_count(&self, recruit: u64) -> u64 {
        self.cap_ratio.floor_of(recruit)
    }
}

/// The submission being created or edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusCandidate {
    /// `None` for a new submission.
    #[serde(default)]
    pub id: Option<SubmissionId>,
    pub raw_score: f64,
    pub final_score: f64,
    #[serde(default)]
    pub bonus_type: BonusType,
    #[serde(default)]
    pub has_cutoff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoBonus,
    CutoffFailed,
    NoPassCount,
}

/// Outcome of a validation that did not reject the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BonusCheck {
    Skipped {
        reason: SkipReason,
    },
    /// Applicants do not outnumber recruits, so no bonus can displace anyone.
    Exempt {
        family: BonusFamily,
        cohort_size: usize,
        recruit_count: u64,
    },
    Within {
        family: BonusFamily,
        beneficiaries: usize,
        cap_count: u64,
        pass_count: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct CandidateRow {
    id: SubmissionId,
    raw: ScoreKey,
    fin: ScoreKey,
    bonus: BonusType,
}

pub struct BonusCapValidator<'a> {
    policy: &'a Policy,
}

impl<'a> BonusCapValidator<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// Reject the candidate when their bonus family would exceed its cap.
    ///
    /// `cohort` is the current qualifying cohort. When the candidate edits an
    /// existing row, that row is replaced by the candidate's new scores.
    pub fn validate(
        &self,
        candidate: &BonusCandidate,
        cohort: &[CohortMember],
        recruit_count: i64,
    ) -> Result<BonusCheck> {
        let Some(rule) = self.policy.bonus_rule(candidate.bonus_type.family()) else {
            return Ok(BonusCheck::Skipped {
                reason: SkipReason::NoBonus,
            });
        };
        if candidate.has_cutoff {
            return Ok(BonusCheck::Skipped {
                reason: SkipReason::CutoffFailed,
            });
        }

        let recruit = positive_recruit(recruit_count)?;
        let cap_count = rule.cap_count(recruit);
        if recruit < rule.min_recruit || cap_count < 1 {
            log::info!(
                "Rejected {} bonus: recruit {} below eligibility (min {}, cap {})",
                rule.family,
                recruit,
                rule.min_recruit,
                cap_count
            );
            return Err(EngineError::BonusFamilyIneligible {
                family: rule.family,
                recruit_count: recruit,
                min_recruit_count: rule.min_recruit,
                cap_count,
            });
        }

        let rows = candidate_rows(candidate, cohort)?;
        if rows.len() as u64 <= recruit {
            log::warn!(
                "Bonus cap not enforced: {} applicants for {} recruits",
                rows.len(),
                recruit
            );
            return Ok(BonusCheck::Exempt {
                family: rule.family,
                cohort_size: rows.len(),
                recruit_count: recruit,
            });
        }

        let pass_count = ThresholdCalculator::new(self.policy.threshold()).pass_count(recruit_count)?;
        if pass_count < 1 {
            return Ok(BonusCheck::Skipped {
                reason: SkipReason::NoPassCount,
            });
        }

        let beneficiaries = bonus_beneficiaries(&rows, pass_count as usize, rule.family);
        if beneficiaries as u64 > cap_count {
            log::info!(
                "Rejected {} bonus: {} beneficiaries over cap {} (pass count {})",
                rule.family,
                beneficiaries,
                cap_count,
                pass_count
            );
            return Err(EngineError::BonusCapExceeded {
                family: rule.family,
                cap_count,
                cap_percent: rule.cap_ratio.percent(),
                beneficiaries,
            });
        }

        log::debug!(
            "{} bonus within cap: {} of {} (pass count {})",
            rule.family,
            beneficiaries,
            cap_count,
            pass_count
        );
        Ok(BonusCheck::Within {
            family: rule.family,
            beneficiaries,
            cap_count,
            pass_count,
        })
    }
}

fn candidate_rows(candidate: &BonusCandidate, cohort: &[CohortMember]) -> Result<Vec<CandidateRow>> {
    let id = candidate.id.unwrap_or(SubmissionId::PENDING);
    let own = CandidateRow {
        id,
        raw: entered_score("raw_score", candidate.raw_score)?,
        fin: entered_score("final_score", candidate.final_score)?,
        bonus: candidate.bonus_type,
    };

    let mut rows = Vec::with_capacity(cohort.len() + 1);
    for member in cohort.iter().filter(|member| member.id != id) {
        let invalid = || EngineError::InvalidScore {
            submission_id: member.id,
        };
        rows.push(CandidateRow {
            id: member.id,
            raw: member.raw_key().ok_or_else(invalid)?,
            fin: member.final_key().ok_or_else(invalid)?,
            bonus: member.bonus_type,
        });
    }
    rows.push(own);
    Ok(rows)
}

/// A score supplied with the request; a bad one is the caller's to fix.
pub(crate) fn entered_score(field: &'static str, value: f64) -> Result<ScoreKey> {
    ScoreKey::from_score(value)
        .filter(|key| key.raw() >= 0)
        .ok_or(EngineError::InvalidEnteredScore { field, value })
}

/// Members of the final-score pass set, holding a bonus of `family`, who are
/// not in the raw-score pass set. Ties break by ascending id in both sets.
fn bonus_beneficiaries(rows: &[CandidateRow], pass_count: usize, family: BonusFamily) -> usize {
    let mut by_final: Vec<&CandidateRow> = rows.iter().collect();
    by_final.sort_by_key(|row| (Reverse(row.fin), row.id));
    by_final.truncate(pass_count);

    let mut by_raw: Vec<&CandidateRow> = rows.iter().collect();
    by_raw.sort_by_key(|row| (Reverse(row.raw), row.id));
    let raw_passers: HashSet<SubmissionId> =
        by_raw.iter().take(pass_count).map(|row| row.id).collect();

    by_final
        .iter()
        .filter(|row| row.bonus.family() == family && !raw_passers.contains(&row.id))
        .count()
}

use crate::error::{EngineError, Result};
use crate::multiple::Multiple;
use crate::policy::ThresholdPolicy;
use serde::Serialize;

/// Pass and likely multiples derived from the recruit headcount.
pub struct ThresholdCalculator<'a> {
    policy: &'a ThresholdPolicy,
}

/// Rank limits of the five tiers for one recruit count, plus the multiples
/// they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankBoundaries {
    pub recruit_count: u64,
    pub pass_multiple: Multiple,
    pub likely_multiple: Multiple,
    pub challenge_multiple: Multiple,
    /// Last rank inside the hiring quota (the 1-multiple line).
    pub sure_max: usize,
    pub likely_max: usize,
    /// Last rank that advances to the interview; the pass count.
    pub possible_max: usize,
    pub challenge_max: usize,
}

impl RankBoundaries {
    pub fn pass_count(&self) -> usize {
        self.possible_max
    }
}

impl<'a> ThresholdCalculator<'a> {
    pub fn new(policy: &'a ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Ratio of interview-eligible candidates to recruits.
    ///
    /// Large cohorts use a graduated multiple. Below the smallest band the
    /// policy fixes an absolute pass count, expressed here as
    /// `pass_count / recruit_count`.
    pub fn pass_multiple(&self, recruit_count: i64) -> Result<Multiple> {
        let recruit = positive_recruit(recruit_count)?;

        if let Some(band) = self
            .policy
            .multiples
            .iter()
            .find(|band| recruit >= band.min_recruit)
        {
            return Ok(band.multiple);
        }

        self.policy
            .small_cohort
            .iter()
            .find(|row| row.recruit == recruit)
            .and_then(|row| Multiple::new(row.pass_count, recruit))
            .ok_or(EngineError::InvalidRecruitPolicy { recruit_count })
    }

    /// `min(likely_cap, pass)`: the inner boundary never passes the outer one.
    pub fn likely_multiple(&self, pass_multiple: Multiple) -> Multiple {
        self.policy.likely_cap.min(pass_multiple)
    }

    /// `ceil(recruit_count * pass_multiple)`
    pub fn pass_count(&self, recruit_count: i64) -> Result<u64> {
        let multiple = self.pass_multiple(recruit_count)?;
        Ok(multiple.ceil_of(positive_recruit(recruit_count)?))
    }

    pub fn boundaries(&self, recruit_count: i64) -> Result<RankBoundaries> {
        let recruit = positive_recruit(recruit_count)?;
        let pass_multiple = self.pass_multiple(recruit_count)?;
        let likely_multiple = self.likely_multiple(pass_multiple);
        let challenge_multiple = pass_multiple.times(self.policy.challenge_factor);

        let sure_max = recruit;
        let likely_max = likely_multiple.floor_of(recruit).max(1).max(sure_max);
        let possible_max = pass_multiple.ceil_of(recruit).max(likely_max);
        let challenge_max = challenge_multiple
            .floor_of(recruit)
            .max(1)
            .max(possible_max);

        let boundaries = RankBoundaries {
            recruit_count: recruit,
            pass_multiple,
            likely_multiple,
            challenge_multiple,
            sure_max: sure_max as usize,
            likely_max: likely_max as usize,
            possible_max: possible_max as usize,
            challenge_max: challenge_max as usize,
        };
        log::debug!(
            "Boundaries for recruit {}: pass x{} likely x{} ranks {}/{}/{}/{}",
            recruit,
            pass_multiple,
            likely_multiple,
            boundaries.sure_max,
            boundaries.likely_max,
            boundaries.possible_max,
            boundaries.challenge_max
        );
        Ok(boundaries)
    }
}

/// Recruit headcount as a positive integer, or [`EngineError::InvalidRecruitPolicy`].
pub fn positive_recruit(recruit_count: i64) -> Result<u64> {
    u64::try_from(recruit_count)
        .ok()
        .filter(|recruit| *recruit > 0)
        .ok_or(EngineError::InvalidRecruitPolicy { recruit_count })
}

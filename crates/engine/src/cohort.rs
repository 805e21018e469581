//! Cohort data as supplied by the surrounding application.
//!
//! The engine never talks to storage itself. Whatever owns submissions
//! implements [`CohortSource`], and every prediction or validation asks it
//! for a fresh snapshot.

use crate::bonus::BonusType;
use crate::error::SourceError;
use crate::score_key::ScoreKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub u64);

impl SubmissionId {
    /// Tie-break slot for a submission that has not been stored yet: it will
    /// receive the highest id, so it sorts after every existing row.
    pub const PENDING: SubmissionId = SubmissionId(u64::MAX);
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::PENDING {
            return f.write_str("pending");
        }
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    /// 공채
    Public,
    /// 경채
    Career,
}

impl ExamType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExamType::Public => "public",
            ExamType::Career => "career",
        }
    }
}

/// Identifies one ranking population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub exam_id: u64,
    pub region_id: u64,
    pub exam_type: ExamType,
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exam={} region={} type={}",
            self.exam_id,
            self.region_id,
            self.exam_type.as_str()
        )
    }
}

/// One ranked (non-cutoff-failed) submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMember {
    pub id: SubmissionId,
    pub user_id: u64,
    pub user_name: String,
    /// Score before any bonus percentage.
    pub raw_score: f64,
    /// `raw_score` with the bonus applied; this is what ranks.
    pub final_score: f64,
    #[serde(default)]
    pub bonus_type: BonusType,
}

impl CohortMember {
    pub fn final_key(&self) -> Option<ScoreKey> {
        ScoreKey::from_score(self.final_score).filter(|key| key.raw() >= 0)
    }

    pub fn raw_key(&self) -> Option<ScoreKey> {
        ScoreKey::from_score(self.raw_score).filter(|key| key.raw() >= 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamInfo {
    pub name: String,
    pub year: u16,
    pub round: u8,
}

/// "My" submission together with the metadata needed to rank it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateContext {
    pub key: CohortKey,
    pub exam: ExamInfo,
    pub region_name: String,
    pub submission: CohortMember,
    /// The submission failed a subject cutoff (과락) and is not part of any cohort.
    #[serde(default)]
    pub has_cutoff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateLookup {
    Submission(SubmissionId),
    LatestForUser {
        user_id: u64,
        #[serde(default)]
        exam_id: Option<u64>,
    },
}

/// External collaborators the engine reads from.
///
/// `load_cohort` must already exclude subject-cutoff-failed rows. Whether
/// suspicious rows are excluded is decided by the implementor.
pub trait CohortSource {
    fn resolve_candidate(&self, lookup: &CandidateLookup)
        -> Result<CandidateContext, SourceError>;

    fn load_cohort(&self, key: &CohortKey) -> Result<Vec<CohortMember>, SourceError>;

    /// Authorized hire count. Returned as-is; the engine validates it.
    fn recruit_count(&self, key: &CohortKey) -> Result<i64, SourceError>;
}

impl<S: CohortSource + ?Sized> CohortSource for &S {
    fn resolve_candidate(
        &self,
        lookup: &CandidateLookup,
    ) -> Result<CandidateContext, SourceError> {
        (**self).resolve_candidate(lookup)
    }

    fn load_cohort(&self, key: &CohortKey) -> Result<Vec<CohortMember>, SourceError> {
        (**self).load_cohort(key)
    }

    fn recruit_count(&self, key: &CohortKey) -> Result<i64, SourceError> {
        (**self).recruit_count(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_id_sorts_after_stored_ids() {
        assert!(SubmissionId(u64::MAX - 1) < SubmissionId::PENDING);
        assert_eq!(SubmissionId::PENDING.to_string(), "pending");
        assert_eq!(SubmissionId(42).to_string(), "42");
    }

    #[test]
    fn negative_or_non_finite_scores_have_no_key() {
        let mut member = CohortMember {
            id: SubmissionId(1),
            user_id: 1,
            user_name: "김민수".to_string(),
            raw_score: 80.0,
            final_score: 84.0,
            bonus_type: BonusType::Veteran5,
        };
        assert!(member.final_key().is_some());
        member.final_score = f64::NAN;
        assert!(member.final_key().is_none());
        member.raw_score = -1.0;
        assert!(member.raw_key().is_none());
    }

    #[test]
    fn lookup_wire_format() {
        let lookup: CandidateLookup =
            serde_json::from_str(r#"{"latest_for_user":{"user_id":7}}"#).unwrap();
        assert_eq!(
            lookup,
            CandidateLookup::LatestForUser {
                user_id: 7,
                exam_id: None
            }
        );
        let by_id: CandidateLookup = serde_json::from_str(r#"{"submission":12}"#).unwrap();
        assert_eq!(by_id, CandidateLookup::Submission(SubmissionId(12)));
    }
}

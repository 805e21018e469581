use crate::bonus::BonusFamily;
use crate::cohort::SubmissionId;
use crate::multiple::Multiple;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported by a [`crate::CohortSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cohort source unavailable: {0}")]
    Unavailable(String),
}

/// Who can act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    UserCorrectable,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No participants in cohort")]
    NoParticipants,

    #[error("No pass policy for recruit count {recruit_count}")]
    InvalidRecruitPolicy { recruit_count: i64 },

    #[error("Submission {submission_id} is missing from the rebuilt ranking")]
    CandidateNotInCohort { submission_id: SubmissionId },

    #[error("Submission {submission_id} failed a subject cutoff and is not ranked")]
    CandidateCutoff { submission_id: SubmissionId },

    #[error(
        "{family} bonus cap exceeded: {beneficiaries} candidates would pass by bonus, \
         cap is {cap_count} ({cap_percent}% of recruits)"
    )]
    BonusCapExceeded {
        family: BonusFamily,
        cap_count: u64,
        cap_percent: Multiple,
        beneficiaries: usize,
    },

    #[error(
        "{family} bonus is not available for recruit count {recruit_count} \
         (minimum {min_recruit_count}, cap {cap_count})"
    )]
    BonusFamilyIneligible {
        family: BonusFamily,
        recruit_count: u64,
        min_recruit_count: u64,
        cap_count: u64,
    },

    #[error("Submission {submission_id} has an invalid score")]
    InvalidScore { submission_id: SubmissionId },

    /// A score typed in by the candidate, as opposed to one already stored.
    #[error("Entered {field} {value} is not a finite, non-negative score")]
    InvalidEnteredScore { field: &'static str, value: f64 },

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoParticipants => "no_participants",
            EngineError::InvalidRecruitPolicy { .. } => "invalid_recruit_policy",
            EngineError::CandidateNotInCohort { .. } => "candidate_not_in_cohort",
            EngineError::CandidateCutoff { .. } => "candidate_cutoff",
            EngineError::BonusCapExceeded { .. } => "bonus_cap_exceeded",
            EngineError::BonusFamilyIneligible { .. } => "bonus_family_ineligible",
            EngineError::InvalidScore { .. } => "invalid_score",
            EngineError::InvalidEnteredScore { .. } => "invalid_entered_score",
            EngineError::InvalidPolicy(_) => "invalid_policy",
            EngineError::Source(SourceError::NotFound(_)) => "not_found",
            EngineError::Source(SourceError::Unavailable(_)) => "source_unavailable",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EngineError::NoParticipants | EngineError::Source(SourceError::NotFound(_)) => {
                Severity::NotFound
            }
            EngineError::CandidateCutoff { .. }
            | EngineError::BonusCapExceeded { .. }
            | EngineError::BonusFamilyIneligible { .. }
            | EngineError::InvalidEnteredScore { .. } => Severity::UserCorrectable,
            EngineError::InvalidRecruitPolicy { .. }
            | EngineError::CandidateNotInCohort { .. }
            | EngineError::InvalidScore { .. }
            | EngineError::InvalidPolicy(_)
            | EngineError::Source(SourceError::Unavailable(_)) => Severity::Internal,
        }
    }

    /// Message shown to the end user.
    pub fn localized_message(&self) -> String {
        match self {
            EngineError::NoParticipants => {
                "아직 채점 참여자가 없어 합격 예측을 제공할 수 없습니다.".to_string()
            }
            EngineError::CandidateCutoff { .. } => {
                "과락 과목이 있어 순위 산정 대상이 아닙니다.".to_string()
            }
            EngineError::BonusCapExceeded {
                family,
                cap_count,
                cap_percent,
                ..
            } => format!(
                "{} 가산점으로 합격하는 인원이 선발예정인원의 {}%({}명)를 초과하여 해당 가산점을 적용할 수 없습니다.",
                family.label(),
                cap_percent,
                cap_count
            ),
            EngineError::BonusFamilyIneligible {
                family,
                recruit_count,
                ..
            } => format!(
                "선발예정인원({}명)이 적은 모집단위에는 {} 가산점을 적용할 수 없습니다.",
                recruit_count,
                family.label()
            ),
            EngineError::Source(SourceError::NotFound(_)) => {
                "채점 정보를 찾을 수 없습니다.".to_string()
            }
            EngineError::InvalidEnteredScore { .. } => {
                "입력한 점수가 올바르지 않습니다. 0 이상의 점수를 입력해 주세요.".to_string()
            }
            _ => "합격 예측을 계산하지 못했습니다. 잠시 후 다시 시도해 주세요.".to_string(),
        }
    }
}

//! Rank and pass-prediction engine for exam score submissions.
//!
//! Pure computation over a cohort snapshot: score bands with shared tie
//! ranks, recruit-count thresholds, the five-tier pass pyramid, the bonus
//! cap check and a masked competitor listing. Data comes in through
//! [`CohortSource`]; nothing here performs I/O apart from loading a policy
//! file on request.

mod bands;
mod bonus;
mod cohort;
mod error;
mod multiple;
mod pager;
mod policy;
mod pyramid;
mod score_key;
mod service;
mod threshold;

pub use bands::{BandTable, ScoreBand};
pub use bonus::{
    family_of, BonusCandidate, BonusCapValidator, BonusCheck, BonusFamily, BonusRule, BonusType,
    SkipReason,
};
pub use cohort::{
    CandidateContext, CandidateLookup, CohortKey, CohortMember, CohortSource, ExamInfo, ExamType,
    SubmissionId,
};
pub use error::{EngineError, Result, Severity, SourceError};
pub use multiple::{Multiple, ParseMultipleError};
pub use pager::{mask_name, CompetitorEntry, CompetitorPage, CompetitorPager, PageRequest};
pub use policy::{
    CompetitorLimits, MultipleBand, Policy, PredictionPolicy, SmallCohortRow, ThresholdPolicy,
    POLICY_ENV,
};
pub use pyramid::{build_pyramid, classify, rank_multiple, PassTier, PyramidLevel, TierBound};
pub use score_key::{ScoreKey, SCORE_SCALE};
pub use service::{PredictionResult, PredictionService, PredictionSummary, PreviewResult};
pub use threshold::{positive_recruit, RankBoundaries, ThresholdCalculator};

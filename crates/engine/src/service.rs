use serde::Serialize;

use crate::bands::BandTable;
use crate::bonus::{entered_score, BonusCandidate, BonusCapValidator, BonusCheck, BonusType};
use crate::cohort::{
    CandidateContext, CandidateLookup, CohortKey, CohortMember, CohortSource, ExamInfo, ExamType,
    SubmissionId,
};
use crate::error::{EngineError, Result, Severity};
use crate::multiple::Multiple;
use crate::pager::{CompetitorPage, CompetitorPager, PageRequest};
use crate::policy::Policy;
use crate::pyramid::{build_pyramid, classify, rank_multiple, PassTier, PyramidLevel, TierBound};
use crate::score_key::ScoreKey;
use crate::threshold::{RankBoundaries, ThresholdCalculator};

const LOW_SAMPLE_DISCLAIMER: &str =
    "채점 참여 인원이 적어 예측 결과가 실제와 크게 다를 수 있습니다.";

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    pub submission_id: SubmissionId,
    pub exam: ExamInfo,
    pub region_name: String,
    pub exam_type: ExamType,
    pub total_participants: usize,
    pub recruit_count: u64,
    pub pass_multiple: Multiple,
    pub likely_multiple: Multiple,
    pub pass_count: usize,
    pub my_rank: usize,
    pub my_score: ScoreKey,
    pub my_raw_score: ScoreKey,
    pub bonus_type: BonusType,
    pub my_multiple: Multiple,
    pub tier: PassTier,
    pub tier_label: &'static str,
    /// Score at rank == recruit count.
    pub one_multiple_cut_score: TierBound,
    /// Score at rank == pass count.
    pub pass_line_score: TierBound,
    pub top_percent: f64,
    pub average_score: ScoreKey,
    pub highest_score: ScoreKey,
    pub lowest_score: ScoreKey,
    pub low_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub summary: PredictionSummary,
    pub pyramid: Vec<PyramidLevel>,
    pub competitors: CompetitorPage,
}

/// Where a hypothetical final score would land in a cohort.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResult {
    pub key: CohortKey,
    pub score: ScoreKey,
    pub rank: usize,
    pub total_participants: usize,
    pub recruit_count: u64,
    pub pass_count: usize,
    pub my_multiple: Multiple,
    pub tier: PassTier,
    pub tier_label: &'static str,
    pub pyramid: Vec<PyramidLevel>,
    pub low_sample: bool,
}

struct RankedCohort {
    members: Vec<CohortMember>,
    table: BandTable,
    boundaries: RankBoundaries,
    my_rank: usize,
    me: CohortMember,
}

/// Ranks a candidate against a fresh cohort snapshot on every call.
///
/// Holds no mutable state, so one service can serve concurrent requests.
pub struct PredictionService<S> {
    source: S,
    policy: Policy,
}

impl<S: CohortSource> PredictionService<S> {
    pub fn new(source: S, policy: Policy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn predict(&self, lookup: &CandidateLookup, page: PageRequest) -> Result<PredictionResult> {
        self.predict_inner(lookup, page).map_err(log_internal)
    }

    fn predict_inner(&self, lookup: &CandidateLookup, page: PageRequest) -> Result<PredictionResult> {
        let ctx = self.source.resolve_candidate(lookup)?;
        let ranked = self.rank_candidate(&ctx)?;
        let boundaries = &ranked.boundaries;
        let table = &ranked.table;

        let total = table.total_participants();
        let tier = classify(boundaries, ranked.my_rank);
        let low_sample = self.is_low_sample(total, boundaries);
        if low_sample {
            log::warn!(
                "Low-sample prediction for {}: {} participants, pass count {}",
                ctx.key,
                total,
                boundaries.pass_count()
            );
        }

        let summary = PredictionSummary {
            submission_id: ranked.me.id,
            exam: ctx.exam.clone(),
            region_name: ctx.region_name.clone(),
            exam_type: ctx.key.exam_type,
            total_participants: total,
            recruit_count: boundaries.recruit_count,
            pass_multiple: boundaries.pass_multiple,
            likely_multiple: boundaries.likely_multiple,
            pass_count: boundaries.pass_count(),
            my_rank: ranked.my_rank,
            my_score: ranked.me.final_key().unwrap_or_default(),
            my_raw_score: ranked.me.raw_key().unwrap_or_default(),
            bonus_type: ranked.me.bonus_type,
            my_multiple: rank_multiple(boundaries, ranked.my_rank),
            tier,
            tier_label: tier.label(),
            one_multiple_cut_score: TierBound::at_rank(table, boundaries.sure_max),
            pass_line_score: TierBound::at_rank(table, boundaries.possible_max),
            top_percent: top_percent(ranked.my_rank, total),
            average_score: table.average(),
            highest_score: table.highest(),
            lowest_score: table.lowest(),
            low_sample,
            disclaimer: low_sample.then_some(LOW_SAMPLE_DISCLAIMER),
        };

        let pyramid = build_pyramid(table, boundaries, Some(ranked.my_rank));
        let competitors = CompetitorPager::new(table, &ranked.members, self.policy.competitors())?
            .page(page, Some(ranked.me.id));

        log::debug!(
            "Predicted submission {}: rank {}/{} tier {}",
            ranked.me.id,
            ranked.my_rank,
            total,
            tier.as_str()
        );
        Ok(PredictionResult {
            summary,
            pyramid,
            competitors,
        })
    }

    pub fn competitors(&self, lookup: &CandidateLookup, page: PageRequest) -> Result<CompetitorPage> {
        let run = || -> Result<CompetitorPage> {
            let ctx = self.source.resolve_candidate(lookup)?;
            let ranked = self.rank_candidate(&ctx)?;
            let pager =
                CompetitorPager::new(&ranked.table, &ranked.members, self.policy.competitors())?;
            Ok(pager.page(page, Some(ranked.me.id)))
        };
        run().map_err(log_internal)
    }

    /// Rank a hypothetical final score as if it were one more submission.
    pub fn preview(&self, key: &CohortKey, final_score: f64) -> Result<PreviewResult> {
        let run = || -> Result<PreviewResult> {
            let score = entered_score("final_score", final_score)?;
            let members = self.source.load_cohort(key)?;
            let table = if members.is_empty() {
                BandTable::build([score])?
            } else {
                BandTable::from_members(&members)?.with_inserted(score)
            };
            let rank = table
                .rank_of(score)
                .ok_or(EngineError::CandidateNotInCohort {
                    submission_id: SubmissionId::PENDING,
                })?;

            let recruit = self.source.recruit_count(key)?;
            let boundaries = ThresholdCalculator::new(self.policy.threshold()).boundaries(recruit)?;
            let tier = classify(&boundaries, rank);
            let total = table.total_participants();

            Ok(PreviewResult {
                key: *key,
                score,
                rank,
                total_participants: total,
                recruit_count: boundaries.recruit_count,
                pass_count: boundaries.pass_count(),
                my_multiple: rank_multiple(&boundaries, rank),
                tier,
                tier_label: tier.label(),
                pyramid: build_pyramid(&table, &boundaries, Some(rank)),
                low_sample: self.is_low_sample(total, &boundaries),
            })
        };
        run().map_err(log_internal)
    }

    /// Gate a submission create/edit on the bonus cap of its family.
    ///
    /// The cohort is read once, here, and nothing is locked. A concurrent
    /// write to the same cohort between this check and the caller's insert
    /// is not seen, so two bonus holders can both be accepted and exceed the
    /// cap together. Callers that need a hard cap must serialize
    /// validate-then-write per [`CohortKey`] themselves.
    pub fn validate_submission(
        &self,
        key: &CohortKey,
        candidate: &BonusCandidate,
    ) -> Result<BonusCheck> {
        let run = || -> Result<BonusCheck> {
            let recruit = self.source.recruit_count(key)?;
            let cohort = self.source.load_cohort(key)?;
            BonusCapValidator::new(&self.policy).validate(candidate, &cohort, recruit)
        };
        run().map_err(log_internal)
    }

    fn rank_candidate(&self, ctx: &CandidateContext) -> Result<RankedCohort> {
        let submission_id = ctx.submission.id;
        if ctx.has_cutoff {
            return Err(EngineError::CandidateCutoff { submission_id });
        }

        let members = self.source.load_cohort(&ctx.key)?;
        let table = BandTable::from_members(&members)?;

        let me = members
            .iter()
            .find(|member| member.id == submission_id)
            .cloned()
            .ok_or(EngineError::CandidateNotInCohort { submission_id })?;
        let my_key = me
            .final_key()
            .ok_or(EngineError::InvalidScore { submission_id })?;
        let my_rank = table
            .rank_of(my_key)
            .ok_or(EngineError::CandidateNotInCohort { submission_id })?;

        let recruit = self.source.recruit_count(&ctx.key)?;
        let boundaries = ThresholdCalculator::new(self.policy.threshold()).boundaries(recruit)?;

        Ok(RankedCohort {
            members,
            table,
            boundaries,
            my_rank,
            me,
        })
    }

    fn is_low_sample(&self, total: usize, boundaries: &RankBoundaries) -> bool {
        let floor = self.policy.prediction().low_sample_floor;
        total < boundaries.pass_count().max(floor)
    }
}

fn top_percent(rank: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = rank as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

fn log_internal(err: EngineError) -> EngineError {
    if err.severity() == Severity::Internal {
        log::error!("Prediction failed ({}): {}", err.code(), err);
    }
    err
}

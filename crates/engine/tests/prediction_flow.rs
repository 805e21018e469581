mod support;

use passline_engine::{
    BonusType, CandidateContext, CandidateLookup, CohortKey, CohortMember, CohortSource,
    EngineError, PageRequest, PassTier, Policy, PredictionService, ScoreKey, Severity,
    SourceError, SubmissionId, TierBound,
};
use pretty_assertions::assert_eq;
use support::{MemorySource, KEY};

const SAMPLE: [f64; 10] = [100.0, 100.0, 90.0, 90.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0];

fn key(score: f64) -> ScoreKey {
    ScoreKey::from_score(score).unwrap()
}

fn service(source: MemorySource) -> PredictionService<MemorySource> {
    PredictionService::new(source, Policy::builtin().unwrap())
}

#[test]
fn tied_candidate_gets_first_rank_of_the_band() {
    let service = service(MemorySource::with_scores(2, &SAMPLE));
    let result = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(4)),
            PageRequest::default(),
        )
        .unwrap();
    let summary = &result.summary;

    assert_eq!(summary.total_participants, 10);
    assert_eq!(summary.my_rank, 3);
    assert_eq!(summary.my_multiple.as_f64(), 1.5);
    assert_eq!(summary.pass_count, 6);
    assert_eq!(summary.tier, PassTier::Possible);
    assert_eq!(summary.one_multiple_cut_score, TierBound::Score(key(100.0)));
    assert_eq!(summary.pass_line_score, TierBound::Score(key(80.0)));
    assert_eq!(summary.highest_score, key(100.0));
    assert_eq!(summary.lowest_score, key(40.0));
    assert_eq!(summary.top_percent, 30.0);
    assert!(!summary.low_sample);
    assert!(summary.disclaimer.is_none());

    let total: usize = result.pyramid.iter().map(|level| level.count).sum();
    assert_eq!(total, 10);
    let current: Vec<PassTier> = result
        .pyramid
        .iter()
        .filter(|level| level.is_current)
        .map(|level| level.tier)
        .collect();
    assert_eq!(current, vec![PassTier::Possible]);

    assert_eq!(result.competitors.total_participants, 10);
    let mine: Vec<u64> = result
        .competitors
        .entries
        .iter()
        .filter(|entry| entry.is_mine)
        .map(|entry| entry.submission_id.0)
        .collect();
    assert_eq!(mine, vec![4]);
}

#[test]
fn last_rank_inside_rounded_pass_count_is_possible() {
    // 7 recruits at x1.8 round up to a pass count of 13.
    let scores: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    let service = service(MemorySource::with_scores(7, &scores));
    let result = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(13)),
            PageRequest::default(),
        )
        .unwrap();

    let summary = &result.summary;
    assert_eq!(summary.my_rank, 13);
    assert_eq!(summary.pass_count, 13);
    assert_eq!(summary.tier, PassTier::Possible);
    let current: Vec<PassTier> = result
        .pyramid
        .iter()
        .filter(|level| level.is_current)
        .map(|level| level.tier)
        .collect();
    assert_eq!(current, vec![PassTier::Possible]);
}

#[test]
fn result_serializes_for_rendering() {
    let service = service(MemorySource::with_scores(2, &SAMPLE));
    let result = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(1)),
            PageRequest::default(),
        )
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["summary"]["tier"], "sure");
    assert_eq!(json["summary"]["my_rank"], 1);
    assert_eq!(json["summary"]["pass_multiple"], 3.0);
    assert_eq!(json["pyramid"][0]["max_score"]["kind"], "open");
    assert_eq!(json["pyramid"][0]["is_current"], true);
    assert_eq!(json["competitors"]["entries"][0]["masked_name"], "김**");
}

#[test]
fn latest_submission_for_user_is_used() {
    let mut source = MemorySource::with_scores(2, &SAMPLE);
    let mut retake = support::member(11, 95.0, BonusType::None);
    retake.user_id = 1001;
    source.members.push(retake);

    let service = service(source);
    let result = service
        .predict(
            &CandidateLookup::LatestForUser {
                user_id: 1001,
                exam_id: None,
            },
            PageRequest::default(),
        )
        .unwrap();
    assert_eq!(result.summary.submission_id, SubmissionId(11));
    assert_eq!(result.summary.my_rank, 3);
}

#[test]
fn small_cohorts_carry_a_disclaimer() {
    let service = service(MemorySource::with_scores(2, &[88.0, 77.0, 66.0]));
    let result = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(2)),
            PageRequest::default(),
        )
        .unwrap();
    assert!(result.summary.low_sample);
    assert!(result.summary.disclaimer.is_some());
    assert_eq!(result.summary.pass_line_score, TierBound::Unpopulated);
}

#[test]
fn cutoff_candidate_is_not_ranked() {
    let mut source = MemorySource::with_scores(2, &SAMPLE);
    source.cutoff.push(SubmissionId(6));
    let err = service(source)
        .predict(
            &CandidateLookup::Submission(SubmissionId(6)),
            PageRequest::default(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::CandidateCutoff { .. }));
    assert_eq!(err.severity(), Severity::UserCorrectable);
}

#[test]
fn invalid_recruit_count_is_internal() {
    let service = service(MemorySource::with_scores(0, &SAMPLE));
    let err = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(1)),
            PageRequest::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidRecruitPolicy { recruit_count: 0 }
    ));
    assert_eq!(err.severity(), Severity::Internal);
}

#[test]
fn unknown_submission_is_not_found() {
    let service = service(MemorySource::with_scores(2, &SAMPLE));
    let err = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(99)),
            PageRequest::default(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Source(SourceError::NotFound(_))));
    assert_eq!(err.severity(), Severity::NotFound);
}

/// Drops the candidate from the cohort it reports, as a racing delete would.
struct StaleSource(MemorySource);

impl CohortSource for StaleSource {
    fn resolve_candidate(&self, lookup: &CandidateLookup) -> Result<CandidateContext, SourceError> {
        self.0.resolve_candidate(lookup)
    }

    fn load_cohort(&self, key: &CohortKey) -> Result<Vec<CohortMember>, SourceError> {
        let mut members = self.0.load_cohort(key)?;
        members.retain(|member| member.id != SubmissionId(1));
        Ok(members)
    }

    fn recruit_count(&self, key: &CohortKey) -> Result<i64, SourceError> {
        self.0.recruit_count(key)
    }
}

#[test]
fn candidate_missing_from_rebuilt_ranking_is_internal() {
    let service = PredictionService::new(
        StaleSource(MemorySource::with_scores(2, &SAMPLE)),
        Policy::builtin().unwrap(),
    );
    let err = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(1)),
            PageRequest::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::CandidateNotInCohort {
            submission_id: SubmissionId(1)
        }
    ));
    assert_eq!(err.severity(), Severity::Internal);
}

#[test]
fn preview_into_an_empty_cohort_ranks_first() {
    let service = service(MemorySource::new(5));
    let err = service.preview(&KEY, f64::NAN).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidEnteredScore {
            field: "final_score",
            ..
        }
    ));
    assert_eq!(err.severity(), Severity::UserCorrectable);

    let preview = service.preview(&KEY, 70.0).unwrap();
    assert_eq!(preview.rank, 1);
    assert_eq!(preview.total_participants, 1);
    assert!(preview.low_sample);
}

#[test]
fn preview_ranks_a_hypothetical_score() {
    let service = service(MemorySource::with_scores(2, &SAMPLE));
    let preview = service.preview(&KEY, 95.0).unwrap();
    assert_eq!(preview.rank, 3);
    assert_eq!(preview.total_participants, 11);
    assert_eq!(preview.tier, PassTier::Possible);
    let total: usize = preview.pyramid.iter().map(|level| level.count).sum();
    assert_eq!(total, 11);

    let tied = service.preview(&KEY, 100.0).unwrap();
    assert_eq!(tied.rank, 1);
    assert_eq!(tied.tier, PassTier::Sure);
}

#[test]
fn competitor_page_is_clamped() {
    let scores: Vec<f64> = (0..45).map(|i| 100.0 - i as f64).collect();
    let service = service(MemorySource::with_scores(10, &scores));
    let page = service
        .competitors(
            &CandidateLookup::Submission(SubmissionId(1)),
            PageRequest {
                page: Some(5),
                limit: Some(20),
            },
        )
        .unwrap();
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.page, 3);
    assert_eq!(page.entries.len(), 5);
    assert_eq!(page.entries[0].rank, 41);
}

#[test]
fn service_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PredictionService<MemorySource>>();

    let service = std::sync::Arc::new(service(MemorySource::with_scores(2, &SAMPLE)));
    let handles: Vec<_> = (1..=4u64)
        .map(|id| {
            let service = service.clone();
            std::thread::spawn(move || {
                service
                    .predict(
                        &CandidateLookup::Submission(SubmissionId(id)),
                        PageRequest::default(),
                    )
                    .map(|result| result.summary.my_rank)
            })
        })
        .collect();
    let ranks: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 1, 3, 3]);
}

#[test]
fn empty_snapshot_has_no_participants() {
    let service = PredictionService::new(
        StaleSource(MemorySource::with_scores(2, &[80.0])),
        Policy::builtin().unwrap(),
    );
    let err = service
        .predict(
            &CandidateLookup::Submission(SubmissionId(1)),
            PageRequest::default(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::NoParticipants));
    assert_eq!(err.severity(), Severity::NotFound);
}

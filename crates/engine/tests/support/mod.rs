#![allow(dead_code)]

use passline_engine::{
    BonusType, CandidateContext, CandidateLookup, CohortKey, CohortMember, CohortSource,
    ExamInfo, ExamType, SourceError, SubmissionId,
};
use std::collections::HashMap;

pub const KEY: CohortKey = CohortKey {
    exam_id: 1,
    region_id: 11,
    exam_type: ExamType::Public,
};

/// Cohort source backed by plain maps.
#[derive(Default)]
pub struct MemorySource {
    pub members: Vec<CohortMember>,
    pub cutoff: Vec<SubmissionId>,
    pub recruits: HashMap<CohortKey, i64>,
}

impl MemorySource {
    pub fn new(recruit: i64) -> Self {
        let mut recruits = HashMap::new();
        recruits.insert(KEY, recruit);
        Self {
            members: Vec::new(),
            cutoff: Vec::new(),
            recruits,
        }
    }

    pub fn with_scores(recruit: i64, scores: &[f64]) -> Self {
        let mut source = Self::new(recruit);
        for (idx, score) in scores.iter().enumerate() {
            source.push(idx as u64 + 1, *score, BonusType::None);
        }
        source
    }

    pub fn push(&mut self, id: u64, raw: f64, bonus: BonusType) {
        self.members.push(member(id, raw, bonus));
    }
}

pub fn member(id: u64, raw: f64, bonus: BonusType) -> CohortMember {
    CohortMember {
        id: SubmissionId(id),
        user_id: 1000 + id,
        user_name: format!("김응시{id}"),
        raw_score: raw,
        final_score: bonus.apply(raw),
        bonus_type: bonus,
    }
}

impl CohortSource for MemorySource {
    fn resolve_candidate(&self, lookup: &CandidateLookup) -> Result<CandidateContext, SourceError> {
        let submission = match lookup {
            CandidateLookup::Submission(id) => self.members.iter().find(|m| m.id == *id),
            CandidateLookup::LatestForUser { user_id, .. } => self
                .members
                .iter()
                .filter(|m| m.user_id == *user_id)
                .max_by_key(|m| m.id),
        }
        .cloned()
        .ok_or_else(|| SourceError::NotFound(format!("{lookup:?}")))?;

        Ok(CandidateContext {
            key: KEY,
            exam: ExamInfo {
                name: "2025년 1차 경찰공무원(순경) 채용".to_string(),
                year: 2025,
                round: 1,
            },
            region_name: "서울".to_string(),
            has_cutoff: self.cutoff.contains(&submission.id),
            submission,
        })
    }

    fn load_cohort(&self, key: &CohortKey) -> Result<Vec<CohortMember>, SourceError> {
        if *key != KEY {
            return Ok(Vec::new());
        }
        Ok(self
            .members
            .iter()
            .filter(|m| !self.cutoff.contains(&m.id))
            .cloned()
            .collect())
    }

    fn recruit_count(&self, key: &CohortKey) -> Result<i64, SourceError> {
        self.recruits
            .get(key)
            .copied()
            .ok_or_else(|| SourceError::NotFound(format!("recruit count for {key}")))
    }
}

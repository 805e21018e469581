use anyhow::{bail, Context, Result};
use passline_engine::{
    BonusType, CandidateContext, CandidateLookup, CohortKey, CohortMember, CohortSource,
    ExamInfo, ExamType, SourceError, SubmissionId,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetFile {
    #[serde(default)]
    exams: Vec<ExamRecord>,
    #[serde(default)]
    regions: Vec<RegionRecord>,
    #[serde(default)]
    quotas: Vec<QuotaRecord>,
    #[serde(default)]
    submissions: Vec<SubmissionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExamRecord {
    id: u64,
    name: String,
    year: u16,
    round: u8,
}

#[derive(Debug, Deserialize)]
struct RegionRecord {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct QuotaRecord {
    exam_id: u64,
    region_id: u64,
    exam_type: ExamType,
    recruit_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmissionRecord {
    id: SubmissionId,
    exam_id: u64,
    region_id: u64,
    exam_type: ExamType,
    user_id: u64,
    #[serde(default)]
    user_name: String,
    raw_score: f64,
    #[serde(default)]
    bonus_type: BonusType,
    #[serde(default)]
    final_score: Option<f64>,
    #[serde(default)]
    has_cutoff: bool,
    #[serde(default)]
    suspicious: bool,
}

impl SubmissionRecord {
    fn key(&self) -> CohortKey {
        CohortKey {
            exam_id: self.exam_id,
            region_id: self.region_id,
            exam_type: self.exam_type,
        }
    }

    fn member(&self) -> CohortMember {
        CohortMember {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            raw_score: self.raw_score,
            final_score: self
                .final_score
                .unwrap_or_else(|| self.bonus_type.apply(self.raw_score)),
            bonus_type: self.bonus_type,
        }
    }
}

/// Exams, regions, quotas and submissions read from one JSON file.
///
/// Cutoff-failed rows never join a cohort. Rows flagged as suspicious are
/// left out too unless the source was opened with `include_suspicious`.
#[derive(Debug)]
pub struct DatasetSource {
    exams: HashMap<u64, ExamRecord>,
    regions: HashMap<u64, String>,
    quotas: HashMap<CohortKey, i64>,
    submissions: Vec<SubmissionRecord>,
    include_suspicious: bool,
}

impl DatasetSource {
    pub fn load(path: &Path, include_suspicious: bool) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        Self::from_json_str(&text, include_suspicious)
            .with_context(|| format!("Invalid dataset {}", path.display()))
    }

    pub fn from_json_str(text: &str, include_suspicious: bool) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(text).context("Failed to parse dataset JSON")?;

        let mut seen = HashSet::new();
        for submission in &file.submissions {
            if !seen.insert(submission.id) {
                bail!("duplicate submission id {}", submission.id);
            }
        }

        let mut quotas = HashMap::new();
        for quota in file.quotas {
            let key = CohortKey {
                exam_id: quota.exam_id,
                region_id: quota.region_id,
                exam_type: quota.exam_type,
            };
            if quotas.insert(key, quota.recruit_count).is_some() {
                bail!("duplicate quota for {key}");
            }
        }

        log::debug!(
            "Loaded dataset: {} exams, {} regions, {} quotas, {} submissions",
            file.exams.len(),
            file.regions.len(),
            quotas.len(),
            file.submissions.len()
        );
        Ok(Self {
            exams: file.exams.into_iter().map(|exam| (exam.id, exam)).collect(),
            regions: file
                .regions
                .into_iter()
                .map(|region| (region.id, region.name))
                .collect(),
            quotas,
            submissions: file.submissions,
            include_suspicious,
        })
    }

    fn admits(&self, record: &SubmissionRecord) -> bool {
        self.include_suspicious || !record.suspicious
    }

    fn find(&self, lookup: &CandidateLookup) -> Option<&SubmissionRecord> {
        match lookup {
            CandidateLookup::Submission(id) => {
                self.submissions.iter().find(|record| record.id == *id)
            }
            CandidateLookup::LatestForUser { user_id, exam_id } => self
                .submissions
                .iter()
                .filter(|record| record.user_id == *user_id)
                .filter(|record| exam_id.map_or(true, |exam| record.exam_id == exam))
                .max_by_key(|record| record.id),
        }
    }
}

impl CohortSource for DatasetSource {
    fn resolve_candidate(&self, lookup: &CandidateLookup) -> Result<CandidateContext, SourceError> {
        let record = self
            .find(lookup)
            .ok_or_else(|| SourceError::NotFound(describe(lookup)))?;
        if !self.admits(record) {
            return Err(SourceError::NotFound(format!(
                "submission {} is flagged as suspicious",
                record.id
            )));
        }

        let exam = self
            .exams
            .get(&record.exam_id)
            .ok_or_else(|| SourceError::NotFound(format!("exam {}", record.exam_id)))?;
        let region_name = self
            .regions
            .get(&record.region_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("region {}", record.region_id)))?;

        Ok(CandidateContext {
            key: record.key(),
            exam: ExamInfo {
                name: exam.name.clone(),
                year: exam.year,
                round: exam.round,
            },
            region_name,
            submission: record.member(),
            has_cutoff: record.has_cutoff,
        })
    }

    fn load_cohort(&self, key: &CohortKey) -> Result<Vec<CohortMember>, SourceError> {
        Ok(self
            .submissions
            .iter()
            .filter(|record| record.key() == *key)
            .filter(|record| !record.has_cutoff && self.admits(record))
            .map(SubmissionRecord::member)
            .collect())
    }

    fn recruit_count(&self, key: &CohortKey) -> Result<i64, SourceError> {
        self.quotas
            .get(key)
            .copied()
            .ok_or_else(|| SourceError::NotFound(format!("recruit count for {key}")))
    }
}

fn describe(lookup: &CandidateLookup) -> String {
    match lookup {
        CandidateLookup::Submission(id) => format!("submission {id}"),
        CandidateLookup::LatestForUser {
            user_id,
            exam_id: Some(exam_id),
        } => format!("submission of user {user_id} for exam {exam_id}"),
        CandidateLookup::LatestForUser { user_id, .. } => format!("submission of user {user_id}"),
    }
}

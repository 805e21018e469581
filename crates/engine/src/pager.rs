use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::bands::BandTable;
use crate::cohort::{CohortMember, SubmissionId};
use crate::error::{EngineError, Result};
use crate::policy::CompetitorLimits;
use crate::score_key::ScoreKey;

const MASK_SUFFIX: &str = "**";
const MASK_PLACEHOLDER: &str = "***";

/// First grapheme of the name followed by two asterisks.
pub fn mask_name(name: &str) -> String {
    match name.trim().graphemes(true).next() {
        Some(first) => format!("{first}{MASK_SUFFIX}"),
        None => MASK_PLACEHOLDER.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorEntry {
    pub submission_id: SubmissionId,
    pub rank: usize,
    pub score: ScoreKey,
    pub masked_name: String,
    pub is_mine: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorPage {
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub total_participants: usize,
    pub entries: Vec<CompetitorEntry>,
}

struct RankedRow<'a> {
    member: &'a CohortMember,
    score: ScoreKey,
    rank: usize,
}

/// Rank-ordered, name-masked view of a cohort.
pub struct CompetitorPager<'a> {
    rows: Vec<RankedRow<'a>>,
    limits: CompetitorLimits,
}

impl<'a> CompetitorPager<'a> {
    /// Orders members by final score (ties by id) and attaches their band rank.
    pub fn new(
        table: &BandTable,
        members: &'a [CohortMember],
        limits: CompetitorLimits,
    ) -> Result<Self> {
        let mut rows = members
            .iter()
            .map(|member| {
                let missing = EngineError::CandidateNotInCohort {
                    submission_id: member.id,
                };
                let score = member.final_key().ok_or(EngineError::InvalidScore {
                    submission_id: member.id,
                })?;
                let rank = table.rank_of(score).ok_or(missing)?;
                Ok(RankedRow {
                    member,
                    score,
                    rank,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.sort_by_key(|row| (row.rank, row.member.id));
        Ok(Self { rows, limits })
    }

    pub fn total_participants(&self) -> usize {
        self.rows.len()
    }

    pub fn page(&self, request: PageRequest, mine: Option<SubmissionId>) -> CompetitorPage {
        let limit = match request.limit {
            Some(limit) if limit > 0 => (limit as usize).min(self.limits.max_limit),
            _ => self.limits.default_limit,
        };
        let total = self.rows.len();
        let total_pages = total.div_ceil(limit).max(1);
        let page = request
            .page
            .unwrap_or(1)
            .clamp(1, total_pages as i64) as usize;

        let entries = self
            .rows
            .iter()
            .skip((page - 1) * limit)
            .take(limit)
            .map(|row| CompetitorEntry {
                submission_id: row.member.id,
                rank: row.rank,
                score: row.score,
                masked_name: mask_name(&row.member.user_name),
                is_mine: Some(row.member.id) == mine,
            })
            .collect();

        CompetitorPage {
            page,
            limit,
            total_pages,
            total_participants: total,
            entries,
        }
    }
}

use crate::cohort::CohortMember;
use crate::error::{EngineError, Result};
use crate::score_key::ScoreKey;
use serde::Serialize;

/// A run of equal scores and the ranks they occupy.
///
/// Everyone in the band shares `rank`; the next distinct score starts at
/// `end_rank + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBand {
    pub score: ScoreKey,
    pub count: usize,
    pub rank: usize,
    pub end_rank: usize,
}

/// Cohort scores grouped into rank bands, best score first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTable {
    bands: Vec<ScoreBand>,
    total: usize,
}

impl BandTable {
    /// Sort-and-group in `O(n log n)`. An empty cohort is
    /// [`EngineError::NoParticipants`].
    pub fn build<I>(scores: I) -> Result<Self>
    where
        I: IntoIterator<Item = ScoreKey>,
    {
        let mut keys: Vec<ScoreKey> = scores.into_iter().collect();
        if keys.is_empty() {
            return Err(EngineError::NoParticipants);
        }
        keys.sort_unstable_by(|a, b| b.cmp(a));

        let mut bands: Vec<ScoreBand> = Vec::new();
        for key in keys {
            if let Some(band) = bands.last_mut().filter(|band| band.score == key) {
                band.count += 1;
                band.end_rank += 1;
                continue;
            }
            let rank = bands.last().map_or(1, |band| band.end_rank + 1);
            bands.push(ScoreBand {
                score: key,
                count: 1,
                rank,
                end_rank: rank,
            });
        }

        let total = bands.last().map_or(0, |band| band.end_rank);
        log::debug!(
            "Built {} score bands for {} participants",
            bands.len(),
            total
        );
        Ok(Self { bands, total })
    }

    /// Bands over the members' final scores.
    pub fn from_members(members: &[CohortMember]) -> Result<Self> {
        let keys = members
            .iter()
            .map(|member| {
                member.final_key().ok_or(EngineError::InvalidScore {
                    submission_id: member.id,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::build(keys)
    }

    pub fn bands(&self) -> &[ScoreBand] {
        &self.bands
    }

    pub fn total_participants(&self) -> usize {
        self.total
    }

    /// Rank shared by everyone holding exactly `key`.
    ///
    /// This is an exact lookup: a score that nobody holds has no rank, even if
    /// it would fall between two bands.
    pub fn rank_of(&self, key: ScoreKey) -> Option<usize> {
        self.bands
            .binary_search_by(|band| key.cmp(&band.score))
            .ok()
            .map(|idx| self.bands[idx].rank)
    }

    /// The band whose `[rank, end_rank]` contains `rank`.
    pub fn band_at_rank(&self, rank: usize) -> Option<&ScoreBand> {
        if rank == 0 || rank > self.total {
            return None;
        }
        let idx = self.bands.partition_point(|band| band.end_rank < rank);
        self.bands.get(idx)
    }

    pub fn score_at_rank(&self, rank: usize) -> Option<ScoreKey> {
        self.band_at_rank(rank).map(|band| band.score)
    }

    /// Participants whose rank lies in `(after, through]`; `None` means no
    /// upper limit.
    pub fn count_in_ranks(&self, after: usize, through: Option<usize>) -> usize {
        let last = through.unwrap_or(usize::MAX);
        if last <= after {
            return 0;
        }
        self.bands
            .iter()
            .map(|band| {
                let lo = band.rank.max(after + 1);
                let hi = band.end_rank.min(last);
                if hi >= lo {
                    hi - lo + 1
                } else {
                    0
                }
            })
            .sum()
    }

    /// Rank `key` would take if one more participant with that score joined.
    pub fn rank_if_inserted(&self, key: ScoreKey) -> usize {
        let idx = self.bands.partition_point(|band| band.score > key);
        match idx.checked_sub(1).and_then(|prev| self.bands.get(prev)) {
            Some(prev) => prev.end_rank + 1,
            None => 1,
        }
    }

    /// A copy of the table with one extra participant holding `key`.
    pub fn with_inserted(&self, key: ScoreKey) -> Self {
        let mut bands = Vec::with_capacity(self.bands.len() + 1);
        let mut placed = false;
        let mut next_rank = 1;

        for band in &self.bands {
            let mut count = band.count;
            if !placed && band.score == key {
                count += 1;
                placed = true;
            } else if !placed && band.score < key {
                bands.push(ScoreBand {
                    score: key,
                    count: 1,
                    rank: next_rank,
                    end_rank: next_rank,
                });
                next_rank += 1;
                placed = true;
            }
            bands.push(ScoreBand {
                score: band.score,
                count,
                rank: next_rank,
                end_rank: next_rank + count - 1,
            });
            next_rank += count;
        }
        if !placed {
            bands.push(ScoreBand {
                score: key,
                count: 1,
                rank: next_rank,
                end_rank: next_rank,
            });
        }

        Self {
            total: self.total + 1,
            bands,
        }
    }

    pub fn highest(&self) -> ScoreKey {
        self.bands.first().map(|band| band.score).unwrap_or_default()
    }

    pub fn lowest(&self) -> ScoreKey {
        self.bands.last().map(|band| band.score).unwrap_or_default()
    }

    /// Mean score, rounded to the key precision.
    pub fn average(&self) -> ScoreKey {
        if self.total == 0 {
            return ScoreKey::default();
        }
        let sum: i128 = self
            .bands
            .iter()
            .map(|band| band.score.raw() as i128 * band.count as i128)
            .sum();
        let total = self.total as i128;
        let rounded = (2 * sum + total).div_euclid(2 * total);
        ScoreKey::from_raw(rounded as i64)
    }
}

use serde::Serialize;

use crate::bands::BandTable;
use crate::multiple::Multiple;
use crate::score_key::ScoreKey;
use crate::threshold::RankBoundaries;

/// Pass likelihood, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTier {
    Sure,
    Likely,
    Possible,
    Challenge,
    BelowChallenge,
}

impl PassTier {
    pub const ALL: [PassTier; 5] = [
        PassTier::Sure,
        PassTier::Likely,
        PassTier::Possible,
        PassTier::Challenge,
        PassTier::BelowChallenge,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PassTier::Sure => "sure",
            PassTier::Likely => "likely",
            PassTier::Possible => "possible",
            PassTier::Challenge => "challenge",
            PassTier::BelowChallenge => "below_challenge",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PassTier::Sure => "합격 확실권",
            PassTier::Likely => "합격 유력권",
            PassTier::Possible => "합격 가능권",
            PassTier::Challenge => "도전권",
            PassTier::BelowChallenge => "도전 어려움",
        }
    }
}

/// One side of a tier's score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "score", rename_all = "snake_case")]
pub enum TierBound {
    Score(ScoreKey),
    /// The tier has no limit on this side.
    Open,
    /// The rank that fixes this bound has no participant yet.
    Unpopulated,
}

impl TierBound {
    pub fn at_rank(table: &BandTable, rank: usize) -> Self {
        table
            .score_at_rank(rank)
            .map_or(TierBound::Unpopulated, TierBound::Score)
    }

    pub fn score(self) -> Option<ScoreKey> {
        match self {
            TierBound::Score(score) => Some(score),
            TierBound::Open | TierBound::Unpopulated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidLevel {
    pub tier: PassTier,
    pub label: &'static str,
    pub count: usize,
    /// Ranks in `(after_rank, last_rank]`; `last_rank` is `None` for the open bottom tier.
    pub after_rank: usize,
    pub last_rank: Option<usize>,
    pub min_score: TierBound,
    pub max_score: TierBound,
    pub min_multiple: Option<Multiple>,
    pub max_multiple: Option<Multiple>,
    pub is_current: bool,
}

/// Tier whose rank range holds `rank`. Limits are inclusive.
///
/// The integer limits agree with comparing `rank / recruit` against each
/// multiple, except that the pass count rounds up, so the last counted rank
/// stays `Possible`.
pub fn classify(boundaries: &RankBoundaries, rank: usize) -> PassTier {
    let ladder = [
        (boundaries.sure_max, PassTier::Sure),
        (boundaries.likely_max, PassTier::Likely),
        (boundaries.possible_max, PassTier::Possible),
        (boundaries.challenge_max, PassTier::Challenge),
    ];
    ladder
        .iter()
        .find(|(last, _)| rank <= *last)
        .map_or(PassTier::BelowChallenge, |(_, tier)| *tier)
}

/// `rank / recruit`
pub fn rank_multiple(boundaries: &RankBoundaries, rank: usize) -> Multiple {
    Multiple::new(rank as u64, boundaries.recruit_count).unwrap_or(Multiple::ONE)
}

/// Split the cohort into the five tiers and mark the one holding `my_rank`.
///
/// Tier counts come from band overlaps and always add up to the number of
/// participants.
pub fn build_pyramid(
    table: &BandTable,
    boundaries: &RankBoundaries,
    my_rank: Option<usize>,
) -> Vec<PyramidLevel> {
    let current = my_rank.map(|rank| classify(boundaries, rank));
    let ranges = [
        (PassTier::Sure, 0, Some(boundaries.sure_max)),
        (
            PassTier::Likely,
            boundaries.sure_max,
            Some(boundaries.likely_max),
        ),
        (
            PassTier::Possible,
            boundaries.likely_max,
            Some(boundaries.possible_max),
        ),
        (
            PassTier::Challenge,
            boundaries.possible_max,
            Some(boundaries.challenge_max),
        ),
        (PassTier::BelowChallenge, boundaries.challenge_max, None),
    ];
    let multiples = [
        None,
        Some(Multiple::ONE),
        Some(boundaries.likely_multiple),
        Some(boundaries.pass_multiple),
        Some(boundaries.challenge_multiple),
        None,
    ];

    ranges
        .iter()
        .enumerate()
        .map(|(idx, &(tier, after, last))| {
            let empty = last.is_some_and(|last| last <= after);
            let max_score = if after == 0 {
                TierBound::Open
            } else if empty {
                TierBound::Unpopulated
            } else {
                TierBound::at_rank(table, after + 1)
            };
            let min_score = match last {
                None => TierBound::Open,
                Some(_) if empty => TierBound::Unpopulated,
                Some(last) => TierBound::at_rank(table, last),
            };

            PyramidLevel {
                tier,
                label: tier.label(),
                count: table.count_in_ranks(after, last),
                after_rank: after,
                last_rank: last,
                min_score,
                max_score,
                min_multiple: multiples[idx],
                max_multiple: multiples[idx + 1],
                is_current: current == Some(tier),
            }
        })
        .collect()
}

use crate::command::PolicyOutput;
use passline_engine::{
    BonusCheck, CompetitorPage, PredictionResult, PreviewResult, PyramidLevel, RankBoundaries,
    SkipReason, TierBound,
};

pub fn render_prediction(result: &PredictionResult) -> String {
    let summary = &result.summary;
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}년 {}차) / {} / {}\n",
        summary.exam.name,
        summary.exam.year,
        summary.exam.round,
        summary.region_name,
        summary.exam_type.as_str()
    ));
    out.push_str(&format!(
        "Submission {}: score {} (raw {}, bonus {})\n",
        summary.submission_id,
        summary.my_score,
        summary.my_raw_score,
        summary.bonus_type.as_str()
    ));
    out.push_str(&format!(
        "Rank {}/{} (top {}%), x{} of {} recruits\n",
        summary.my_rank,
        summary.total_participants,
        summary.top_percent,
        summary.my_multiple,
        summary.recruit_count
    ));
    out.push_str(&format!("Tier: {} [{}]\n", summary.tier_label, summary.tier.as_str()));
    out.push_str(&format!(
        "Pass count {} (x{}), likely x{}\n",
        summary.pass_count, summary.pass_multiple, summary.likely_multiple
    ));
    out.push_str(&format!(
        "1x cut {} / pass line {}\n",
        bound(summary.one_multiple_cut_score),
        bound(summary.pass_line_score)
    ));
    out.push_str(&format!(
        "Scores: avg {} / high {} / low {}\n",
        summary.average_score, summary.highest_score, summary.lowest_score
    ));
    if let Some(disclaimer) = summary.disclaimer {
        out.push_str(&format!("! {disclaimer}\n"));
    }
    out.push('\n');
    out.push_str(&render_pyramid(&result.pyramid));
    out.push('\n');
    out.push_str(&render_competitors(&result.competitors));
    out
}

pub fn render_preview(preview: &PreviewResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Cohort {}\n", preview.key));
    out.push_str(&format!(
        "Score {} would rank {}/{} (x{} of {} recruits)\n",
        preview.score,
        preview.rank,
        preview.total_participants,
        preview.my_multiple,
        preview.recruit_count
    ));
    out.push_str(&format!("Tier: {} [{}]\n", preview.tier_label, preview.tier.as_str()));
    if preview.low_sample {
        out.push_str("! low sample\n");
    }
    out.push('\n');
    out.push_str(&render_pyramid(&preview.pyramid));
    out
}

pub fn render_pyramid(levels: &[PyramidLevel]) -> String {
    let mut out = String::new();
    for level in levels {
        let marker = if level.is_current { ">" } else { " " };
        out.push_str(&format!(
            "{marker} {:<10} {:>5}  {} ~ {}\n",
            level.label,
            level.count,
            bound(level.max_score),
            bound(level.min_score)
        ));
    }
    out
}

pub fn render_competitors(page: &CompetitorPage) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Competitors page {}/{} ({} participants)\n",
        page.page, page.total_pages, page.total_participants
    ));
    for entry in &page.entries {
        let marker = if entry.is_mine { "*" } else { " " };
        out.push_str(&format!(
            "{marker} {:>5}  {:<8} {}\n",
            entry.rank, entry.masked_name, entry.score
        ));
    }
    out
}

pub fn render_bonus_check(check: &BonusCheck) -> String {
    match check {
        BonusCheck::Skipped { reason } => {
            let why = match reason {
                SkipReason::NoBonus => "no bonus claimed",
                SkipReason::CutoffFailed => "submission fails a subject cutoff",
                SkipReason::NoPassCount => "no pass count for this cohort",
            };
            format!("Bonus check skipped: {why}\n")
        }
        BonusCheck::Exempt {
            family,
            cohort_size,
            recruit_count,
        } => format!(
            "{} bonus accepted: {cohort_size} applicants for {recruit_count} recruits, cap not enforced\n",
            family.label()
        ),
        BonusCheck::Within {
            family,
            beneficiaries,
            cap_count,
            pass_count,
        } => format!(
            "{} bonus accepted: {beneficiaries}/{cap_count} beneficiaries within pass count {pass_count}\n",
            family.label()
        ),
    }
}

pub fn render_policy(view: &PolicyOutput) -> String {
    let mut out = String::new();
    let threshold = view.policy.threshold();
    out.push_str(&format!("Policy: {}\n", view.name));
    out.push_str(&format!(
        "likely cap x{}, challenge factor x{}\n",
        threshold.likely_cap, threshold.challenge_factor
    ));
    for band in &threshold.multiples {
        out.push_str(&format!("  recruit >= {:<4} x{}\n", band.min_recruit, band.multiple));
    }
    for row in &threshold.small_cohort {
        out.push_str(&format!("  recruit == {:<4} pass {}\n", row.recruit, row.pass_count));
    }
    if let Some(boundaries) = &view.boundaries {
        out.push_str(&render_boundaries(boundaries));
    }
    out
}

fn render_boundaries(b: &RankBoundaries) -> String {
    format!(
        "Recruit {}: sure <= {}, likely <= {}, possible <= {}, challenge <= {}\n",
        b.recruit_count, b.sure_max, b.likely_max, b.possible_max, b.challenge_max
    )
}

fn bound(value: TierBound) -> String {
    match value {
        TierBound::Score(score) => score.to_string(),
        TierBound::Open => "-".to_string(),
        TierBound::Unpopulated => "?".to_string(),
    }
}

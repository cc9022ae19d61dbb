use std::time::Duration;

use crate::config::RecommendationConfig;
use crate::model::{MatchStatistics, MatchSummary, QualityCounts};

pub const EXCELLENT_THRESHOLD: f64 = 90.0;
pub const GOOD_THRESHOLD: f64 = 75.0;
pub const FAIR_THRESHOLD: f64 = 50.0;

/// Distribution of match scores. All zero for an empty slice.
pub fn statistics(scores: &[f64]) -> MatchStatistics {
    if scores.is_empty() {
        return MatchStatistics::default();
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;

    MatchStatistics {
        min_score: sorted[0],
        max_score: sorted[n - 1],
        median_score: median,
        std_dev: variance.sqrt(),
        quality: quality_counts(&sorted),
    }
}

fn quality_counts(scores: &[f64]) -> QualityCounts {
    let mut q = QualityCounts::default();
    for &s in scores {
        if s >= EXCELLENT_THRESHOLD {
            q.excellent += 1;
        } else if s >= GOOD_THRESHOLD {
            q.good += 1;
        } else if s >= FAIR_THRESHOLD {
            q.fair += 1;
        } else {
            q.poor += 1;
        }
    }
    q
}

pub fn summary(total_authorizations: usize, total_presentments: usize, scores: &[f64]) -> MatchSummary {
    let matched = scores.len();
    let total_score: f64 = scores.iter().sum();
    MatchSummary {
        total_authorizations,
        total_presentments,
        matched,
        unmatched_authorizations: total_authorizations - matched,
        unmatched_presentments: total_presentments - matched,
        total_score,
        average_score: ratio(total_score, matched),
        matching_rate: ratio(matched as f64, total_authorizations),
        presentment_coverage_rate: ratio(matched as f64, total_presentments),
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Operator-facing advice derived from a finished solve.
pub fn recommendations(
    summary: &MatchSummary,
    statistics: &MatchStatistics,
    elapsed: Duration,
    thresholds: &RecommendationConfig,
) -> Vec<String> {
    let mut out = Vec::new();

    if summary.total_authorizations > 0 && summary.matching_rate < thresholds.min_matching_rate {
        out.push(format!(
            "Matching rate {:.1}% is below {:.1}%: review {} unmatched authorizations for \
             missing presentments or data-quality issues",
            summary.matching_rate * 100.0,
            thresholds.min_matching_rate * 100.0,
            summary.unmatched_authorizations,
        ));
    }

    if summary.matched > 0 && summary.average_score < thresholds.min_average_score {
        out.push(format!(
            "Average match score {:.1} is below {:.1}: check merchant and amount \
             consistency between authorization and clearing feeds",
            summary.average_score, thresholds.min_average_score,
        ));
    }

    if elapsed.as_millis() > u128::from(thresholds.max_execution_ms) {
        out.push(format!(
            "Matching took {} ms (limit {} ms): split the batch by card with partitioned matching",
            elapsed.as_millis(),
            thresholds.max_execution_ms,
        ));
    }

    if statistics.quality.poor > 0 {
        out.push(format!(
            "{} matches scored below {FAIR_THRESHOLD:.0}: verify them manually",
            statistics.quality.poor,
        ));
    }

    out
}

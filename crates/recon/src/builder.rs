use crate::config::RecommendationConfig;
use crate::hungarian::Assignment;
use crate::model::{
    Authorization, Match, MatchMeta, MatchingResult, Presentment, ScoreBreakdown,
};
use crate::stats;

/// One accepted pair, by input index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PairedIndex {
    pub auth: usize,
    pub presentment: usize,
    pub breakdown: ScoreBreakdown,
}

/// Keeps the assigned pairs that still score above zero.
///
/// `breakdown(row, col)` rescores a pair in matrix coordinates.
pub(crate) fn collect_pairs(
    assignment: &Assignment,
    mut breakdown: impl FnMut(usize, usize) -> Option<ScoreBreakdown>,
) -> Vec<PairedIndex> {
    assignment
        .pairs()
        .filter_map(|(row, col)| {
            breakdown(row, col)
                .filter(|b| b.total > 0.0)
                .map(|b| PairedIndex {
                    auth: row,
                    presentment: col,
                    breakdown: b,
                })
        })
        .collect()
}

/// Turns accepted pairs into the final result. `pairs` must be ordered by
/// authorization index; unmatched lists keep input order.
pub(crate) fn assemble(
    authorizations: &[Authorization],
    presentments: &[Presentment],
    pairs: &[PairedIndex],
    meta: MatchMeta,
    thresholds: RecommendationConfig,
) -> MatchingResult {
    let mut auth_taken = vec![false; authorizations.len()];
    let mut pres_taken = vec![false; presentments.len()];

    let matches: Vec<Match> = pairs
        .iter()
        .map(|p| {
            auth_taken[p.auth] = true;
            pres_taken[p.presentment] = true;
            Match::new(
                authorizations[p.auth].clone(),
                presentments[p.presentment].clone(),
                p.breakdown,
            )
        })
        .collect();

    let unmatched_authorizations: Vec<Authorization> = authorizations
        .iter()
        .zip(&auth_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(a, _)| a.clone())
        .collect();
    let unmatched_presentments: Vec<Presentment> = presentments
        .iter()
        .zip(&pres_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(p, _)| p.clone())
        .collect();

    let scores: Vec<f64> = matches.iter().map(Match::score).collect();
    let summary = stats::summary(authorizations.len(), presentments.len(), &scores);
    let statistics = stats::statistics(&scores);

    MatchingResult::from_parts(
        meta,
        summary,
        statistics,
        matches,
        unmatched_authorizations,
        unmatched_presentments,
        thresholds,
    )
}

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::builder::{self, PairedIndex};
use crate::config::MatchConfig;
use crate::cost_matrix::CostMatrix;
use crate::error::MatchError;
use crate::hungarian;
use crate::model::{Authorization, CardId, MatchMeta, MatchingResult, Presentment};
use crate::scorer::Scorer;

pub const ALGORITHM: &str = "Hungarian";
pub const ALGORITHM_PARTITIONED: &str = "Hungarian (partitioned)";
pub const ALGORITHM_NONE: &str = "None";

/// Evaluation instant for eligibility: `matching.as_of` or the wall clock.
pub fn evaluation_instant(config: &MatchConfig) -> DateTime<Utc> {
    config.matching.as_of.unwrap_or_else(Utc::now)
}

/// Runs the pipeline the config asks for (single matrix or per-card partitions).
pub fn run(
    config: &MatchConfig,
    authorizations: &[Authorization],
    presentments: &[Presentment],
) -> Result<MatchingResult, MatchError> {
    let now = evaluation_instant(config);
    if config.matching.partition_by_card {
        solve_partitioned_at(config, authorizations, presentments, now)
    } else {
        solve_at(config, authorizations, presentments, now)
    }
}

/// Optimal one-to-one matching over a single cost matrix.
pub fn solve(
    config: &MatchConfig,
    authorizations: &[Authorization],
    presentments: &[Presentment],
) -> Result<MatchingResult, MatchError> {
    solve_at(config, authorizations, presentments, evaluation_instant(config))
}

pub fn solve_at(
    config: &MatchConfig,
    authorizations: &[Authorization],
    presentments: &[Presentment],
    now: DateTime<Utc>,
) -> Result<MatchingResult, MatchError> {
    let started = Instant::now();
    config.validate()?;
    validate_inputs(authorizations, presentments)?;

    if authorizations.is_empty() && presentments.is_empty() {
        return Ok(empty_result(config, now, started));
    }

    let scorer = Scorer::new(config.scoring);
    let matrix = CostMatrix::build(authorizations, presentments, &scorer, now);
    debug!(
        authorizations = authorizations.len(),
        presentments = presentments.len(),
        size = matrix.size(),
        reachable = matrix.reachable_count(),
        "cost matrix built"
    );

    let assignment = hungarian::solve(&matrix)?;
    let pairs = builder::collect_pairs(&assignment, |i, j| {
        scorer.breakdown(&authorizations[i], &presentments[j], now)
    });

    let meta = meta(ALGORITHM, now, started);
    let result = builder::assemble(
        authorizations,
        presentments,
        &pairs,
        meta,
        config.recommendations,
    );
    log_outcome(&result);
    Ok(result)
}

/// Same result as [`solve`] in match count and total score, but solves each
/// (card, currency) group on its own matrix. Pairs across groups are always
/// unreachable, so the full matrix is block-diagonal.
pub fn solve_partitioned(
    config: &MatchConfig,
    authorizations: &[Authorization],
    presentments: &[Presentment],
) -> Result<MatchingResult, MatchError> {
    solve_partitioned_at(config, authorizations, presentments, evaluation_instant(config))
}

pub fn solve_partitioned_at(
    config: &MatchConfig,
    authorizations: &[Authorization],
    presentments: &[Presentment],
    now: DateTime<Utc>,
) -> Result<MatchingResult, MatchError> {
    let started = Instant::now();
    config.validate()?;
    validate_inputs(authorizations, presentments)?;

    if authorizations.is_empty() && presentments.is_empty() {
        return Ok(empty_result(config, now, started));
    }

    let scorer = Scorer::new(config.scoring);
    let groups = partition(authorizations, presentments);
    debug!(groups = groups.len(), "partitioned by card and currency");

    let mut pairs: Vec<PairedIndex> = Vec::new();
    for ((card, currency), group) in &groups {
        if group.auths.is_empty() || group.presentments.is_empty() {
            continue;
        }
        let matrix = CostMatrix::from_fn(group.auths.len(), group.presentments.len(), |i, j| {
            scorer.cost(
                &authorizations[group.auths[i]],
                &presentments[group.presentments[j]],
                now,
            )
        });
        debug!(
            card = %card,
            currency = currency.as_str(),
            size = matrix.size(),
            reachable = matrix.reachable_count(),
            "solving partition"
        );

        let assignment = hungarian::solve(&matrix)?;
        let local = builder::collect_pairs(&assignment, |i, j| {
            scorer.breakdown(
                &authorizations[group.auths[i]],
                &presentments[group.presentments[j]],
                now,
            )
        });
        pairs.extend(local.into_iter().map(|p| PairedIndex {
            auth: group.auths[p.auth],
            presentment: group.presentments[p.presentment],
            breakdown: p.breakdown,
        }));
    }
    pairs.sort_by_key(|p| p.auth);

    let meta = meta(ALGORITHM_PARTITIONED, now, started);
    let result = builder::assemble(
        authorizations,
        presentments,
        &pairs,
        meta,
        config.recommendations,
    );
    log_outcome(&result);
    Ok(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Group {
    auths: Vec<usize>,
    presentments: Vec<usize>,
}

fn partition(
    authorizations: &[Authorization],
    presentments: &[Presentment],
) -> BTreeMap<(CardId, String), Group> {
    let mut groups: BTreeMap<(CardId, String), Group> = BTreeMap::new();
    for (i, a) in authorizations.iter().enumerate() {
        groups
            .entry((a.card.clone(), a.amount.currency.clone()))
            .or_default()
            .auths
            .push(i);
    }
    for (j, p) in presentments.iter().enumerate() {
        groups
            .entry((p.card.clone(), p.amount.currency.clone()))
            .or_default()
            .presentments
            .push(j);
    }
    groups
}

/// Record invariants plus unique ids within each list.
pub fn validate_inputs(
    authorizations: &[Authorization],
    presentments: &[Presentment],
) -> Result<(), MatchError> {
    let mut seen = HashSet::new();
    for a in authorizations {
        a.validate()?;
        if !seen.insert(a.id.as_str()) {
            return Err(MatchError::InvalidInput(format!(
                "duplicate authorization id '{}'",
                a.id
            )));
        }
    }

    let mut seen = HashSet::new();
    for p in presentments {
        p.validate()?;
        if !seen.insert(p.id.as_str()) {
            return Err(MatchError::InvalidInput(format!(
                "duplicate presentment id '{}'",
                p.id
            )));
        }
    }
    Ok(())
}

fn meta(algorithm: &str, now: DateTime<Utc>, started: Instant) -> MatchMeta {
    MatchMeta {
        algorithm: algorithm.into(),
        engine_version: env!("CARGO_PKG_VERSION").into(),
        as_of: now,
        execution_time: started.elapsed(),
    }
}

fn empty_result(config: &MatchConfig, now: DateTime<Utc>, started: Instant) -> MatchingResult {
    debug!("no authorizations or presentments; solver skipped");
    builder::assemble(
        &[],
        &[],
        &[],
        meta(ALGORITHM_NONE, now, started),
        config.recommendations,
    )
}

fn log_outcome(result: &MatchingResult) {
    let s = result.summary();
    info!(
        algorithm = result.algorithm(),
        matched = s.matched,
        unmatched_authorizations = s.unmatched_authorizations,
        unmatched_presentments = s.unmatched_presentments,
        total_score = s.total_score,
        elapsed_ms = result.execution_time().as_millis() as u64,
        "matching complete"
    );
    for rec in result.recommendations() {
        info!(recommendation = rec.as_str(), "recommendation raised");
    }
}

// Property-based tests for the matching engine.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use clearmatch_recon::cost_matrix::CostMatrix;
use clearmatch_recon::engine::{solve_at, solve_partitioned_at};
use clearmatch_recon::hungarian;
use clearmatch_recon::{
    Authorization, AuthorizationStatus, CardId, MatchConfig, Money, Presentment, PresentmentKind,
    Scorer,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn config_128() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const CARDS: [&str; 3] = ["tok_0001", "tok_0002", "tok_0003"];
const MERCHANTS: [&str; 2] = ["m-a", "m-b"];

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    base() + Duration::days(1)
}

/// Cost cell: mostly real integer costs, sometimes unreachable.
fn arb_cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        3 => (0u32..=100).prop_map(|c| Some(c as f64)),
        1 => Just(None),
    ]
}

fn arb_matrix() -> impl Strategy<Value = (usize, usize, Vec<Option<f64>>)> {
    (0usize..=5, 0usize..=5).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(arb_cell(), rows * cols).prop_map(move |cells| (rows, cols, cells))
    })
}

/// (card, amount, minutes after base, merchant, approved)
fn arb_auth() -> impl Strategy<Value = (usize, i64, i64, usize, bool)> {
    (
        0..CARDS.len(),
        prop_oneof![Just(10_000i64), Just(10_150), Just(11_000), Just(20_000)],
        0i64..(3 * 24 * 60),
        0..MERCHANTS.len(),
        prop::bool::weighted(0.85),
    )
}

/// (card, amount, minutes after base, merchant, kind selector)
fn arb_presentment() -> impl Strategy<Value = (usize, i64, i64, usize, u8)> {
    (
        0..CARDS.len(),
        prop_oneof![Just(10_000i64), Just(10_150), Just(11_000), Just(20_000)],
        0i64..(3 * 24 * 60),
        0..MERCHANTS.len(),
        0u8..10,
    )
}

fn build_auths(specs: &[(usize, i64, i64, usize, bool)]) -> Vec<Authorization> {
    specs
        .iter()
        .enumerate()
        .map(|(i, &(card, amount, minutes, merchant, approved))| {
            let timestamp = base() + Duration::minutes(minutes);
            Authorization {
                id: format!("a-{i}"),
                card: CardId::new(CARDS[card]),
                amount: Money::new(amount, "USD"),
                timestamp,
                merchant_id: MERCHANTS[merchant].into(),
                category_code: "5411".into(),
                status: if approved {
                    AuthorizationStatus::Approved
                } else {
                    AuthorizationStatus::Declined
                },
                expires_at: timestamp + Duration::days(7),
                auth_code: approved.then(|| format!("AC{i:04}")),
            }
        })
        .collect()
}

fn build_presentments(specs: &[(usize, i64, i64, usize, u8)]) -> Vec<Presentment> {
    specs
        .iter()
        .enumerate()
        .map(|(j, &(card, amount, minutes, merchant, kind))| Presentment {
            id: format!("p-{j}"),
            card: CardId::new(CARDS[card]),
            amount: Money::new(amount, "USD"),
            timestamp: base() + Duration::minutes(minutes),
            merchant_id: MERCHANTS[merchant].into(),
            category_code: "5411".into(),
            kind: match kind {
                0 => PresentmentKind::Reversal,
                1 | 2 => PresentmentKind::SecondPresentment,
                _ => PresentmentKind::FirstPresentment,
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Brute force
// ---------------------------------------------------------------------------

/// Best (pair count, total cost) over all partial one-to-one assignments:
/// most pairs first, then least cost.
fn brute_force(rows: usize, cols: usize, cells: &[Option<f64>]) -> (usize, f64) {
    fn go(
        row: usize,
        rows: usize,
        cols: usize,
        cells: &[Option<f64>],
        used: &mut [bool],
    ) -> (usize, f64) {
        if row == rows {
            return (0, 0.0);
        }
        let mut best = go(row + 1, rows, cols, cells, used);
        for col in 0..cols {
            if used[col] {
                continue;
            }
            if let Some(c) = cells[row * cols + col] {
                used[col] = true;
                let (n, cost) = go(row + 1, rows, cols, cells, used);
                used[col] = false;
                let candidate = (n + 1, cost + c);
                if candidate.0 > best.0 || (candidate.0 == best.0 && candidate.1 < best.1 - 1e-9) {
                    best = candidate;
                }
            }
        }
        best
    }
    go(0, rows, cols, cells, &mut vec![false; cols])
}

// ---------------------------------------------------------------------------
// Solver properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn solver_matches_brute_force((rows, cols, cells) in arb_matrix()) {
        let matrix = CostMatrix::from_costs(rows, cols, &cells).unwrap();
        let assignment = hungarian::solve(&matrix).unwrap();

        let (best_pairs, best_cost) = brute_force(rows, cols, &cells);
        let cost: f64 = assignment
            .pairs()
            .map(|(r, c)| cells[r * cols + c].unwrap())
            .sum();

        prop_assert_eq!(assignment.len(), best_pairs);
        prop_assert!((cost - best_cost).abs() < 1e-6, "cost {} vs best {}", cost, best_cost);
    }

    #[test]
    fn solver_assignment_is_one_to_one((rows, cols, cells) in arb_matrix()) {
        let matrix = CostMatrix::from_costs(rows, cols, &cells).unwrap();
        let assignment = hungarian::solve(&matrix).unwrap();

        let mut seen = vec![false; cols];
        for (r, c) in assignment.pairs() {
            prop_assert!(r < rows);
            prop_assert!(c < cols);
            prop_assert!(cells[r * cols + c].is_some(), "unreachable cell ({}, {}) assigned", r, c);
            prop_assert!(!seen[c], "column {} assigned twice", c);
            seen[c] = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Engine properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_128())]

    #[test]
    fn conservation_and_bounded_ratios(
        auth_specs in prop::collection::vec(arb_auth(), 0..8),
        pres_specs in prop::collection::vec(arb_presentment(), 0..8),
    ) {
        let auths = build_auths(&auth_specs);
        let pres = build_presentments(&pres_specs);
        let result = solve_at(&MatchConfig::default(), &auths, &pres, now()).unwrap();
        let s = result.summary();

        prop_assert_eq!(result.matches().len() + result.unmatched_authorizations().len(), auths.len());
        prop_assert_eq!(result.matches().len() + result.unmatched_presentments().len(), pres.len());
        prop_assert!((0.0..=1.0).contains(&s.matching_rate));
        prop_assert!((0.0..=1.0).contains(&s.presentment_coverage_rate));
        for m in result.matches() {
            prop_assert!(m.score() > 0.0 && m.score() <= 100.0);
        }
    }

    #[test]
    fn matches_respect_the_card_gate(
        auth_specs in prop::collection::vec(arb_auth(), 0..8),
        pres_specs in prop::collection::vec(arb_presentment(), 0..8),
    ) {
        let auths = build_auths(&auth_specs);
        let pres = build_presentments(&pres_specs);
        let result = solve_at(&MatchConfig::default(), &auths, &pres, now()).unwrap();

        for m in result.matches() {
            prop_assert_eq!(&m.authorization().card, &m.presentment().card);
            prop_assert_eq!(m.authorization().status, AuthorizationStatus::Approved);
            prop_assert_ne!(m.presentment().kind, PresentmentKind::Reversal);
        }
    }

    #[test]
    fn engine_is_optimal_against_brute_force(
        auth_specs in prop::collection::vec(arb_auth(), 0..6),
        pres_specs in prop::collection::vec(arb_presentment(), 0..6),
    ) {
        let auths = build_auths(&auth_specs);
        let pres = build_presentments(&pres_specs);
        let result = solve_at(&MatchConfig::default(), &auths, &pres, now()).unwrap();

        let scorer = Scorer::default();
        let cells: Vec<Option<f64>> = auths
            .iter()
            .flat_map(|a| pres.iter().map(move |p| (a, p)))
            .map(|(a, p)| scorer.cost(a, p, now()))
            .collect();
        let (best_pairs, best_cost) = brute_force(auths.len(), pres.len(), &cells);

        prop_assert_eq!(result.matches().len(), best_pairs);
        prop_assert!(
            (result.total_cost() - best_cost).abs() < 1e-6,
            "cost {} vs best {}", result.total_cost(), best_cost
        );
    }

    #[test]
    fn solving_is_idempotent(
        auth_specs in prop::collection::vec(arb_auth(), 0..8),
        pres_specs in prop::collection::vec(arb_presentment(), 0..8),
    ) {
        let auths = build_auths(&auth_specs);
        let pres = build_presentments(&pres_specs);
        let config = MatchConfig::default();
        let first = solve_at(&config, &auths, &pres, now()).unwrap();
        let second = solve_at(&config, &auths, &pres, now()).unwrap();

        prop_assert_eq!(first.matches(), second.matches());
        prop_assert_eq!(first.total_score(), second.total_score());
    }

    #[test]
    fn partitioned_agrees_with_single_matrix(
        auth_specs in prop::collection::vec(arb_auth(), 0..8),
        pres_specs in prop::collection::vec(arb_presentment(), 0..8),
    ) {
        let auths = build_auths(&auth_specs);
        let pres = build_presentments(&pres_specs);
        let config = MatchConfig::default();
        let full = solve_at(&config, &auths, &pres, now()).unwrap();
        let split = solve_partitioned_at(&config, &auths, &pres, now()).unwrap();

        prop_assert_eq!(full.matches().len(), split.matches().len());
        prop_assert!(
            (full.total_score() - split.total_score()).abs() < 1e-6,
            "full {} vs partitioned {}", full.total_score(), split.total_score()
        );
    }
}

use std::path::PathBuf;
use std::time::Duration;

use clearmatch_recon::engine::{self, ALGORITHM, ALGORITHM_PARTITIONED};
use clearmatch_recon::loader::{load_authorizations, load_presentments};
use clearmatch_recon::{Authorization, MatchConfig, MatchError, MatchingResult, Presentment};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(config_file: &str) -> (MatchConfig, Vec<Authorization>, Vec<Presentment>) {
    let dir = fixtures_dir();
    let toml = std::fs::read_to_string(dir.join(config_file)).unwrap();
    let config = MatchConfig::from_toml(&toml).unwrap();

    let auth_src = config.inputs.authorizations.as_ref().unwrap();
    let auth_csv = std::fs::read_to_string(dir.join(&auth_src.file)).unwrap();
    let auths = load_authorizations("authorizations", &auth_csv, &auth_src.columns).unwrap();

    let pres_src = config.inputs.presentments.as_ref().unwrap();
    let pres_csv = std::fs::read_to_string(dir.join(&pres_src.file)).unwrap();
    let pres = load_presentments("presentments", &pres_csv, &pres_src.columns).unwrap();

    (config, auths, pres)
}

fn load_and_run(config_file: &str) -> MatchingResult {
    let (config, auths, pres) = load_fixture(config_file);
    engine::run(&config, &auths, &pres).unwrap()
}

fn pair_ids(result: &MatchingResult) -> Vec<(String, String)> {
    result
        .matches()
        .iter()
        .map(|m| (m.authorization().id.clone(), m.presentment().id.clone()))
        .collect()
}

// -------------------------------------------------------------------------
// Daily batch
// -------------------------------------------------------------------------

#[test]
fn daily_batch_pairs_best_candidates() {
    let result = load_and_run("daily.toml");

    assert_eq!(result.algorithm(), ALGORITHM);
    assert_eq!(
        pair_ids(&result),
        vec![
            ("a-100".to_string(), "p-200".to_string()),
            ("a-101".to_string(), "p-201".to_string()),
            ("a-102".to_string(), "p-202".to_string()),
        ]
    );

    let scores: Vec<f64> = result.matches().iter().map(|m| m.score()).collect();
    assert!((scores[0] - 100.0).abs() < 1e-9);
    assert!((scores[1] - 92.0).abs() < 1e-9);
    assert!((scores[2] - 88.0).abs() < 1e-9);
    assert!((result.total_score() - 280.0).abs() < 1e-9);
}

#[test]
fn daily_batch_reports_ineligible_records_as_unmatched() {
    let result = load_and_run("daily.toml");

    // a-103 declined, a-104 expired before the evaluation instant.
    let auths: Vec<&str> = result
        .unmatched_authorizations()
        .iter()
        .map(|a| a.id.as_str())
        .collect();
    assert_eq!(auths, ["a-103", "a-104"]);

    // p-203 only fits the declined hold; p-204 is a reversal.
    let pres: Vec<&str> = result
        .unmatched_presentments()
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(pres, ["p-203", "p-204"]);
}

#[test]
fn daily_batch_summary_and_statistics() {
    let result = load_and_run("daily.toml");
    let s = result.summary();

    assert_eq!(s.total_authorizations, 5);
    assert_eq!(s.total_presentments, 5);
    assert_eq!(s.matched, 3);
    assert_eq!(s.matched + s.unmatched_authorizations, s.total_authorizations);
    assert_eq!(s.matched + s.unmatched_presentments, s.total_presentments);
    assert!((s.matching_rate - 0.6).abs() < 1e-12);
    assert!((s.presentment_coverage_rate - 0.6).abs() < 1e-12);

    let stats = result.statistics();
    assert!((stats.min_score - 88.0).abs() < 1e-9);
    assert!((stats.max_score - 100.0).abs() < 1e-9);
    assert!((stats.median_score - 92.0).abs() < 1e-9);
    assert_eq!(stats.quality.excellent, 2);
    assert_eq!(stats.quality.good, 1);
    assert_eq!(stats.quality.poor, 0);

    assert_eq!(result.recommendations().len(), 1);
    assert!(result.recommendations()[0].contains("Matching rate 60.0%"));
}

#[test]
fn partitioned_solve_matches_single_matrix() {
    let (config, auths, pres) = load_fixture("daily.toml");
    let full = engine::solve(&config, &auths, &pres).unwrap();
    let split = engine::solve_partitioned(&config, &auths, &pres).unwrap();

    assert_eq!(split.algorithm(), ALGORITHM_PARTITIONED);
    assert_eq!(pair_ids(&full), pair_ids(&split));
    assert!((full.total_score() - split.total_score()).abs() < 1e-9);
    assert_eq!(full.unmatched_presentments(), split.unmatched_presentments());
}

// -------------------------------------------------------------------------
// Column mapping
// -------------------------------------------------------------------------

#[test]
fn mapped_feed_with_partitioning() {
    let result = load_and_run("mapped.toml");

    assert_eq!(result.algorithm(), ALGORITHM_PARTITIONED);
    assert_eq!(
        pair_ids(&result),
        vec![
            ("a-100".to_string(), "CLR-3".to_string()),
            ("a-101".to_string(), "CLR-1".to_string()),
            ("a-102".to_string(), "CLR-2".to_string()),
        ]
    );
    assert!(result.unmatched_presentments().is_empty());
    // min_matching_rate lowered to 0.5 in the config
    assert!(result.recommendations().is_empty());
}

#[test]
fn unmapped_headers_are_missing_columns() {
    let dir = fixtures_dir();
    let csv = std::fs::read_to_string(dir.join("acquirer_feed.csv")).unwrap();
    let err = load_presentments("acquirer_feed", &csv, &Default::default()).unwrap_err();
    assert!(matches!(err, MatchError::MissingColumn { ref column, .. } if column == "id"));
}

// -------------------------------------------------------------------------
// Result surface
// -------------------------------------------------------------------------

#[test]
fn result_serializes_to_json() {
    let result = load_and_run("daily.toml");
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["meta"]["algorithm"], "Hungarian");
    assert_eq!(json["meta"]["as_of"], "2026-01-16T00:00:00Z");
    assert!(json["meta"]["execution_time_ms"].is_u64());
    assert_eq!(json["summary"]["matched"], 3);
    assert_eq!(json["matches"].as_array().unwrap().len(), 3);
    assert_eq!(json["matches"][0]["authorization"]["id"], "a-100");
    assert_eq!(json["matches"][1]["breakdown"]["amount"], 80.0);
    assert_eq!(json["unmatched_presentments"][1]["kind"], "reversal");
    assert!(json.get("thresholds").is_none());
}

#[test]
fn execution_time_copy_keeps_content() {
    let result = load_and_run("daily.toml");
    let slow = result.with_execution_time(Duration::from_millis(2_500));

    assert_eq!(slow.execution_time(), Duration::from_millis(2_500));
    assert_eq!(slow.matches(), result.matches());
    assert_eq!(slow.summary(), result.summary());
    assert_eq!(slow.recommendations().len(), result.recommendations().len() + 1);
    assert!(slow.recommendations().iter().any(|r| r.contains("2500 ms")));
}

#[test]
fn summary_line_mentions_counts() {
    let line = load_and_run("daily.toml").summary_line();
    assert!(line.starts_with("5 authorizations, 5 presentments: 3 matched"), "{line}");
    assert!(line.contains("[Hungarian,"), "{line}");
}

#[test]
fn solving_twice_yields_identical_matches() {
    let (config, auths, pres) = load_fixture("daily.toml");
    let a = engine::solve(&config, &auths, &pres).unwrap();
    let b = engine::solve(&config, &auths, &pres).unwrap();
    assert_eq!(a.matches(), b.matches());
    assert_eq!(a.unmatched_authorizations(), b.unmatched_authorizations());
}

//! `clearmatch run | validate | explain`: config-driven authorization matching.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Subcommand;
use tracing::debug;

use clearmatch_recon::config::{ColumnMap, SourceConfig};
use clearmatch_recon::loader::{load_authorizations, load_presentments, parse_timestamp};
use clearmatch_recon::scorer::Scorer;
use clearmatch_recon::{engine, Authorization, MatchConfig, MatchError, Presentment};

use crate::exit_codes::{
    exit_code_for, EXIT_INVALID_INPUT, EXIT_IO, EXIT_UNMATCHED, EXIT_USAGE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum MatchCommands {
    /// Match authorizations to presentments from a TOML config file
    #[command(after_help = "\
Examples:
  clearmatch run daily.toml
  clearmatch run daily.toml --json
  clearmatch run daily.toml --as-of 2026-01-16T00:00:00Z --output result.json
  clearmatch run daily.toml --presentments late_feed.csv --partition --strict")]
    Run {
        /// Path to the matching config (.toml)
        config: PathBuf,

        /// Authorizations CSV (overrides inputs.authorizations.file)
        #[arg(long)]
        authorizations: Option<PathBuf>,

        /// Presentments CSV (overrides inputs.presentments.file)
        #[arg(long)]
        presentments: Option<PathBuf>,

        /// Evaluate eligibility at this instant (RFC 3339 or "YYYY-MM-DD HH:MM:SS" UTC)
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,

        /// Solve each card/currency group separately
        #[arg(long)]
        partition: bool,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 1 when anything is left unmatched
        #[arg(long)]
        strict: bool,
    },

    /// Validate a matching config without running
    #[command(after_help = "\
Examples:
  clearmatch validate daily.toml")]
    Validate {
        /// Path to the matching config (.toml)
        config: PathBuf,
    },

    /// Show the score breakdown for one authorization/presentment pair
    #[command(after_help = "\
Examples:
  clearmatch explain daily.toml --authorization a-101 --presentment p-201
  clearmatch explain daily.toml --authorization a-101 --presentment p-201 --json")]
    Explain {
        /// Path to the matching config (.toml)
        config: PathBuf,

        /// Authorization id
        #[arg(long)]
        authorization: String,

        /// Presentment id
        #[arg(long)]
        presentment: String,

        /// Authorizations CSV (overrides inputs.authorizations.file)
        #[arg(long)]
        authorizations: Option<PathBuf>,

        /// Presentments CSV (overrides inputs.presentments.file)
        #[arg(long)]
        presentments: Option<PathBuf>,

        /// Evaluate eligibility at this instant
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_match(cmd: MatchCommands) -> Result<(), CliError> {
    match cmd {
        MatchCommands::Run {
            config,
            authorizations,
            presentments,
            as_of,
            partition,
            json,
            output,
            strict,
        } => cmd_run(
            config,
            Overrides {
                authorizations,
                presentments,
                as_of,
            },
            partition,
            json,
            output,
            strict,
        ),
        MatchCommands::Validate { config } => cmd_validate(config),
        MatchCommands::Explain {
            config,
            authorization,
            presentment,
            authorizations,
            presentments,
            as_of,
            json,
        } => cmd_explain(
            config,
            Overrides {
                authorizations,
                presentments,
                as_of,
            },
            &authorization,
            &presentment,
            json,
        ),
    }
}

fn match_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

fn engine_err(err: MatchError) -> CliError {
    match_err(exit_code_for(&err), err.to_string())
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value).ok_or_else(|| {
        format!("invalid timestamp '{value}' (expected RFC 3339 or YYYY-MM-DD HH:MM:SS)")
    })
}

/// Command-line values that take precedence over the config file.
struct Overrides {
    authorizations: Option<PathBuf>,
    presentments: Option<PathBuf>,
    as_of: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<MatchConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| match_err(EXIT_IO, format!("cannot read config {}: {e}", path.display())))?;
    MatchConfig::from_toml(&text).map_err(engine_err)
}

/// CSV path for one side: the command-line override, else the config's file
/// resolved relative to the config's directory.
fn resolve_source(
    label: &str,
    config_path: &Path,
    source: Option<&SourceConfig>,
    override_path: Option<PathBuf>,
) -> Result<(PathBuf, ColumnMap), CliError> {
    let columns = source.map(|s| s.columns.clone()).unwrap_or_default();
    if let Some(path) = override_path {
        return Ok((path, columns));
    }
    let source = source.ok_or_else(|| {
        match_err(EXIT_USAGE, format!("no {label} input configured")).with_hint(format!(
            "add [inputs.{label}] to the config or pass --{label} <PATH>"
        ))
    })?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok((base_dir.join(&source.file), columns))
}

fn read_csv(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| match_err(EXIT_IO, format!("cannot read {}: {e}", path.display())))
}

fn load_inputs(
    config_path: &Path,
    config: &MatchConfig,
    overrides: &mut Overrides,
) -> Result<(Vec<Authorization>, Vec<Presentment>), CliError> {
    let (auth_path, auth_cols) = resolve_source(
        "authorizations",
        config_path,
        config.inputs.authorizations.as_ref(),
        overrides.authorizations.take(),
    )?;
    let (pres_path, pres_cols) = resolve_source(
        "presentments",
        config_path,
        config.inputs.presentments.as_ref(),
        overrides.presentments.take(),
    )?;

    let auths = load_authorizations(&source_name(&auth_path), &read_csv(&auth_path)?, &auth_cols)
        .map_err(engine_err)?;
    let pres = load_presentments(&source_name(&pres_path), &read_csv(&pres_path)?, &pres_cols)
        .map_err(engine_err)?;
    debug!(
        authorizations = auths.len(),
        presentments = pres.len(),
        "inputs loaded"
    );
    Ok((auths, pres))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn cmd_run(
    config_path: PathBuf,
    mut overrides: Overrides,
    partition: bool,
    json_output: bool,
    output_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let mut config = load_config(&config_path)?;
    if let Some(as_of) = overrides.as_of {
        config.matching.as_of = Some(as_of);
    }
    if partition {
        config.matching.partition_by_card = true;
    }

    let (auths, pres) = load_inputs(&config_path, &config, &mut overrides)?;
    let result = engine::run(&config, &auths, &pres).map_err(engine_err)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| match_err(EXIT_IO, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| match_err(EXIT_IO, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    eprintln!("{}: {}", config.name, result.summary_line());
    for rec in result.recommendations() {
        eprintln!("  - {rec}");
    }

    let s = result.summary();
    if strict && (s.unmatched_authorizations > 0 || s.unmatched_presentments > 0) {
        return Err(match_err(
            EXIT_UNMATCHED,
            format!(
                "{} unmatched authorizations, {} unmatched presentments",
                s.unmatched_authorizations, s.unmatched_presentments
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let w = &config.scoring;
    eprintln!("valid: {}", config.name);
    eprintln!(
        "  weights: amount {:.2}, time {:.2}, merchant {:.2}, category {:.2}",
        w.amount_weight, w.time_weight, w.merchant_weight, w.category_weight
    );
    if let Some(ref src) = config.inputs.authorizations {
        eprintln!("  authorizations: {}", src.file);
    }
    if let Some(ref src) = config.inputs.presentments {
        eprintln!("  presentments: {}", src.file);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// explain
// ---------------------------------------------------------------------------

fn cmd_explain(
    config_path: PathBuf,
    mut overrides: Overrides,
    authorization_id: &str,
    presentment_id: &str,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let (auths, pres) = load_inputs(&config_path, &config, &mut overrides)?;
    let now = overrides
        .as_of
        .unwrap_or_else(|| engine::evaluation_instant(&config));

    let auth = auths
        .iter()
        .find(|a| a.id == authorization_id)
        .ok_or_else(|| {
            match_err(
                EXIT_INVALID_INPUT,
                format!("authorization '{authorization_id}' not found"),
            )
        })?;
    let presentment = pres
        .iter()
        .find(|p| p.id == presentment_id)
        .ok_or_else(|| {
            match_err(
                EXIT_INVALID_INPUT,
                format!("presentment '{presentment_id}' not found"),
            )
        })?;

    let scorer = Scorer::new(config.scoring);
    let gate = scorer.gate(auth, presentment, now);
    let breakdown = scorer.breakdown(auth, presentment, now);

    if json_output {
        let value = serde_json::json!({
            "authorization": auth.id,
            "presentment": presentment.id,
            "as_of": now,
            "matchable": gate.is_ok(),
            "gate": gate.err().map(|r| r.to_string()),
            "breakdown": breakdown,
        });
        let json_str = serde_json::to_string_pretty(&value)
            .map_err(|e| match_err(EXIT_IO, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!(
        "authorization {} ({}) vs presentment {} ({}), card {}, as of {}",
        auth.id,
        auth.amount,
        presentment.id,
        presentment.amount,
        auth.card,
        now.to_rfc3339()
    );
    match (gate, breakdown) {
        (Ok(()), Some(b)) => {
            let w = scorer.weights();
            println!("  amount   {:>5.1} x {:.2}", b.amount, w.amount_weight);
            println!("  time     {:>5.1} x {:.2}", b.time, w.time_weight);
            println!("  merchant {:>5.1} x {:.2}", b.merchant, w.merchant_weight);
            println!("  category {:>5.1} x {:.2}", b.category, w.category_weight);
            println!("  score    {:>5.1}", b.total);
        }
        (Err(reason), _) => println!("  not matchable: {reason}"),
        (Ok(()), None) => println!("  not matchable"),
    }
    Ok(())
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::MatchError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchConfig {
    pub name: String,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub matching: MatchingOptions,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            scoring: ScoringWeights::default(),
            matching: MatchingOptions::default(),
            recommendations: RecommendationConfig::default(),
            inputs: InputsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Weights of the four sub-scores. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub amount_weight: f64,
    pub time_weight: f64,
    pub merchant_weight: f64,
    pub category_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            amount_weight: 0.4,
            time_weight: 0.3,
            merchant_weight: 0.2,
            category_weight: 0.1,
        }
    }
}

impl ScoringWeights {
    fn sum(&self) -> f64 {
        self.amount_weight + self.time_weight + self.merchant_weight + self.category_weight
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingOptions {
    /// Instant eligibility is evaluated at. Defaults to the wall clock.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    /// Solve each (card, currency) group separately.
    #[serde(default)]
    pub partition_by_card: bool,
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub min_matching_rate: f64,
    pub min_average_score: f64,
    pub max_execution_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            min_matching_rate: 0.8,
            min_average_score: 70.0,
            max_execution_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub authorizations: Option<SourceConfig>,
    #[serde(default)]
    pub presentments: Option<SourceConfig>,
}

/// One CSV source. `columns` maps canonical field names to CSV headers;
/// unmapped fields use their canonical name as the header.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    #[serde(default)]
    pub columns: ColumnMap,
}

pub type ColumnMap = BTreeMap<String, String>;

pub const AUTHORIZATION_FIELDS: [&str; 10] = [
    "id",
    "card",
    "amount_minor",
    "currency",
    "timestamp",
    "merchant_id",
    "category_code",
    "status",
    "expires_at",
    "auth_code",
];

pub const PRESENTMENT_FIELDS: [&str; 8] = [
    "id",
    "card",
    "amount_minor",
    "currency",
    "timestamp",
    "merchant_id",
    "category_code",
    "kind",
];

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, MatchError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| MatchError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.name.trim().is_empty() {
            return Err(MatchError::ConfigValidation("name cannot be empty".into()));
        }

        let w = &self.scoring;
        for (label, value) in [
            ("amount_weight", w.amount_weight),
            ("time_weight", w.time_weight),
            ("merchant_weight", w.merchant_weight),
            ("category_weight", w.category_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::ConfigValidation(format!(
                    "scoring.{label} must be a non-negative number, got {value}"
                )));
            }
        }
        if (w.sum() - 1.0).abs() > 1e-9 {
            return Err(MatchError::ConfigValidation(format!(
                "scoring weights must sum to 1, got {}",
                w.sum()
            )));
        }

        let r = &self.recommendations;
        if !(0.0..=1.0).contains(&r.min_matching_rate) {
            return Err(MatchError::ConfigValidation(format!(
                "recommendations.min_matching_rate must be within [0, 1], got {}",
                r.min_matching_rate
            )));
        }
        if !(0.0..=100.0).contains(&r.min_average_score) {
            return Err(MatchError::ConfigValidation(format!(
                "recommendations.min_average_score must be within [0, 100], got {}",
                r.min_average_score
            )));
        }

        if let Some(ref source) = self.inputs.authorizations {
            validate_columns("authorizations", source, &AUTHORIZATION_FIELDS)?;
        }
        if let Some(ref source) = self.inputs.presentments {
            validate_columns("presentments", source, &PRESENTMENT_FIELDS)?;
        }

        Ok(())
    }
}

fn validate_columns(label: &str, source: &SourceConfig, known: &[&str]) -> Result<(), MatchError> {
    if source.file.trim().is_empty() {
        return Err(MatchError::ConfigValidation(format!(
            "inputs.{label}.file cannot be empty"
        )));
    }
    for field in source.columns.keys() {
        if !known.contains(&field.as_str()) {
            return Err(MatchError::ConfigValidation(format!(
                "inputs.{label}.columns: unknown field '{field}'"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

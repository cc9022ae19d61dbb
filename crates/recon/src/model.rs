use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::RecommendationConfig;
use crate::error::MatchError;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Opaque card identity (token or PAN reference). Compared for equality only.
///
/// `Display` masks everything but the last four characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{tail}", "*".repeat(chars.len() - 4))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Amount in minor units plus ISO currency code. Never converted across currencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

// ---------------------------------------------------------------------------
// Authorizations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Approved,
    Declined,
    Pending,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Declined => write!(f, "declined"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

impl FromStr for AuthorizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            "pending" => Ok(Self::Pending),
            other => Err(format!("unknown authorization status '{other}'")),
        }
    }
}

/// A hold placed against a card at transaction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: String,
    pub card: CardId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
    pub merchant_id: String,
    pub category_code: String,
    pub status: AuthorizationStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub auth_code: Option<String>,
}

impl Authorization {
    /// Approved and not yet expired at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == AuthorizationStatus::Approved && now < self.expires_at
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.id.trim().is_empty() {
            return Err(MatchError::InvalidInput(
                "authorization id cannot be empty".into(),
            ));
        }
        validate_money("authorization", &self.id, &self.amount)?;
        validate_category("authorization", &self.id, &self.category_code)?;
        if self.expires_at < self.timestamp {
            return Err(MatchError::InvalidInput(format!(
                "authorization '{}': expires_at {} is before timestamp {}",
                self.id, self.expires_at, self.timestamp
            )));
        }
        if self.status == AuthorizationStatus::Approved
            && self.auth_code.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(MatchError::InvalidInput(format!(
                "authorization '{}': approved without an authorization code",
                self.id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Presentments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentmentKind {
    FirstPresentment,
    SecondPresentment,
    Reversal,
}

impl fmt::Display for PresentmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstPresentment => write!(f, "first_presentment"),
            Self::SecondPresentment => write!(f, "second_presentment"),
            Self::Reversal => write!(f, "reversal"),
        }
    }
}

impl FromStr for PresentmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_presentment" | "first" => Ok(Self::FirstPresentment),
            "second_presentment" | "second" => Ok(Self::SecondPresentment),
            "reversal" => Ok(Self::Reversal),
            other => Err(format!("unknown presentment kind '{other}'")),
        }
    }
}

/// A clearing record submitted after the authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentment {
    pub id: String,
    pub card: CardId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
    pub merchant_id: String,
    pub category_code: String,
    pub kind: PresentmentKind,
}

impl Presentment {
    /// Reversals unwind an earlier presentment and never pair with a hold.
    pub fn is_eligible(&self) -> bool {
        matches!(
            self.kind,
            PresentmentKind::FirstPresentment | PresentmentKind::SecondPresentment
        )
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.id.trim().is_empty() {
            return Err(MatchError::InvalidInput(
                "presentment id cannot be empty".into(),
            ));
        }
        validate_money("presentment", &self.id, &self.amount)?;
        validate_category("presentment", &self.id, &self.category_code)
    }
}

fn validate_money(kind: &str, id: &str, money: &Money) -> Result<(), MatchError> {
    if money.amount_minor < 0 {
        return Err(MatchError::InvalidInput(format!(
            "{kind} '{id}': amount {} is negative",
            money.amount_minor
        )));
    }
    if money.currency.trim().is_empty() {
        return Err(MatchError::InvalidInput(format!(
            "{kind} '{id}': currency cannot be empty"
        )));
    }
    Ok(())
}

fn validate_category(kind: &str, id: &str, code: &str) -> Result<(), MatchError> {
    if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MatchError::InvalidInput(format!(
            "{kind} '{id}': category code '{code}' must be exactly 4 digits"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// Unweighted sub-scores (each 0-100) and the weighted total of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub amount: f64,
    pub time: f64,
    pub merchant: f64,
    pub category: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    authorization: Authorization,
    presentment: Presentment,
    score: f64,
    breakdown: ScoreBreakdown,
}

impl Match {
    pub(crate) fn new(
        authorization: Authorization,
        presentment: Presentment,
        breakdown: ScoreBreakdown,
    ) -> Self {
        Self {
            authorization,
            presentment,
            score: breakdown.total,
            breakdown,
        }
    }

    pub fn authorization(&self) -> &Authorization {
        &self.authorization
    }

    pub fn presentment(&self) -> &Presentment {
        &self.presentment
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn breakdown(&self) -> &ScoreBreakdown {
        &self.breakdown
    }

    /// Cost the solver minimized for this pair.
    pub fn cost(&self) -> f64 {
        100.0 - self.score
    }
}

// ---------------------------------------------------------------------------
// Statistics + result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityCounts {
    /// score >= 90
    pub excellent: usize,
    /// 75 <= score < 90
    pub good: usize,
    /// 50 <= score < 75
    pub fair: usize,
    /// score < 50
    pub poor: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchStatistics {
    pub min_score: f64,
    pub max_score: f64,
    pub median_score: f64,
    pub std_dev: f64,
    pub quality: QualityCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub total_authorizations: usize,
    pub total_presentments: usize,
    pub matched: usize,
    pub unmatched_authorizations: usize,
    pub unmatched_presentments: usize,
    pub total_score: f64,
    pub average_score: f64,
    pub matching_rate: f64,
    pub presentment_coverage_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchMeta {
    pub algorithm: String,
    pub engine_version: String,
    pub as_of: DateTime<Utc>,
    #[serde(rename = "execution_time_ms", serialize_with = "serialize_millis")]
    pub execution_time: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Outcome of one solve. Content is fixed at construction; only a derived copy
/// with a different execution time can be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingResult {
    meta: MatchMeta,
    summary: MatchSummary,
    statistics: MatchStatistics,
    recommendations: Vec<String>,
    matches: Vec<Match>,
    unmatched_authorizations: Vec<Authorization>,
    unmatched_presentments: Vec<Presentment>,
    #[serde(skip)]
    thresholds: RecommendationConfig,
}

impl MatchingResult {
    pub(crate) fn from_parts(
        meta: MatchMeta,
        summary: MatchSummary,
        statistics: MatchStatistics,
        matches: Vec<Match>,
        unmatched_authorizations: Vec<Authorization>,
        unmatched_presentments: Vec<Presentment>,
        thresholds: RecommendationConfig,
    ) -> Self {
        let recommendations =
            crate::stats::recommendations(&summary, &statistics, meta.execution_time, &thresholds);
        Self {
            meta,
            summary,
            statistics,
            recommendations,
            matches,
            unmatched_authorizations,
            unmatched_presentments,
            thresholds,
        }
    }

    /// Derived copy carrying a new execution time; recommendations are re-derived.
    pub fn with_execution_time(&self, elapsed: Duration) -> Self {
        let mut meta = self.meta.clone();
        meta.execution_time = elapsed;
        Self::from_parts(
            meta,
            self.summary.clone(),
            self.statistics,
            self.matches.clone(),
            self.unmatched_authorizations.clone(),
            self.unmatched_presentments.clone(),
            self.thresholds,
        )
    }

    pub fn meta(&self) -> &MatchMeta {
        &self.meta
    }

    pub fn summary(&self) -> &MatchSummary {
        &self.summary
    }

    pub fn statistics(&self) -> &MatchStatistics {
        &self.statistics
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn unmatched_authorizations(&self) -> &[Authorization] {
        &self.unmatched_authorizations
    }

    pub fn unmatched_presentments(&self) -> &[Presentment] {
        &self.unmatched_presentments
    }

    pub fn algorithm(&self) -> &str {
        &self.meta.algorithm
    }

    pub fn execution_time(&self) -> Duration {
        self.meta.execution_time
    }

    pub fn total_score(&self) -> f64 {
        self.summary.total_score
    }

    pub fn average_score(&self) -> f64 {
        self.summary.average_score
    }

    pub fn matching_rate(&self) -> f64 {
        self.summary.matching_rate
    }

    pub fn presentment_coverage_rate(&self) -> f64 {
        self.summary.presentment_coverage_rate
    }

    /// Sum of `100 - score` over all matches.
    pub fn total_cost(&self) -> f64 {
        self.matches.iter().map(Match::cost).sum()
    }

    /// One-line operational summary.
    pub fn summary_line(&self) -> String {
        let s = &self.summary;
        format!(
            "{} authorizations, {} presentments: {} matched ({:.1}% of authorizations, {:.1}% of presentments), \
             avg score {:.1}, {} unmatched authorizations, {} unmatched presentments [{}, {} ms]",
            s.total_authorizations,
            s.total_presentments,
            s.matched,
            s.matching_rate * 100.0,
            s.presentment_coverage_rate * 100.0,
            s.average_score,
            s.unmatched_authorizations,
            s.unmatched_presentments,
            self.meta.algorithm,
            self.meta.execution_time.as_millis(),
        )
    }
}

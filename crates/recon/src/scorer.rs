use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::ScoringWeights;
use crate::model::{Authorization, Presentment, ScoreBreakdown};

pub const MAX_SCORE: f64 = 100.0;

/// Why a pair scores zero without being weighed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    CardMismatch,
    CurrencyMismatch,
    AuthorizationIneligible,
    PresentmentIneligible,
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CardMismatch => write!(f, "card identities differ"),
            Self::CurrencyMismatch => write!(f, "currencies differ"),
            Self::AuthorizationIneligible => {
                write!(f, "authorization is not approved or has expired")
            }
            Self::PresentmentIneligible => write!(f, "presentment is a reversal"),
        }
    }
}

/// Pairwise compatibility scorer. Pure: same inputs, same score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Hard filters applied before any weighing.
    pub fn gate(
        &self,
        auth: &Authorization,
        presentment: &Presentment,
        now: DateTime<Utc>,
    ) -> Result<(), GateReason> {
        if auth.card != presentment.card {
            return Err(GateReason::CardMismatch);
        }
        if auth.amount.currency != presentment.amount.currency {
            return Err(GateReason::CurrencyMismatch);
        }
        if !auth.is_eligible(now) {
            return Err(GateReason::AuthorizationIneligible);
        }
        if !presentment.is_eligible() {
            return Err(GateReason::PresentmentIneligible);
        }
        Ok(())
    }

    /// Sub-scores and weighted total, or `None` when the gate rejects the pair.
    pub fn breakdown(
        &self,
        auth: &Authorization,
        presentment: &Presentment,
        now: DateTime<Utc>,
    ) -> Option<ScoreBreakdown> {
        self.gate(auth, presentment, now).ok()?;

        let amount = amount_score(auth.amount.amount_minor, presentment.amount.amount_minor);
        let time = time_score(auth.timestamp, presentment.timestamp);
        let merchant = identity_score(&auth.merchant_id, &presentment.merchant_id);
        let category = identity_score(&auth.category_code, &presentment.category_code);

        let w = &self.weights;
        let total = (amount * w.amount_weight
            + time * w.time_weight
            + merchant * w.merchant_weight
            + category * w.category_weight)
            .min(MAX_SCORE);

        Some(ScoreBreakdown {
            amount,
            time,
            merchant,
            category,
            total,
        })
    }

    /// Score in [0, 100]; 0 when the gate rejects the pair.
    pub fn score(&self, auth: &Authorization, presentment: &Presentment, now: DateTime<Utc>) -> f64 {
        self.breakdown(auth, presentment, now)
            .map_or(0.0, |b| b.total)
    }

    /// Solver cost `100 - score`, or `None` when the pair can never match.
    pub fn cost(
        &self,
        auth: &Authorization,
        presentment: &Presentment,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let score = self.score(auth, presentment, now);
        (score > 0.0).then(|| MAX_SCORE - score)
    }
}

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

/// Relative amount difference against the authorized amount, bucketed.
pub fn amount_score(auth_minor: i64, presentment_minor: i64) -> f64 {
    if auth_minor == presentment_minor {
        return 100.0;
    }
    if auth_minor == 0 {
        // presentment_minor != 0 here
        return 0.0;
    }
    let diff = (auth_minor - presentment_minor).unsigned_abs() as f64;
    let pct = diff / auth_minor.unsigned_abs() as f64 * 100.0;
    match pct {
        p if p <= 1.0 => 95.0,
        p if p <= 5.0 => 80.0,
        p if p <= 10.0 => 60.0,
        p if p <= 20.0 => 30.0,
        _ => 0.0,
    }
}

/// Absolute hour distance between the two events, bucketed.
pub fn time_score(auth_at: DateTime<Utc>, presentment_at: DateTime<Utc>) -> f64 {
    let hours = (presentment_at - auth_at).num_seconds().unsigned_abs() as f64 / 3600.0;
    match hours {
        h if h <= 1.0 => 100.0,
        h if h <= 24.0 => 80.0,
        h if h <= 72.0 => 60.0,
        h if h <= 168.0 => 30.0,
        _ => 10.0,
    }
}

fn identity_score(a: &str, b: &str) -> f64 {
    if a == b {
        100.0
    } else {
        0.0
    }
}

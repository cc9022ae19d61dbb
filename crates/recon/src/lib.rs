//! `clearmatch-recon`: optimal matching of card authorizations to presentments.
//!
//! Pure engine crate: receives pre-loaded records, returns an immutable
//! matching result. Scoring feeds a square cost matrix that a Kuhn-Munkres
//! solver reduces to a maximum-cardinality, minimum-cost assignment.
//! No CLI or filesystem dependencies; CSV loading works on in-memory text.

mod builder;
pub mod config;
pub mod cost_matrix;
pub mod engine;
pub mod error;
pub mod hungarian;
pub mod loader;
pub mod model;
pub mod scorer;
pub mod stats;

pub use config::MatchConfig;
pub use engine::{run, solve, solve_partitioned};
pub use error::{MatchError, SolverFault};
pub use model::{
    Authorization, AuthorizationStatus, CardId, Match, MatchingResult, Money, Presentment,
    PresentmentKind, ScoreBreakdown,
};
pub use scorer::Scorer;

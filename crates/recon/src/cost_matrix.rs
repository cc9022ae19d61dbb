use chrono::{DateTime, Utc};

use crate::error::MatchError;
use crate::model::{Authorization, Presentment};
use crate::scorer::Scorer;

/// Square cost matrix over authorizations (rows) and presentments (columns).
///
/// `size = max(rows, cols)`. Cells outside `rows x cols` are padding and are
/// always unreachable (`None`), as is any pair the scorer rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    size: usize,
    rows: usize,
    cols: usize,
    cells: Vec<Option<f64>>,
}

impl CostMatrix {
    /// Scores every authorization against every presentment.
    pub fn build(
        authorizations: &[Authorization],
        presentments: &[Presentment],
        scorer: &Scorer,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_fn(authorizations.len(), presentments.len(), |i, j| {
            scorer.cost(&authorizations[i], &presentments[j], now)
        })
    }

    /// Matrix whose real region is filled by `cost(row, col)`.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        mut cost: impl FnMut(usize, usize) -> Option<f64>,
    ) -> Self {
        let size = rows.max(cols);
        let mut cells = vec![None; size * size];
        for i in 0..rows {
            for j in 0..cols {
                cells[i * size + j] = cost(i, j);
            }
        }
        Self {
            size,
            rows,
            cols,
            cells,
        }
    }

    /// Matrix from a row-major `rows x cols` slice of costs.
    pub fn from_costs(rows: usize, cols: usize, costs: &[Option<f64>]) -> Result<Self, MatchError> {
        if costs.len() != rows * cols {
            return Err(MatchError::InvalidInput(format!(
                "expected {} costs for a {rows}x{cols} matrix, got {}",
                rows * cols,
                costs.len()
            )));
        }
        Ok(Self::from_fn(rows, cols, |i, j| costs[i * cols + j]))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of real rows (authorizations).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of real columns (presentments).
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells[row * self.size + col]
    }

    /// Row-major view of all `size * size` cells.
    pub fn cells(&self) -> &[Option<f64>] {
        &self.cells
    }

    pub fn reachable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

//! Kuhn-Munkres assignment over a [`CostMatrix`].
//!
//! Unreachable cells are priced at a penalty larger than any achievable
//! difference in real cost, so the square problem always has a perfect
//! assignment and the real pairs it contains form a maximum-cardinality,
//! minimum-cost matching. Extraction drops every penalty cell.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::cost_matrix::CostMatrix;
use crate::error::{SolverFault, SolverStage};

/// Tolerance for treating a reduced cost as zero.
pub const EPSILON: f64 = 1e-10;

/// Row-to-column pairs over the real region of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    row_to_col: Vec<Option<usize>>,
    iterations: usize,
}

impl Assignment {
    /// Column assigned to `row`, if the row was matched to a real cell.
    pub fn col_for(&self, row: usize) -> Option<usize> {
        self.row_to_col.get(row).copied().flatten()
    }

    /// `(row, col)` pairs in row order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_to_col
            .iter()
            .enumerate()
            .filter_map(|(row, col)| col.map(|c| (row, c)))
    }

    pub fn len(&self) -> usize {
        self.row_to_col.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cover/adjust rounds the solver ran.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Solves the assignment problem for `matrix`.
pub fn solve(matrix: &CostMatrix) -> Result<Assignment, SolverFault> {
    let n = matrix.size();
    if n == 0 {
        return Ok(Assignment {
            row_to_col: Vec::new(),
            iterations: 0,
        });
    }

    let mut work = Workspace::prepare(matrix)?;
    work.reduce_rows();
    work.reduce_cols();

    let limit = n * (n + 1) + 1;
    for iteration in 0..limit {
        work.maximize();
        let matched = work.matched();
        trace!(iteration, matched, size = n, "cover round");

        if matched == n {
            debug!(iterations = iteration, size = n, "zero-cost assignment found");
            return work.extract(matrix, iteration);
        }

        let cover = work.cover(iteration)?;
        work.adjust(&cover, iteration)?;
    }

    Err(work.fault(
        SolverStage::Cover,
        format!("no perfect assignment after {limit} rounds"),
        limit,
    ))
}

/// Alternating-path reachability from free rows. Covered lines are the
/// unreached rows and the reached columns.
struct Cover {
    row_reached: Vec<bool>,
    col_reached: Vec<bool>,
}

struct Workspace {
    n: usize,
    cost: Vec<f64>,
    row_match: Vec<Option<usize>>,
    col_match: Vec<Option<usize>>,
}

impl Workspace {
    fn prepare(matrix: &CostMatrix) -> Result<Self, SolverFault> {
        let n = matrix.size();
        let mut max_real = 0.0_f64;
        for (idx, cell) in matrix.cells().iter().enumerate() {
            if let Some(c) = *cell {
                if !c.is_finite() || c < 0.0 {
                    return Err(SolverFault {
                        stage: SolverStage::Prepare,
                        detail: format!(
                            "invalid cost {c} at ({}, {})",
                            idx / n,
                            idx % n
                        ),
                        iteration: 0,
                        matched: 0,
                        size: n,
                    });
                }
                max_real = max_real.max(c);
            }
        }

        let penalty = (max_real + 1.0) * (n as f64 + 1.0);
        debug!(size = n, reachable = matrix.reachable_count(), penalty, "solver prepared");

        Ok(Self {
            n,
            cost: matrix.cells().iter().map(|c| c.unwrap_or(penalty)).collect(),
            row_match: vec![None; n],
            col_match: vec![None; n],
        })
    }

    fn is_zero(&self, row: usize, col: usize) -> bool {
        self.cost[row * self.n + col] <= EPSILON
    }

    fn matched(&self) -> usize {
        self.row_match.iter().filter(|m| m.is_some()).count()
    }

    fn fault(&self, stage: SolverStage, detail: String, iteration: usize) -> SolverFault {
        SolverFault {
            stage,
            detail,
            iteration,
            matched: self.matched(),
            size: self.n,
        }
    }

    // -----------------------------------------------------------------------
    // Reduction
    // -----------------------------------------------------------------------

    fn reduce_rows(&mut self) {
        let n = self.n;
        for row in self.cost.chunks_mut(n) {
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            for c in row.iter_mut() {
                *c -= min;
            }
        }
    }

    fn reduce_cols(&mut self) {
        let n = self.n;
        for col in 0..n {
            let min = (0..n)
                .map(|row| self.cost[row * n + col])
                .fold(f64::INFINITY, f64::min);
            for row in 0..n {
                self.cost[row * n + col] -= min;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Maximum matching on the zero graph
    // -----------------------------------------------------------------------

    /// Grows the current matching until no augmenting path remains.
    ///
    /// Columns visited by a failed search stay visited until the next success:
    /// a failed search leaves the matching unchanged, so those columns still
    /// lead nowhere.
    fn maximize(&mut self) {
        let mut visited = vec![false; self.n];
        for root in 0..self.n {
            if self.row_match[root].is_some() {
                continue;
            }
            if self.augment_from(root, &mut visited) {
                visited.iter_mut().for_each(|v| *v = false);
            }
        }
    }

    /// Depth-first augmenting-path search on an explicit stack.
    ///
    /// `frames[k]` is `(row, next column to try)`; `path[k]` is the column
    /// claimed by `frames[k].0`.
    fn augment_from(&mut self, root: usize, visited: &mut [bool]) -> bool {
        let n = self.n;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        let mut path: Vec<usize> = Vec::with_capacity(n);

        while let Some(top) = frames.last_mut() {
            let row = top.0;
            let mut claimed = None;
            while top.1 < n {
                let col = top.1;
                top.1 += 1;
                if !visited[col] && self.cost[row * n + col] <= EPSILON {
                    visited[col] = true;
                    claimed = Some(col);
                    break;
                }
            }

            match claimed {
                Some(col) => {
                    path.push(col);
                    match self.col_match[col] {
                        Some(next_row) => frames.push((next_row, 0)),
                        None => {
                            for (&(r, _), &c) in frames.iter().zip(path.iter()) {
                                self.row_match[r] = Some(c);
                                self.col_match[c] = Some(r);
                            }
                            return true;
                        }
                    }
                }
                None => {
                    frames.pop();
                    path.pop();
                }
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Cover + adjust
    // -----------------------------------------------------------------------

    fn cover(&self, iteration: usize) -> Result<Cover, SolverFault> {
        let n = self.n;
        let mut row_reached = vec![false; n];
        let mut col_reached = vec![false; n];
        let mut queue = VecDeque::new();

        for row in 0..n {
            if self.row_match[row].is_none() {
                row_reached[row] = true;
                queue.push_back(row);
            }
        }

        while let Some(row) = queue.pop_front() {
            for col in 0..n {
                if col_reached[col] || !self.is_zero(row, col) {
                    continue;
                }
                col_reached[col] = true;
                match self.col_match[col] {
                    Some(next) => {
                        if !row_reached[next] {
                            row_reached[next] = true;
                            queue.push_back(next);
                        }
                    }
                    None => {
                        return Err(self.fault(
                            SolverStage::Cover,
                            format!("augmenting path to column {col} survived maximization"),
                            iteration,
                        ));
                    }
                }
            }
        }

        Ok(Cover {
            row_reached,
            col_reached,
        })
    }

    /// Subtracts the smallest uncovered cost from uncovered cells and adds it
    /// to doubly-covered ones. Matched cells are singly covered and stay zero.
    fn adjust(&mut self, cover: &Cover, iteration: usize) -> Result<(), SolverFault> {
        let n = self.n;
        let mut delta = f64::INFINITY;
        for row in (0..n).filter(|&r| cover.row_reached[r]) {
            for col in (0..n).filter(|&c| !cover.col_reached[c]) {
                delta = delta.min(self.cost[row * n + col]);
            }
        }

        if delta.is_infinite() {
            return Err(self.fault(
                SolverStage::Adjust,
                "no uncovered cell while the cover is short".into(),
                iteration,
            ));
        }
        if !delta.is_finite() || delta <= EPSILON {
            return Err(self.fault(
                SolverStage::Adjust,
                format!("non-positive adjustment {delta}"),
                iteration,
            ));
        }

        for row in 0..n {
            for col in 0..n {
                let uncovered = cover.row_reached[row] && !cover.col_reached[col];
                let doubly = !cover.row_reached[row] && cover.col_reached[col];
                if uncovered {
                    self.cost[row * n + col] -= delta;
                } else if doubly {
                    self.cost[row * n + col] += delta;
                }
            }
        }
        trace!(iteration, delta, "matrix adjusted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    fn extract(&self, matrix: &CostMatrix, iteration: usize) -> Result<Assignment, SolverFault> {
        let mut row_to_col = vec![None; matrix.rows()];
        for (row, slot) in row_to_col.iter_mut().enumerate() {
            let col = self.row_match[row].ok_or_else(|| {
                self.fault(
                    SolverStage::Extract,
                    format!("row {row} unassigned in a perfect assignment"),
                    iteration,
                )
            })?;
            if col < matrix.cols() && matrix.get(row, col).is_some() && self.is_zero(row, col) {
                *slot = Some(col);
            }
        }
        Ok(Assignment {
            row_to_col,
            iterations: iteration,
        })
    }
}

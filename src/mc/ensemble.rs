// src/mc/ensemble.rs
//! Simulated path ensembles
//!
//! A `PathEnsemble` is a `(num_paths, steps + 1)` matrix of simulated values.
//! Column 0 holds the spot (the last observed value) for every row; each row is
//! one trajectory. Most models simulate prices and guarantee positivity; the
//! Kalman walk simulates a level and may cross zero.

use crate::error::{SimError, SimResult};
use ndarray::{Array2, ArrayView1, Axis};

#[derive(Debug, Clone)]
pub struct PathEnsemble {
    paths: Array2<f64>,
}

impl PathEnsemble {
    pub fn from_array(paths: Array2<f64>) -> Self {
        PathEnsemble { paths }
    }

    pub fn num_paths(&self) -> usize {
        self.paths.nrows()
    }

    /// Number of simulated increments; the matrix has `steps() + 1` columns.
    pub fn steps(&self) -> usize {
        self.paths.ncols().saturating_sub(1)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.paths.nrows(), self.paths.ncols())
    }

    /// Spot the ensemble started from: median of column 0. All rows share the
    /// same value for engine-produced ensembles; the median keeps the accessor
    /// meaningful for externally assembled matrices too.
    pub fn spot(&self) -> f64 {
        let col0: Vec<f64> = self.paths.column(0).to_vec();
        crate::math_utils::percentile(&col0, 50.0)
    }

    pub fn terminal_values(&self) -> Vec<f64> {
        self.paths.column(self.paths.ncols() - 1).to_vec()
    }

    pub fn step_values(&self, step: usize) -> ArrayView1<'_, f64> {
        self.paths.column(step)
    }

    pub fn path(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.paths.row(idx)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.paths
    }

    /// Check the structural invariants: non-degenerate shape, finite entries,
    /// uniform column 0.
    pub fn validate(&self) -> SimResult<()> {
        if self.paths.nrows() == 0 || self.paths.ncols() < 2 {
            return Err(SimError::InvalidConfiguration {
                field: "ensemble".to_string(),
                reason: format!("degenerate shape {:?}", self.shape()),
            });
        }
        if let Some(bad) = self.paths.iter().find(|v| !v.is_finite()) {
            return Err(SimError::NumericalInstability {
                method: "PathEnsemble::validate".to_string(),
                reason: format!("non-finite path value: {}", bad),
            });
        }
        let first = self.paths[(0, 0)];
        for row in self.paths.axis_iter(Axis(0)) {
            if (row[0] - first).abs() > 1e-9 * first.abs().max(1.0) {
                return Err(SimError::InvalidConfiguration {
                    field: "ensemble".to_string(),
                    reason: "column 0 is not uniform across paths".to_string(),
                });
            }
        }
        Ok(())
    }
}

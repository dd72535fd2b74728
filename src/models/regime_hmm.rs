// src/models/regime_hmm.rs
//! Gaussian hidden-Markov regime switching
//!
//! # Mathematical Framework
//!
//! Log-returns are modeled as draws from one of K Gaussian states with a
//! row-stochastic transition matrix. Calibration is plain
//! expectation-maximization on the return series:
//!
//! - E-step: per time step, evaluate each state's density at the observed
//!   return and normalize across states into responsibilities. A vanishing
//!   total density floors the responsibilities at 1/K.
//! - M-step: responsibility-weighted means and standard deviations (with a
//!   1e-6 additive floor), and a transition matrix from pairwise expected
//!   co-occurrence of adjacent responsibilities, row-normalized with a uniform
//!   1/K fallback for underflowing rows.
//!
//! The loop runs a fixed iteration budget with no likelihood-based early
//! stop. `RegimeMode::VarianceOnly` collapses the state means to one shared
//! value each iteration, leaving the regimes distinguished by variance alone.
//!
//! Simulation draws an initial state uniformly, then walks the chain:
//! return from the current state's Gaussian, multiplicative price update,
//! state transition by cumulative-probability inversion.

use crate::error::{SimError, SimResult};
use crate::math_utils;
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use crate::series::PriceSeries;
use ndarray::Array2;
use rand::Rng;
use statrs::distribution::{Continuous, Normal};
use std::f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeMode {
    /// Independent state means and variances
    Full,
    /// Shared mean, variance-only switching
    VarianceOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct HmmOptions {
    pub n_states: usize,
    pub iterations: usize,
    pub mode: RegimeMode,
}

impl Default for HmmOptions {
    fn default() -> Self {
        HmmOptions {
            n_states: 3,
            iterations: 80,
            mode: RegimeMode::VarianceOnly,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HmmParams {
    pub mu: Vec<f64>,
    pub sigma: Vec<f64>,
    /// Row-stochastic K×K transition matrix
    pub transition: Array2<f64>,
}

impl HmmParams {
    pub fn n_states(&self) -> usize {
        self.mu.len()
    }

    /// Minimum number of returns for a stable fit with K states.
    pub fn min_returns(n_states: usize) -> usize {
        30usize.max(5 * n_states)
    }

    /// EM calibration on log-returns with a fixed iteration budget.
    pub fn estimate(series: &PriceSeries, opts: &HmmOptions) -> SimResult<Self> {
        let k = opts.n_states;
        if k < 2 {
            return Err(SimError::InvalidParameter {
                parameter: "n_states".to_string(),
                value: k as f64,
                constraint: "regime switching needs at least 2 states".to_string(),
            });
        }
        let min_len = Self::min_returns(k) + 1;
        series.require_len("hmm", min_len)?;

        let returns = series.log_returns();
        let n = returns.len();

        // Initialization: means at evenly spaced return percentiles, sigmas
        // fanned around the sample std, sticky 0.9-diagonal transitions.
        let std_ret = math_utils::population_std(&returns) + 1e-8;
        let mut mu: Vec<f64> = (0..k)
            .map(|i| {
                let q = 10.0 + 80.0 * i as f64 / (k as f64 - 1.0);
                math_utils::percentile(&returns, q)
            })
            .collect();
        let mut sigma: Vec<f64> = (0..k)
            .map(|i| {
                let factor = 0.5 + i as f64 / (k as f64 - 1.0);
                std_ret * factor + 1e-6
            })
            .collect();
        let off_diag = (1.0 - 0.9) / (k as f64 - 1.0);
        let mut trans = Array2::<f64>::from_elem((k, k), off_diag);
        for i in 0..k {
            trans[(i, i)] = 0.9;
        }

        // Responsibility buffer reused across iterations
        let mut gamma = Array2::<f64>::zeros((n, k));
        let mut weights = vec![0.0f64; k];

        for _ in 0..opts.iterations {
            if opts.mode == RegimeMode::VarianceOnly {
                let shared = math_utils::mean(&mu);
                mu.iter_mut().for_each(|m| *m = shared);
            }

            // E-step
            let densities: Vec<Normal> = (0..k)
                .map(|s| {
                    Normal::new(mu[s], sigma[s]).map_err(|_| SimError::NumericalInstability {
                        method: "HMM E-step".to_string(),
                        reason: format!("invalid state density (mu={}, sigma={})", mu[s], sigma[s]),
                    })
                })
                .collect::<SimResult<_>>()?;

            for t in 0..n {
                let mut denom = 0.0;
                for s in 0..k {
                    let g = densities[s].pdf(returns[t]);
                    gamma[(t, s)] = g;
                    denom += g;
                }
                if denom <= 0.0 {
                    let inv_k = 1.0 / k as f64;
                    for s in 0..k {
                        gamma[(t, s)] = inv_k;
                    }
                } else {
                    for s in 0..k {
                        gamma[(t, s)] /= denom;
                    }
                }
            }

            // M-step: state weights and means
            for s in 0..k {
                weights[s] = (0..n).map(|t| gamma[(t, s)]).sum();
            }
            for s in 0..k {
                if weights[s] <= 1e-12 {
                    continue;
                }
                let num: f64 = (0..n).map(|t| gamma[(t, s)] * returns[t]).sum();
                mu[s] = num / weights[s];
            }

            if opts.mode == RegimeMode::VarianceOnly {
                let den: f64 = weights.iter().sum();
                if den > 0.0 {
                    let num: f64 = (0..k).map(|s| mu[s] * weights[s]).sum();
                    let shared = num / den;
                    mu.iter_mut().for_each(|m| *m = shared);
                }
            }

            // M-step: state sigmas
            for s in 0..k {
                if weights[s] <= 1e-12 {
                    continue;
                }
                let num: f64 = (0..n)
                    .map(|t| {
                        let diff = returns[t] - mu[s];
                        gamma[(t, s)] * diff * diff
                    })
                    .sum();
                sigma[s] = (num / weights[s]).sqrt() + 1e-6;
            }

            // M-step: transitions from adjacent-step co-occurrence
            for i in 0..k {
                for j in 0..k {
                    let mut num = 0.0;
                    let mut den = 0.0;
                    for t in 0..n - 1 {
                        num += gamma[(t, i)] * gamma[(t + 1, j)];
                        den += gamma[(t, i)];
                    }
                    trans[(i, j)] = if den <= 1e-12 { 1.0 / k as f64 } else { num / den };
                }
            }
            for i in 0..k {
                let row_sum: f64 = (0..k).map(|j| trans[(i, j)]).sum();
                if row_sum <= 0.0 {
                    let inv_k = 1.0 / k as f64;
                    for j in 0..k {
                        trans[(i, j)] = inv_k;
                    }
                } else {
                    for j in 0..k {
                        trans[(i, j)] /= row_sum;
                    }
                }
            }
        }

        for s in 0..k {
            if !mu[s].is_finite() || !sigma[s].is_finite() || sigma[s] <= 0.0 {
                return Err(SimError::NumericalInstability {
                    method: "HMM estimation".to_string(),
                    reason: format!("state {} degenerated (mu={}, sigma={})", s, mu[s], sigma[s]),
                });
            }
        }

        Ok(HmmParams {
            mu,
            sigma,
            transition: trans,
        })
    }

    /// Simulate an ensemble starting from `spot`.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        crate::error::validation::validate_positive("spot", spot)?;
        let k = self.n_states();
        let p = self.clone();

        run_paths(cfg, spot, move |rng, row| {
            let mut state = rng.gen_range(0..k);
            for t in 1..row.len() {
                let ret = p.mu[state] + p.sigma[state] * rng::get_normal_draw(rng);
                row[t] = row[t - 1] * ret.exp();

                let u: f64 = rng.gen();
                let mut cumsum = 0.0;
                let mut next = 0;
                for j in 0..k {
                    cumsum += p.transition[(state, j)];
                    if u <= cumsum {
                        next = j;
                        break;
                    }
                }
                state = next;
            }
        })
    }
}

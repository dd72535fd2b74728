// src/models/garch.rs
//! GARCH(1,1) conditional-variance model
//!
//! # Mathematical Framework
//!
//! Bollerslev (1986):
//! ```text
//! σ²_t = ω + α·ε²_{t-1} + β·σ²_{t-1}
//! ```
//! Covariance stationarity requires ω > 0, α ≥ 0, β ≥ 0, α + β < 1; the
//! unconditional variance is ω/(1-α-β).
//!
//! Calibration is a fixed-budget grid maximum likelihood with variance
//! targeting: for each (α, β) candidate the intercept is pinned to
//! ω = Var(ε)·(1-α-β) and the Gaussian likelihood
//! ```text
//! L = -Σ [ln(σ²_t) + ε²_t/σ²_t]
//! ```
//! is evaluated through the recursion. No convergence-based stopping; the grid
//! is the entire budget.
//!
//! Simulation runs the same recursion forward: shocks are σ_t·√dt·Z, the
//! log-price is their running sum against the last observed close.

use crate::error::{validation::*, SimError, SimResult};
use crate::math_utils;
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use crate::series::PriceSeries;
use std::f64;

pub const MIN_SERIES_LEN: usize = 31; // 30 returns

const ALPHA_GRID: [f64; 6] = [0.02, 0.05, 0.08, 0.10, 0.15, 0.20];
const BETA_GRID: [f64; 8] = [0.50, 0.60, 0.70, 0.80, 0.85, 0.90, 0.94, 0.97];

#[derive(Debug, Clone, Copy)]
pub struct Garch11Params {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Conditional variance after filtering the full history
    pub last_variance: f64,
}

impl Garch11Params {
    pub fn new(omega: f64, alpha: f64, beta: f64, last_variance: f64) -> SimResult<Self> {
        validate_positive("omega", omega)?;
        validate_non_negative("alpha", alpha)?;
        validate_non_negative("beta", beta)?;
        validate_positive("last_variance", last_variance)?;
        if alpha + beta >= 1.0 {
            return Err(SimError::InvalidParameter {
                parameter: "alpha+beta".to_string(),
                value: alpha + beta,
                constraint: "must be < 1 for covariance stationarity".to_string(),
            });
        }
        Ok(Garch11Params {
            omega,
            alpha,
            beta,
            last_variance,
        })
    }

    pub fn long_run_variance(&self) -> f64 {
        self.omega / (1.0 - self.alpha - self.beta)
    }

    /// Grid maximum likelihood on demeaned log-returns.
    pub fn estimate(series: &PriceSeries) -> SimResult<Self> {
        series.require_len("garch", MIN_SERIES_LEN)?;

        let returns = series.log_returns();
        let mean_r = math_utils::mean(&returns);
        let eps: Vec<f64> = returns.iter().map(|r| r - mean_r).collect();
        let var_r = math_utils::sample_variance(&eps);

        if var_r <= 0.0 || !var_r.is_finite() {
            return Err(SimError::NumericalInstability {
                method: "GARCH estimation".to_string(),
                reason: format!("degenerate return variance: {}", var_r),
            });
        }

        let mut best: Option<(f64, f64, f64, f64)> = None; // (nll, omega, alpha, beta)
        for &alpha in ALPHA_GRID.iter() {
            for &beta in BETA_GRID.iter() {
                if alpha + beta >= 0.999 {
                    continue;
                }
                let omega = var_r * (1.0 - alpha - beta);
                let nll = Self::neg_log_likelihood(omega, alpha, beta, var_r, &eps);
                if !nll.is_finite() {
                    continue;
                }
                match best {
                    Some((b, _, _, _)) if b <= nll => {}
                    _ => best = Some((nll, omega, alpha, beta)),
                }
            }
        }

        let (_, omega, alpha, beta) = best.ok_or_else(|| SimError::NumericalInstability {
            method: "GARCH estimation".to_string(),
            reason: "no grid candidate produced a finite likelihood".to_string(),
        })?;

        let last_variance = Self::filter_last_variance(omega, alpha, beta, var_r, &eps);
        Garch11Params::new(omega, alpha, beta, last_variance)
    }

    /// -L = Σ [ln(σ²_t) + ε²_t/σ²_t] through the variance recursion.
    fn neg_log_likelihood(omega: f64, alpha: f64, beta: f64, var0: f64, eps: &[f64]) -> f64 {
        let mut sigma2 = var0;
        let mut nll = 0.0;
        for &e in eps {
            sigma2 = sigma2.max(1e-12);
            nll += sigma2.ln() + e * e / sigma2;
            sigma2 = omega + alpha * e * e + beta * sigma2;
        }
        nll
    }

    /// Run the recursion over the sample and return the final variance.
    fn filter_last_variance(omega: f64, alpha: f64, beta: f64, var0: f64, eps: &[f64]) -> f64 {
        let mut sigma2 = var0;
        for &e in eps {
            sigma2 = omega + alpha * e * e + beta * sigma2;
        }
        sigma2.max(1e-12)
    }

    /// Simulate an ensemble starting from `spot`. Each path carries its own
    /// conditional variance seeded with the fitted `last_variance`.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;

        let dt = cfg.dt();
        let sqrt_dt = dt.sqrt();
        let p = *self;

        run_paths(cfg, spot, move |rng, row| {
            let mut sigma2 = p.last_variance;
            let mut log_price = spot.ln();
            for t in 1..row.len() {
                let z = rng::get_normal_draw(rng);
                let shock = sigma2.sqrt() * sqrt_dt * z;
                log_price += shock;
                row[t] = log_price.exp();
                sigma2 = p.omega + p.alpha * shock * shock + p.beta * sigma2;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{get_normal_draw, seed_rng_from_u64};

    fn noisy_series(seed: u64, n: usize) -> PriceSeries {
        let mut rng = seed_rng_from_u64(seed);
        let mut prices = vec![100.0];
        for _ in 1..n {
            let r = 0.02 * get_normal_draw(&mut rng);
            let prev = *prices.last().unwrap();
            prices.push(prev * r.exp());
        }
        PriceSeries::new(prices).unwrap()
    }

    #[test]
    fn test_estimate_is_stationary() {
        let series = noisy_series(4, 200);
        let params = Garch11Params::estimate(&series).unwrap();
        assert!(params.alpha + params.beta < 1.0);
        assert!(params.omega > 0.0);
        assert!(params.last_variance > 0.0);
        assert!(params.long_run_variance() > 0.0);
    }

    #[test]
    fn test_estimate_rejects_short_series() {
        let series = noisy_series(4, 10);
        assert!(matches!(
            Garch11Params::estimate(&series),
            Err(SimError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_shock_raises_variance_then_decays() {
        let p = Garch11Params::new(1e-6, 0.10, 0.85, 4e-4).unwrap();
        let spike = 0.05;
        let after_shock = p.omega + p.alpha * spike * spike + p.beta * p.last_variance;
        let after_calm = p.omega + p.beta * after_shock;
        assert!(after_shock > p.last_variance);
        assert!(after_calm < after_shock + p.alpha * spike * spike);
    }

    #[test]
    fn test_simulate_shape() {
        let p = Garch11Params::new(1e-6, 0.10, 0.85, 4e-4).unwrap();
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 40,
            seed: 8,
        };
        let ens = p.simulate(100.0, &cfg).unwrap();
        assert_eq!(ens.shape(), (40, 31));
        assert!(ens.as_array().iter().all(|&s| s > 0.0));
    }
}

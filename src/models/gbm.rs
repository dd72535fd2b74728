// src/models/gbm.rs
//! Geometric Brownian Motion
//!
//! # Mathematical Framework
//!
//! ```text
//! dS_t = μ S_t dt + σ S_t dW_t
//! ```
//!
//! Simulated with the exact log-space solution, so paths are strictly positive
//! by construction:
//! ```text
//! S_{t+dt} = S_t * exp((μ - σ²/2) dt + σ √dt Z),  Z ~ N(0,1)
//! ```
//!
//! Calibration is the sample moment estimator on log-returns: μ̂ is the mean
//! per step, σ̂ the sample standard deviation per step.

use crate::error::{validation::*, SimError, SimResult};
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use crate::series::PriceSeries;
use std::f64;

pub const MIN_SERIES_LEN: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct GbmParams {
    /// Drift of log-returns, per step of the historical sampling clock
    pub mu: f64,
    /// Volatility of log-returns, per step
    pub sigma: f64,
}

impl GbmParams {
    pub fn new(mu: f64, sigma: f64) -> SimResult<Self> {
        validate_finite("mu", mu)?;
        validate_positive("sigma", sigma)?;
        Ok(GbmParams { mu, sigma })
    }

    /// Moment estimator over the historical log-returns.
    pub fn estimate(series: &PriceSeries) -> SimResult<Self> {
        series.require_len("gbm", MIN_SERIES_LEN)?;

        let mu = series.mean_log_return();
        let sigma = series.std_log_return();

        validate_fitted("GBM estimation", "mu", mu)?;
        validate_fitted("GBM estimation", "sigma", sigma)?;
        if sigma <= 0.0 {
            return Err(SimError::NumericalInstability {
                method: "GBM estimation".to_string(),
                reason: format!("degenerate return volatility: {}", sigma),
            });
        }

        Ok(GbmParams { mu, sigma })
    }

    /// Simulate an ensemble starting from `spot`.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;
        validate_positive("sigma", self.sigma)?;
        validate_finite("mu", self.mu)?;

        let dt = cfg.dt();
        let sqrt_dt = dt.sqrt();
        let drift = (self.mu - 0.5 * self.sigma * self.sigma) * dt;
        let sigma = self.sigma;

        run_paths(cfg, spot, move |rng, row| {
            for t in 1..row.len() {
                let z = rng::get_normal_draw(rng);
                row[t] = row[t - 1] * (drift + sigma * sqrt_dt * z).exp();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_recovers_moments() {
        // Constant price: zero return volatility, estimation must refuse
        let series = PriceSeries::new(vec![100.0; 20]).unwrap();
        assert!(GbmParams::estimate(&series).is_err());

        let series = PriceSeries::new(vec![100.0, 102.0, 99.0, 103.0, 101.0]).unwrap();
        let params = GbmParams::estimate(&series).unwrap();
        assert!((params.mu - series.mean_log_return()).abs() < 1e-12);
        assert!((params.sigma - series.std_log_return()).abs() < 1e-12);
    }

    #[test]
    fn test_simulate_shape_and_positivity() {
        let params = GbmParams::new(0.0, 0.02).unwrap();
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 50,
            seed: 42,
        };
        let ens = params.simulate(100.0, &cfg).unwrap();
        assert_eq!(ens.shape(), (50, 31));
        assert!(ens.as_array().iter().all(|&v| v > 0.0));
        assert!(ens.validate().is_ok());
    }

    #[test]
    fn test_log_terminal_mean_matches_drift() {
        // E[ln(S_T/S_0)] = (mu - sigma^2/2) * horizon
        let mu = 0.001;
        let sigma = 0.02;
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 20_000,
            seed: 7,
        };
        let params = GbmParams::new(mu, sigma).unwrap();
        let ens = params.simulate(100.0, &cfg).unwrap();

        let mean_log: f64 = ens
            .terminal_values()
            .iter()
            .map(|s| (s / 100.0).ln())
            .sum::<f64>()
            / cfg.num_paths as f64;
        let expected = (mu - 0.5 * sigma * sigma) * cfg.horizon_days;
        let mc_tol = 4.0 * sigma * cfg.horizon_days.sqrt() / (cfg.num_paths as f64).sqrt();

        assert!(
            (mean_log - expected).abs() < mc_tol,
            "mean log-return {} vs expected {} (tol {})",
            mean_log,
            expected,
            mc_tol
        );
    }
}

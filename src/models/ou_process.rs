// src/models/ou_process.rs
//! Ornstein-Uhlenbeck mean reversion
//!
//! # Mathematical Framework
//!
//! ```text
//! dX_t = θ(μ - X_t) dt + σ dW_t
//! ```
//!
//! Calibrated through the AR(1) discretization fit by ordinary least squares:
//! ```text
//! x[t+1] = φ·x[t] + c + ε,   φ = e^{-θ·dt},  μ = c/(1-φ)
//! σ = sqrt(2θ·Var(ε) / (1-φ²))
//! ```
//!
//! The fit runs on log-prices. `φ ≤ 0` indicates an oscillating or misfit
//! series; the mapping `θ = -ln(|φ|)/dt` is applied anyway and the clamps
//! below keep the simulation sane. This is a known approximation boundary,
//! kept as-is.

use crate::error::{validation::*, SimError, SimResult};
use crate::math_utils;
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::models::model::DiffusionModel;
use crate::series::PriceSeries;
use crate::solvers::euler_maruyama::EulerMaruyama;
use nalgebra::{DMatrix, DVector};
use std::f64;

pub const MIN_SERIES_LEN: usize = 10;

pub const THETA_MIN: f64 = 0.01;
pub const THETA_MAX: f64 = 1.0;
pub const SIGMA_MIN: f64 = 1e-6;

/// Which space the integrator works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuSpace {
    /// Integrate ln(S); exponentiate per step. Paths stay positive.
    LogPrice,
    /// Integrate the level directly, floored at 0.
    Level,
}

/// Raw AR(1) regression output before any clamping.
#[derive(Debug, Clone, Copy)]
pub struct OuRawFit {
    pub phi: f64,
    pub intercept: f64,
    pub theta: Option<f64>,
    pub mu: f64,
    pub sigma: Option<f64>,
    pub resid_var: f64,
}

/// Fit x[t+1] = phi·x[t] + c by least squares (SVD solve).
pub fn estimate_ou_raw(x: &[f64], dt: f64) -> SimResult<OuRawFit> {
    if x.len() < 3 {
        return Err(SimError::InsufficientData {
            model: "ou".to_string(),
            required: 3,
            actual: x.len(),
        });
    }
    validate_positive("dt", dt)?;

    let n = x.len() - 1;
    let mut design = DMatrix::<f64>::zeros(n, 2);
    for i in 0..n {
        design[(i, 0)] = x[i];
        design[(i, 1)] = 1.0;
    }
    let target = DVector::from_iterator(n, x[1..].iter().copied());

    let svd = design.svd(true, true);
    let coeffs = svd.solve(&target, 1e-12).map_err(|reason| {
        SimError::NumericalInstability {
            method: "OU least squares".to_string(),
            reason: reason.to_string(),
        }
    })?;

    let mut phi = coeffs[(0, 0)];
    let intercept = coeffs[(1, 0)];
    validate_fitted("OU least squares", "phi", phi)?;
    validate_fitted("OU least squares", "intercept", intercept)?;

    let residuals: Vec<f64> = (0..n)
        .map(|i| x[i + 1] - (phi * x[i] + intercept))
        .collect();
    let resid_var = math_utils::sample_variance(&residuals);

    // phi = exp(-theta*dt); clamp for numerical safety before inverting
    phi = phi.clamp(-0.999_999_9, 0.999_999_9);
    let theta = if phi <= 0.0 {
        // Unstable fit: fall back to the magnitude
        if phi == 0.0 {
            None
        } else {
            Some(-phi.abs().ln() / dt)
        }
    } else {
        Some(-phi.ln() / dt)
    };

    let mu = intercept / (1.0 - phi);

    let sigma = match theta {
        Some(th) if th > 0.0 && (1.0 - phi * phi) > 0.0 => {
            Some((2.0 * th * resid_var / (1.0 - phi * phi)).sqrt())
        }
        _ => None,
    };

    Ok(OuRawFit {
        phi,
        intercept,
        theta,
        mu,
        sigma,
        resid_var,
    })
}

/// Clamped, simulation-ready OU parameters.
#[derive(Debug, Clone, Copy)]
pub struct OuParams {
    pub theta: f64,
    pub mu: f64,
    pub sigma: f64,
    pub phi: f64,
    /// ln(2)/θ, in steps of the historical clock
    pub half_life: f64,
}

impl OuParams {
    pub fn new(theta: f64, mu: f64, sigma: f64) -> SimResult<Self> {
        validate_positive("theta", theta)?;
        validate_finite("mu", mu)?;
        validate_positive("sigma", sigma)?;
        Ok(OuParams {
            theta,
            mu,
            sigma,
            phi: (-theta).exp(),
            half_life: std::f64::consts::LN_2 / theta,
        })
    }

    /// Calibrate on log-prices and apply the defensive clamps:
    /// θ ∈ [0.01, 1.0], σ ∈ [1e-6, sample std of log-prices],
    /// μ within a ±10% band of the observed log-price range.
    pub fn estimate(series: &PriceSeries, dt: f64) -> SimResult<Self> {
        series.require_len("ou", MIN_SERIES_LEN)?;

        let logp = series.log_prices();
        let raw = estimate_ou_raw(&logp, dt)?;

        let logp_std = math_utils::sample_std(&logp);

        let theta = raw.theta.unwrap_or(0.2).clamp(THETA_MIN, THETA_MAX);
        let sigma = raw
            .sigma
            .unwrap_or(logp_std)
            .clamp(SIGMA_MIN, logp_std.max(SIGMA_MIN));

        let lo_p = logp.iter().copied().fold(f64::INFINITY, f64::min);
        let hi_p = logp.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let band_lo = (0.9 * lo_p).min(1.1 * hi_p);
        let band_hi = (0.9 * lo_p).max(1.1 * hi_p);
        let mu = raw.mu.clamp(band_lo, band_hi);

        validate_fitted("OU estimation", "theta", theta)?;
        validate_fitted("OU estimation", "mu", mu)?;
        validate_fitted("OU estimation", "sigma", sigma)?;

        Ok(OuParams {
            theta,
            mu,
            sigma,
            phi: raw.phi,
            half_life: std::f64::consts::LN_2 / theta,
        })
    }

    /// Simulate an ensemble; `spot` is a price in both spaces.
    pub fn simulate(
        &self,
        spot: f64,
        cfg: &SimulationConfig,
        space: OuSpace,
    ) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;
        let dt = cfg.dt();
        let model = *self;

        match space {
            OuSpace::LogPrice => run_paths(cfg, spot, move |rng, row| {
                let mut x = spot.ln();
                for t in 1..row.len() {
                    EulerMaruyama::step(&model, &mut x, t as f64 * dt, dt, rng);
                    row[t] = x.exp();
                }
            }),
            OuSpace::Level => run_paths(cfg, spot, move |rng, row| {
                let mut x = spot;
                for t in 1..row.len() {
                    EulerMaruyama::step(&model, &mut x, t as f64 * dt, dt, rng);
                    x = x.max(0.0);
                    row[t] = x;
                }
            }),
        }
    }
}

impl DiffusionModel for OuParams {
    fn drift(&self, x: f64, _t: f64) -> f64 {
        self.theta * (self.mu - x)
    }

    fn diffusion(&self, _x: f64, _t: f64) -> f64 {
        self.sigma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng;

    fn synthetic_ar1(phi: f64, c: f64, noise: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = rng::seed_rng_from_u64(seed);
        let mut x = vec![c / (1.0 - phi)];
        for _ in 1..n {
            let eps = noise * rng::get_normal_draw(&mut rng);
            let prev = *x.last().unwrap();
            x.push(phi * prev + c + eps);
        }
        x
    }

    #[test]
    fn test_raw_fit_recovers_phi() {
        let x = synthetic_ar1(0.9, 0.46, 0.01, 2000, 3);
        let raw = estimate_ou_raw(&x, 1.0).unwrap();
        assert!((raw.phi - 0.9).abs() < 0.05, "phi = {}", raw.phi);
        assert!(raw.theta.unwrap() > 0.0);
        // mu = c / (1 - phi) = 4.6
        assert!((raw.mu - 4.6).abs() < 0.5, "mu = {}", raw.mu);
        assert!(raw.sigma.is_some());
    }

    #[test]
    fn test_estimate_applies_clamps() {
        let prices: Vec<f64> = synthetic_ar1(0.9, 0.46, 0.01, 300, 11)
            .into_iter()
            .map(|x: f64| x.exp())
            .collect();
        let series = PriceSeries::new(prices).unwrap();
        let params = OuParams::estimate(&series, 1.0).unwrap();
        assert!(params.theta >= THETA_MIN && params.theta <= THETA_MAX);
        assert!(params.sigma >= SIGMA_MIN);
        assert!(params.half_life > 0.0);
    }

    #[test]
    fn test_negative_phi_is_handled_not_fatal() {
        // Alternating series drives phi negative; the |phi| fallback plus the
        // clamps must still yield usable parameters. The numeric value is an
        // approximation boundary and deliberately not asserted.
        let prices: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 105.0 })
            .collect();
        let series = PriceSeries::new(prices).unwrap();
        let params = OuParams::estimate(&series, 1.0).unwrap();
        assert!(params.theta >= THETA_MIN && params.theta <= THETA_MAX);
        assert!(params.phi <= 0.0);
    }

    #[test]
    fn test_simulate_log_space_positive() {
        let params = OuParams::new(0.2, 100.0f64.ln(), 0.02).unwrap();
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 25,
            seed: 5,
        };
        let ens = params.simulate(100.0, &cfg, OuSpace::LogPrice).unwrap();
        assert_eq!(ens.shape(), (25, 31));
        assert!(ens.as_array().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_simulate_level_space_floors_at_zero() {
        let params = OuParams::new(0.5, -50.0, 5.0).unwrap();
        let cfg = SimulationConfig {
            horizon_days: 50.0,
            steps: 50,
            num_paths: 10,
            seed: 9,
        };
        let ens = params.simulate(1.0, &cfg, OuSpace::Level).unwrap();
        assert!(ens.as_array().iter().all(|&v| v >= 0.0));
    }
}

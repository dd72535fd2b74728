// src/models/heston.rs
//! Heston Stochastic Volatility Model
//!
//! # Mathematical Framework
//!
//! ```text
//! dS_t = μ S_t dt + √V_t S_t dW_t^(1)
//! dV_t = κ(θ - V_t) dt + ξ √V_t dW_t^(2)
//! corr(dW^(1), dW^(2)) = ρ
//! ```
//!
//! Discretized with full truncation on the variance process plus a hard
//! variance band derived from the base volatility:
//! ```text
//! floor = max(0.01·σ², 1e-6)        cap = 25·σ²
//! v⁺ = max(v, floor)
//! v' = clamp(v⁺ + κ(θ - v⁺)dt + ξ√v⁺√dt·Z₂, floor, cap)
//! S' = max(S·exp((μ - v⁺/2)dt + √v⁺√dt·Z₁), 1e-6)
//! ```
//!
//! The price update uses the *pre-update* truncated variance in both drift and
//! diffusion. The leverage effect enters through
//! `Z₂ = ρ·Z₁ + √(1-ρ²)·Z₂_indep`. Time runs on the annualized clock.

use crate::error::{validation::*, SimError, SimResult};
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use std::f64;

/// Fallback base volatility when the caller supplies nothing usable
const DEFAULT_BASE_SIGMA: f64 = 0.8;
const PRICE_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
pub struct HestonOverrides {
    pub v0: Option<f64>,
    pub kappa: Option<f64>,
    pub theta: Option<f64>,
    pub vol_of_vol: Option<f64>,
    pub rho: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct HestonParams {
    /// Price drift, annualized
    pub mu: f64,
    /// Initial variance
    pub v0: f64,
    /// Mean reversion speed of variance
    pub kappa: f64,
    /// Long-run variance level
    pub theta: f64,
    /// Volatility of variance
    pub vol_of_vol: f64,
    /// Price/variance shock correlation
    pub rho: f64,
    /// Variance band, derived from the base sigma at construction
    pub var_floor: f64,
    pub var_cap: f64,
}

impl HestonParams {
    /// Derive a parameter set from an annualized base volatility, filling
    /// anything the caller did not override. A non-finite or non-positive
    /// `base_sigma` falls back to 0.8 with a warning, matching the defensive
    /// posture of the rest of the calibration layer.
    pub fn from_base_sigma(mu: f64, base_sigma: f64, ov: &HestonOverrides) -> SimResult<Self> {
        validate_finite("mu", mu)?;

        let sigma = if base_sigma.is_finite() && base_sigma > 0.0 {
            base_sigma
        } else {
            eprintln!(
                "WARNING!: unusable base sigma {} for Heston; falling back to {}",
                base_sigma, DEFAULT_BASE_SIGMA
            );
            DEFAULT_BASE_SIGMA
        };

        let base_var = sigma * sigma;
        let var_floor = (0.01 * base_var).max(1e-6);
        let var_cap = 25.0 * base_var;

        let params = HestonParams {
            mu,
            v0: ov.v0.unwrap_or_else(|| base_var.max(var_floor)),
            kappa: ov.kappa.unwrap_or(2.0),
            theta: ov.theta.unwrap_or_else(|| base_var.max(var_floor)),
            vol_of_vol: ov.vol_of_vol.unwrap_or(1.0),
            rho: ov.rho.unwrap_or(-0.7),
            var_floor,
            var_cap,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.kappa <= 0.0 {
            return Err(SimError::InvalidParameter {
                parameter: "kappa".to_string(),
                value: self.kappa,
                constraint: "must be > 0 for the variance process".to_string(),
            });
        }
        validate_non_negative("v0", self.v0)?;
        validate_non_negative("theta", self.theta)?;
        validate_positive("vol_of_vol", self.vol_of_vol)?;
        validate_correlation("rho", self.rho)?;
        validate_positive("var_cap", self.var_cap)?;
        Ok(())
    }

    /// Simulate an ensemble starting from `spot` on the annualized clock.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;
        self.validate()?;

        let dt = cfg.dt_annualized();
        let sqrt_dt = dt.sqrt();
        let p = *self;
        let rho_comp = (1.0 - p.rho * p.rho).max(0.0).sqrt();

        run_paths(cfg, spot, move |rng, row| {
            let mut v = p.v0;
            for t in 1..row.len() {
                let z1 = rng::get_normal_draw(rng);
                let z2_ind = rng::get_normal_draw(rng);
                let z2 = p.rho * z1 + rho_comp * z2_ind;

                let v_pos = v.max(p.var_floor);

                let dv = p.kappa * (p.theta - v_pos) * dt
                    + p.vol_of_vol * v_pos.sqrt() * sqrt_dt * z2;
                v = (v_pos + dv).clamp(p.var_floor, p.var_cap);

                let exponent = (p.mu - 0.5 * v_pos) * dt + v_pos.sqrt() * sqrt_dt * z1;
                row[t] = (row[t - 1] * exponent.exp()).max(PRICE_FLOOR);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> HestonParams {
        HestonParams::from_base_sigma(0.05, 0.8, &HestonOverrides::default()).unwrap()
    }

    #[test]
    fn test_defaults_from_base_sigma() {
        let p = default_params();
        assert!((p.v0 - 0.64).abs() < 1e-12);
        assert!((p.theta - 0.64).abs() < 1e-12);
        assert!((p.kappa - 2.0).abs() < 1e-12);
        assert!((p.rho + 0.7).abs() < 1e-12);
        assert!((p.var_cap - 16.0).abs() < 1e-12);
        assert!((p.var_floor - 0.0064).abs() < 1e-12);
    }

    #[test]
    fn test_kappa_must_be_positive() {
        let ov = HestonOverrides {
            kappa: Some(0.0),
            ..Default::default()
        };
        let err = HestonParams::from_base_sigma(0.0, 0.8, &ov).unwrap_err();
        assert!(format!("{}", err).contains("kappa"));
    }

    #[test]
    fn test_rho_out_of_range_rejected() {
        let ov = HestonOverrides {
            rho: Some(-1.5),
            ..Default::default()
        };
        assert!(HestonParams::from_base_sigma(0.0, 0.8, &ov).is_err());
    }

    #[test]
    fn test_simulate_stays_in_bounds() {
        let p = default_params();
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 200,
            seed: 42,
        };
        let ens = p.simulate(100.0, &cfg).unwrap();
        assert_eq!(ens.shape(), (200, 31));
        assert!(ens.as_array().iter().all(|&s| s >= PRICE_FLOOR));
        assert!(ens.validate().is_ok());
    }
}

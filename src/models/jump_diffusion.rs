// src/models/jump_diffusion.rs
//! Merton and Kou jump-diffusion
//!
//! # Mathematical Framework
//!
//! Log-price increments combine a GBM diffusion with compensated Poisson
//! jumps:
//! ```text
//! Δln(S) = (μ - σ²/2 - λκ_J) dt + σ√dt·Z + Σ_{i=1}^{N} J_i,  N ~ Poisson(λ·dt)
//! ```
//!
//! The compensator κ_J = E[e^J - 1] keeps the expected growth rate at μ:
//! - Merton, J ~ N(m, s²):  κ_J = exp(m + s²/2) - 1
//! - Kou, two-sided exponential mixture (probability `p` of a negative jump
//!   with rate α₁, else a positive jump with rate α₂):
//!   κ_J = p·α₁/(α₁-1) + (1-p)·α₂/(α₂+1) - 1, finite only for α₁ > 1.
//!
//! Time runs on the annualized clock.

use crate::error::{validation::*, SimError, SimResult};
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use rand::Rng;
use rand_distr::{Distribution, Exp, Poisson};
use std::f64;

#[derive(Debug, Clone, Copy)]
pub enum JumpKind {
    Merton { jump_mu: f64, jump_sigma: f64 },
    Kou { p: f64, alpha1: f64, alpha2: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct JumpDiffusionParams {
    /// Diffusion drift, annualized
    pub mu: f64,
    /// Diffusion volatility, annualized
    pub sigma: f64,
    /// Jump intensity per year
    pub jump_lambda: f64,
    pub kind: JumpKind,
}

impl JumpDiffusionParams {
    pub fn new(mu: f64, sigma: f64, jump_lambda: f64, kind: JumpKind) -> SimResult<Self> {
        validate_finite("mu", mu)?;
        validate_non_negative("sigma", sigma)?;
        validate_non_negative("jump_lambda", jump_lambda)?;
        match kind {
            JumpKind::Merton { jump_mu, jump_sigma } => {
                validate_finite("jump_mu", jump_mu)?;
                validate_non_negative("jump_sigma", jump_sigma)?;
            }
            JumpKind::Kou { p, alpha1, alpha2 } => {
                validate_range("kou_p", p, 0.0, 1.0)?;
                if alpha1 <= 1.0 {
                    return Err(SimError::InvalidParameter {
                        parameter: "kou_alpha1".to_string(),
                        value: alpha1,
                        constraint: "must be > 1 for finite E[e^J]".to_string(),
                    });
                }
                validate_positive("kou_alpha2", alpha2)?;
            }
        }
        Ok(JumpDiffusionParams {
            mu,
            sigma,
            jump_lambda,
            kind,
        })
    }

    /// Closed-form jump compensator κ_J = E[e^J - 1].
    pub fn compensator(&self) -> f64 {
        match self.kind {
            JumpKind::Merton { jump_mu, jump_sigma } => {
                (jump_mu + 0.5 * jump_sigma * jump_sigma).exp() - 1.0
            }
            JumpKind::Kou { p, alpha1, alpha2 } => {
                p * (alpha1 / (alpha1 - 1.0)) + (1.0 - p) * (alpha2 / (alpha2 + 1.0)) - 1.0
            }
        }
    }

    /// Simulate an ensemble starting from `spot`.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;

        let dt = cfg.dt_annualized();
        let sqrt_dt = dt.sqrt();
        let drift = (self.mu - 0.5 * self.sigma * self.sigma - self.jump_lambda * self.compensator())
            * dt;
        let p = *self;

        let poisson = if p.jump_lambda > 0.0 {
            Some(
                Poisson::new(p.jump_lambda * dt).map_err(|_| SimError::InvalidParameter {
                    parameter: "jump_lambda".to_string(),
                    value: p.jump_lambda,
                    constraint: "lambda*dt must be a valid Poisson rate".to_string(),
                })?,
            )
        } else {
            None
        };

        run_paths(cfg, spot, move |rng, row| {
            for t in 1..row.len() {
                let diffusion = p.sigma * sqrt_dt * rng::get_normal_draw(rng);
                let num_jumps = match &poisson {
                    Some(d) => d.sample(rng) as usize,
                    None => 0,
                };
                let jump_total = p.sample_jump_total(num_jumps, rng);
                row[t] = row[t - 1] * (drift + diffusion + jump_total).exp();
            }
        })
    }

    /// Aggregate log-jump over `n` arrivals within one step.
    fn sample_jump_total<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> f64 {
        if n == 0 {
            return 0.0;
        }
        match self.kind {
            JumpKind::Merton { jump_mu, jump_sigma } => {
                // Sum of n iid normals, drawn as one normal
                let nf = n as f64;
                jump_mu * nf + jump_sigma * nf.sqrt() * rng::get_normal_draw(rng)
            }
            JumpKind::Kou { p, alpha1, alpha2 } => {
                let neg = Exp::new(alpha1).expect("alpha1 > 1 validated at construction");
                let pos = Exp::new(alpha2).expect("alpha2 > 0 validated at construction");
                let mut total = 0.0;
                for _ in 0..n {
                    let u: f64 = rng.gen();
                    if u < p {
                        total -= neg.sample(rng);
                    } else {
                        total += pos.sample(rng);
                    }
                }
                total
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merton_compensator() {
        let params = JumpDiffusionParams::new(
            0.0,
            0.2,
            0.5,
            JumpKind::Merton {
                jump_mu: 0.0,
                jump_sigma: 0.1,
            },
        )
        .unwrap();
        let expected = (0.005f64).exp() - 1.0;
        assert!((params.compensator() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_kou_compensator_and_guard() {
        let params = JumpDiffusionParams::new(
            0.0,
            0.2,
            0.5,
            JumpKind::Kou {
                p: 0.4,
                alpha1: 5.0,
                alpha2: 5.0,
            },
        )
        .unwrap();
        let expected = 0.4 * (5.0 / 4.0) + 0.6 * (5.0 / 6.0) - 1.0;
        assert!((params.compensator() - expected).abs() < 1e-12);

        let err = JumpDiffusionParams::new(
            0.0,
            0.2,
            0.5,
            JumpKind::Kou {
                p: 0.5,
                alpha1: 1.0,
                alpha2: 5.0,
            },
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("kou_alpha1"));
    }

    #[test]
    fn test_simulate_shape_and_positivity() {
        let params = JumpDiffusionParams::new(
            0.05,
            0.3,
            2.0,
            JumpKind::Merton {
                jump_mu: -0.02,
                jump_sigma: 0.05,
            },
        )
        .unwrap();
        let cfg = SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 100,
            seed: 17,
        };
        let ens = params.simulate(100.0, &cfg).unwrap();
        assert_eq!(ens.shape(), (100, 31));
        assert!(ens.as_array().iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_zero_lambda_is_pure_diffusion() {
        let params = JumpDiffusionParams::new(
            0.0,
            0.2,
            0.0,
            JumpKind::Merton {
                jump_mu: 0.5,
                jump_sigma: 0.5,
            },
        )
        .unwrap();
        let cfg = SimulationConfig {
            horizon_days: 10.0,
            steps: 10,
            num_paths: 20,
            seed: 23,
        };
        // With lambda = 0 the jump parameters are inert; must not error
        let ens = params.simulate(50.0, &cfg).unwrap();
        assert_eq!(ens.shape(), (20, 11));
    }
}

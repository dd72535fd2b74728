// src/models/residual_mlp.rs
//! Residual-regressor stochastic kernel
//!
//! A single-hidden-layer network (tanh activation, linear output) is trained
//! by full-batch gradient descent to predict the next log-return from a
//! sliding window of lagged returns. Features and targets are standardized
//! with a 1e-8 epsilon; the spread of the de-standardized training residuals
//! becomes the noise scale of the simulator.
//!
//! Path generation rolls the window forward: predict, blend with Gaussian
//! residual noise, clip to ±max_return, apply multiplicatively, append the
//! realized return. Training runs a fixed epoch budget at a fixed learning
//! rate; there is no early stopping.

use crate::error::{validation::*, SimError, SimResult};
use crate::math_utils;
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::{run_paths, SimulationConfig};
use crate::rng;
use crate::series::PriceSeries;
use nalgebra::{DMatrix, DVector};
use std::f64;

#[derive(Debug, Clone, Copy)]
pub struct ResidualMlpOptions {
    pub window: usize,
    pub hidden_dim: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub max_return: f64,
    /// Fraction of the residual spread mixed into each simulated step
    pub noise_weight: f64,
}

impl Default for ResidualMlpOptions {
    fn default() -> Self {
        ResidualMlpOptions {
            window: 50,
            hidden_dim: 32,
            epochs: 120,
            learning_rate: 0.01,
            max_return: 0.08,
            noise_weight: 0.3,
        }
    }
}

impl ResidualMlpOptions {
    pub fn validate(&self) -> SimResult<()> {
        if self.window < 2 {
            return Err(SimError::InvalidParameter {
                parameter: "window".to_string(),
                value: self.window as f64,
                constraint: "must be at least 2".to_string(),
            });
        }
        if self.hidden_dim == 0 {
            return Err(SimError::InvalidParameter {
                parameter: "hidden_dim".to_string(),
                value: 0.0,
                constraint: "must be positive".to_string(),
            });
        }
        validate_positive("learning_rate", self.learning_rate)?;
        validate_positive("max_return", self.max_return)?;
        validate_non_negative("noise_weight", self.noise_weight)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ResidualMlpParams {
    /// hidden × window
    pub w1: DMatrix<f64>,
    pub b1: DVector<f64>,
    /// 1 × hidden
    pub w2: DMatrix<f64>,
    pub b2: DVector<f64>,
    pub feature_mean: DVector<f64>,
    pub feature_std: DVector<f64>,
    pub target_mean: f64,
    pub target_std: f64,
    /// Spread of de-standardized training residuals
    pub residual_std: f64,
    /// Most recent `window` raw returns; the simulator's starting state
    pub seed_window: Vec<f64>,
    pub max_return: f64,
    pub noise_weight: f64,
}

impl ResidualMlpParams {
    /// Train on the historical returns. Weight initialization draws from the
    /// given seed so calibration is reproducible.
    pub fn estimate(
        series: &PriceSeries,
        opts: &ResidualMlpOptions,
        seed: u64,
    ) -> SimResult<Self> {
        opts.validate()?;
        series.require_len("residual_mlp", opts.window + 6)?;

        let returns = series.log_returns();
        let window = opts.window;
        let total = returns.len() - window;
        let hidden = opts.hidden_dim;

        // Sliding feature windows and next-return targets
        let features = DMatrix::from_fn(total, window, |i, j| returns[i + j]);
        let targets = DVector::from_fn(total, |i, _| returns[window + i]);

        // Per-column standardization
        let mut feature_mean = DVector::zeros(window);
        let mut feature_std = DVector::zeros(window);
        for j in 0..window {
            let col: Vec<f64> = (0..total).map(|i| features[(i, j)]).collect();
            feature_mean[j] = math_utils::mean(&col);
            feature_std[j] = math_utils::population_std(&col) + 1e-8;
        }
        let x_norm = DMatrix::from_fn(total, window, |i, j| {
            (features[(i, j)] - feature_mean[j]) / feature_std[j]
        });

        let target_mean = targets.mean();
        let target_std = {
            let raw: Vec<f64> = targets.iter().copied().collect();
            math_utils::population_std(&raw) + 1e-8
        };
        let y_norm = targets.map(|y| (y - target_mean) / target_std);

        // Small random init, zero biases
        let mut init_rng = rng::seed_rng_from_u64(seed);
        let mut w1 =
            DMatrix::from_fn(hidden, window, |_, _| 0.01 * rng::get_normal_draw(&mut init_rng));
        let mut b1 = DVector::zeros(hidden);
        let mut w2 =
            DMatrix::from_fn(1, hidden, |_, _| 0.01 * rng::get_normal_draw(&mut init_rng));
        let mut b2 = DVector::zeros(1);

        // Full-batch gradient descent on squared error
        let scale = 2.0 / total as f64;
        let lr = opts.learning_rate;
        for _ in 0..opts.epochs {
            let mut z1 = &x_norm * w1.transpose();
            for i in 0..total {
                for j in 0..hidden {
                    z1[(i, j)] += b1[j];
                }
            }
            let h1 = z1.map(|v| v.tanh());
            let y_hat = &h1 * w2.transpose(); // total × 1

            // dL/dy for the squared-error loss, kept as a column matrix
            let dy = DMatrix::from_fn(total, 1, |i, _| {
                (y_hat[(i, 0)] + b2[0] - y_norm[i]) * scale
            });

            let dw2 = dy.transpose() * &h1; // 1 × hidden
            let db2 = dy.sum();

            let dh1 = &dy * &w2; // total × hidden
            let dz1 = dh1.component_mul(&h1.map(|v| 1.0 - v * v));

            let dw1 = dz1.transpose() * &x_norm; // hidden × window
            let db1 = dz1.row_sum().transpose(); // hidden

            w1 -= &dw1 * lr;
            b1 -= &db1 * lr;
            w2 -= &dw2 * lr;
            b2[0] -= db2 * lr;
        }

        // Residual spread on the training sample, de-standardized
        let mut resid_real = Vec::with_capacity(total);
        for i in 0..total {
            let feat = x_norm.row(i).transpose();
            let pred = forward_one(&w1, &b1, &w2, &b2, &feat);
            resid_real.push((y_norm[i] - pred) * target_std);
        }
        let residual_std = math_utils::population_std(&resid_real) + 1e-6;

        validate_fitted("residual MLP training", "residual_std", residual_std)?;
        if w1.iter().any(|v| !v.is_finite()) || w2.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NumericalInstability {
                method: "residual MLP training".to_string(),
                reason: "weights diverged during gradient descent".to_string(),
            });
        }

        Ok(ResidualMlpParams {
            w1,
            b1,
            w2,
            b2,
            feature_mean,
            feature_std,
            target_mean,
            target_std,
            residual_std,
            seed_window: returns[returns.len() - window..].to_vec(),
            max_return: opts.max_return,
            noise_weight: opts.noise_weight,
        })
    }

    /// One-step return prediction from a raw (unstandardized) window.
    pub fn predict_return(&self, raw_window: &[f64]) -> f64 {
        let feat = DVector::from_fn(raw_window.len(), |i, _| {
            (raw_window[i] - self.feature_mean[i]) / self.feature_std[i]
        });
        let pred_norm = forward_one(&self.w1, &self.b1, &self.w2, &self.b2, &feat);
        self.target_mean + self.target_std * pred_norm
    }

    /// Simulate an ensemble starting from `spot`.
    pub fn simulate(&self, spot: f64, cfg: &SimulationConfig) -> SimResult<PathEnsemble> {
        validate_positive("spot", spot)?;
        let p = self.clone();
        let noise_sd = p.residual_std * p.noise_weight;

        run_paths(cfg, spot, move |rng, row| {
            let mut window = p.seed_window.clone();
            for t in 1..row.len() {
                let pred_ret = p.predict_return(&window);
                let noisy = pred_ret + noise_sd * rng::get_normal_draw(rng);
                let clipped = noisy.clamp(-p.max_return, p.max_return);

                row[t] = row[t - 1] * clipped.exp();

                window.rotate_left(1);
                let last = window.len() - 1;
                window[last] = clipped;
            }
        })
    }
}

fn forward_one(
    w1: &DMatrix<f64>,
    b1: &DVector<f64>,
    w2: &DMatrix<f64>,
    b2: &DVector<f64>,
    feat: &DVector<f64>,
) -> f64 {
    let h = (w1 * feat + b1).map(|v| v.tanh());
    (w2 * h)[(0, 0)] + b2[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating_series(n: usize) -> PriceSeries {
        // Strict +1% / -1% alternation: a learnable next-return pattern
        let mut prices = vec![100.0];
        for i in 1..n {
            let r: f64 = if i % 2 == 0 { 0.01 } else { -0.01 };
            let prev = *prices.last().unwrap();
            prices.push(prev * r.exp());
        }
        PriceSeries::new(prices).unwrap()
    }

    fn small_opts() -> ResidualMlpOptions {
        ResidualMlpOptions {
            window: 8,
            hidden_dim: 12,
            epochs: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_training_reduces_residual_spread() {
        let series = alternating_series(120);
        let untrained = ResidualMlpParams::estimate(
            &series,
            &ResidualMlpOptions {
                epochs: 0,
                ..small_opts()
            },
            42,
        )
        .unwrap();
        let trained = ResidualMlpParams::estimate(&series, &small_opts(), 42).unwrap();

        assert!(
            trained.residual_std < untrained.residual_std,
            "trained {} vs untrained {}",
            trained.residual_std,
            untrained.residual_std
        );
    }

    #[test]
    fn test_insufficient_data() {
        let series = alternating_series(12);
        assert!(matches!(
            ResidualMlpParams::estimate(&series, &ResidualMlpOptions::default(), 1),
            Err(SimError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_simulated_steps_respect_clip() {
        let series = alternating_series(120);
        let opts = ResidualMlpOptions {
            max_return: 0.01,
            ..small_opts()
        };
        let params = ResidualMlpParams::estimate(&series, &opts, 3).unwrap();
        let cfg = SimulationConfig {
            horizon_days: 20.0,
            steps: 20,
            num_paths: 10,
            seed: 5,
        };
        let ens = params.simulate(series.last(), &cfg).unwrap();
        assert_eq!(ens.shape(), (10, 21));

        for i in 0..10 {
            let path = ens.path(i);
            for t in 1..path.len() {
                let step = (path[t] / path[t - 1]).ln();
                assert!(step.abs() <= 0.01 + 1e-9, "step {} exceeds clip", step);
            }
        }
    }
}

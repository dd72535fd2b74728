// src/mc/path_engine.rs
//! Shared Monte Carlo path driver
//!
//! Every simulator in `models/` reduces to the same control flow: validate the
//! configuration, derive one RNG stream per path from the call seed, and fill
//! each row of the ensemble matrix sequentially in step order while rows run
//! in parallel. The driver owns that loop; models supply a row-filling closure.

use crate::error::{validation::*, SimResult};
use crate::mc::ensemble::PathEnsemble;
use crate::rng::RngFactory;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;

/// Horizon, discretization and ensemble-size settings shared by all models
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub horizon_days: f64,
    pub steps: usize,
    pub num_paths: usize,
    pub seed: u64,
}

impl SimulationConfig {
    pub fn validate(&self) -> SimResult<()> {
        validate_positive("horizon_days", self.horizon_days)?;
        validate_finite("horizon_days", self.horizon_days)?;
        validate_steps(self.steps)?;
        validate_paths(self.num_paths)?;
        Ok(())
    }

    /// Time increment in the model's native clock (days per step)
    pub fn dt(&self) -> f64 {
        self.horizon_days / self.steps as f64
    }

    /// Time increment for models that work in annualized units
    pub fn dt_annualized(&self) -> f64 {
        (self.horizon_days / 365.0) / self.steps as f64
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            horizon_days: 30.0,
            steps: 30,
            num_paths: 10,
            seed: 12345,
        }
    }
}

/// Fill a `(num_paths, steps + 1)` ensemble in parallel across paths.
///
/// `fill_row` receives the path's own generator and the full row slice with
/// `row[0]` already set to `spot`; it must write `row[1..]` in step order.
/// Streams derive from `cfg.seed + path_id`, so the result is independent of
/// rayon's scheduling.
pub fn run_paths<F>(cfg: &SimulationConfig, spot: f64, fill_row: F) -> SimResult<PathEnsemble>
where
    F: Fn(&mut StdRng, &mut [f64]) + Sync,
{
    cfg.validate()?;
    validate_finite("spot", spot)?;

    let mut paths = Array2::<f64>::zeros((cfg.num_paths, cfg.steps + 1));
    let factory = RngFactory::new(cfg.seed);

    paths
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let mut rng = factory.create_path_rng(i as u64);
            let slice = row.as_slice_mut().expect("ensemble rows are contiguous");
            slice[0] = spot;
            fill_row(&mut rng, slice);
        });

    Ok(PathEnsemble::from_array(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng;

    #[test]
    fn test_config_validation() {
        assert!(SimulationConfig::default().validate().is_ok());

        let bad = SimulationConfig {
            steps: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = SimulationConfig {
            horizon_days: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_run_paths_shape_and_spot() {
        let cfg = SimulationConfig {
            horizon_days: 10.0,
            steps: 5,
            num_paths: 8,
            seed: 7,
        };
        let ens = run_paths(&cfg, 42.0, |rng, row| {
            for t in 1..row.len() {
                row[t] = row[t - 1] + rng::get_normal_draw(rng);
            }
        })
        .unwrap();

        assert_eq!(ens.shape(), (8, 6));
        for i in 0..8 {
            assert!((ens.path(i)[0] - 42.0).abs() < 1e-12);
        }
        assert!(ens.validate().is_ok());
    }

    #[test]
    fn test_run_paths_deterministic_per_seed() {
        let cfg = SimulationConfig {
            horizon_days: 5.0,
            steps: 3,
            num_paths: 4,
            seed: 99,
        };
        let fill = |rng: &mut rand::rngs::StdRng, row: &mut [f64]| {
            for t in 1..row.len() {
                row[t] = row[t - 1] * (0.01 * rng::get_normal_draw(rng)).exp();
            }
        };
        let a = run_paths(&cfg, 100.0, fill).unwrap();
        let b = run_paths(&cfg, 100.0, fill).unwrap();
        assert_eq!(a.as_array(), b.as_array());
    }
}

//! # pathcast: Monte Carlo Price-Path Forecasting
//!
//! A Rust library for calibrating stochastic-process models to historical
//! asset prices, simulating ensembles of future price paths, and deriving
//! decision-support signals from them.
//!
//! ## Key Features
//!
//! - **Eight path models**: GBM, Ornstein-Uhlenbeck, Heston, Merton/Kou
//!   jump-diffusion, GARCH(1,1), Gaussian-HMM regime switching, a
//!   Kalman-filtered random walk, and a residual-regressor hybrid
//! - **Calibration built in**: per-model estimators (OLS, EM, grid MLE,
//!   gradient descent) with defensive clamping and a shared error taxonomy
//! - **High Performance**: path-parallel Monte Carlo with Rayon over ndarray
//!   ensembles
//! - **Signals, not just paths**: percentiles, exceedance probabilities,
//!   CVaR, first-passage times, regime buckets, cross-model agreement
//!
//! ## Quick Start
//!
//! ```rust
//! use pathcast::analytics::signals::{generate_signal_report, ReportConfig};
//! use pathcast::mc::path_engine::SimulationConfig;
//! use pathcast::registry::{run, SimulationRequest};
//!
//! let config = SimulationConfig {
//!     horizon_days: 30.0,
//!     steps: 30,
//!     num_paths: 1_000,
//!     seed: 42,
//! };
//!
//! let request = SimulationRequest::new("gbm", config)
//!     .with_historical(vec![100.0, 101.0, 99.0, 102.0, 98.0, 103.0]);
//!
//! let output = run(&request).expect("valid request");
//! let report = generate_signal_report(&output.ensemble, &ReportConfig::default());
//! println!("suggested actions: {:?}", report.suggested_actions);
//! ```
//!
//! ## Pipeline
//!
//! Caller → registry (model dispatch) → estimator (model-dependent) →
//! simulator (`PathEnsemble`) → analytics (`SignalReport`). Every stage is a
//! pure function of its inputs and the call seed; concurrent requests share
//! no state.

// Module declarations
pub mod error;
pub mod rng;
pub mod math_utils;
pub mod series;
pub mod models;
pub mod solvers;
pub mod mc;
pub mod registry;
pub mod analytics;
pub mod output;

// Re-export commonly used types for convenience
pub use error::{SimError, SimResult};
pub use mc::ensemble::PathEnsemble;
pub use mc::path_engine::SimulationConfig;
pub use models::CalibratedParams;
pub use series::PriceSeries;

// src/series.rs
//! Historical price series input
//!
//! All calibration routines consume a `PriceSeries`: a chronological sequence
//! of strictly positive, finite close prices. Validation happens once at
//! construction so the estimators can assume a sane input.

use crate::error::{SimError, SimResult};
use crate::math_utils;

#[derive(Debug, Clone)]
pub struct PriceSeries {
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from raw close prices, rejecting empty input and any
    /// non-finite or non-positive entry.
    pub fn new(prices: Vec<f64>) -> SimResult<Self> {
        if prices.is_empty() {
            return Err(SimError::InvalidConfiguration {
                field: "historical".to_string(),
                reason: "price series is empty".to_string(),
            });
        }
        for (i, &p) in prices.iter().enumerate() {
            if !p.is_finite() || p <= 0.0 {
                return Err(SimError::InvalidParameter {
                    parameter: format!("historical[{}]", i),
                    value: p,
                    constraint: "prices must be finite and positive".to_string(),
                });
            }
        }
        Ok(PriceSeries { prices })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Last observed close; the spot every simulated path starts from.
    pub fn last(&self) -> f64 {
        *self.prices.last().expect("series is never empty")
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn log_prices(&self) -> Vec<f64> {
        self.prices.iter().map(|p| p.ln()).collect()
    }

    /// Log-returns: ln(P[t] / P[t-1]), length = len - 1
    pub fn log_returns(&self) -> Vec<f64> {
        self.prices
            .windows(2)
            .map(|w| (w[1] / w[0]).ln())
            .collect()
    }

    /// Sample mean of log-returns (the GBM drift estimate per step)
    pub fn mean_log_return(&self) -> f64 {
        math_utils::mean(&self.log_returns())
    }

    /// Sample std of log-returns (ddof = 1, the GBM volatility estimate per step)
    pub fn std_log_return(&self) -> f64 {
        math_utils::sample_std(&self.log_returns())
    }

    /// Guard used by every estimator before touching the data.
    pub fn require_len(&self, model: &str, required: usize) -> SimResult<()> {
        if self.len() < required {
            Err(SimError::InsufficientData {
                model: model.to_string(),
                required,
                actual: self.len(),
            })
        } else {
            Ok(())
        }
    }
}

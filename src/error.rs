// src/error.rs
use std::fmt;

/// Custom error types for the pathcast library
#[derive(Debug, Clone)]
pub enum SimError {
    /// Historical series shorter than the model's minimum
    InsufficientData {
        model: String,
        required: usize,
        actual: usize,
    },

    /// Invalid parameter values
    InvalidParameter {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Numerical instability or degenerate fit
    NumericalInstability { method: String, reason: String },

    /// Model identifier not present in the registry
    UnknownModel { model: String },

    /// Invalid request or simulation configuration
    InvalidConfiguration { field: String, reason: String },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InsufficientData {
                model,
                required,
                actual,
            } => {
                write!(
                    f,
                    "Insufficient data for model '{}': need at least {} observations, got {}",
                    model, required, actual
                )
            }
            SimError::InvalidParameter {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = {}: {}",
                    parameter, value, constraint
                )
            }
            SimError::NumericalInstability { method, reason } => {
                write!(f, "Numerical instability in {}: {}", method, reason)
            }
            SimError::UnknownModel { model } => {
                write!(f, "Unknown model identifier '{}'", model)
            }
            SimError::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for SimError {}

/// Result type alias for pathcast operations
pub type SimResult<T> = Result<T, SimError>;

/// Validation utilities
pub mod validation {
    use super::{SimError, SimResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> SimResult<()> {
        if value <= 0.0 {
            Err(SimError::InvalidParameter {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> SimResult<()> {
        if value < 0.0 {
            Err(SimError::InvalidParameter {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> SimResult<()> {
        if value < min || value > max {
            Err(SimError::InvalidParameter {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range [{}, {}]", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate correlation parameter
    pub fn validate_correlation(name: &str, rho: f64) -> SimResult<()> {
        validate_range(name, rho, -1.0, 1.0)
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> SimResult<()> {
        if !value.is_finite() {
            Err(SimError::InvalidParameter {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate paths count
    pub fn validate_paths(paths: usize) -> SimResult<()> {
        if paths == 0 {
            Err(SimError::InvalidConfiguration {
                field: "num_paths".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if paths > 1_000_000_000 {
            Err(SimError::InvalidConfiguration {
                field: "num_paths".to_string(),
                reason: "exceeds maximum allowed (1 billion)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate steps count
    pub fn validate_steps(steps: usize) -> SimResult<()> {
        if steps == 0 {
            Err(SimError::InvalidConfiguration {
                field: "steps".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if steps > 100_000 {
            Err(SimError::InvalidConfiguration {
                field: "steps".to_string(),
                reason: "exceeds maximum allowed (100,000)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a fitted value is finite, mapping failures to instability
    pub fn validate_fitted(method: &str, name: &str, value: f64) -> SimResult<()> {
        if !value.is_finite() {
            Err(SimError::NumericalInstability {
                method: method.to_string(),
                reason: format!("fitted parameter '{}' is not finite: {}", name, value),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("sigma", 0.2).is_ok());
        assert!(validate_positive("sigma", 0.0).is_err());
        assert!(validate_positive("sigma", -0.1).is_err());
    }

    #[test]
    fn test_validate_correlation() {
        assert!(validate_correlation("rho", 0.5).is_ok());
        assert!(validate_correlation("rho", -0.8).is_ok());
        assert!(validate_correlation("rho", 1.0).is_ok());
        assert!(validate_correlation("rho", -1.0).is_ok());
        assert!(validate_correlation("rho", 1.1).is_err());
        assert!(validate_correlation("rho", -1.1).is_err());
    }

    #[test]
    fn test_validate_finite() {
        assert!(validate_finite("value", 1.0).is_ok());
        assert!(validate_finite("value", f64::NAN).is_err());
        assert!(validate_finite("value", f64::INFINITY).is_err());
        assert!(validate_finite("value", f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_insufficient_data_display() {
        let error = SimError::InsufficientData {
            model: "hmm".to_string(),
            required: 30,
            actual: 12,
        };

        let display = format!("{}", error);
        assert!(display.contains("hmm"));
        assert!(display.contains("30"));
        assert!(display.contains("12"));
    }

    #[test]
    fn test_unknown_model_display() {
        let error = SimError::UnknownModel {
            model: "garhc".to_string(),
        };

        let display = format!("{}", error);
        assert!(display.contains("garhc"));
    }
}

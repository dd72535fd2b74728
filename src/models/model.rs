// src/models/model.rs
/// One-dimensional diffusion written as dX_t = a(X_t, t) dt + b(X_t, t) dW_t.
///
/// Implemented by the models that integrate on a level (OU in level space, the
/// Kalman random walk); the multiplicative models use their own exact or
/// log-space steps.
pub trait DiffusionModel {
    fn drift(&self, x: f64, t: f64) -> f64;
    fn diffusion(&self, x: f64, t: f64) -> f64;
}

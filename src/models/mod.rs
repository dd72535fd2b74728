// src/models/mod.rs
pub mod garch;
pub mod gbm;
pub mod heston;
pub mod jump_diffusion;
pub mod kalman_walk;
pub mod model;
pub mod ou_process;
pub mod regime_hmm;
pub mod residual_mlp;

pub use model::DiffusionModel;

use crate::error::SimResult;
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::SimulationConfig;

/// Calibration output, one variant per registered model.
///
/// The heterogeneous per-model parameter shapes live behind this single tag so
/// callers hold one type between `estimate` and `simulate`.
#[derive(Debug, Clone)]
pub enum CalibratedParams {
    Gbm(gbm::GbmParams),
    Ou(ou_process::OuParams),
    Heston(heston::HestonParams),
    JumpDiffusion(jump_diffusion::JumpDiffusionParams),
    Garch(garch::Garch11Params),
    Hmm(regime_hmm::HmmParams),
    KalmanWalk(kalman_walk::KalmanWalkParams),
    ResidualMlp(residual_mlp::ResidualMlpParams),
}

impl CalibratedParams {
    pub fn model_name(&self) -> &'static str {
        match self {
            CalibratedParams::Gbm(_) => "gbm",
            CalibratedParams::Ou(_) => "ou",
            CalibratedParams::Heston(_) => "heston",
            CalibratedParams::JumpDiffusion(_) => "jump_diffusion",
            CalibratedParams::Garch(_) => "garch",
            CalibratedParams::Hmm(_) => "hmm",
            CalibratedParams::KalmanWalk(_) => "kalman",
            CalibratedParams::ResidualMlp(_) => "residual_mlp",
        }
    }

    /// Dispatch to the model's simulator. `spot` is ignored by the Kalman
    /// walk, which starts from its own denoised level.
    pub fn simulate(
        &self,
        spot: f64,
        cfg: &SimulationConfig,
        ou_space: ou_process::OuSpace,
    ) -> SimResult<PathEnsemble> {
        match self {
            CalibratedParams::Gbm(p) => p.simulate(spot, cfg),
            CalibratedParams::Ou(p) => p.simulate(spot, cfg, ou_space),
            CalibratedParams::Heston(p) => p.simulate(spot, cfg),
            CalibratedParams::JumpDiffusion(p) => p.simulate(spot, cfg),
            CalibratedParams::Garch(p) => p.simulate(spot, cfg),
            CalibratedParams::Hmm(p) => p.simulate(spot, cfg),
            CalibratedParams::KalmanWalk(p) => p.simulate(cfg),
            CalibratedParams::ResidualMlp(p) => p.simulate(spot, cfg),
        }
    }
}

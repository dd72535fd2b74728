// src/registry.rs
//! Model registry and request dispatch
//!
//! Maps a model identifier to its {estimator, simulator} pair and normalizes
//! the heterogeneous per-model argument shapes (raw drift/vol vs. full
//! history) into a single request/response contract. Unknown identifiers are
//! `UnknownModel`; a model whose required inputs are missing is
//! `InvalidConfiguration`.

use crate::error::{SimError, SimResult};
use crate::mc::ensemble::PathEnsemble;
use crate::mc::path_engine::SimulationConfig;
use crate::models::garch::Garch11Params;
use crate::models::gbm::GbmParams;
use crate::models::heston::{HestonOverrides, HestonParams};
use crate::models::jump_diffusion::{JumpDiffusionParams, JumpKind};
use crate::models::kalman_walk::{KalmanWalkParams, DEFAULT_MEAS_VAR, DEFAULT_PROCESS_VAR};
use crate::models::ou_process::{OuParams, OuSpace};
use crate::models::regime_hmm::{HmmOptions, HmmParams};
use crate::models::residual_mlp::{ResidualMlpOptions, ResidualMlpParams};
use crate::models::CalibratedParams;
use crate::series::PriceSeries;

/// Annualization factor between the daily sampling clock and the
/// annualized-clock models (Heston, jump-diffusion)
const TRADING_DAYS: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelId {
    Gbm,
    Ou,
    Heston,
    JumpDiffusion,
    Garch,
    Hmm,
    Kalman,
    ResidualMlp,
}

impl ModelId {
    pub fn parse(s: &str) -> SimResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gbm" => Ok(ModelId::Gbm),
            "ou" => Ok(ModelId::Ou),
            "heston" => Ok(ModelId::Heston),
            "jump_diffusion" => Ok(ModelId::JumpDiffusion),
            "garch" => Ok(ModelId::Garch),
            "hmm" => Ok(ModelId::Hmm),
            "kalman" => Ok(ModelId::Kalman),
            "residual_mlp" => Ok(ModelId::ResidualMlp),
            _ => Err(SimError::UnknownModel {
                model: s.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gbm => "gbm",
            ModelId::Ou => "ou",
            ModelId::Heston => "heston",
            ModelId::JumpDiffusion => "jump_diffusion",
            ModelId::Garch => "garch",
            ModelId::Hmm => "hmm",
            ModelId::Kalman => "kalman",
            ModelId::ResidualMlp => "residual_mlp",
        }
    }

    pub fn all() -> [ModelId; 8] {
        [
            ModelId::Gbm,
            ModelId::Ou,
            ModelId::Heston,
            ModelId::JumpDiffusion,
            ModelId::Garch,
            ModelId::Hmm,
            ModelId::Kalman,
            ModelId::ResidualMlp,
        ]
    }

    /// Whether the model can only be calibrated from a full history
    pub fn requires_history(&self) -> bool {
        matches!(
            self,
            ModelId::Ou | ModelId::Garch | ModelId::Hmm | ModelId::Kalman | ModelId::ResidualMlp
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JumpOptions {
    pub jump_lambda: f64,
    pub kind: JumpKind,
}

impl Default for JumpOptions {
    fn default() -> Self {
        JumpOptions {
            jump_lambda: 0.1,
            kind: JumpKind::Merton {
                jump_mu: 0.0,
                jump_sigma: 0.02,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KalmanOptions {
    pub process_var: f64,
    pub meas_var: f64,
}

impl Default for KalmanOptions {
    fn default() -> Self {
        KalmanOptions {
            process_var: DEFAULT_PROCESS_VAR,
            meas_var: DEFAULT_MEAS_VAR,
        }
    }
}

/// Per-model tuning knobs; every field has a sensible default.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub ou_space: Option<OuSpace>,
    pub heston: HestonOverrides,
    pub jump: JumpOptions,
    pub hmm: HmmOptions,
    pub kalman: KalmanOptions,
    pub mlp: ResidualMlpOptions,
}

impl ModelOptions {
    fn ou_space(&self) -> OuSpace {
        self.ou_space.unwrap_or(OuSpace::LogPrice)
    }
}

/// The single call shape the external request layer produces.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub model: String,
    pub historical: Option<Vec<f64>>,
    /// Starting value override; defaults to the last historical close
    pub spot: Option<f64>,
    /// Raw drift/vol for the models that accept them instead of a history
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
    pub config: SimulationConfig,
    pub options: ModelOptions,
}

impl SimulationRequest {
    pub fn new(model: &str, config: SimulationConfig) -> Self {
        SimulationRequest {
            model: model.to_string(),
            historical: None,
            spot: None,
            mu: None,
            sigma: None,
            config,
            options: ModelOptions::default(),
        }
    }

    pub fn with_historical(mut self, prices: Vec<f64>) -> Self {
        self.historical = Some(prices);
        self
    }

    pub fn with_drift_vol(mut self, mu: f64, sigma: f64) -> Self {
        self.mu = Some(mu);
        self.sigma = Some(sigma);
        self
    }
}

/// Uniform result envelope, independent of the model's internal output shape.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub model: String,
    pub ensemble: PathEnsemble,
    pub steps: usize,
    pub horizon_days: f64,
    pub num_paths: usize,
    pub diagnostics: Vec<(String, String)>,
}

/// Calibrate the named model from a historical series.
pub fn estimate(
    model: &str,
    series: &PriceSeries,
    cfg: &SimulationConfig,
    options: &ModelOptions,
) -> SimResult<CalibratedParams> {
    let id = ModelId::parse(model)?;
    match id {
        ModelId::Gbm => Ok(CalibratedParams::Gbm(GbmParams::estimate(series)?)),
        // The AR(1) fit runs on the historical sampling clock (one bar per
        // observation), independent of the simulation discretization
        ModelId::Ou => Ok(CalibratedParams::Ou(OuParams::estimate(series, 1.0)?)),
        ModelId::Heston => {
            let (mu, sigma) = annualized_moments(series)?;
            Ok(CalibratedParams::Heston(HestonParams::from_base_sigma(
                mu,
                sigma,
                &options.heston,
            )?))
        }
        ModelId::JumpDiffusion => {
            let (mu, sigma) = annualized_moments(series)?;
            Ok(CalibratedParams::JumpDiffusion(JumpDiffusionParams::new(
                mu,
                sigma,
                options.jump.jump_lambda,
                options.jump.kind,
            )?))
        }
        ModelId::Garch => Ok(CalibratedParams::Garch(Garch11Params::estimate(series)?)),
        ModelId::Hmm => Ok(CalibratedParams::Hmm(HmmParams::estimate(
            series,
            &options.hmm,
        )?)),
        ModelId::Kalman => Ok(CalibratedParams::KalmanWalk(KalmanWalkParams::estimate(
            series,
            options.kalman.process_var,
            options.kalman.meas_var,
        )?)),
        ModelId::ResidualMlp => Ok(CalibratedParams::ResidualMlp(ResidualMlpParams::estimate(
            series,
            &options.mlp,
            cfg.seed,
        )?)),
    }
}

/// Run the calibrated model forward from `spot`.
pub fn simulate(
    calibrated: &CalibratedParams,
    spot: f64,
    cfg: &SimulationConfig,
    options: &ModelOptions,
) -> SimResult<PathEnsemble> {
    calibrated.simulate(spot, cfg, options.ou_space())
}

/// Full request pipeline: resolve inputs, calibrate where the model demands
/// it, simulate, wrap the envelope.
pub fn run(req: &SimulationRequest) -> SimResult<SimulationOutput> {
    let id = ModelId::parse(&req.model)?;
    req.config.validate()?;

    let series = match &req.historical {
        Some(prices) => Some(PriceSeries::new(prices.clone())?),
        None => None,
    };

    if id.requires_history() && series.is_none() {
        return Err(SimError::InvalidConfiguration {
            field: "historical".to_string(),
            reason: format!("model '{}' requires a price history", id.as_str()),
        });
    }

    let spot = req
        .spot
        .or_else(|| series.as_ref().map(|s| s.last()))
        .ok_or_else(|| SimError::InvalidConfiguration {
            field: "spot".to_string(),
            reason: format!(
                "model '{}' needs a spot price or a price history",
                id.as_str()
            ),
        })?;

    let params = resolve_params(id, req, series.as_ref())?;
    let ensemble = simulate(&params, spot, &req.config, &req.options)?;
    ensemble.validate()?;

    let diagnostics = collect_diagnostics(&params);
    Ok(SimulationOutput {
        model: id.as_str().to_string(),
        ensemble,
        steps: req.config.steps,
        horizon_days: req.config.horizon_days,
        num_paths: req.config.num_paths,
        diagnostics,
    })
}

/// Per-model argument normalization: raw drift/vol where accepted, history
/// everywhere else.
fn resolve_params(
    id: ModelId,
    req: &SimulationRequest,
    series: Option<&PriceSeries>,
) -> SimResult<CalibratedParams> {
    match id {
        ModelId::Gbm => match (req.mu, req.sigma) {
            (Some(mu), Some(sigma)) => Ok(CalibratedParams::Gbm(GbmParams::new(mu, sigma)?)),
            _ => {
                let series = require_series(id, series)?;
                Ok(CalibratedParams::Gbm(GbmParams::estimate(series)?))
            }
        },
        ModelId::Heston => {
            let (mu, sigma) = raw_or_annualized(req, series)?;
            Ok(CalibratedParams::Heston(HestonParams::from_base_sigma(
                mu,
                sigma,
                &req.options.heston,
            )?))
        }
        ModelId::JumpDiffusion => {
            // Raw drift/vol default to zero, matching the historical contract
            let (mu, sigma) = match raw_or_annualized(req, series) {
                Ok(pair) => pair,
                Err(_) => (req.mu.unwrap_or(0.0), req.sigma.unwrap_or(0.0)),
            };
            Ok(CalibratedParams::JumpDiffusion(JumpDiffusionParams::new(
                mu,
                sigma,
                req.options.jump.jump_lambda,
                req.options.jump.kind,
            )?))
        }
        _ => {
            let series = require_series(id, series)?;
            estimate(id.as_str(), series, &req.config, &req.options)
        }
    }
}

fn require_series<'a>(id: ModelId, series: Option<&'a PriceSeries>) -> SimResult<&'a PriceSeries> {
    series.ok_or_else(|| SimError::InvalidConfiguration {
        field: "historical".to_string(),
        reason: format!("model '{}' requires a price history", id.as_str()),
    })
}

fn raw_or_annualized(
    req: &SimulationRequest,
    series: Option<&PriceSeries>,
) -> SimResult<(f64, f64)> {
    if let (Some(mu), Some(sigma)) = (req.mu, req.sigma) {
        return Ok((mu, sigma));
    }
    let series = series.ok_or_else(|| SimError::InvalidConfiguration {
        field: "mu/sigma".to_string(),
        reason: "supply raw drift/vol or a price history to derive them".to_string(),
    })?;
    annualized_moments(series)
}

/// Daily log-return moments scaled to the annualized clock.
fn annualized_moments(series: &PriceSeries) -> SimResult<(f64, f64)> {
    series.require_len("moments", 3)?;
    let mu = series.mean_log_return() * TRADING_DAYS;
    let sigma = series.std_log_return() * TRADING_DAYS.sqrt();
    Ok((mu, sigma))
}

fn collect_diagnostics(params: &CalibratedParams) -> Vec<(String, String)> {
    let mut diag = vec![("model".to_string(), params.model_name().to_string())];
    let mut push = |k: &str, v: String| diag.push((k.to_string(), v));

    match params {
        CalibratedParams::Gbm(p) => {
            push("mu", format!("{}", p.mu));
            push("sigma", format!("{}", p.sigma));
        }
        CalibratedParams::Ou(p) => {
            push("theta", format!("{}", p.theta));
            push("mu", format!("{}", p.mu));
            push("sigma", format!("{}", p.sigma));
            push("phi", format!("{}", p.phi));
            push("half_life", format!("{}", p.half_life));
        }
        CalibratedParams::Heston(p) => {
            push("v0", format!("{}", p.v0));
            push("kappa", format!("{}", p.kappa));
            push("theta", format!("{}", p.theta));
            push("vol_of_vol", format!("{}", p.vol_of_vol));
            push("rho", format!("{}", p.rho));
        }
        CalibratedParams::JumpDiffusion(p) => {
            push("mu", format!("{}", p.mu));
            push("sigma", format!("{}", p.sigma));
            push("jump_lambda", format!("{}", p.jump_lambda));
            push("compensator", format!("{}", p.compensator()));
            let kind = match p.kind {
                JumpKind::Merton { .. } => "merton",
                JumpKind::Kou { .. } => "kou",
            };
            push("jump_model", kind.to_string());
        }
        CalibratedParams::Garch(p) => {
            push("omega", format!("{}", p.omega));
            push("alpha", format!("{}", p.alpha));
            push("beta", format!("{}", p.beta));
            push("last_variance", format!("{}", p.last_variance));
            push("long_run_variance", format!("{}", p.long_run_variance()));
        }
        CalibratedParams::Hmm(p) => {
            push("n_states", format!("{}", p.n_states()));
            for s in 0..p.n_states() {
                push(&format!("state_{}_mu", s), format!("{}", p.mu[s]));
                push(&format!("state_{}_sigma", s), format!("{}", p.sigma[s]));
            }
        }
        CalibratedParams::KalmanWalk(p) => {
            push("noise_scale", format!("{}", p.noise_scale));
            push("filtered_last", format!("{}", p.filtered_last()));
            push("space", "level".to_string());
        }
        CalibratedParams::ResidualMlp(p) => {
            push("window", format!("{}", p.seed_window.len()));
            push("residual_std", format!("{}", p.residual_std));
            push("target_mean", format!("{}", p.target_mean));
            push("target_std", format!("{}", p.target_std));
        }
    }
    diag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_round_trip() {
        for id in ModelId::all() {
            assert_eq!(ModelId::parse(id.as_str()).unwrap(), id);
        }
    }

    #[test]
    fn test_unknown_model() {
        assert!(matches!(
            ModelId::parse("garhc"),
            Err(SimError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_history_demanding_models_reject_bare_request() {
        for name in ["ou", "garch", "hmm", "kalman", "residual_mlp"] {
            let req = SimulationRequest::new(name, SimulationConfig::default());
            assert!(
                matches!(run(&req), Err(SimError::InvalidConfiguration { .. })),
                "model {} accepted a request without history",
                name
            );
        }
    }

    #[test]
    fn test_gbm_raw_params_request() {
        let req = SimulationRequest::new(
            "gbm",
            SimulationConfig {
                num_paths: 50,
                ..Default::default()
            },
        )
        .with_drift_vol(0.0, 0.01);
        // Raw-parameter GBM still needs a spot
        assert!(run(&req).is_err());

        let req = SimulationRequest {
            spot: Some(100.0),
            ..req
        };
        let out = run(&req).unwrap();
        assert_eq!(out.model, "gbm");
        assert_eq!(out.ensemble.shape(), (50, 31));
        assert!(out.diagnostics.iter().any(|(k, _)| k == "sigma"));
    }
}

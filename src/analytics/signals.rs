// src/analytics/signals.rs
//! Decision-support signals derived from a path ensemble
//!
//! Everything here is a pure function of a `PathEnsemble` (plus an optional
//! spot override): empirical percentiles, threshold-crossing probabilities,
//! tail risk, first-passage statistics, scenario classification, cross-model
//! agreement and a lightweight confidence score, assembled into one
//! `SignalReport` for the caller.

use crate::math_utils::percentile;
use crate::mc::ensemble::PathEnsemble;
use bitflags::bitflags;
use std::f64;

pub const DEFAULT_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Bucket thresholds on the terminal ratio ST/S0
pub const DEFAULT_BULL_THRESHOLD: f64 = 1.2;
pub const DEFAULT_BEAR_THRESHOLD: f64 = 0.9;

bitflags! {
    /// Optional sections of the signal report. Terminal percentiles are
    /// always computed; everything else can be switched off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReportSections: u32 {
        const STEPWISE       = 1 << 0;
        const PROB_CHECKS    = 1 << 1;
        const TAIL_RISK      = 1 << 2;
        const SCENARIO       = 1 << 3;
        const CONFIDENCE     = 1 << 4;
        const TIME_TO_TARGET = 1 << 5;
    }
}

impl Default for ReportSections {
    fn default() -> Self {
        ReportSections::STEPWISE
            | ReportSections::PROB_CHECKS
            | ReportSections::TAIL_RISK
            | ReportSections::SCENARIO
            | ReportSections::CONFIDENCE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Bull,
    Flat,
    Bear,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Bull => "bull",
            Bucket::Flat => "flat",
            Bucket::Bear => "bear",
        }
    }
}

/// Fixed bucket → action lookup
pub fn map_bucket_to_action(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Bull => "increase_exposure",
        Bucket::Flat => "hold",
        Bucket::Bear => "reduce_exposure_or_hedge",
    }
}

/// One percentile's trajectory across time steps
#[derive(Debug, Clone)]
pub struct PercentileSeries {
    pub pct: f64,
    pub values: Vec<f64>,
}

/// Per-step percentile curves across the ensemble.
pub fn compute_percentiles(ens: &PathEnsemble, percentiles: &[f64]) -> Vec<PercentileSeries> {
    let (_, cols) = ens.shape();
    percentiles
        .iter()
        .map(|&pct| {
            let values = (0..cols)
                .map(|t| {
                    let col: Vec<f64> = ens.step_values(t).to_vec();
                    percentile(&col, pct)
                })
                .collect();
            PercentileSeries { pct, values }
        })
        .collect()
}

/// P(terminal value > threshold)
pub fn prob_exceed(ens: &PathEnsemble, threshold: f64) -> f64 {
    let terminals = ens.terminal_values();
    let hits = terminals.iter().filter(|&&v| v > threshold).count();
    hits as f64 / terminals.len() as f64
}

/// P(terminal value < threshold)
pub fn prob_below(ens: &PathEnsemble, threshold: f64) -> f64 {
    let terminals = ens.terminal_values();
    let hits = terminals.iter().filter(|&&v| v < threshold).count();
    hits as f64 / terminals.len() as f64
}

/// Conditional value at risk of the terminal distribution.
///
/// Losses are max(S0 - ST, 0); the worst ceil((1-α)·n) of them (at least one)
/// are averaged.
pub fn cvar(ens: &PathEnsemble, alpha: f64, s0: Option<f64>) -> f64 {
    let s0 = s0.unwrap_or_else(|| ens.spot());
    let mut losses: Vec<f64> = ens
        .terminal_values()
        .iter()
        .map(|&st| (s0 - st).max(0.0))
        .collect();
    losses.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let tail = (((1.0 - alpha) * losses.len() as f64).ceil() as usize).max(1);
    let tail = tail.min(losses.len());
    losses[..tail].iter().sum::<f64>() / tail as f64
}

/// Per path, the first step index at or past the target; `None` if the path
/// never crosses within the horizon. Crossing is `>=` for `Above`, `<=` for
/// `Below`, and column 0 counts.
pub fn first_passage_times(
    ens: &PathEnsemble,
    target: f64,
    direction: Direction,
) -> Vec<Option<usize>> {
    (0..ens.num_paths())
        .map(|i| {
            let path = ens.path(i);
            path.iter().position(|&v| match direction {
                Direction::Above => v >= target,
                Direction::Below => v <= target,
            })
        })
        .collect()
}

/// First-passage histogram summary
#[derive(Debug, Clone)]
pub struct TimeToTarget {
    pub pct_hit: f64,
    pub mean_time: Option<f64>,
    pub median_time: Option<f64>,
    /// (step index, number of paths first crossing there), ascending by step
    pub counts: Vec<(usize, usize)>,
}

pub fn time_to_target_distribution(
    ens: &PathEnsemble,
    target: f64,
    direction: Direction,
) -> TimeToTarget {
    let times = first_passage_times(ens, target, direction);
    let total = times.len();
    let hit_times: Vec<usize> = times.into_iter().flatten().collect();

    if hit_times.is_empty() {
        return TimeToTarget {
            pct_hit: 0.0,
            mean_time: None,
            median_time: None,
            counts: Vec::new(),
        };
    }

    let as_f64: Vec<f64> = hit_times.iter().map(|&t| t as f64).collect();
    let mean_time = crate::math_utils::mean(&as_f64);
    let median_time = percentile(&as_f64, 50.0);

    let mut counts: Vec<(usize, usize)> = Vec::new();
    let mut sorted = hit_times.clone();
    sorted.sort_unstable();
    for t in sorted {
        match counts.last_mut() {
            Some((step, n)) if *step == t => *n += 1,
            _ => counts.push((t, 1)),
        }
    }

    TimeToTarget {
        pct_hit: hit_times.len() as f64 / total as f64,
        mean_time: Some(mean_time),
        median_time: Some(median_time),
        counts,
    }
}

/// Terminal-ratio classification of the ensemble
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub bull: f64,
    pub flat: f64,
    pub bear: f64,
    pub majority: Bucket,
    pub action: &'static str,
}

/// Bucket terminal outcomes by ST/S0. The majority is by plurality; ties
/// default to flat unless bull or bear strictly dominates both others.
pub fn scenario_bucket(
    ens: &PathEnsemble,
    s0: f64,
    bull_threshold: f64,
    bear_threshold: f64,
) -> ScenarioSummary {
    let terminals = ens.terminal_values();
    let n = terminals.len() as f64;
    let bull = terminals.iter().filter(|&&v| v / s0 >= bull_threshold).count() as f64 / n;
    let bear = terminals.iter().filter(|&&v| v / s0 <= bear_threshold).count() as f64 / n;
    let flat = 1.0 - (bull + bear);

    let majority = if bull > bear.max(flat) {
        Bucket::Bull
    } else if bear > bull.max(flat) {
        Bucket::Bear
    } else {
        Bucket::Flat
    };

    ScenarioSummary {
        bull,
        flat,
        bear,
        majority,
        action: map_bucket_to_action(majority),
    }
}

/// Cross-model directional agreement
#[derive(Debug, Clone)]
pub struct AgreementSummary {
    /// Per model: +1 bull, -1 bear, 0 neutral
    pub opinions: Vec<(String, i8)>,
    pub agreement_frac: f64,
    pub direction: Bucket,
}

/// Each model votes by comparing its median terminal value to its own median
/// initial value; the agreement fraction is the larger directional vote count
/// over the number of models.
pub fn model_agreement(models: &[(&str, &PathEnsemble)]) -> AgreementSummary {
    let mut opinions = Vec::with_capacity(models.len());
    let mut bulls = 0usize;
    let mut bears = 0usize;

    for (name, ens) in models {
        let terminals = ens.terminal_values();
        let median_terminal = percentile(&terminals, 50.0);
        let s0 = ens.spot();
        let vote: i8 = if median_terminal > s0 {
            1
        } else if median_terminal < s0 {
            -1
        } else {
            0
        };
        if vote > 0 {
            bulls += 1;
        } else if vote < 0 {
            bears += 1;
        }
        opinions.push((name.to_string(), vote));
    }

    let total = models.len();
    let agreement_frac = if total == 0 {
        0.0
    } else {
        bulls.max(bears) as f64 / total as f64
    };
    let direction = if bulls > bears {
        Bucket::Bull
    } else if bears > bulls {
        Bucket::Bear
    } else {
        Bucket::Flat
    };

    AgreementSummary {
        opinions,
        agreement_frac,
        direction,
    }
}

/// Ensemble-tightness confidence in [0, 1]: 1 minus the coefficient of
/// variation of terminal values, optionally discounted by a bootstrap
/// uncertainty factor.
pub fn signal_confidence(ens: &PathEnsemble, bootstrap_sigma: Option<f64>) -> f64 {
    let terminals = ens.terminal_values();
    if terminals.len() <= 1 {
        return 0.0;
    }
    let mean = crate::math_utils::mean(&terminals);
    let std = crate::math_utils::population_std(&terminals);
    let cv = if mean == 0.0 { 1.0 } else { std / mean.abs() };

    let mut conf = (1.0 - cv).max(0.0);
    if let Some(bs) = bootstrap_sigma {
        conf *= (1.0 - bs).max(0.0);
    }
    conf.clamp(0.0, 1.0)
}

/// Threshold-crossing probability check
#[derive(Debug, Clone)]
pub struct ProbCheck {
    pub label: &'static str,
    pub target: f64,
    pub prob: f64,
    pub triggered: bool,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub percentiles: Vec<f64>,
    /// Exceedance check: target ratio above spot, probability cutoff
    pub add_ratio: f64,
    pub add_cutoff: f64,
    /// Downside check: target ratio below spot, probability cutoff
    pub reduce_ratio: f64,
    pub reduce_cutoff: f64,
    pub bull_threshold: f64,
    pub bear_threshold: f64,
    pub cvar_alpha: f64,
    pub bootstrap_sigma: Option<f64>,
    /// Spot override; defaults to the ensemble's own column 0
    pub s0: Option<f64>,
    pub sections: ReportSections,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            add_ratio: 1.08,
            add_cutoff: 0.45,
            reduce_ratio: 0.968,
            reduce_cutoff: 0.35,
            bull_threshold: DEFAULT_BULL_THRESHOLD,
            bear_threshold: DEFAULT_BEAR_THRESHOLD,
            cvar_alpha: 0.95,
            bootstrap_sigma: None,
            s0: None,
            sections: ReportSections::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalReport {
    pub s0: f64,
    /// (percentile, terminal value)
    pub percentiles_final: Vec<(f64, f64)>,
    pub percentiles_stepwise: Option<Vec<PercentileSeries>>,
    pub prob_checks: Vec<ProbCheck>,
    pub tail_risk_cvar: Option<f64>,
    pub scenario: Option<ScenarioSummary>,
    pub suggested_actions: Vec<String>,
    pub confidence: Option<f64>,
    pub time_to_upside_target: Option<TimeToTarget>,
}

/// Assemble the full report from one ensemble.
pub fn generate_signal_report(ens: &PathEnsemble, cfg: &ReportConfig) -> SignalReport {
    let s0 = cfg.s0.unwrap_or_else(|| ens.spot());
    let sections = cfg.sections;

    let terminals = ens.terminal_values();
    let percentiles_final = cfg
        .percentiles
        .iter()
        .map(|&pct| (pct, percentile(&terminals, pct)))
        .collect();

    let percentiles_stepwise = sections
        .contains(ReportSections::STEPWISE)
        .then(|| compute_percentiles(ens, &cfg.percentiles));

    let mut prob_checks = Vec::new();
    let mut actions: Vec<String> = Vec::new();
    if sections.contains(ReportSections::PROB_CHECKS) {
        let add_target = s0 * cfg.add_ratio;
        let p_add = prob_exceed(ens, add_target);
        let add_triggered = p_add > cfg.add_cutoff;
        prob_checks.push(ProbCheck {
            label: "add",
            target: add_target,
            prob: p_add,
            triggered: add_triggered,
        });
        if add_triggered {
            actions.push("consider_add".to_string());
        }

        let reduce_target = s0 * cfg.reduce_ratio;
        let p_reduce = prob_below(ens, reduce_target);
        let reduce_triggered = p_reduce > cfg.reduce_cutoff;
        prob_checks.push(ProbCheck {
            label: "reduce",
            target: reduce_target,
            prob: p_reduce,
            triggered: reduce_triggered,
        });
        if reduce_triggered {
            actions.push("consider_reduce".to_string());
        }
    }
    if actions.is_empty() {
        actions.push("hold".to_string());
    }

    let tail_risk_cvar = sections
        .contains(ReportSections::TAIL_RISK)
        .then(|| cvar(ens, cfg.cvar_alpha, Some(s0)));

    let scenario = sections
        .contains(ReportSections::SCENARIO)
        .then(|| scenario_bucket(ens, s0, cfg.bull_threshold, cfg.bear_threshold));

    let confidence = sections
        .contains(ReportSections::CONFIDENCE)
        .then(|| signal_confidence(ens, cfg.bootstrap_sigma));

    let time_to_upside_target = sections
        .contains(ReportSections::TIME_TO_TARGET)
        .then(|| time_to_target_distribution(ens, s0 * cfg.add_ratio, Direction::Above));

    SignalReport {
        s0,
        percentiles_final,
        percentiles_stepwise,
        prob_checks,
        tail_risk_cvar,
        scenario,
        suggested_actions: actions,
        confidence,
        time_to_upside_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn toy_ensemble() -> PathEnsemble {
        // 4 paths from 100: strong rally, mild rally, flat, crash
        let data = vec![
            100.0, 115.0, 130.0, //
            100.0, 103.0, 106.0, //
            100.0, 100.0, 100.0, //
            100.0, 90.0, 80.0,
        ];
        PathEnsemble::from_array(Array2::from_shape_vec((4, 3), data).unwrap())
    }

    #[test]
    fn test_percentiles_monotone_across_pcts() {
        let ens = toy_ensemble();
        let series = compute_percentiles(&ens, &[5.0, 50.0, 95.0]);
        for t in 0..3 {
            assert!(series[0].values[t] <= series[1].values[t]);
            assert!(series[1].values[t] <= series[2].values[t]);
        }
    }

    #[test]
    fn test_prob_exceed_and_below() {
        let ens = toy_ensemble();
        assert!((prob_exceed(&ens, 105.0) - 0.5).abs() < 1e-12);
        assert!((prob_below(&ens, 100.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cvar_takes_worst_tail() {
        let ens = toy_ensemble();
        // alpha=0.95, 4 paths: tail size = ceil(0.05*4) = 1, worst loss = 20
        assert!((cvar(&ens, 0.95, None) - 20.0).abs() < 1e-12);
        // alpha=0.5: tail = 2 worst losses {20, 0} -> 10
        assert!((cvar(&ens, 0.5, None) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_bucket_proportions_sum_to_one() {
        let ens = toy_ensemble();
        let summary = scenario_bucket(&ens, 100.0, 1.2, 0.9);
        assert!((summary.bull + summary.flat + summary.bear - 1.0).abs() < 1e-12);
        assert_eq!(summary.majority, Bucket::Flat);
        assert_eq!(summary.action, "hold");
    }

    #[test]
    fn test_agreement_votes() {
        let ens = toy_ensemble();
        let summary = model_agreement(&[("a", &ens), ("b", &ens)]);
        // Median terminal is 103 > 100: both models vote bull
        assert_eq!(summary.direction, Bucket::Bull);
        assert!((summary.agreement_frac - 1.0).abs() < 1e-12);
        assert_eq!(summary.opinions.len(), 2);
    }

    #[test]
    fn test_confidence_bounds_and_discount() {
        let ens = toy_ensemble();
        let base = signal_confidence(&ens, None);
        assert!((0.0..=1.0).contains(&base));
        let discounted = signal_confidence(&ens, Some(0.5));
        assert!(discounted <= base);
        assert!((0.0..=1.0).contains(&discounted));
    }

    #[test]
    fn test_report_defaults_to_hold() {
        let ens = toy_ensemble();
        let report = generate_signal_report(&ens, &ReportConfig::default());
        assert!((report.s0 - 100.0).abs() < 1e-12);
        assert_eq!(report.suggested_actions, vec!["hold".to_string()]);
        assert_eq!(report.percentiles_final.len(), 5);
        assert!(report.percentiles_stepwise.is_some());
        assert!(report.tail_risk_cvar.is_some());
        assert!(report.time_to_upside_target.is_none());
    }

    #[test]
    fn test_report_advisories_trigger() {
        // All paths rally 20%: the add check must fire
        let data = vec![100.0, 110.0, 120.0, 100.0, 112.0, 121.0];
        let ens = PathEnsemble::from_array(Array2::from_shape_vec((2, 3), data).unwrap());
        let report = generate_signal_report(&ens, &ReportConfig::default());
        assert!(report
            .suggested_actions
            .contains(&"consider_add".to_string()));
        assert!(!report.suggested_actions.contains(&"hold".to_string()));
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MarkowitzError;
use crate::types::Rate;
use crate::MarkowitzResult;

pub const DEFAULT_RISK_FREE_RATE: Rate = 0.02;
pub const DEFAULT_NUM_PORTFOLIOS: u32 = 5_000;
pub const DEFAULT_PERIODS_PER_YEAR: u32 = 252;

fn default_risk_free_rate() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

fn default_num_portfolios() -> u32 {
    DEFAULT_NUM_PORTFOLIOS
}

fn default_periods_per_year() -> u32 {
    DEFAULT_PERIODS_PER_YEAR
}

fn default_max_iterations() -> u32 {
    50_000
}

fn default_tolerance() -> f64 {
    1e-7
}

/// Iteration budget and stopping tolerance for the constrained solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Stationarity threshold on the projected-gradient step (infinity norm).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Configuration for a single analysis run.
///
/// Every field has a default so partial YAML/JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// First date of the historical window (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    /// Last date of the historical window (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Annual risk-free rate used in every Sharpe ratio.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    /// Number of random portfolios drawn for the frontier.
    #[serde(default = "default_num_portfolios")]
    pub num_portfolios: u32,
    /// Annualization constant (252 for daily data).
    #[serde(default = "default_periods_per_year")]
    pub trading_periods_per_year: u32,
    /// Seed for the frontier sampler. `None` draws from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Keep per-sample weight vectors in the frontier output.
    #[serde(default)]
    pub include_weights: bool,
    #[serde(default)]
    pub solver: SolverSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            start: None,
            end: None,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            num_portfolios: DEFAULT_NUM_PORTFOLIOS,
            trading_periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            seed: None,
            include_weights: false,
            solver: SolverSettings::default(),
        }
    }
}

impl AnalysisConfig {
    /// Reject configurations that cannot produce meaningful results.
    pub fn validate(&self) -> MarkowitzResult<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(MarkowitzError::config(
                "risk_free_rate",
                "Must be a finite number",
            ));
        }
        if self.risk_free_rate <= -1.0 {
            return Err(MarkowitzError::config(
                "risk_free_rate",
                format!("Must be greater than -1, got {}", self.risk_free_rate),
            ));
        }
        if self.num_portfolios == 0 {
            return Err(MarkowitzError::config(
                "num_portfolios",
                "Must be positive",
            ));
        }
        if self.trading_periods_per_year == 0 {
            return Err(MarkowitzError::config(
                "trading_periods_per_year",
                "Must be positive",
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(MarkowitzError::config(
                    "start",
                    format!("Start date {} is after end date {}", start, end),
                ));
            }
        }
        if self.solver.max_iterations == 0 {
            return Err(MarkowitzError::config(
                "solver.max_iterations",
                "Must be positive",
            ));
        }
        if !(self.solver.tolerance > 0.0 && self.solver.tolerance.is_finite()) {
            return Err(MarkowitzError::config(
                "solver.tolerance",
                "Must be a positive finite number",
            ));
        }
        Ok(())
    }

    pub fn periods_per_year(&self) -> f64 {
        f64::from(self.trading_periods_per_year)
    }

    /// Checks the risk-free rate against estimated returns. See
    /// [`check_excess_return`].
    pub fn validate_excess_return(&self, mean_returns: &[f64]) -> MarkowitzResult<()> {
        check_excess_return(mean_returns, self.risk_free_rate)
    }
}

/// At least one asset must be expected to beat the risk-free rate; otherwise no
/// allocation improves on holding the risk-free asset.
pub fn check_excess_return(mean_returns: &[f64], risk_free_rate: Rate) -> MarkowitzResult<()> {
    let best = mean_returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if best <= risk_free_rate {
        return Err(MarkowitzError::config(
            "risk_free_rate",
            format!(
                "Rate {} is not below the highest expected return {:.6}; no portfolio has a positive excess return",
                risk_free_rate, best
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.risk_free_rate, 0.02);
        assert_eq!(cfg.num_portfolios, 5000);
        assert_eq!(cfg.trading_periods_per_year, 252);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"num_portfolios": 100, "seed": 7}"#).unwrap();
        assert_eq!(
            cfg,
            AnalysisConfig {
                num_portfolios: 100,
                seed: Some(7),
                ..AnalysisConfig::default()
            }
        );
    }

    #[test]
    fn test_zero_portfolios_rejected() {
        let cfg = AnalysisConfig {
            num_portfolios: 0,
            ..AnalysisConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        match err {
            MarkowitzError::Configuration { field, .. } => assert_eq!(field, "num_portfolios"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inverted_window_rejected() {
        let cfg = AnalysisConfig {
            start: NaiveDate::from_ymd_opt(2024, 6, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..AnalysisConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_non_finite_rate_rejected() {
        let cfg = AnalysisConfig {
            risk_free_rate: f64::NAN,
            ..AnalysisConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_risk_free_rate_must_leave_excess_return() {
        let cfg = AnalysisConfig {
            risk_free_rate: 0.5,
            ..AnalysisConfig::default()
        };
        let err = cfg.validate_excess_return(&[0.10, 0.20]).unwrap_err();
        match err {
            MarkowitzError::Configuration { field, .. } => assert_eq!(field, "risk_free_rate"),
            other => panic!("unexpected error: {other}"),
        }
        // equal to the best return is still no improvement
        assert!(check_excess_return(&[0.10, 0.20], 0.20).is_err());
        assert!(AnalysisConfig::default()
            .validate_excess_return(&[0.01, 0.03])
            .is_ok());
    }
}

use serde::{Deserialize, Serialize};

use crate::error::MarkowitzError;
use crate::MarkowitzResult;

/// Portfolio risk at or below this is treated as zero.
pub const RISK_EPSILON: f64 = 1e-12;

/// Whether an objective is to be minimized or maximized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Map a raw objective value (or gradient component) into the
    /// minimization frame used by solvers.
    pub fn orient(self, value: f64) -> f64 {
        match self {
            Direction::Minimize => value,
            Direction::Maximize => -value,
        }
    }
}

/// A scalar function of a weight vector.
///
/// `value` and `gradient` return `None` where the function is undefined
/// (for example a Sharpe ratio at zero risk).
pub trait Objective: Sync {
    fn name(&self) -> &str;
    fn direction(&self) -> Direction;
    fn value(&self, weights: &[f64]) -> Option<f64>;
    fn gradient(&self, weights: &[f64]) -> Option<Vec<f64>>;
}

/// Sharpe ratio `(w·μ - r_f) / sqrt(w'Σw)`, maximized.
#[derive(Debug, Clone, Copy)]
pub struct SharpeRatio<'a> {
    pub mean_returns: &'a [f64],
    pub covariance: &'a [Vec<f64>],
    pub risk_free_rate: f64,
}

/// Portfolio volatility `sqrt(w'Σw)`, minimized.
#[derive(Debug, Clone, Copy)]
pub struct Volatility<'a> {
    pub covariance: &'a [Vec<f64>],
}

impl Objective for SharpeRatio<'_> {
    fn name(&self) -> &str {
        "sharpe_ratio"
    }

    fn direction(&self) -> Direction {
        Direction::Maximize
    }

    fn value(&self, weights: &[f64]) -> Option<f64> {
        let ret = portfolio_return(weights, self.mean_returns);
        let risk = volatility(weights, self.covariance);
        sharpe_ratio(ret, risk, self.risk_free_rate)
    }

    fn gradient(&self, weights: &[f64]) -> Option<Vec<f64>> {
        // dS/dw = μ/σ - (w·μ - r_f) Σw / σ³
        let sigma_w = mat_vec_multiply(self.covariance, weights);
        let risk = vec_dot(weights, &sigma_w).max(0.0).sqrt();
        if risk <= RISK_EPSILON {
            return None;
        }
        let excess = portfolio_return(weights, self.mean_returns) - self.risk_free_rate;
        let risk_cubed = risk * risk * risk;
        Some(
            self.mean_returns
                .iter()
                .zip(sigma_w.iter())
                .map(|(mu, sw)| mu / risk - excess * sw / risk_cubed)
                .collect(),
        )
    }
}

impl Objective for Volatility<'_> {
    fn name(&self) -> &str {
        "volatility"
    }

    fn direction(&self) -> Direction {
        Direction::Minimize
    }

    fn value(&self, weights: &[f64]) -> Option<f64> {
        Some(volatility(weights, self.covariance))
    }

    fn gradient(&self, weights: &[f64]) -> Option<Vec<f64>> {
        // dσ/dw = Σw / σ; zero risk is the global minimum, so 0 is a valid
        // subgradient there.
        let sigma_w = mat_vec_multiply(self.covariance, weights);
        let risk = vec_dot(weights, &sigma_w).max(0.0).sqrt();
        if risk <= RISK_EPSILON {
            return Some(vec![0.0; weights.len()]);
        }
        Some(sigma_w.iter().map(|sw| sw / risk).collect())
    }
}

/// Return, risk and Sharpe ratio of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub expected_return: f64,
    pub risk: f64,
    /// `None` when risk is zero and the ratio is undefined.
    pub sharpe_ratio: Option<f64>,
}

impl PortfolioMetrics {
    pub fn require_sharpe(&self) -> MarkowitzResult<f64> {
        self.sharpe_ratio.ok_or_else(|| {
            MarkowitzError::DegenerateInput(
                "Sharpe ratio is undefined for a zero-risk portfolio".into(),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Expected return `w·μ`.
pub fn portfolio_return(weights: &[f64], mean_returns: &[f64]) -> f64 {
    vec_dot(weights, mean_returns)
}

/// Variance `w'Σw`, floored at zero against rounding.
pub fn portfolio_variance(weights: &[f64], covariance: &[Vec<f64>]) -> f64 {
    let sigma_w = mat_vec_multiply(covariance, weights);
    vec_dot(weights, &sigma_w).max(0.0)
}

/// Volatility `sqrt(w'Σw)`.
pub fn volatility(weights: &[f64], covariance: &[Vec<f64>]) -> f64 {
    portfolio_variance(weights, covariance).sqrt()
}

/// Sharpe ratio with zero-risk guard.
pub fn sharpe_ratio(expected_return: f64, risk: f64, risk_free_rate: f64) -> Option<f64> {
    if risk <= RISK_EPSILON {
        None
    } else {
        Some((expected_return - risk_free_rate) / risk)
    }
}

/// `-(w·μ - r_f) / sqrt(w'Σw)`, the Sharpe ratio in minimization form.
///
/// Returns `+∞` at zero risk so a minimizer never selects such a point.
pub fn negative_sharpe(
    weights: &[f64],
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
) -> f64 {
    let objective = SharpeRatio {
        mean_returns,
        covariance,
        risk_free_rate,
    };
    objective
        .value(weights)
        .map(|s| objective.direction().orient(s))
        .unwrap_or(f64::INFINITY)
}

pub fn portfolio_metrics(
    weights: &[f64],
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
) -> PortfolioMetrics {
    let expected_return = portfolio_return(weights, mean_returns);
    let risk = volatility(weights, covariance);
    PortfolioMetrics {
        expected_return,
        risk,
        sharpe_ratio: sharpe_ratio(expected_return, risk, risk_free_rate),
    }
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

pub(crate) fn mat_vec_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

pub(crate) fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

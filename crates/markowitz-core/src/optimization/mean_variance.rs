use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::objective::{mat_vec_multiply, portfolio_metrics, Objective, SharpeRatio, Volatility};
use super::solver::{ProjectedGradient, Solver, WeightConstraints};
use crate::config::{check_excess_return, AnalysisConfig};
use crate::error::MarkowitzError;
use crate::estimation::{AssetStatistics, AssetSummary};
use crate::types::{with_metadata, ComputationOutput};
use crate::MarkowitzResult;

/// Constraint tolerance a returned weight vector must meet.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;
/// Weights above this share trigger a concentration warning.
const CONCENTRATION_WARNING: f64 = 0.40;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to mean-variance optimization from precomputed statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanVarianceInput {
    /// Asset identifiers.
    pub asset_names: Vec<String>,
    /// Annualized expected returns per asset.
    pub expected_returns: Vec<f64>,
    /// N x N annualized covariance matrix.
    pub covariance_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub config: AnalysisConfig,
}

/// A single asset weight with risk/return contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub ticker: String,
    pub weight: f64,
    /// Weight times marginal risk contribution; sums to portfolio risk.
    pub contribution_to_risk: f64,
    /// Weight times expected return; sums to portfolio return.
    pub contribution_to_return: f64,
}

/// A solved portfolio with its performance metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPoint {
    pub weights: Vec<AssetWeight>,
    pub expected_return: f64,
    pub risk: f64,
    /// `None` for a zero-risk portfolio.
    pub sharpe_ratio: Option<f64>,
    pub iterations: u32,
}

impl PortfolioPoint {
    /// Bare weight vector in universe order.
    pub fn weight_vector(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.weight).collect()
    }
}

/// Result of one optimization call. A failure is scoped to the call and does
/// not invalidate the rest of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PortfolioOutcome {
    Converged(PortfolioPoint),
    Failed { reason: String },
}

impl PortfolioOutcome {
    pub fn from_result(result: MarkowitzResult<PortfolioPoint>) -> Self {
        match result {
            Ok(point) => PortfolioOutcome::Converged(point),
            Err(e) => PortfolioOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    pub fn point(&self) -> Option<&PortfolioPoint> {
        match self {
            PortfolioOutcome::Converged(p) => Some(p),
            PortfolioOutcome::Failed { .. } => None,
        }
    }
}

/// Output of mean-variance optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanVarianceOutput {
    pub assets: Vec<AssetSummary>,
    /// Maximum Sharpe ratio portfolio.
    pub optimal_portfolio: PortfolioOutcome,
    /// Minimum volatility portfolio.
    pub minimum_risk_portfolio: PortfolioOutcome,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Equal weighting, the neutral feasible starting point.
pub fn equal_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// Long-only, fully invested portfolio maximizing the Sharpe ratio.
pub fn optimal_portfolio(
    stats: &AssetStatistics,
    risk_free_rate: f64,
    solver: &dyn Solver,
) -> MarkowitzResult<PortfolioPoint> {
    check_excess_return(&stats.mean_returns, risk_free_rate)?;
    let objective = SharpeRatio {
        mean_returns: &stats.mean_returns,
        covariance: &stats.covariance,
        risk_free_rate,
    };
    let point = solve(&objective, stats, risk_free_rate, solver)?;
    point.sharpe_ratio.ok_or_else(|| {
        MarkowitzError::DegenerateInput("Optimal portfolio has zero risk".into())
    })?;
    Ok(point)
}

/// Long-only, fully invested portfolio minimizing volatility.
pub fn minimum_risk_portfolio(
    stats: &AssetStatistics,
    risk_free_rate: f64,
    solver: &dyn Solver,
) -> MarkowitzResult<PortfolioPoint> {
    let objective = Volatility {
        covariance: &stats.covariance,
    };
    solve(&objective, stats, risk_free_rate, solver)
}

/// Optimize both portfolios from precomputed annualized statistics.
pub fn optimize_mean_variance(
    input: &MeanVarianceInput,
) -> MarkowitzResult<ComputationOutput<MeanVarianceOutput>> {
    let start = Instant::now();
    input.config.validate()?;

    let stats = AssetStatistics::from_annualized(
        input.asset_names.clone(),
        input.expected_returns.clone(),
        input.covariance_matrix.clone(),
        input.config.periods_per_year(),
    )?;
    input.config.validate_excess_return(&stats.mean_returns)?;
    let solver = ProjectedGradient::new(input.config.solver);
    let rf = input.config.risk_free_rate;

    let optimal = PortfolioOutcome::from_result(optimal_portfolio(&stats, rf, &solver));
    let minimum_risk = PortfolioOutcome::from_result(minimum_risk_portfolio(&stats, rf, &solver));
    let warnings = portfolio_warnings(&optimal, &minimum_risk);

    let output = MeanVarianceOutput {
        assets: stats.asset_summaries(),
        optimal_portfolio: optimal,
        minimum_risk_portfolio: minimum_risk,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Markowitz Mean-Variance Optimization (projected gradient, long-only)",
        &serde_json::json!({
            "n_assets": stats.num_assets(),
            "risk_free_rate": rf,
            "max_iterations": input.config.solver.max_iterations,
            "tolerance": input.config.solver.tolerance,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Warnings for failed or concentrated portfolios.
pub(crate) fn portfolio_warnings(
    optimal: &PortfolioOutcome,
    minimum_risk: &PortfolioOutcome,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for (label, outcome) in [("Optimal", optimal), ("Minimum-risk", minimum_risk)] {
        match outcome {
            PortfolioOutcome::Failed { reason } => {
                warnings.push(format!("{} portfolio unavailable: {}", label, reason));
            }
            PortfolioOutcome::Converged(point) => {
                for aw in &point.weights {
                    if point.weights.len() > 1 && aw.weight > CONCENTRATION_WARNING {
                        warnings.push(format!(
                            "Concentrated position in {} portfolio: {} has weight {:.4}",
                            label, aw.ticker, aw.weight
                        ));
                    }
                }
            }
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
// Core routine
// ---------------------------------------------------------------------------

fn solve(
    objective: &dyn Objective,
    stats: &AssetStatistics,
    risk_free_rate: f64,
    solver: &dyn Solver,
) -> MarkowitzResult<PortfolioPoint> {
    let n = stats.num_assets();
    let constraints = WeightConstraints::long_only();
    constraints.validate(n)?;

    // A single asset has exactly one feasible allocation.
    let (weights, iterations) = if n == 1 {
        (vec![1.0], 0)
    } else {
        let m = solver.minimize(objective, &equal_weights(n), &constraints)?;
        if !m.converged {
            warn!(
                objective = objective.name(),
                iterations = m.iterations,
                delta = m.last_delta,
                "optimization did not converge"
            );
            return Err(MarkowitzError::ConvergenceFailure {
                function: objective.name().to_string(),
                iterations: m.iterations,
                last_delta: m.last_delta,
            });
        }
        (m.weights, m.iterations)
    };

    if !constraints.is_satisfied(&weights, WEIGHT_TOLERANCE) {
        let total: f64 = weights.iter().sum();
        return Err(MarkowitzError::ConvergenceFailure {
            function: format!("{} (constraint check)", objective.name()),
            iterations,
            last_delta: (total - constraints.budget).abs(),
        });
    }

    let metrics = portfolio_metrics(
        &weights,
        &stats.mean_returns,
        &stats.covariance,
        risk_free_rate,
    );
    info!(
        objective = objective.name(),
        iterations,
        expected_return = metrics.expected_return,
        risk = metrics.risk,
        "portfolio solved"
    );

    let sigma_w = mat_vec_multiply(&stats.covariance, &weights);
    let allocations = (0..n)
        .map(|i| AssetWeight {
            ticker: stats.tickers[i].clone(),
            weight: weights[i],
            contribution_to_risk: if metrics.risk > 0.0 {
                weights[i] * sigma_w[i] / metrics.risk
            } else {
                0.0
            },
            contribution_to_return: weights[i] * stats.mean_returns[i],
        })
        .collect();

    Ok(PortfolioPoint {
        weights: allocations,
        expected_return: metrics.expected_return,
        risk: metrics.risk,
        sharpe_ratio: metrics.sharpe_ratio,
        iterations,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn uncorrelated_pair() -> AssetStatistics {
        AssetStatistics::from_annualized(
            vec!["A".into(), "B".into()],
            vec![0.10, 0.20],
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            252.0,
        )
        .unwrap()
    }

    fn three_assets() -> AssetStatistics {
        let v1: f64 = 0.15;
        let v2: f64 = 0.20;
        let v3: f64 = 0.25;
        let c12 = 0.3 * v1 * v2;
        let c13 = 0.1 * v1 * v3;
        let c23 = 0.5 * v2 * v3;
        AssetStatistics::from_annualized(
            vec!["Equity".into(), "Bonds".into(), "Commodities".into()],
            vec![0.10, 0.04, 0.07],
            vec![
                vec![v1 * v1, c12, c13],
                vec![c12, v2 * v2, c23],
                vec![c13, c23, v3 * v3],
            ],
            252.0,
        )
        .unwrap()
    }

    fn solver() -> ProjectedGradient {
        ProjectedGradient::default()
    }

    fn assert_feasible(point: &PortfolioPoint) {
        let w = point.weight_vector();
        let total: f64 = w.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "weights sum to {}", total);
        for x in &w {
            assert!(*x >= 0.0 && *x <= 1.0, "weight {} out of bounds", x);
        }
    }

    // ------------------------------------------------------------------
    // 1. Inverse-variance solution for uncorrelated assets
    // ------------------------------------------------------------------
    #[test]
    fn test_minimum_risk_uncorrelated_pair() {
        let p = minimum_risk_portfolio(&uncorrelated_pair(), 0.02, &solver()).unwrap();
        let w = p.weight_vector();
        let inv = [1.0 / 0.04, 1.0 / 0.09];
        let expected_a = inv[0] / (inv[0] + inv[1]);
        assert!((w[0] - expected_a).abs() < 1e-4, "w = {:?}", w);
        assert!((w[0] - 0.692).abs() < 1e-3);
        assert!((w[1] - 0.308).abs() < 1e-3);
        assert!((p.expected_return - 0.130).abs() < 1e-3);
        assert!((p.risk - 0.166).abs() < 1e-3);
        assert_feasible(&p);
    }

    // ------------------------------------------------------------------
    // 2. Tangency portfolio for the same pair is the equal mix
    // ------------------------------------------------------------------
    #[test]
    fn test_optimal_uncorrelated_pair() {
        // Σ^-1 (μ - r_f) = [0.08/0.04, 0.18/0.09] = [2, 2] -> [0.5, 0.5]
        let p = optimal_portfolio(&uncorrelated_pair(), 0.02, &solver()).unwrap();
        let w = p.weight_vector();
        assert!((w[0] - 0.5).abs() < 1e-4, "w = {:?}", w);
        let expected_sharpe = 0.13 / 0.0325f64.sqrt();
        assert!((p.sharpe_ratio.unwrap() - expected_sharpe).abs() < 1e-6);
        assert_feasible(&p);
    }

    // ------------------------------------------------------------------
    // 3. Minimum risk never exceeds optimal risk
    // ------------------------------------------------------------------
    #[test]
    fn test_min_risk_below_optimal_risk() {
        let stats = three_assets();
        let opt = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
        let min = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
        assert!(min.risk <= opt.risk + 1e-9);
        assert!(opt.sharpe_ratio.unwrap() >= min.sharpe_ratio.unwrap() - 1e-9);
        assert_feasible(&opt);
        assert_feasible(&min);
    }

    // ------------------------------------------------------------------
    // 4. Optimal Sharpe beats every vertex and the equal mix
    // ------------------------------------------------------------------
    #[test]
    fn test_optimal_sharpe_dominates_simple_portfolios() {
        let stats = three_assets();
        let opt = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
        let best = opt.sharpe_ratio.unwrap();
        let mut candidates = vec![equal_weights(3)];
        for i in 0..3 {
            let mut e = vec![0.0; 3];
            e[i] = 1.0;
            candidates.push(e);
        }
        for w in candidates {
            let m = portfolio_metrics(&w, &stats.mean_returns, &stats.covariance, 0.02);
            assert!(best >= m.sharpe_ratio.unwrap() - 1e-9);
        }
    }

    // ------------------------------------------------------------------
    // 5. Single asset: the whole budget, exactly
    // ------------------------------------------------------------------
    #[test]
    fn test_single_asset() {
        let stats = AssetStatistics::from_annualized(
            vec!["ONLY".into()],
            vec![0.08],
            vec![vec![0.0225]],
            252.0,
        )
        .unwrap();
        let opt = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
        let min = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
        assert_eq!(opt.weight_vector(), vec![1.0]);
        assert_eq!(min.weight_vector(), vec![1.0]);
        assert!((opt.expected_return - 0.08).abs() < 1e-15);
        assert!((opt.risk - 0.15).abs() < 1e-15);
        assert!((opt.sharpe_ratio.unwrap() - 0.4).abs() < 1e-12);
    }

    // ------------------------------------------------------------------
    // 6. Budget exhaustion surfaces as a convergence failure
    // ------------------------------------------------------------------
    #[test]
    fn test_convergence_failure_is_explicit() {
        let tight = ProjectedGradient::new(crate::config::SolverSettings {
            max_iterations: 1,
            tolerance: 1e-15,
        });
        let res = minimum_risk_portfolio(&three_assets(), 0.02, &tight);
        match res {
            Err(MarkowitzError::ConvergenceFailure { function, .. }) => {
                assert_eq!(function, "volatility")
            }
            other => panic!("expected convergence failure, got {:?}", other),
        }
    }

    // ------------------------------------------------------------------
    // 7. Zero-risk universe cannot produce a Sharpe-optimal portfolio
    // ------------------------------------------------------------------
    #[test]
    fn test_zero_risk_is_degenerate() {
        let stats = AssetStatistics::from_annualized(
            vec!["A".into(), "B".into()],
            vec![0.03, 0.04],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            252.0,
        )
        .unwrap();
        assert!(matches!(
            optimal_portfolio(&stats, 0.02, &solver()),
            Err(MarkowitzError::DegenerateInput(_))
        ));
        // Minimum risk is still well defined: zero.
        let min = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
        assert_eq!(min.risk, 0.0);
        assert_eq!(min.sharpe_ratio, None);
    }

    // ------------------------------------------------------------------
    // 8. Risk contributions add up to portfolio risk
    // ------------------------------------------------------------------
    #[test]
    fn test_risk_contributions_sum_to_risk() {
        let p = minimum_risk_portfolio(&three_assets(), 0.02, &solver()).unwrap();
        let total: f64 = p.weights.iter().map(|w| w.contribution_to_risk).sum();
        assert!((total - p.risk).abs() < 1e-9);
        let ret: f64 = p.weights.iter().map(|w| w.contribution_to_return).sum();
        assert!((ret - p.expected_return).abs() < 1e-12);
    }

    // ------------------------------------------------------------------
    // 9. Envelope API: failures stay scoped
    // ------------------------------------------------------------------
    #[test]
    fn test_optimize_mean_variance_envelope() {
        let input = MeanVarianceInput {
            asset_names: vec!["A".into(), "B".into()],
            expected_returns: vec![0.10, 0.20],
            covariance_matrix: vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            config: AnalysisConfig::default(),
        };
        let out = optimize_mean_variance(&input).unwrap();
        assert!(out.result.optimal_portfolio.point().is_some());
        assert!(out.result.minimum_risk_portfolio.point().is_some());
        assert_eq!(out.result.assets.len(), 2);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_optimize_mean_variance_rejects_bad_config() {
        let mut config = AnalysisConfig::default();
        config.num_portfolios = 0;
        let input = MeanVarianceInput {
            asset_names: vec!["A".into()],
            expected_returns: vec![0.1],
            covariance_matrix: vec![vec![0.04]],
            config,
        };
        assert!(matches!(
            optimize_mean_variance(&input),
            Err(MarkowitzError::Configuration { .. })
        ));
    }

    // ------------------------------------------------------------------
    // 10. A risk-free rate above every expected return is rejected
    // ------------------------------------------------------------------
    #[test]
    fn test_risk_free_rate_above_all_returns() {
        let err = optimal_portfolio(&uncorrelated_pair(), 0.5, &solver()).unwrap_err();
        assert!(matches!(err, MarkowitzError::Configuration { .. }));

        let input = MeanVarianceInput {
            asset_names: vec!["A".into(), "B".into()],
            expected_returns: vec![0.10, 0.20],
            covariance_matrix: vec![vec![0.04, 0.0], vec![0.0, 0.09]],
            config: AnalysisConfig {
                risk_free_rate: 0.5,
                ..AnalysisConfig::default()
            },
        };
        assert!(matches!(
            optimize_mean_variance(&input),
            Err(MarkowitzError::Configuration { .. })
        ));
    }

    // ------------------------------------------------------------------
    // 11. Indefinite covariance never yields a zero-risk portfolio
    // ------------------------------------------------------------------
    #[test]
    fn test_indefinite_covariance_rejected() {
        let input = MeanVarianceInput {
            asset_names: vec!["A".into(), "B".into()],
            expected_returns: vec![0.10, 0.20],
            covariance_matrix: vec![vec![0.04, -0.1], vec![-0.1, 0.09]],
            config: AnalysisConfig::default(),
        };
        assert!(matches!(
            optimize_mean_variance(&input),
            Err(MarkowitzError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let failed = PortfolioOutcome::Failed {
            reason: "nope".into(),
        };
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["reason"], "nope");
    }
}

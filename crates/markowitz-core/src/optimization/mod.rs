//! Objective functions, the constrained solver and the mean-variance
//! portfolio searches built on them.

pub mod mean_variance;
pub mod objective;
pub mod solver;

pub use mean_variance::{
    equal_weights, minimum_risk_portfolio, optimal_portfolio, optimize_mean_variance,
    AssetWeight, MeanVarianceInput, MeanVarianceOutput, PortfolioOutcome, PortfolioPoint,
};
pub use objective::{
    negative_sharpe, portfolio_metrics, volatility, Direction, Objective, PortfolioMetrics,
    SharpeRatio, Volatility,
};
pub use solver::{Minimization, ProjectedGradient, Solver, WeightConstraints};

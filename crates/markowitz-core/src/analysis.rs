use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::estimation::{
    estimate_statistics, AssetSummary, InMemoryPriceProvider, PriceDataProvider, PriceSeries,
};
use crate::frontier::{sample_frontier, FrontierSampleSet};
use crate::optimization::mean_variance::portfolio_warnings;
use crate::optimization::{
    minimum_risk_portfolio, optimal_portfolio, PortfolioOutcome, ProjectedGradient,
};
use crate::types::{with_metadata, AssetUniverse, ComputationOutput};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Self-contained analysis request: a price table plus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub prices: PriceSeries,
    /// Subset and order of tickers to analyse; defaults to every column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<AssetUniverse>,
    #[serde(default)]
    pub config: AnalysisConfig,
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Annualized return and volatility of each asset.
    pub assets: Vec<AssetSummary>,
    /// Maximum Sharpe ratio portfolio.
    pub optimal_portfolio: PortfolioOutcome,
    /// Minimum volatility portfolio.
    pub minimum_risk_portfolio: PortfolioOutcome,
    pub frontier: FrontierSampleSet,
    /// Periodic return observations used for estimation.
    pub observations: usize,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the full pipeline on a request carrying its own prices.
pub fn run_analysis(input: &AnalysisInput) -> MarkowitzResult<ComputationOutput<AnalysisOutput>> {
    let provider = InMemoryPriceProvider::new(input.prices.clone());
    let universe = input
        .tickers
        .clone()
        .unwrap_or_else(|| input.prices.universe().clone());
    analyze_with_provider(&provider, &universe, &input.config)
}

/// Fetch prices for `universe` over the configured window, then analyse them.
///
/// Configuration and data problems abort before any optimization runs.
pub fn analyze_with_provider(
    provider: &dyn PriceDataProvider,
    universe: &AssetUniverse,
    config: &AnalysisConfig,
) -> MarkowitzResult<ComputationOutput<AnalysisOutput>> {
    config.validate()?;
    let prices = provider.fetch(universe, config.start, config.end)?;
    analyze_prices(&prices, config)
}

/// Estimate statistics from `prices`, solve the optimal and minimum-risk
/// portfolios and sample the frontier.
///
/// A convergence failure in either optimization is reported in its
/// [`PortfolioOutcome`] and as a warning; the other results are still
/// returned.
pub fn analyze_prices(
    prices: &PriceSeries,
    config: &AnalysisConfig,
) -> MarkowitzResult<ComputationOutput<AnalysisOutput>> {
    let start = Instant::now();
    config.validate()?;

    let stats = estimate_statistics(prices, config.periods_per_year())?;
    config.validate_excess_return(&stats.mean_returns)?;
    let solver = ProjectedGradient::new(config.solver);
    let rf = config.risk_free_rate;

    let ((optimal, minimum_risk), frontier) = join(
        || {
            join(
                || PortfolioOutcome::from_result(optimal_portfolio(&stats, rf, &solver)),
                || PortfolioOutcome::from_result(minimum_risk_portfolio(&stats, rf, &solver)),
            )
        },
        || {
            sample_frontier(
                &stats,
                config.num_portfolios,
                rf,
                config.seed,
                config.include_weights,
            )
        },
    );
    let frontier = frontier?;

    let mut warnings = portfolio_warnings(&optimal, &minimum_risk);
    if stats.num_assets() == 1 {
        warnings.push("Single asset: every allocation is the whole budget".into());
    }
    if frontier.degenerate_samples > 0 {
        warnings.push(format!(
            "{} frontier sample(s) have zero risk; their Sharpe ratio is undefined",
            frontier.degenerate_samples
        ));
    }

    info!(
        assets = stats.num_assets(),
        observations = stats.observations,
        samples = frontier.len(),
        warnings = warnings.len(),
        "analysis complete"
    );

    let output = AnalysisOutput {
        assets: stats.asset_summaries(),
        optimal_portfolio: optimal,
        minimum_risk_portfolio: minimum_risk,
        frontier,
        observations: stats.observations,
        window_start: prices.dates().first().copied(),
        window_end: prices.dates().last().copied(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Markowitz mean-variance analysis: sample estimates, projected-gradient optimization, Dirichlet frontier sampling",
        config,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

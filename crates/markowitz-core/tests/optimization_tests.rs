use markowitz_core::config::{AnalysisConfig, SolverSettings};
use markowitz_core::estimation::AssetStatistics;
use markowitz_core::frontier::{generate_frontier, sample_frontier};
use markowitz_core::optimization::{
    minimum_risk_portfolio, negative_sharpe, optimal_portfolio, optimize_mean_variance,
    portfolio_metrics, volatility, MeanVarianceInput, PortfolioOutcome, ProjectedGradient,
};
use markowitz_core::MarkowitzError;

// ===========================================================================
// Mean-variance optimization over precomputed annualized statistics
// ===========================================================================

fn solver() -> ProjectedGradient {
    ProjectedGradient::new(SolverSettings::default())
}

fn uncorrelated_pair() -> AssetStatistics {
    AssetStatistics::from_annualized(
        vec!["A".into(), "B".into()],
        vec![0.10, 0.20],
        vec![vec![0.04, 0.0], vec![0.0, 0.09]],
        252.0,
    )
    .unwrap()
}

fn four_assets() -> AssetStatistics {
    AssetStatistics::from_annualized(
        vec!["EQ".into(), "BOND".into(), "GOLD".into(), "EM".into()],
        vec![0.08, 0.03, 0.05, 0.11],
        vec![
            vec![0.0400, 0.0020, -0.0010, 0.0300],
            vec![0.0020, 0.0025, 0.0005, 0.0015],
            vec![-0.0010, 0.0005, 0.0225, 0.0010],
            vec![0.0300, 0.0015, 0.0010, 0.0900],
        ],
        252.0,
    )
    .unwrap()
}

fn assert_feasible(weights: &[f64]) {
    let total: f64 = weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-6, "weights sum to {}", total);
    for w in weights {
        assert!(*w >= -1e-9 && *w <= 1.0 + 1e-9, "weight {} out of bounds", w);
    }
}

// ---------------------------------------------------------------------------
// Minimum-risk portfolio
// ---------------------------------------------------------------------------

#[test]
fn test_minimum_risk_uncorrelated_pair() {
    let point = minimum_risk_portfolio(&uncorrelated_pair(), 0.02, &solver()).unwrap();
    let w = point.weight_vector();
    // inverse-variance weights: 0.09/0.13 and 0.04/0.13
    assert!((w[0] - 0.6923).abs() < 1e-3, "w = {:?}", w);
    assert!((w[1] - 0.3077).abs() < 1e-3, "w = {:?}", w);
    assert!((point.expected_return - 0.1308).abs() < 1e-3);
    assert!((point.risk - 0.1664).abs() < 1e-3);
}

#[test]
fn test_minimum_risk_is_feasible_and_below_every_sample() {
    let stats = four_assets();
    let point = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
    assert_feasible(&point.weight_vector());

    let set = sample_frontier(&stats, 2000, 0.02, Some(3), false).unwrap();
    for s in &set.samples {
        assert!(point.risk <= s.risk + 1e-9, "{} > {}", point.risk, s.risk);
    }
}

#[test]
fn test_risk_contributions_sum_to_risk() {
    let point = minimum_risk_portfolio(&four_assets(), 0.02, &solver()).unwrap();
    let total: f64 = point.weights.iter().map(|w| w.contribution_to_risk).sum();
    assert!((total - point.risk).abs() < 1e-9);
    let ret: f64 = point.weights.iter().map(|w| w.contribution_to_return).sum();
    assert!((ret - point.expected_return).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Optimal (maximum Sharpe) portfolio
// ---------------------------------------------------------------------------

#[test]
fn test_optimal_uncorrelated_pair_is_tangency() {
    // Σ⁻¹(μ − r_f) = [2, 2] normalizes to equal weights
    let point = optimal_portfolio(&uncorrelated_pair(), 0.02, &solver()).unwrap();
    let w = point.weight_vector();
    assert!((w[0] - 0.5).abs() < 1e-4, "w = {:?}", w);
    let sharpe = point.sharpe_ratio.unwrap();
    assert!((sharpe - 0.13 / 0.0325_f64.sqrt()).abs() < 1e-6);
}

#[test]
fn test_optimal_dominates_sampled_sharpe() {
    let stats = four_assets();
    let point = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
    assert_feasible(&point.weight_vector());
    let best = point.sharpe_ratio.unwrap();

    let set = sample_frontier(&stats, 2000, 0.02, Some(9), false).unwrap();
    let sampled = set.max_sharpe().unwrap().sharpe_ratio.unwrap();
    assert!(best >= sampled - 1e-9, "{} < {}", best, sampled);

    let min = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
    assert!(min.risk <= point.risk + 1e-9);
}

#[test]
fn test_optimal_matches_negative_sharpe() {
    let stats = four_assets();
    let point = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
    let w = point.weight_vector();
    let ns = negative_sharpe(&w, &stats.mean_returns, &stats.covariance, 0.02);
    assert!((ns + point.sharpe_ratio.unwrap()).abs() < 1e-12);
    assert!((volatility(&w, &stats.covariance) - point.risk).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Degenerate universes
// ---------------------------------------------------------------------------

#[test]
fn test_single_asset_takes_whole_budget() {
    let stats = AssetStatistics::from_annualized(
        vec!["ONLY".into()],
        vec![0.10],
        vec![vec![0.04]],
        252.0,
    )
    .unwrap();
    let optimal = optimal_portfolio(&stats, 0.02, &solver()).unwrap();
    let minimum = minimum_risk_portfolio(&stats, 0.02, &solver()).unwrap();
    for point in [&optimal, &minimum] {
        assert_eq!(point.weight_vector(), vec![1.0]);
        assert!((point.expected_return - 0.10).abs() < 1e-15);
        assert!((point.risk - 0.20).abs() < 1e-15);
        assert!((point.sharpe_ratio.unwrap() - 0.40).abs() < 1e-12);
    }
}

#[test]
fn test_zero_risk_universe_has_no_optimal_portfolio() {
    let stats = AssetStatistics::from_annualized(
        vec!["CASH".into(), "TBILL".into()],
        vec![0.03, 0.035],
        vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        252.0,
    )
    .unwrap();
    let err = optimal_portfolio(&stats, 0.02, &solver()).unwrap_err();
    assert!(matches!(err, MarkowitzError::DegenerateInput(_)));

    let metrics = portfolio_metrics(&[0.5, 0.5], &stats.mean_returns, &stats.covariance, 0.02);
    assert_eq!(metrics.sharpe_ratio, None);
    assert!(metrics.require_sharpe().is_err());
    assert_eq!(
        negative_sharpe(&[0.5, 0.5], &stats.mean_returns, &stats.covariance, 0.02),
        f64::INFINITY
    );
}

#[test]
fn test_exhausted_budget_is_convergence_failure() {
    let settings = SolverSettings {
        max_iterations: 1,
        tolerance: 1e-300,
    };
    let err = minimum_risk_portfolio(&four_assets(), 0.02, &ProjectedGradient::new(settings))
        .unwrap_err();
    match err {
        MarkowitzError::ConvergenceFailure { iterations, .. } => assert!(iterations <= 1),
        other => panic!("expected ConvergenceFailure, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Envelope entry points
// ---------------------------------------------------------------------------

fn input(config: AnalysisConfig) -> MeanVarianceInput {
    let stats = four_assets();
    MeanVarianceInput {
        asset_names: stats.tickers.clone(),
        expected_returns: stats.mean_returns.clone(),
        covariance_matrix: stats.covariance.clone(),
        config,
    }
}

#[test]
fn test_optimize_mean_variance_envelope() {
    let out = optimize_mean_variance(&input(AnalysisConfig::default())).unwrap();
    assert_eq!(out.metadata.precision, "ieee754_f64");
    assert_eq!(out.result.assets.len(), 4);
    assert!(matches!(
        out.result.optimal_portfolio,
        PortfolioOutcome::Converged(_)
    ));
    assert!(out.result.minimum_risk_portfolio.point().is_some());
}

#[test]
fn test_optimize_rejects_asymmetric_covariance() {
    let mut bad = input(AnalysisConfig::default());
    bad.covariance_matrix[0][1] = 0.5;
    assert!(matches!(
        optimize_mean_variance(&bad),
        Err(MarkowitzError::Configuration { .. })
    ));
}

#[test]
fn test_optimize_rejects_indefinite_covariance() {
    let bad = MeanVarianceInput {
        asset_names: vec!["A".into(), "B".into()],
        expected_returns: vec![0.10, 0.20],
        covariance_matrix: vec![vec![0.04, -0.1], vec![-0.1, 0.09]],
        config: AnalysisConfig::default(),
    };
    assert!(matches!(
        optimize_mean_variance(&bad),
        Err(MarkowitzError::DegenerateInput(_))
    ));
}

#[test]
fn test_optimize_rejects_repeated_or_blank_names() {
    let mut repeated = input(AnalysisConfig::default());
    repeated.asset_names[1] = repeated.asset_names[0].clone();
    assert!(matches!(
        optimize_mean_variance(&repeated),
        Err(MarkowitzError::Configuration { .. })
    ));

    let mut blank = input(AnalysisConfig::default());
    blank.asset_names[2] = "  ".into();
    assert!(matches!(
        optimize_mean_variance(&blank),
        Err(MarkowitzError::Configuration { .. })
    ));
}

#[test]
fn test_optimize_rejects_risk_free_rate_without_excess_return() {
    let config = AnalysisConfig {
        risk_free_rate: 0.5,
        ..AnalysisConfig::default()
    };
    match optimize_mean_variance(&input(config)) {
        Err(MarkowitzError::Configuration { field, .. }) => assert_eq!(field, "risk_free_rate"),
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_default_solver_converges_on_correlated_universe() {
    let stats = four_assets();
    let min = minimum_risk_portfolio(&stats, 0.02, &ProjectedGradient::default()).unwrap();
    let opt = optimal_portfolio(&stats, 0.02, &ProjectedGradient::default()).unwrap();
    assert_feasible(&min.weight_vector());
    assert_feasible(&opt.weight_vector());
    assert!(min.risk <= opt.risk + 1e-9);
}

#[test]
fn test_generate_frontier_respects_config() {
    let config = AnalysisConfig {
        num_portfolios: 750,
        seed: Some(11),
        include_weights: true,
        ..AnalysisConfig::default()
    };
    let out = generate_frontier(&input(config)).unwrap();
    assert_eq!(out.result.len(), 750);
    assert_eq!(out.result.seed, 11);
    for s in &out.result.samples {
        let w = s.weights.as_ref().unwrap();
        assert_eq!(w.len(), 4);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(w.iter().all(|x| *x >= 0.0));
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Dirichlet, Distribution};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::MarkowitzError;
use crate::estimation::AssetStatistics;
use crate::optimization::objective::portfolio_metrics;
use crate::optimization::MeanVarianceInput;
use crate::types::{with_metadata, ComputationOutput};
use crate::MarkowitzResult;

/// Samples drawn per independently seeded chunk. Fixed so results do not
/// depend on the number of worker threads.
const CHUNK_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// Random source
// ---------------------------------------------------------------------------

/// Dirichlet sampler over the weight simplex.
///
/// With all concentrations equal to 1 the draws are uniform over
/// `{w >= 0, Σw = 1}`.
#[derive(Debug, Clone)]
pub struct DirichletSource {
    concentration: Vec<f64>,
    // None for a single asset: the simplex is the point [1].
    dist: Option<Dirichlet<f64>>,
}

impl DirichletSource {
    /// Symmetric Dirichlet(1, ..., 1) over `n` assets.
    pub fn uniform(n: usize) -> MarkowitzResult<Self> {
        DirichletSource::new(vec![1.0; n])
    }

    pub fn new(concentration: Vec<f64>) -> MarkowitzResult<Self> {
        if concentration.is_empty() {
            return Err(MarkowitzError::DegenerateInput(
                "At least one asset required".into(),
            ));
        }
        if let Some(bad) = concentration.iter().find(|a| !(a.is_finite() && **a > 0.0)) {
            return Err(MarkowitzError::config(
                "concentration",
                format!("Concentration parameters must be positive, got {}", bad),
            ));
        }
        let dist = if concentration.len() >= 2 {
            Some(Dirichlet::new(&concentration).map_err(|e| {
                MarkowitzError::config("concentration", format!("Invalid Dirichlet parameters: {e}"))
            })?)
        } else {
            None
        };
        Ok(DirichletSource {
            concentration,
            dist,
        })
    }

    pub fn dimension(&self) -> usize {
        self.concentration.len()
    }

    pub fn concentration(&self) -> &[f64] {
        &self.concentration
    }

    /// One non-negative weight vector summing to 1.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match &self.dist {
            Some(d) => d.sample(rng),
            None => vec![1.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One random portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    pub expected_return: f64,
    pub risk: f64,
    /// `None` when the sample has zero risk.
    pub sharpe_ratio: Option<f64>,
}

/// Upper-left boundary point of the sampled cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub risk: f64,
    pub expected_return: f64,
}

/// Unordered collection of random portfolios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSampleSet {
    pub samples: Vec<FrontierSample>,
    /// Master seed the set was generated from; replaying it reproduces the set.
    pub seed: u64,
    /// Samples whose Sharpe ratio is undefined (zero risk).
    pub degenerate_samples: usize,
}

impl FrontierSampleSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_sharpe(&self) -> Option<&FrontierSample> {
        self.samples
            .iter()
            .filter(|s| s.sharpe_ratio.is_some())
            .max_by(|a, b| a.sharpe_ratio.partial_cmp(&b.sharpe_ratio).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn min_risk(&self) -> Option<&FrontierSample> {
        self.samples
            .iter()
            .min_by(|a, b| a.risk.partial_cmp(&b.risk).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Best return per risk bucket, keeping only points that improve on every
    /// lower-risk point. Traces the sampled approximation of the frontier.
    pub fn efficient_envelope(&self, buckets: usize) -> Vec<EnvelopePoint> {
        if self.samples.is_empty() || buckets == 0 {
            return Vec::new();
        }
        let lo = self.samples.iter().map(|s| s.risk).fold(f64::INFINITY, f64::min);
        let hi = self.samples.iter().map(|s| s.risk).fold(f64::NEG_INFINITY, f64::max);
        let width = (hi - lo) / buckets as f64;

        let mut best: Vec<Option<EnvelopePoint>> = vec![None; buckets];
        for s in &self.samples {
            let idx = if width > 0.0 {
                (((s.risk - lo) / width) as usize).min(buckets - 1)
            } else {
                0
            };
            let better = best[idx].is_none_or(|p| s.expected_return > p.expected_return);
            if better {
                best[idx] = Some(EnvelopePoint {
                    risk: s.risk,
                    expected_return: s.expected_return,
                });
            }
        }

        let mut envelope = Vec::new();
        let mut top = f64::NEG_INFINITY;
        for p in best.into_iter().flatten() {
            if p.expected_return > top {
                top = p.expected_return;
                envelope.push(p);
            }
        }
        envelope
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Draw `num_portfolios` uniform random long-only portfolios and evaluate
/// return, risk and Sharpe ratio for each.
///
/// With `seed = Some(s)` the result is identical across runs and thread
/// counts; with `None` a seed is drawn from OS entropy and reported back.
pub fn sample_frontier(
    stats: &AssetStatistics,
    num_portfolios: u32,
    risk_free_rate: f64,
    seed: Option<u64>,
    include_weights: bool,
) -> MarkowitzResult<FrontierSampleSet> {
    if num_portfolios == 0 {
        return Err(MarkowitzError::config("num_portfolios", "Must be positive"));
    }
    let source = DirichletSource::uniform(stats.num_assets())?;
    let seed = seed.unwrap_or_else(|| StdRng::from_entropy().gen());

    let total = num_portfolios as usize;
    let mut master = StdRng::seed_from_u64(seed);
    let plan: Vec<(u64, usize)> = (0..total.div_ceil(CHUNK_SIZE))
        .map(|c| (master.gen::<u64>(), CHUNK_SIZE.min(total - c * CHUNK_SIZE)))
        .collect();
    debug!(num_portfolios, chunks = plan.len(), seed, "sampling frontier");

    let run = |(chunk_seed, len): (u64, usize)| {
        sample_chunk(&source, stats, risk_free_rate, chunk_seed, len, include_weights)
    };
    #[cfg(feature = "parallel")]
    let chunks: Vec<Vec<FrontierSample>> = plan.into_par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let chunks: Vec<Vec<FrontierSample>> = plan.into_iter().map(run).collect();

    let samples: Vec<FrontierSample> = chunks.into_iter().flatten().collect();
    let degenerate_samples = samples.iter().filter(|s| s.sharpe_ratio.is_none()).count();

    Ok(FrontierSampleSet {
        samples,
        seed,
        degenerate_samples,
    })
}

/// Frontier sampling from precomputed statistics, wrapped in the standard
/// output envelope.
pub fn generate_frontier(
    input: &MeanVarianceInput,
) -> MarkowitzResult<ComputationOutput<FrontierSampleSet>> {
    let start = Instant::now();
    input.config.validate()?;
    let stats = AssetStatistics::from_annualized(
        input.asset_names.clone(),
        input.expected_returns.clone(),
        input.covariance_matrix.clone(),
        input.config.periods_per_year(),
    )?;

    let cfg = &input.config;
    let set = sample_frontier(
        &stats,
        cfg.num_portfolios,
        cfg.risk_free_rate,
        cfg.seed,
        cfg.include_weights,
    )?;

    let mut warnings = Vec::new();
    if set.degenerate_samples > 0 {
        warnings.push(format!(
            "{} sample(s) have zero risk; their Sharpe ratio is undefined",
            set.degenerate_samples
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Efficient frontier Monte Carlo (symmetric Dirichlet weights)",
        &serde_json::json!({
            "n_assets": stats.num_assets(),
            "num_portfolios": cfg.num_portfolios,
            "risk_free_rate": cfg.risk_free_rate,
            "seed": set.seed,
        }),
        warnings,
        elapsed,
        set,
    ))
}

fn sample_chunk(
    source: &DirichletSource,
    stats: &AssetStatistics,
    risk_free_rate: f64,
    chunk_seed: u64,
    len: usize,
    include_weights: bool,
) -> Vec<FrontierSample> {
    let mut rng = StdRng::seed_from_u64(chunk_seed);
    (0..len)
        .map(|_| {
            let w = source.draw(&mut rng);
            let m = portfolio_metrics(&w, &stats.mean_returns, &stats.covariance, risk_free_rate);
            FrontierSample {
                weights: include_weights.then_some(w),
                expected_return: m.expected_return,
                risk: m.risk,
                sharpe_ratio: m.sharpe_ratio,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

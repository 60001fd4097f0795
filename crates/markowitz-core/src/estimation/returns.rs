use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::prices::PriceSeries;
use crate::error::MarkowitzError;
use crate::types::AssetUniverse;
use crate::MarkowitzResult;

/// Relative tolerance used when checking covariance symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-9;
/// Pivot tolerance, relative to the largest variance, for the
/// positive-semidefinite check.
const PSD_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Period-over-period relative price changes, stored per asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub tickers: Vec<String>,
    /// Date of the closing price each return ends on (the first price date
    /// has no return).
    pub dates: Vec<NaiveDate>,
    /// `by_asset[i][t]` is asset i's return at step t.
    pub by_asset: Vec<Vec<f64>>,
}

/// Annualized return statistics for an ordered asset universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub tickers: Vec<String>,
    /// Annualized expected return per asset.
    pub mean_returns: Vec<f64>,
    /// Annualized N x N covariance matrix.
    pub covariance: Vec<Vec<f64>>,
    /// Annualized standard deviation per asset.
    pub std_devs: Vec<f64>,
    /// Number of periodic return observations behind the estimate
    /// (0 when built from precomputed statistics).
    pub observations: usize,
    pub periods_per_year: f64,
}

/// Per-asset annualized return and risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub ticker: String,
    pub expected_return: f64,
    pub risk: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute periodic returns `p[t] / p[t-1] - 1` for every asset.
///
/// The series is validated first: a missing or non-positive price aborts with
/// a data-quality error naming every offending cell.
pub fn periodic_returns(series: &PriceSeries) -> MarkowitzResult<ReturnSeries> {
    series.validate()?;

    let n = series.num_assets();
    let rows = series.rows();
    let mut by_asset = vec![Vec::with_capacity(rows.len().saturating_sub(1)); n];

    for pair in rows.windows(2) {
        for (i, column) in by_asset.iter_mut().enumerate() {
            // validate() guarantees presence and positivity
            let prev = price_f64(pair[0][i], &series.tickers()[i])?;
            let curr = price_f64(pair[1][i], &series.tickers()[i])?;
            column.push(curr / prev - 1.0);
        }
    }

    Ok(ReturnSeries {
        tickers: series.tickers().to_vec(),
        dates: series.dates().iter().skip(1).copied().collect(),
        by_asset,
    })
}

/// Estimate annualized mean returns, covariance and volatilities from prices.
pub fn estimate_statistics(
    series: &PriceSeries,
    periods_per_year: f64,
) -> MarkowitzResult<AssetStatistics> {
    let returns = periodic_returns(series)?;
    returns.annualize(periods_per_year)
}

impl ReturnSeries {
    pub fn observations(&self) -> usize {
        self.dates.len()
    }

    /// Mean of each asset's periodic returns.
    pub fn periodic_means(&self) -> Vec<f64> {
        self.by_asset.iter().map(|col| col.iter().mean()).collect()
    }

    /// Sample (n - 1) covariance of periodic returns.
    pub fn periodic_covariance(&self) -> Vec<Vec<f64>> {
        let n = self.by_asset.len();
        let mut cov = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let c = self.by_asset[i].iter().covariance(self.by_asset[j].iter());
                cov[i][j] = c;
                cov[j][i] = c;
            }
        }
        cov
    }

    /// Sample standard deviation of each asset's periodic returns.
    pub fn periodic_std_devs(&self) -> Vec<f64> {
        self.by_asset.iter().map(|col| col.iter().std_dev()).collect()
    }

    /// Scale periodic statistics to annual figures: means and covariance by
    /// `periods_per_year`, standard deviations by its square root.
    pub fn annualize(&self, periods_per_year: f64) -> MarkowitzResult<AssetStatistics> {
        if !(periods_per_year > 0.0 && periods_per_year.is_finite()) {
            return Err(MarkowitzError::config(
                "trading_periods_per_year",
                "Must be a positive finite number",
            ));
        }
        let obs = self.observations();
        if obs < 2 {
            return Err(MarkowitzError::InsufficientData(format!(
                "At least 2 return observations (3 prices) required, got {}",
                obs
            )));
        }

        let mean_returns: Vec<f64> = self
            .periodic_means()
            .into_iter()
            .map(|m| m * periods_per_year)
            .collect();
        let covariance: Vec<Vec<f64>> = self
            .periodic_covariance()
            .into_iter()
            .map(|row| row.into_iter().map(|c| c * periods_per_year).collect())
            .collect();
        let std_devs: Vec<f64> = self
            .periodic_std_devs()
            .into_iter()
            .map(|s| s * periods_per_year.sqrt())
            .collect();

        let stats = AssetStatistics {
            tickers: self.tickers.clone(),
            mean_returns,
            covariance,
            std_devs,
            observations: obs,
            periods_per_year,
        };
        stats.check_finite()?;
        Ok(stats)
    }
}

impl AssetStatistics {
    /// Build statistics from already annualized inputs.
    pub fn from_annualized(
        tickers: Vec<String>,
        mean_returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        periods_per_year: f64,
    ) -> MarkowitzResult<Self> {
        let n = tickers.len();
        if n == 0 {
            return Err(MarkowitzError::DegenerateInput(
                "At least one asset required".into(),
            ));
        }
        let tickers: Vec<String> = AssetUniverse::new(tickers)?.into();
        if mean_returns.len() != n {
            return Err(MarkowitzError::config(
                "expected_returns",
                format!("Expected {} returns but got {}", n, mean_returns.len()),
            ));
        }
        validate_covariance_matrix(&covariance, n)?;

        let std_devs = (0..n).map(|i| covariance[i][i].sqrt()).collect();
        let stats = AssetStatistics {
            tickers,
            mean_returns,
            covariance,
            std_devs,
            observations: 0,
            periods_per_year,
        };
        stats.check_finite()?;
        check_positive_semidefinite(&stats.covariance)?;
        Ok(stats)
    }

    pub fn num_assets(&self) -> usize {
        self.tickers.len()
    }

    /// (ticker, annualized return, annualized risk) per asset, in order.
    pub fn asset_summaries(&self) -> Vec<AssetSummary> {
        self.tickers
            .iter()
            .zip(self.mean_returns.iter().zip(self.std_devs.iter()))
            .map(|(t, (r, s))| AssetSummary {
                ticker: t.clone(),
                expected_return: *r,
                risk: *s,
            })
            .collect()
    }

    pub fn deannualized_means(&self) -> Vec<f64> {
        self.mean_returns
            .iter()
            .map(|m| m / self.periods_per_year)
            .collect()
    }

    pub fn deannualized_covariance(&self) -> Vec<Vec<f64>> {
        self.covariance
            .iter()
            .map(|row| row.iter().map(|c| c / self.periods_per_year).collect())
            .collect()
    }

    pub fn deannualized_std_devs(&self) -> Vec<f64> {
        let root = self.periods_per_year.sqrt();
        self.std_devs.iter().map(|s| s / root).collect()
    }

    fn check_finite(&self) -> MarkowitzResult<()> {
        let bad_mean = self.mean_returns.iter().any(|v| !v.is_finite());
        let bad_cov = self.covariance.iter().flatten().any(|v| !v.is_finite());
        if bad_mean || bad_cov {
            return Err(MarkowitzError::DegenerateInput(
                "Return statistics contain non-finite values".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn price_f64(cell: Option<rust_decimal::Decimal>, ticker: &str) -> MarkowitzResult<f64> {
    cell.and_then(|p| p.to_f64()).ok_or_else(|| {
        MarkowitzError::DegenerateInput(format!("Price for {} is not representable", ticker))
    })
}

/// Cholesky factorization that tolerates zero pivots. A negative pivot, or a
/// zero pivot with a non-zero remainder below it, means some weight vector has
/// negative variance.
#[allow(clippy::needless_range_loop)]
fn check_positive_semidefinite(cov: &[Vec<f64>]) -> MarkowitzResult<()> {
    let n = cov.len();
    let scale = (0..n).map(|i| cov[i][i]).fold(0.0, f64::max);
    let tol = PSD_TOLERANCE * scale.max(f64::MIN_POSITIVE);
    let mut l = vec![vec![0.0; n]; n];
    for j in 0..n {
        let d = cov[j][j] - (0..j).map(|k| l[j][k] * l[j][k]).sum::<f64>();
        if d < -tol {
            return Err(MarkowitzError::DegenerateInput(format!(
                "Covariance matrix is not positive semidefinite (pivot {} = {:e})",
                j, d
            )));
        }
        let pivot = if d > tol { d.sqrt() } else { 0.0 };
        l[j][j] = pivot;
        for i in (j + 1)..n {
            let r = cov[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            if pivot > 0.0 {
                l[i][j] = r / pivot;
            } else if r.abs() > tol {
                return Err(MarkowitzError::DegenerateInput(format!(
                    "Covariance matrix is not positive semidefinite (zero variance on {} but covariance {:e} with {})",
                    j, r, i
                )));
            }
        }
    }
    Ok(())
}

#[allow(clippy::needless_range_loop)]
fn validate_covariance_matrix(cov: &[Vec<f64>], n: usize) -> MarkowitzResult<()> {
    if cov.len() != n {
        return Err(MarkowitzError::config(
            "covariance_matrix",
            format!("Expected {}x{} matrix but got {} rows", n, n, cov.len()),
        ));
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(MarkowitzError::config(
                "covariance_matrix",
                format!("Row {} has {} columns, expected {}", i, row.len(), n),
            ));
        }
    }
    for i in 0..n {
        if cov[i][i] < 0.0 {
            return Err(MarkowitzError::DegenerateInput(format!(
                "Negative variance on diagonal [{},{}]={}",
                i, i, cov[i][i]
            )));
        }
        for j in (i + 1)..n {
            let scale = cov[i][j].abs().max(cov[j][i].abs()).max(1.0);
            if (cov[i][j] - cov[j][i]).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(MarkowitzError::config(
                    "covariance_matrix",
                    format!(
                        "Not symmetric: [{},{}]={} != [{},{}]={}",
                        i, j, cov[i][j], j, i, cov[j][i]
                    ),
                ));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DataIssue, MarkowitzError};
use crate::types::{AssetUniverse, Money};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Wire form of a price series, validated into [`PriceSeries`] on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeriesData {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// One row per date, one cell per ticker. `null` marks a missing price.
    pub prices: Vec<Vec<Option<Money>>>,
}

/// Prices for an ordered asset universe on a common calendar.
///
/// Rows are dates (strictly increasing), columns follow the universe order.
/// Cells may be missing; [`PriceSeries::validate`] reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceSeriesData", into = "PriceSeriesData")]
pub struct PriceSeries {
    universe: AssetUniverse,
    dates: Vec<NaiveDate>,
    prices: Vec<Vec<Option<Money>>>,
}

impl PriceSeries {
    pub fn new(
        universe: AssetUniverse,
        dates: Vec<NaiveDate>,
        prices: Vec<Vec<Option<Money>>>,
    ) -> MarkowitzResult<Self> {
        let n = universe.len();
        if dates.len() != prices.len() {
            return Err(MarkowitzError::config(
                "prices",
                format!("Expected {} rows (one per date) but got {}", dates.len(), prices.len()),
            ));
        }
        for (row, cells) in prices.iter().enumerate() {
            if cells.len() != n {
                return Err(MarkowitzError::config(
                    "prices",
                    format!("Row {} has {} cells, expected {}", row, cells.len(), n),
                ));
            }
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(MarkowitzError::config(
                    "dates",
                    format!("Dates must be strictly increasing ({} then {})", pair[0], pair[1]),
                ));
            }
        }
        Ok(PriceSeries {
            universe,
            dates,
            prices,
        })
    }

    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    pub fn tickers(&self) -> &[String] {
        self.universe.tickers()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<Option<Money>>] {
        &self.prices
    }

    /// Number of timestamps.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn num_assets(&self) -> usize {
        self.universe.len()
    }

    /// Every cell must be present and strictly positive.
    pub fn validate(&self) -> MarkowitzResult<()> {
        let mut issues = Vec::new();
        for (date, row) in self.dates.iter().zip(self.prices.iter()) {
            for (ticker, cell) in self.universe.tickers().iter().zip(row.iter()) {
                let reason = match cell {
                    None => "missing price",
                    Some(p) if *p <= Decimal::ZERO => "non-positive price",
                    Some(_) => continue,
                };
                issues.push(DataIssue {
                    asset: ticker.clone(),
                    date: *date,
                    reason: reason.to_string(),
                });
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(MarkowitzError::DataQuality { issues })
        }
    }

    /// Restrict to the inclusive `[start, end]` window. Open bounds keep all rows.
    pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceSeries {
        let keep = |d: &NaiveDate| start.is_none_or(|s| *d >= s) && end.is_none_or(|e| *d <= e);
        let (dates, prices) = self
            .dates
            .iter()
            .zip(self.prices.iter())
            .filter(|(d, _)| keep(*d))
            .map(|(d, row)| (*d, row.clone()))
            .unzip();
        PriceSeries {
            universe: self.universe.clone(),
            dates,
            prices,
        }
    }

    /// Columns for `universe`, in its order. Unknown tickers are unavailable.
    pub fn select(&self, universe: &AssetUniverse) -> MarkowitzResult<PriceSeries> {
        let mut columns = Vec::with_capacity(universe.len());
        let mut unknown = Vec::new();
        for ticker in universe.tickers() {
            match self.universe.tickers().iter().position(|t| t == ticker) {
                Some(idx) => columns.push(idx),
                None => unknown.push(ticker.as_str()),
            }
        }
        if !unknown.is_empty() {
            return Err(MarkowitzError::DataUnavailable(format!(
                "Unknown ticker(s): {}",
                unknown.join(", ")
            )));
        }
        let prices = self
            .prices
            .iter()
            .map(|row| columns.iter().map(|&c| row[c]).collect())
            .collect();
        Ok(PriceSeries {
            universe: universe.clone(),
            dates: self.dates.clone(),
            prices,
        })
    }
}

impl TryFrom<PriceSeriesData> for PriceSeries {
    type Error = MarkowitzError;

    fn try_from(data: PriceSeriesData) -> Result<Self, Self::Error> {
        PriceSeries::new(AssetUniverse::new(data.tickers)?, data.dates, data.prices)
    }
}

impl From<PriceSeries> for PriceSeriesData {
    fn from(series: PriceSeries) -> Self {
        PriceSeriesData {
            tickers: series.universe.into(),
            dates: series.dates,
            prices: series.prices,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider interface
// ---------------------------------------------------------------------------

/// Source of historical prices for a set of tickers over a date window.
pub trait PriceDataProvider {
    /// Fetch prices for `universe` within the inclusive window.
    ///
    /// Fails with [`MarkowitzError::DataUnavailable`] when a ticker cannot be
    /// resolved or the window contains no observations for it. Gaps inside the
    /// window are returned as missing cells so that estimation can report them.
    fn fetch(
        &self,
        universe: &AssetUniverse,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> MarkowitzResult<PriceSeries>;
}

/// Provider over an already materialized price table.
#[derive(Debug, Clone)]
pub struct InMemoryPriceProvider {
    series: PriceSeries,
}

impl InMemoryPriceProvider {
    pub fn new(series: PriceSeries) -> Self {
        InMemoryPriceProvider { series }
    }
}

impl PriceDataProvider for InMemoryPriceProvider {
    fn fetch(
        &self,
        universe: &AssetUniverse,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> MarkowitzResult<PriceSeries> {
        let selected = self.series.select(universe)?.window(start, end);
        if selected.is_empty() {
            return Err(MarkowitzError::DataUnavailable(
                "No observations in the requested window".into(),
            ));
        }
        let empty: Vec<&str> = universe
            .tickers()
            .iter()
            .enumerate()
            .filter(|(col, _)| selected.prices.iter().all(|row| row[*col].is_none()))
            .map(|(_, t)| t.as_str())
            .collect();
        if !empty.is_empty() {
            return Err(MarkowitzError::DataUnavailable(format!(
                "No prices in the requested window for: {}",
                empty.join(", ")
            )));
        }
        Ok(selected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use chrono::NaiveDate;
use markowitz_core::estimation::{InMemoryPriceProvider, PriceDataProvider, PriceSeries};
use markowitz_core::{AssetUniverse, MarkowitzError, MarkowitzResult};
use rust_decimal::Decimal;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

use super::file;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Price provider over a wide CSV file:
///
/// ```text
/// date,AAPL,MSFT
/// 2024-01-02,185.64,370.87
/// 2024-01-03,184.25,
/// ```
///
/// The first column holds ISO dates, every further column one ticker. An
/// empty cell is a missing price. Rows may appear in any order.
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    inner: InMemoryPriceProvider,
    universe: AssetUniverse,
}

impl CsvPriceProvider {
    pub fn from_path(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let canonical = file::resolve_path(path)?;
        let reader = std::fs::File::open(&canonical)
            .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
        let provider = Self::from_reader(reader)
            .map_err(|e| format!("Failed to load '{}': {}", canonical.display(), e))?;
        debug!(
            path = %canonical.display(),
            tickers = provider.universe.len(),
            "loaded price file"
        );
        Ok(provider)
    }

    pub fn from_reader<R: Read>(reader: R) -> MarkowitzResult<Self> {
        let series = parse_wide_csv(reader)?;
        Ok(CsvPriceProvider {
            universe: series.universe().clone(),
            inner: InMemoryPriceProvider::new(series),
        })
    }

    /// Every ticker in the file, in column order.
    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }
}

impl PriceDataProvider for CsvPriceProvider {
    fn fetch(
        &self,
        universe: &AssetUniverse,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> MarkowitzResult<PriceSeries> {
        self.inner.fetch(universe, start, end)
    }
}

fn malformed(msg: String) -> MarkowitzError {
    MarkowitzError::SerializationError(msg)
}

fn parse_wide_csv<R: Read>(reader: R) -> MarkowitzResult<PriceSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| malformed(format!("Invalid CSV header: {}", e)))?
        .clone();
    match headers.get(0) {
        Some(h) if h.eq_ignore_ascii_case("date") => {}
        _ => return Err(malformed("First CSV column must be 'date'".into())),
    }
    let universe = AssetUniverse::new(headers.iter().skip(1).map(str::to_string).collect())?;

    let mut rows: Vec<(NaiveDate, Vec<Option<Decimal>>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        // header is line 1
        let line = line + 2;
        let record = record.map_err(|e| malformed(format!("Line {}: {}", line, e)))?;
        let date_cell = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_cell, DATE_FORMAT)
            .map_err(|e| malformed(format!("Line {}: invalid date '{}': {}", line, date_cell, e)))?;
        let cells = record
            .iter()
            .skip(1)
            .zip(universe.tickers())
            .map(|(cell, ticker)| {
                if cell.is_empty() {
                    Ok(None)
                } else {
                    Decimal::from_str(cell).map(Some).map_err(|e| {
                        malformed(format!(
                            "Line {}: invalid price '{}' for {}: {}",
                            line, cell, ticker, e
                        ))
                    })
                }
            })
            .collect::<MarkowitzResult<Vec<_>>>()?;
        rows.push((date, cells));
    }

    rows.sort_by_key(|(date, _)| *date);
    let (dates, prices) = rows.into_iter().unzip();
    PriceSeries::new(universe, dates, prices)
}

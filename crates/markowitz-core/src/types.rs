use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarkowitzError;
use crate::MarkowitzResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Ordered, distinct asset identifiers. The order indexes every vector and
/// matrix derived from the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetUniverse {
    tickers: Vec<String>,
}

impl AssetUniverse {
    pub fn new(tickers: Vec<String>) -> MarkowitzResult<Self> {
        if tickers.is_empty() {
            return Err(MarkowitzError::config(
                "tickers",
                "At least one ticker is required",
            ));
        }
        for (i, t) in tickers.iter().enumerate() {
            if t.trim().is_empty() {
                return Err(MarkowitzError::config(
                    "tickers",
                    format!("Ticker at position {} is empty", i),
                ));
            }
            if tickers[..i].contains(t) {
                return Err(MarkowitzError::config(
                    "tickers",
                    format!("Duplicate ticker '{}'", t),
                ));
            }
        }
        Ok(AssetUniverse { tickers })
    }

    /// Parse a comma-separated ticker list, e.g. `"AAPL, MSFT,GOOG"`.
    pub fn parse(list: &str) -> MarkowitzResult<Self> {
        let tickers = list.split(',').map(|t| t.trim().to_string()).collect();
        AssetUniverse::new(tickers)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }
}

impl TryFrom<Vec<String>> for AssetUniverse {
    type Error = MarkowitzError;

    fn try_from(tickers: Vec<String>) -> Result<Self, Self::Error> {
        AssetUniverse::new(tickers)
    }
}

impl From<AssetUniverse> for Vec<String> {
    fn from(u: AssetUniverse) -> Self {
        u.tickers
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

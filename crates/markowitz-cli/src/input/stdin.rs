use serde::de::DeserializeOwned;
use std::io::{self, Read};

use markowitz_core::analysis::AnalysisInput;

use super::prices::CsvPriceProvider;

/// Where an analysis run takes its prices from.
pub enum AnalysisSource {
    /// A full JSON request with prices and config.
    Request(Box<AnalysisInput>),
    /// A bare wide price table; config comes from the command line.
    Prices(CsvPriceProvider),
}

/// Text piped on stdin, or None when stdin is a terminal or blank.
pub fn read_piped() -> io::Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().lock().read_to_string(&mut buffer)?;
    if buffer.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(buffer))
}

/// Parse a piped JSON request body.
pub fn parse_request<T: DeserializeOwned>(text: &str) -> Result<T, Box<dyn std::error::Error>> {
    serde_json::from_str(text.trim())
        .map_err(|e| format!("Failed to parse stdin as JSON: {}", e).into())
}

/// A JSON object is a request; anything else is read as a price CSV.
pub fn parse_analysis(text: &str) -> Result<AnalysisSource, Box<dyn std::error::Error>> {
    let body = text.trim_start();
    if body.starts_with('{') {
        return parse_request(body).map(|r| AnalysisSource::Request(Box::new(r)));
    }
    let provider = CsvPriceProvider::from_reader(body.as_bytes())
        .map_err(|e| format!("Failed to parse stdin as a price CSV: {}", e))?;
    Ok(AnalysisSource::Prices(provider))
}

use napi::Result as NapiResult;
use napi_derive::napi;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Price history
// ---------------------------------------------------------------------------

/// Full analysis from `{ "prices": {...}, "tickers"?: [...], "config"?: {...} }`.
#[napi]
pub fn analyze_portfolio(input_json: String) -> NapiResult<String> {
    let input: markowitz_core::analysis::AnalysisInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = markowitz_core::analysis::run_analysis(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Precomputed statistics
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_portfolio(input_json: String) -> NapiResult<String> {
    let input: markowitz_core::optimization::MeanVarianceInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = markowitz_core::optimization::optimize_mean_variance(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn sample_frontier(input_json: String) -> NapiResult<String> {
    let input: markowitz_core::optimization::MeanVarianceInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        markowitz_core::frontier::generate_frontier(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single offending cell in a price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub asset: String,
    pub date: NaiveDate,
    pub reason: String,
}

impl std::fmt::Display for DataIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}: {}", self.asset, self.date, self.reason)
    }
}

fn describe_issues(issues: &[DataIssue]) -> String {
    const SHOWN: usize = 10;
    let mut parts: Vec<String> = issues.iter().take(SHOWN).map(|i| i.to_string()).collect();
    if issues.len() > SHOWN {
        parts.push(format!("... and {} more", issues.len() - SHOWN));
    }
    parts.join("; ")
}

#[derive(Debug, Error)]
pub enum MarkowitzError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Data quality: {} incomplete or invalid observation(s): {}", .issues.len(), describe_issues(.issues))]
    DataQuality { issues: Vec<DataIssue> },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta:e})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Invalid configuration: {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MarkowitzError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        MarkowitzError::Configuration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MarkowitzError {
    fn from(e: serde_json::Error) -> Self {
        MarkowitzError::SerializationError(e.to_string())
    }
}

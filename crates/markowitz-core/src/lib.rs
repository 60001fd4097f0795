//! Markowitz mean-variance portfolio analysis.
//!
//! Estimates annualized returns and covariance from price history, finds the
//! maximum Sharpe ratio and minimum volatility long-only portfolios and
//! samples random portfolios to approximate the efficient frontier.

pub mod analysis;
pub mod config;
pub mod error;
pub mod estimation;
pub mod frontier;
pub mod optimization;
pub mod types;

pub use error::MarkowitzError;
pub use types::*;

pub type MarkowitzResult<T> = Result<T, MarkowitzError>;

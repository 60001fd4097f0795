//! Price series handling and return / covariance estimation.

pub mod prices;
pub mod returns;

pub use prices::{InMemoryPriceProvider, PriceDataProvider, PriceSeries};
pub use returns::{estimate_statistics, periodic_returns, AssetStatistics, AssetSummary, ReturnSeries};

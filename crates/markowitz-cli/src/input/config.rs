use chrono::NaiveDate;
use clap::Args;
use markowitz_core::config::AnalysisConfig;
use tracing::debug;

use super::file;

/// Analysis settings shared by every subcommand.
///
/// Precedence: flags, then `--config` file, then the request's own config.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// YAML or JSON configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// First date of the estimation window (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date of the estimation window (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Annual risk-free rate (e.g. 0.02 for 2%)
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,

    /// Number of random portfolios to sample
    #[arg(long)]
    pub num_portfolios: Option<u32>,

    /// Return periods per year used for annualisation
    #[arg(long)]
    pub periods_per_year: Option<u32>,

    /// Seed for reproducible frontier sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep the weight vector of every sampled portfolio
    #[arg(long)]
    pub include_weights: bool,

    /// Solver iteration budget
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Solver stationarity tolerance
    #[arg(long)]
    pub tolerance: Option<f64>,
}

impl ConfigArgs {
    /// Layer the config file and flags over `base`.
    pub fn resolve(&self, base: AnalysisConfig) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
        let mut cfg = match self.config {
            Some(ref path) => {
                debug!(path = path.as_str(), "loading configuration file");
                file::read_structured::<AnalysisConfig>(path)?
            }
            None => base,
        };
        if self.start.is_some() {
            cfg.start = self.start;
        }
        if self.end.is_some() {
            cfg.end = self.end;
        }
        if let Some(rf) = self.risk_free_rate {
            cfg.risk_free_rate = rf;
        }
        if let Some(n) = self.num_portfolios {
            cfg.num_portfolios = n;
        }
        if let Some(p) = self.periods_per_year {
            cfg.trading_periods_per_year = p;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.include_weights {
            cfg.include_weights = true;
        }
        if let Some(m) = self.max_iterations {
            cfg.solver.max_iterations = m;
        }
        if let Some(t) = self.tolerance {
            cfg.solver.tolerance = t;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

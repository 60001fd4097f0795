use clap::Args;
use serde_json::Value;

use markowitz_core::frontier;
use markowitz_core::optimization::{self, MeanVarianceInput};

use crate::input;
use crate::input::config::ConfigArgs;
use crate::output::frontier_csv;

#[derive(Args)]
pub struct OptimizeArgs {
    /// JSON with asset_names, expected_returns and covariance_matrix (annualized)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

#[derive(Args)]
pub struct FrontierArgs {
    /// JSON with asset_names, expected_returns and covariance_matrix (annualized)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub settings: ConfigArgs,

    /// Also write the sampled frontier to this CSV file
    #[arg(long)]
    pub frontier_csv: Option<String>,
}

fn read_request(
    path: Option<&str>,
    settings: &ConfigArgs,
    what: &str,
) -> Result<MeanVarianceInput, Box<dyn std::error::Error>> {
    let mut request: MeanVarianceInput = if let Some(path) = path {
        input::file::read_json(path)?
    } else if let Some(text) = input::stdin::read_piped()? {
        input::stdin::parse_request(&text)?
    } else {
        return Err(format!("--input <file.json> or stdin required for {}", what).into());
    };
    request.config = settings.resolve(request.config)?;
    Ok(request)
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref(), &args.settings, "optimization")?;
    let result = optimization::optimize_mean_variance(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref(), &args.settings, "frontier sampling")?;
    let result = frontier::generate_frontier(&request)?;
    if let Some(ref path) = args.frontier_csv {
        frontier_csv::write_frontier_csv(path, &request.asset_names, &result.result)?;
    }
    Ok(serde_json::to_value(result)?)
}

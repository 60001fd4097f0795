use clap::Args;
use serde_json::Value;
use tracing::info;

use markowitz_core::analysis;
use markowitz_core::AssetUniverse;

use crate::input;
use crate::input::config::ConfigArgs;
use crate::input::prices::CsvPriceProvider;
use crate::input::stdin::{self, AnalysisSource};
use crate::output::frontier_csv;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Wide price CSV: a `date` column followed by one column per ticker
    #[arg(long, conflicts_with = "input")]
    pub prices: Option<String>,

    /// JSON analysis request ({ "prices": {...}, "config": {...} }).
    /// Without --prices or --input, stdin may carry either form.
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated tickers to analyse, in order (default: every column)
    #[arg(long)]
    pub tickers: Option<String>,

    #[command(flatten)]
    pub settings: ConfigArgs,

    /// Also write the sampled frontier to this CSV file
    #[arg(long)]
    pub frontier_csv: Option<String>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tickers = args.tickers.as_deref().map(AssetUniverse::parse).transpose()?;

    let source = if let Some(ref path) = args.prices {
        AnalysisSource::Prices(CsvPriceProvider::from_path(path)?)
    } else if let Some(ref path) = args.input {
        AnalysisSource::Request(Box::new(input::file::read_json(path)?))
    } else if let Some(text) = stdin::read_piped()? {
        stdin::parse_analysis(&text)?
    } else {
        return Err("--prices <file.csv>, --input <file.json> or stdin required for analysis".into());
    };

    let result = match source {
        AnalysisSource::Prices(provider) => {
            let universe = tickers.unwrap_or_else(|| provider.universe().clone());
            let config = args.settings.resolve(Default::default())?;
            info!(assets = universe.len(), "analysing price table");
            analysis::analyze_with_provider(&provider, &universe, &config)?
        }
        AnalysisSource::Request(request) => {
            let mut request = *request;
            request.config = args.settings.resolve(request.config)?;
            if tickers.is_some() {
                request.tickers = tickers;
            }
            analysis::run_analysis(&request)?
        }
    };

    if let Some(ref path) = args.frontier_csv {
        let names: Vec<String> = result.result.assets.iter().map(|a| a.ticker.clone()).collect();
        frontier_csv::write_frontier_csv(path, &names, &result.result.frontier)?;
    }

    Ok(serde_json::to_value(result)?)
}

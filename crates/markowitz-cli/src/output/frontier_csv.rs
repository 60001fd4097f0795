use markowitz_core::frontier::FrontierSampleSet;
use tracing::info;

/// Write one row per sampled portfolio: return, risk, Sharpe, then one
/// weight column per asset when the samples carry weights.
pub fn write_frontier_csv(
    path: &str,
    tickers: &[String],
    set: &FrontierSampleSet,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    write_samples(&mut wtr, tickers, set)?;
    wtr.flush()?;
    info!(path, samples = set.len(), "wrote frontier samples");
    Ok(())
}

fn write_samples<W: std::io::Write>(
    wtr: &mut csv::Writer<W>,
    tickers: &[String],
    set: &FrontierSampleSet,
) -> Result<(), Box<dyn std::error::Error>> {
    let with_weights = set.samples.iter().any(|s| s.weights.is_some());

    let mut header = vec![
        "expected_return".to_string(),
        "risk".to_string(),
        "sharpe_ratio".to_string(),
    ];
    if with_weights {
        header.extend(tickers.iter().map(|t| format!("w_{}", t)));
    }
    wtr.write_record(&header)?;

    for s in &set.samples {
        let mut row = vec![
            s.expected_return.to_string(),
            s.risk.to_string(),
            s.sharpe_ratio.map(|v| v.to_string()).unwrap_or_default(),
        ];
        if with_weights {
            match s.weights {
                Some(ref w) => row.extend(w.iter().map(|x| x.to_string())),
                None => row.extend(tickers.iter().map(|_| String::new())),
            }
        }
        wtr.write_record(&row)?;
    }
    Ok(())
}

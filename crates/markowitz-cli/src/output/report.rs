use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Returns and risk as percentages with two decimals.
pub fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn num(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_f64)
}

fn ratio(v: Option<&Value>) -> String {
    num(v).map(|x| format!("{:.2}", x)).unwrap_or_else(|| "n/a".into())
}

fn percent_or_na(v: Option<&Value>) -> String {
    num(v).map(pct).unwrap_or_else(|| "n/a".into())
}

/// True when the result looks like a portfolio analysis or optimization.
pub fn is_portfolio_result(result: &Map<String, Value>) -> bool {
    result.contains_key("optimal_portfolio") || result.contains_key("samples")
}

/// Human-readable report: per-asset statistics, both portfolios, frontier
/// summary.
pub fn print_portfolio_report(result: &Map<String, Value>) {
    if let Some(Value::Array(assets)) = result.get("assets") {
        println!("Assets");
        let mut builder = Builder::default();
        builder.push_record(["Ticker", "Expected Return", "Risk"]);
        for a in assets {
            builder.push_record([
                a.get("ticker").and_then(Value::as_str).unwrap_or("").to_string(),
                percent_or_na(a.get("expected_return")),
                percent_or_na(a.get("risk")),
            ]);
        }
        println!("{}", Table::from(builder));
    }

    for (key, label) in [
        ("optimal_portfolio", "Optimal Portfolio (max Sharpe)"),
        ("minimum_risk_portfolio", "Minimum-Risk Portfolio"),
    ] {
        if let Some(Value::Object(p)) = result.get(key) {
            println!("\n{}", label);
            print_portfolio(p);
        }
    }

    if let Some(Value::Object(f)) = result.get("frontier") {
        println!("\nFrontier");
        print_frontier_summary(f);
    } else if result.contains_key("samples") {
        println!("Frontier");
        print_frontier_summary(result);
    }

    if let Some(Value::Number(obs)) = result.get("observations") {
        println!("\nObservations: {}", obs);
    }
}

fn print_portfolio(p: &Map<String, Value>) {
    if p.get("status").and_then(Value::as_str) == Some("failed") {
        let reason = p.get("reason").and_then(Value::as_str).unwrap_or("unknown");
        println!("  unavailable: {}", reason);
        return;
    }
    if let Some(Value::Array(weights)) = p.get("weights") {
        let mut builder = Builder::default();
        builder.push_record(["Ticker", "Weight"]);
        for w in weights {
            builder.push_record([
                w.get("ticker").and_then(Value::as_str).unwrap_or("").to_string(),
                percent_or_na(w.get("weight")),
            ]);
        }
        println!("{}", Table::from(builder));
    }
    println!("  Expected return: {}", percent_or_na(p.get("expected_return")));
    println!("  Risk:            {}", percent_or_na(p.get("risk")));
    println!("  Sharpe ratio:    {}", ratio(p.get("sharpe_ratio")));
}

fn print_frontier_summary(f: &Map<String, Value>) {
    let samples: &[Value] = match f.get("samples") {
        Some(Value::Array(s)) => s.as_slice(),
        _ => &[],
    };
    let best = samples
        .iter()
        .filter(|s| num(s.get("sharpe_ratio")).is_some())
        .max_by(|a, b| {
            let x = num(a.get("sharpe_ratio")).unwrap_or(f64::NEG_INFINITY);
            let y = num(b.get("sharpe_ratio")).unwrap_or(f64::NEG_INFINITY);
            x.total_cmp(&y)
        });
    let safest = samples.iter().min_by(|a, b| {
        let x = num(a.get("risk")).unwrap_or(f64::INFINITY);
        let y = num(b.get("risk")).unwrap_or(f64::INFINITY);
        x.total_cmp(&y)
    });

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    builder.push_record(["samples".to_string(), samples.len().to_string()]);
    if let Some(seed) = f.get("seed") {
        builder.push_record(["seed".to_string(), seed.to_string()]);
    }
    if let Some(d) = f.get("degenerate_samples") {
        builder.push_record(["zero-risk samples".to_string(), d.to_string()]);
    }
    if let Some(s) = best {
        builder.push_record([
            "best sampled Sharpe".to_string(),
            format!(
                "{} (return {}, risk {})",
                ratio(s.get("sharpe_ratio")),
                percent_or_na(s.get("expected_return")),
                percent_or_na(s.get("risk"))
            ),
        ]);
    }
    if let Some(s) = safest {
        builder.push_record([
            "lowest sampled risk".to_string(),
            format!(
                "{} (return {})",
                percent_or_na(s.get("risk")),
                percent_or_na(s.get("expected_return"))
            ),
        ]);
    }
    println!("{}", Table::from(builder));
}

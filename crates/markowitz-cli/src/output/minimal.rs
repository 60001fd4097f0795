use serde_json::Value;

/// Print just the key answer from the output.
///
/// Portfolio results print the optimal weights as `TICKER=weight` pairs,
/// frontier results the sample count and seed; anything else falls back to
/// the first field of the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(line) = minimal_line(result_obj) {
        println!("{}", line);
        return;
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn minimal_line(result: &Value) -> Option<String> {
    for key in ["optimal_portfolio", "minimum_risk_portfolio"] {
        if let Some(Value::Array(weights)) = result.get(key).and_then(|p| p.get("weights")) {
            let pairs: Vec<String> = weights
                .iter()
                .map(|w| {
                    format!(
                        "{}={:.4}",
                        w.get("ticker").and_then(Value::as_str).unwrap_or("?"),
                        w.get("weight").and_then(Value::as_f64).unwrap_or(f64::NAN)
                    )
                })
                .collect();
            return Some(pairs.join(","));
        }
    }
    let samples = result.get("samples").and_then(Value::as_array)?;
    let seed = result.get("seed").map(format_minimal).unwrap_or_default();
    Some(format!("samples={} seed={}", samples.len(), seed))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_optimal_weights_line() {
        let result = serde_json::json!({
            "optimal_portfolio": {
                "status": "converged",
                "weights": [
                    { "ticker": "A", "weight": 0.5 },
                    { "ticker": "B", "weight": 0.5 }
                ]
            }
        });
        assert_eq!(minimal_line(&result).unwrap(), "A=0.5000,B=0.5000");
    }

    #[test]
    fn test_falls_back_to_minimum_risk_when_optimal_failed() {
        let result = serde_json::json!({
            "optimal_portfolio": { "status": "failed", "reason": "x" },
            "minimum_risk_portfolio": { "weights": [ { "ticker": "A", "weight": 1.0 } ] }
        });
        assert_eq!(minimal_line(&result).unwrap(), "A=1.0000");
    }

    #[test]
    fn test_frontier_line() {
        let result = serde_json::json!({ "samples": [{}, {}], "seed": 42 });
        assert_eq!(minimal_line(&result).unwrap(), "samples=2 seed=42");
    }
}

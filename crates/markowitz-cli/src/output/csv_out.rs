use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// Frontier results become one row per sample; portfolio results one row per
/// (portfolio, asset) weight; anything else a two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            if let Some(Value::Array(samples)) = map.get("samples") {
                write_array_csv(&mut wtr, samples);
            } else if map.contains_key("optimal_portfolio") {
                write_weights_csv(&mut wtr, map);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(result)]);
        }
    }

    let _ = wtr.flush();
}

fn write_weights_csv<W: io::Write>(wtr: &mut csv::Writer<W>, result: &Map<String, Value>) {
    let _ = wtr.write_record([
        "portfolio",
        "ticker",
        "weight",
        "contribution_to_return",
        "contribution_to_risk",
    ]);
    for key in ["optimal_portfolio", "minimum_risk_portfolio"] {
        let Some(Value::Array(weights)) = result.get(key).and_then(|p| p.get("weights")) else {
            continue;
        };
        for w in weights {
            let field = |name: &str| w.get(name).map(format_csv_value).unwrap_or_default();
            let _ = wtr.write_record([
                key.to_string(),
                field("ticker"),
                field("weight"),
                field("contribution_to_return"),
                field("contribution_to_risk"),
            ]);
        }
    }
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_weights_rows_skip_failed_portfolio() {
        let result = serde_json::json!({
            "optimal_portfolio": { "status": "failed", "reason": "did not converge" },
            "minimum_risk_portfolio": {
                "status": "converged",
                "weights": [
                    { "ticker": "A", "weight": 0.7, "contribution_to_return": 0.07, "contribution_to_risk": 0.1 }
                ]
            }
        });
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_weights_csv(&mut wtr, result.as_object().unwrap());
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "minimum_risk_portfolio,A,0.7,0.07,0.1");
    }
}

pub mod csv_out;
pub mod frontier_csv;
pub mod json;
pub mod minimal;
pub mod report;
pub mod table;

use colored::Colorize;
use serde_json::Value;

use crate::OutputFormat;

/// Render a command result in the requested format.
///
/// JSON keeps the envelope and the table report prints its warnings inline.
/// CSV and minimal output carry only the result, so warnings go to stderr.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => {
            report_warnings(value);
            csv_out::print_csv(value);
        }
        OutputFormat::Minimal => {
            report_warnings(value);
            minimal::print_minimal(value);
        }
    }
}

fn report_warnings(value: &Value) {
    for w in envelope_warnings(value) {
        eprintln!("{}: {}", "warning".yellow().bold(), w);
    }
}

fn envelope_warnings(value: &Value) -> Vec<&str> {
    value
        .get("warnings")
        .and_then(Value::as_array)
        .map(|ws| ws.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

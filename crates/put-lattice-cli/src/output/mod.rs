pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Result fields holding per-step rows; tabular formats expand these.
pub const ROW_FIELDS: [&str; 2] = ["boundary", "points"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a scalar JSON value as plain text.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// First array-of-rows field found in a result object.
pub fn row_field(result: &serde_json::Map<String, Value>) -> Option<(&'static str, &[Value])> {
    ROW_FIELDS.iter().find_map(|key| match result.get(*key) {
        Some(Value::Array(rows)) => Some((*key, rows.as_slice())),
        _ => None,
    })
}

/// Column names across every object row, in first-seen order.
///
/// Boundary rows drop `node` and `stock_price` on `no_exercise` steps, so
/// the first row alone does not carry the full column set.
pub fn row_headers(rows: &[Value]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for key in row.keys() {
            if !headers.contains(&key.as_str()) {
                headers.push(key.as_str());
            }
        }
    }
    headers
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_row_headers_union_in_first_seen_order() {
        let rows = vec![
            json!({"decision": "no_exercise", "time": 0.1, "time_step": 1}),
            json!({"decision": "exercise", "node": 0, "stock_price": 40.0, "time": 0.2, "time_step": 2}),
        ];
        assert_eq!(
            row_headers(&rows),
            vec!["decision", "time", "time_step", "node", "stock_price"]
        );
    }

    #[test]
    fn test_row_field_finds_boundary_and_points() {
        let price = fixtures::price_envelope();
        let (name, rows) = row_field(price["result"].as_object().unwrap()).unwrap();
        assert_eq!(name, "boundary");
        assert_eq!(rows.len(), 3);

        let study = fixtures::convergence_envelope();
        let (name, rows) = row_field(study["result"].as_object().unwrap()).unwrap();
        assert_eq!(name, "points");
        assert_eq!(rows.len(), 3);
    }
}

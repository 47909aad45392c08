use serde_json::Value;

use super::format_scalar;

/// Key answer fields, most specific first.
const PRIORITY_KEYS: [&str; 3] = ["option_price", "final_price", "stock_price"];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    for line in render_minimal(value) {
        println!("{line}");
    }
}

fn render_minimal(value: &Value) -> Vec<String> {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result_obj {
        Value::Object(map) => {
            if let Some(val) = PRIORITY_KEYS
                .iter()
                .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
            {
                return vec![format_scalar(val)];
            }
            map.iter()
                .next()
                .map(|(key, val)| vec![format!("{}: {}", key, format_scalar(val))])
                .unwrap_or_default()
        }
        // Row listings: one line per row, "<time_step|node> <stock_price>"
        Value::Array(rows) => rows
            .iter()
            .map(|row| {
                let label = row
                    .get("time_step")
                    .or_else(|| row.get("node"))
                    .map(format_scalar)
                    .unwrap_or_default();
                let price = row.get("stock_price").map(format_scalar).unwrap_or_default();
                format!("{label} {price}")
            })
            .collect(),
        other => vec![format_scalar(other)],
    }
}

use serde_json::Value;
use std::fmt::Write;
use tabled::{builder::Builder, Table};

use super::{format_scalar, row_field, row_headers};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    print!("{}", render_table(value));
}

fn render_table(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => render_result_table(&mut out, result, map),
            None => render_flat_object(&mut out, map),
        },
        Value::Array(rows) => render_row_table(&mut out, rows),
        _ => push_line(&mut out, &value.to_string()),
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn render_result_table(
    out: &mut String,
    result: &Value,
    envelope: &serde_json::Map<String, Value>,
) {
    match result {
        Value::Object(res_map) => {
            render_flat_object(out, res_map);
            if let Some((name, rows)) = row_field(res_map) {
                push_line(out, &format!("\n{}:", capitalise(name)));
                render_row_table(out, rows);
            }
        }
        Value::Array(rows) => render_row_table(out, rows),
        other => push_line(out, &format_scalar(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            push_line(out, "\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                let _ = writeln!(out, "  - {w}");
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        let _ = writeln!(out, "\nMethodology: {meth}");
    }
}

fn render_flat_object(out: &mut String, map: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_cell(val)]);
    }
    push_line(out, &Table::from(builder).to_string());
}

fn render_row_table(out: &mut String, rows: &[Value]) {
    let headers = row_headers(rows);
    if headers.is_empty() {
        if rows.is_empty() {
            push_line(out, "(empty)");
        }
        for row in rows {
            push_line(out, &format_scalar(row));
        }
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(headers.iter().copied());
    for row in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(*h).map(format_cell).unwrap_or_else(|| "-".to_string())),
        );
    }
    push_line(out, &Table::from(builder).to_string());
}

/// Nested objects and row arrays are summarised rather than inlined.
fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Array(items) if items.iter().any(Value::is_object) => {
            format!("[{} rows]", items.len())
        }
        Value::Array(items) => items.iter().map(format_scalar).collect::<Vec<_>>().join(", "),
        _ => format_scalar(value),
    }
}

fn capitalise(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

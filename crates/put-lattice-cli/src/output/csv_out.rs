use serde_json::Value;
use std::io;

use super::{format_scalar, row_field, row_headers};

/// Write output as CSV to stdout.
///
/// Per-step rows (boundary, convergence points) are written as a table so
/// the output feeds straight into plotting tools; anything else becomes
/// two-column `field,value` records.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Err(e) = write_value(&mut wtr, value).and_then(|_| wtr.flush().map_err(csv::Error::from)) {
        tracing::error!(error = %e, "CSV output failed");
    }
}

fn write_value<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => match row_field(result) {
                Some((_, rows)) => write_rows(wtr, rows),
                None => write_fields(wtr, result),
            },
            Some(Value::Array(rows)) => write_rows(wtr, rows),
            _ => write_fields(wtr, map),
        },
        Value::Array(rows) => write_rows(wtr, rows),
        _ => wtr.write_record([format_scalar(value)]),
    }
}

fn write_fields<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    map: &serde_json::Map<String, Value>,
) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in map {
        wtr.write_record([key.as_str(), &format_scalar(val)])?;
    }
    Ok(())
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let headers = row_headers(rows);
    if headers.is_empty() {
        for row in rows {
            wtr.write_record([format_scalar(row)])?;
        }
        return Ok(());
    }

    wtr.write_record(&headers)?;
    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_scalar).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }
    Ok(())
}

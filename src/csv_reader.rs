use anyhow::{Context, Result};
use std::io::Read;

use crate::data::{Row, RowSet, Value};

/// Parse CSV text with a header row into a `RowSet`.
pub fn read_csv_str(text: &str) -> Result<RowSet> {
    read_csv(text.as_bytes())
}

/// Read CSV with a header row. Cells are typed by [`infer_value`].
pub fn read_csv<R: Read>(reader: R) -> Result<RowSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        // Header is line 1
        let record = record.with_context(|| format!("Failed to read CSV record {}", line + 2))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, raw)| (header.clone(), infer_value(raw)))
            .collect();
        rows.push(row);
    }

    Ok(RowSet::new(rows))
}

/// Empty -> null, numeric -> number, `true`/`false` -> bool, else text.
pub fn infer_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::text(raw),
    }
}

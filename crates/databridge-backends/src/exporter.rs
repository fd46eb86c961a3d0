//! CSV export of stored tables

use std::time::Instant;

use tracing::info;

use databridge_common::{Result, TableRecord};

use crate::backend::Backend;

/// A rendered CSV document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    /// Suggested download name, `{table}.csv`
    pub filename: String,
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Read every row of `table` and render it as CSV
pub async fn export_table(backend: &mut dyn Backend, table: &str) -> Result<CsvExport> {
    let start = Instant::now();
    let record = backend.export_rows(table).await?;
    let export = render_csv(table, &record);
    info!(
        table,
        rows = export.rows,
        bytes = export.bytes.len(),
        "Export completed in {:?}",
        start.elapsed()
    );
    Ok(export)
}

/// Header of column names, then one line per row in record order. Nulls are
/// empty fields.
#[must_use]
pub fn render_csv(table: &str, record: &TableRecord) -> CsvExport {
    let mut out = String::new();

    let header: Vec<String> = record.columns.iter().map(|c| escape_csv(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in &record.rows {
        let values: Vec<String> = row
            .columns
            .iter()
            .map(|cell| cell.value.to_text().map(|t| escape_csv(&t)).unwrap_or_default())
            .collect();
        out.push_str(&values.join(","));
        out.push('\n');
    }

    CsvExport {
        filename: format!("{}.csv", table),
        bytes: out.into_bytes(),
        rows: record.rows.len(),
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

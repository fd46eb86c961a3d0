//! Persisting untyped rows as a relational table
//!
//! The first row defines the column set; every column is `TEXT`. The target
//! table is dropped and recreated, then rows are inserted one at a time with
//! bound parameters inside a single transaction.
//!
//! Engines with transactional DDL run the drop and create inside that same
//! transaction, so a failed save leaves the previous table untouched. MySQL
//! commits DDL implicitly, so there the table is replaced first and only the
//! inserts share a transaction; a failed save leaves an empty table.

use std::collections::HashSet;
use std::time::Instant;

use sqlx::Connection;
use tracing::{debug, info, warn};

use databridge_common::{BridgeError, Result, Row};

use super::connection::{dispatch, query_error, SqlConnection};
use super::executor::finish_transaction;

/// Columns of the table derived from `rows`: the keys of the first row
pub fn derive_columns(rows: &[Row]) -> Result<Vec<String>> {
    let first = rows
        .first()
        .ok_or_else(|| BridgeError::InvalidRequest("no rows to save".into()))?;
    if first.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "the first row has no columns".into(),
        ));
    }
    let columns: Vec<String> = first.names().map(String::from).collect();
    if columns.iter().any(|c| c.is_empty()) {
        return Err(BridgeError::InvalidRequest("column names must not be empty".into()));
    }
    Ok(columns)
}

/// Bound parameters for one row, in column order. Absent or null cells are
/// SQL NULL; nested values cannot be stored.
pub fn row_parameters(row: &Row, columns: &[String], row_index: usize) -> Result<Vec<Option<String>>> {
    columns
        .iter()
        .map(|column| match row.get(column) {
            None => Ok(None),
            Some(value) if value.is_nested() => Err(BridgeError::WriteFailed {
                row_index,
                detail: format!(
                    "column '{}' holds a nested {} value",
                    column,
                    value.type_name()
                ),
            }),
            Some(value) => Ok(value.to_text()),
        })
        .collect()
}

/// Number of rows carrying attributes outside `columns`
fn rows_with_extra_keys(rows: &[Row], columns: &[String]) -> usize {
    let known: HashSet<&str> = columns.iter().map(String::as_str).collect();
    rows.iter()
        .filter(|row| row.names().any(|name| !known.contains(name)))
        .count()
}

fn ddl_error(e: sqlx::Error) -> BridgeError {
    BridgeError::query(format!("replacing table failed: {}", e))
}

/// Replace `table` with `rows`, returning the number of rows inserted
pub async fn save_rows(conn: &mut SqlConnection, table: &str, rows: Vec<Row>) -> Result<u64> {
    let ddl_in_transaction = conn.dialect().transactional_ddl();
    write_table(conn, table, rows, ddl_in_transaction).await
}

async fn write_table(
    conn: &mut SqlConnection,
    table: &str,
    rows: Vec<Row>,
    ddl_in_transaction: bool,
) -> Result<u64> {
    if table.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("table name is required".into()));
    }
    let columns = derive_columns(&rows)?;

    let dropped = rows_with_extra_keys(&rows, &columns);
    if dropped > 0 {
        warn!(
            table,
            rows = dropped,
            "Attributes not present in the first row are dropped"
        );
    }

    let dialect = conn.dialect();
    let drop_sql = dialect.drop_table_sql(table);
    let create_sql = dialect.create_text_table_sql(table, &columns);
    let insert_sql = dialect.insert_sql(table, &columns);
    let start = Instant::now();
    debug!(table, ddl_in_transaction, "Replacing table");

    let written = dispatch!(conn, c => {
        if !ddl_in_transaction {
            for ddl in [&drop_sql, &create_sql] {
                sqlx::query(ddl).execute(&mut *c).await.map_err(ddl_error)?;
            }
        }

        let mut tx = c.begin().await.map_err(query_error)?;
        let outcome: Result<u64> = async {
            if ddl_in_transaction {
                for ddl in [&drop_sql, &create_sql] {
                    sqlx::query(ddl).execute(&mut *tx).await.map_err(ddl_error)?;
                }
            }
            for (row_index, row) in rows.iter().enumerate() {
                let params = row_parameters(row, &columns, row_index)?;
                let mut insert = sqlx::query(&insert_sql);
                for param in params {
                    insert = insert.bind(param);
                }
                insert
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| BridgeError::WriteFailed {
                        row_index,
                        detail: e.to_string(),
                    })?;
            }
            Ok(rows.len() as u64)
        }
        .await;
        finish_transaction(tx, outcome).await
    })?;

    info!(
        table,
        rows = written,
        columns = columns.len(),
        "Saved table in {:?}",
        start.elapsed()
    );
    Ok(written)
}

//! Ad-hoc statement execution

use sqlx::{Column as _, Connection, Database, Executor as _, Row as _, Transaction};
use tracing::{debug, warn};

use databridge_common::{BridgeError, QueryResult, Result};

use super::connection::{describe_columns, dispatch, query_error, SqlConnection};
use super::decode::decode_row;

/// Whether a statement produces rows or only a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Rows,
    Status,
}

/// Classify by leading keyword: anything starting with `SELECT`
/// (case-insensitive, after leading whitespace) yields rows.
#[must_use]
pub fn classify_statement(query: &str) -> StatementKind {
    let is_select = query
        .trim_start()
        .get(..6)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("select"));
    if is_select {
        StatementKind::Rows
    } else {
        StatementKind::Status
    }
}

/// Run `query` inside its own transaction; commit on success, roll back on
/// any failure.
///
/// A row-producing statement that matches nothing still reports its column
/// names, taken from the prepared statement.
pub async fn execute_in_transaction(conn: &mut SqlConnection, query: &str) -> Result<QueryResult> {
    if query.trim().is_empty() {
        return Err(BridgeError::EmptyQuery);
    }
    debug!(query, "Executing statement");
    let kind = classify_statement(query);

    dispatch!(conn, c => {
        let mut tx = c.begin().await.map_err(query_error)?;
        let outcome: Result<QueryResult> = async {
            match kind {
                StatementKind::Rows => {
                    let rows = (&mut *tx).fetch_all(query).await.map_err(query_error)?;
                    let columns = match rows.first() {
                        Some(first) => first
                            .columns()
                            .iter()
                            .map(|column| column.name().to_string())
                            .collect(),
                        None => describe_columns(&mut *tx, query).await,
                    };
                    let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
                    Ok(QueryResult::Rows { columns, rows })
                }
                StatementKind::Status => {
                    let done = (&mut *tx).execute(query).await.map_err(query_error)?;
                    Ok(QueryResult::Status {
                        message: "Query executed successfully".to_string(),
                        rows_affected: done.rows_affected(),
                    })
                }
            }
        }
        .await;
        finish_transaction(tx, outcome).await
    })
}

/// Commit when `outcome` succeeded, otherwise roll back and return the
/// original error.
pub(crate) async fn finish_transaction<DB: Database, T>(
    tx: Transaction<'_, DB>,
    outcome: Result<T>,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| BridgeError::query(format!("commit failed: {}", e)))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                warn!("Rollback failed: {}", e);
            }
            Err(err)
        }
    }
}

//! The capability interface every storage backend implements

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use databridge_common::{BridgeError, ColumnSchema, QueryResult, Result, Row, TableRecord};

use crate::descriptor::BackendKind;

/// An open handle onto one backend, owned by a single request.
///
/// Capabilities a backend lacks keep the default method, which reports the
/// matching error.
#[async_trait]
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Names of every table, without duplicates
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Column definitions of `table`
    async fn get_columns(&mut self, table: &str) -> Result<ColumnSchema>;

    /// At most `limit` rows of `table`, aligned to one column list
    async fn get_data(&mut self, table: &str, limit: usize) -> Result<TableRecord>;

    /// Every row of `table`
    async fn export_rows(&mut self, table: &str) -> Result<TableRecord>;

    /// Run an ad-hoc statement
    async fn execute(&mut self, _query: &str) -> Result<QueryResult> {
        Err(BridgeError::UnsupportedBackend {
            tag: self.kind().to_string(),
        })
    }

    /// Replace `table` with `rows`, returning the number of rows written
    async fn save_table(&mut self, _table: &str, _rows: Vec<Row>) -> Result<u64> {
        Err(BridgeError::UnsupportedDestination(self.kind().to_string()))
    }

    /// Release the handle
    async fn close(self: Box<Self>) {}
}

/// Run `fut`, failing with [`BridgeError::Timeout`] once `limit` elapses
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Drop repeated names, keeping the first occurrence
pub(crate) fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

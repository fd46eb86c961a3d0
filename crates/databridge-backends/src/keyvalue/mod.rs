//! Key-value backend
//!
//! Items carry their own attribute sets, so column lists are derived from the
//! data: the union of attribute names in first-seen order, with every row
//! padded with nulls.

pub mod dynamodb;
pub mod memory;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use databridge_common::{ColumnSchema, Result, Row, TableRecord};

use crate::backend::{dedup_names, with_timeout, Backend};
use crate::descriptor::BackendKind;

pub use dynamodb::DynamoStore;
pub use memory::MemoryDocumentStore;

/// Raw access to a schemaless document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every table name, across all result pages
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Items of `table`; `None` reads every page
    async fn scan(&self, table: &str, limit: Option<usize>) -> Result<Vec<Row>>;

    /// Declared key attribute names of `table`
    async fn key_attributes(&self, table: &str) -> Result<Vec<String>>;
}

/// [`Backend`] over any [`DocumentStore`]
pub struct KeyValueBackend {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl KeyValueBackend {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn scan_record(
        &self,
        operation: &str,
        table: &str,
        limit: Option<usize>,
    ) -> Result<TableRecord> {
        let start = Instant::now();
        let items = with_timeout(operation, self.timeout, self.store.scan(table, limit)).await?;
        let record = TableRecord::from_rows(items);
        info!(
            table,
            rows = record.len(),
            columns = record.columns.len(),
            "Scan completed in {:?}",
            start.elapsed()
        );
        Ok(record)
    }
}

#[async_trait]
impl Backend for KeyValueBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let names = with_timeout("list_tables", self.timeout, self.store.list_tables()).await?;
        Ok(dedup_names(names))
    }

    async fn get_columns(&mut self, table: &str) -> Result<ColumnSchema> {
        let sample =
            with_timeout("get_columns", self.timeout, self.store.scan(table, Some(1))).await?;
        if let Some(item) = sample.first() {
            return Ok(ColumnSchema::untyped(item.names()));
        }

        debug!(table, "Table is empty, falling back to key schema");
        let keys = with_timeout(
            "get_columns",
            self.timeout,
            self.store.key_attributes(table),
        )
        .await?;
        Ok(ColumnSchema::untyped(keys))
    }

    async fn get_data(&mut self, table: &str, limit: usize) -> Result<TableRecord> {
        self.scan_record("get_data", table, Some(limit)).await
    }

    async fn export_rows(&mut self, table: &str) -> Result<TableRecord> {
        self.scan_record("export", table, None).await
    }
}

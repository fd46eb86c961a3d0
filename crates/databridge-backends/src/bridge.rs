//! Per-request operations
//!
//! Every operation resolves the connection description, opens a fresh
//! backend handle, runs exactly one capability and closes the handle again,
//! whether or not the capability succeeded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use databridge_common::{
    BackendOptions, BridgeError, ColumnSchema, QueryResult, Result, Row, TableRecord, Value,
};

use crate::backend::Backend;
use crate::descriptor::{resolve, BackendKind, ConnectionDescriptor};
use crate::exporter::{self, CsvExport};
use crate::keyvalue::{DynamoStore, KeyValueBackend};
use crate::relational::RelationalBackend;

/// Opens backend handles for resolved descriptors
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Backend>>;
}

/// Connects to the real engines named by the descriptor
pub struct DefaultConnector {
    timeout: Duration,
}

impl DefaultConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Backend>> {
        open_backend(descriptor, self.timeout).await
    }
}

/// Open a handle for `descriptor`
pub async fn open_backend(
    descriptor: &ConnectionDescriptor,
    timeout: Duration,
) -> Result<Box<dyn Backend>> {
    match descriptor {
        ConnectionDescriptor::Relational { dsn } => {
            Ok(Box::new(RelationalBackend::connect(dsn, timeout).await?))
        }
        ConnectionDescriptor::KeyValueStore(creds) => Ok(Box::new(KeyValueBackend::new(
            Arc::new(DynamoStore::new(creds)),
            timeout,
        ))),
    }
}

/// A fetched data page with its preview rows
#[derive(Debug, Clone)]
pub struct DataPage {
    pub record: TableRecord,
    pub samples: Vec<Row>,
}

/// Entry point for every client-visible operation
#[derive(Clone)]
pub struct Bridge {
    connector: Arc<dyn Connector>,
    options: BackendOptions,
}

impl Bridge {
    pub fn new(options: BackendOptions) -> Self {
        let connector = Arc::new(DefaultConnector::new(options.timeout()));
        Self { connector, options }
    }

    pub fn with_connector(options: BackendOptions, connector: Arc<dyn Connector>) -> Self {
        Self { connector, options }
    }

    #[must_use]
    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Backend>> {
        debug!(?descriptor, "Opening backend");
        self.connector.open(descriptor).await
    }

    /// List the tables reachable through a connection description
    #[instrument(skip(self, payload))]
    pub async fn connect(&self, tag: Option<&str>, payload: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        let descriptor = resolve(tag, payload)?;
        let mut backend = self.open(&descriptor).await?;
        let result = backend.list_tables().await;
        backend.close().await;

        let tables = result?;
        info!(
            backend = %descriptor.kind(),
            tables = tables.len(),
            "Connect completed in {:?}",
            start.elapsed()
        );
        Ok(tables)
    }

    #[instrument(skip(self, payload))]
    pub async fn list_columns(
        &self,
        tag: Option<&str>,
        payload: &str,
        table: &str,
    ) -> Result<ColumnSchema> {
        require("table name", table)?;
        let descriptor = resolve(tag, payload)?;
        let mut backend = self.open(&descriptor).await?;
        let result = backend.get_columns(table).await;
        backend.close().await;
        result
    }

    /// Fetch up to `limit` rows (the configured page limit when absent)
    #[instrument(skip(self, payload))]
    pub async fn get_data(
        &self,
        tag: Option<&str>,
        payload: &str,
        table: &str,
        limit: Option<usize>,
    ) -> Result<DataPage> {
        require("table name", table)?;
        let limit = limit.unwrap_or(self.options.page_limit);
        let descriptor = resolve(tag, payload)?;

        let start = Instant::now();
        let mut backend = self.open(&descriptor).await?;
        let result = backend.get_data(table, limit).await;
        backend.close().await;

        let record = result?;
        info!(
            table,
            rows = record.len(),
            "Data fetch completed in {:?}",
            start.elapsed()
        );
        let samples = record.samples(self.options.sample_size).to_vec();
        Ok(DataPage { record, samples })
    }

    /// Run an ad-hoc statement against the relational engine
    #[instrument(skip(self, payload, query))]
    pub async fn execute(&self, payload: &str, query: &str) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(BridgeError::EmptyQuery);
        }
        let descriptor = resolve(None, payload)?;

        let start = Instant::now();
        let mut backend = self.open(&descriptor).await?;
        let result = backend.execute(query).await;
        backend.close().await;

        let outcome = result?;
        info!(rows = outcome.is_rows(), "Query completed in {:?}", start.elapsed());
        Ok(outcome)
    }

    /// Persist `rows` as `table`, replacing any existing table of that name
    #[instrument(skip(self, payload, rows), fields(rows = rows.len()))]
    pub async fn save_table(
        &self,
        tag: Option<&str>,
        payload: &str,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<u64> {
        let kind = BackendKind::from_tag(tag)?;
        if kind != BackendKind::Relational {
            return Err(BridgeError::UnsupportedDestination(kind.to_string()));
        }
        require("table name", table)?;
        if rows.is_empty() {
            return Err(BridgeError::InvalidRequest("no rows to save".into()));
        }

        let descriptor = resolve(tag, payload)?;
        let mut backend = self.open(&descriptor).await?;
        let result = backend.save_table(table, rows).await;
        backend.close().await;
        result
    }

    /// Render a stored table as CSV
    #[instrument(skip(self, payload))]
    pub async fn export_table(
        &self,
        tag: Option<&str>,
        payload: &str,
        table: &str,
    ) -> Result<CsvExport> {
        require("table name", table)?;
        let descriptor = resolve(tag, payload)?;
        let mut backend = self.open(&descriptor).await?;
        let result = exporter::export_table(backend.as_mut(), table).await;
        backend.close().await;
        result
    }

    /// Up to `sample_size` values of one column, for transform previews
    #[instrument(skip(self, payload))]
    pub async fn preview_column(
        &self,
        tag: Option<&str>,
        payload: &str,
        table: &str,
        column: &str,
    ) -> Result<Vec<Value>> {
        require("table name", table)?;
        require("column name", column)?;
        let descriptor = resolve(tag, payload)?;
        let mut backend = self.open(&descriptor).await?;
        let result = backend.get_data(table, self.options.sample_size).await;
        backend.close().await;

        let record = result?;
        if !record.columns.iter().any(|c| c == column) {
            return Err(BridgeError::InvalidRequest(format!(
                "column '{}' not found in table '{}'",
                column, table
            )));
        }
        Ok(record
            .rows
            .into_iter()
            .filter_map(|row| {
                row.columns
                    .into_iter()
                    .find(|c| c.name == column)
                    .map(|c| c.value)
            })
            .collect())
    }
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::InvalidRequest(format!("{} is required", what)));
    }
    Ok(())
}

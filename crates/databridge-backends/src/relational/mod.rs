//! Relational backend over native sqlx connections (MySQL, PostgreSQL, SQLite)

pub mod connection;
mod decode;
pub mod dialect;
pub mod executor;
pub mod writer;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use databridge_common::{
    BridgeError, ColumnDef, ColumnSchema, ColumnType, QueryResult, Result, Row, TableRecord,
};

use crate::backend::{dedup_names, with_timeout, Backend};
use crate::descriptor::BackendKind;

pub use connection::SqlConnection;
pub use dialect::SqlDialect;
pub use executor::{classify_statement, StatementKind};

/// One open connection to a relational engine
pub struct RelationalBackend {
    conn: SqlConnection,
    timeout: Duration,
}

impl RelationalBackend {
    /// Open a connection for `dsn`
    #[instrument(skip(dsn))]
    pub async fn connect(dsn: &str, timeout: Duration) -> Result<Self> {
        let (dialect, url) = SqlDialect::from_dsn(dsn)?;

        let start = Instant::now();
        let conn = with_timeout("connect", timeout, SqlConnection::open(dialect, &url)).await?;

        info!(dialect = dialect.name(), "Connected in {:?}", start.elapsed());
        Ok(Self { conn, timeout })
    }

    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        self.conn.dialect()
    }

    async fn read_table(&mut self, table: &str, limit: Option<usize>) -> Result<TableRecord> {
        let schema = self.get_columns(table).await?;
        let sql = self.dialect().select_sql(table, limit);
        debug!(sql = %sql, "Fetching rows");
        let rows = with_timeout("read", self.timeout, self.conn.fetch(&sql, &[])).await?;

        let columns = match rows.first() {
            Some(first) => first.names().map(String::from).collect(),
            None => schema.names(),
        };
        Ok(TableRecord::new(columns, rows))
    }
}

#[async_trait]
impl Backend for RelationalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let sql = self.dialect().list_tables_sql();
        let rows =
            with_timeout("list_tables", self.timeout, self.conn.fetch_text(sql, &[])).await?;
        let names = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect();
        Ok(dedup_names(names))
    }

    async fn get_columns(&mut self, table: &str) -> Result<ColumnSchema> {
        let sql = self.dialect().columns_sql();
        let params = [table.to_string()];
        let rows =
            with_timeout("get_columns", self.timeout, self.conn.fetch_text(sql, &params)).await?;

        let columns: Vec<ColumnDef> = rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let name = cells.next().flatten()?;
                let native = cells.next().flatten().unwrap_or_default();
                Some(ColumnDef {
                    name,
                    inferred_type: ColumnType::from_sql_type(&native),
                })
            })
            .collect();

        if columns.is_empty() {
            return Err(BridgeError::TableNotFound(table.to_string()));
        }
        Ok(ColumnSchema { columns })
    }

    async fn get_data(&mut self, table: &str, limit: usize) -> Result<TableRecord> {
        self.read_table(table, Some(limit)).await
    }

    async fn export_rows(&mut self, table: &str) -> Result<TableRecord> {
        self.read_table(table, None).await
    }

    async fn execute(&mut self, query: &str) -> Result<QueryResult> {
        with_timeout(
            "execute",
            self.timeout,
            executor::execute_in_transaction(&mut self.conn, query),
        )
        .await
    }

    async fn save_table(&mut self, table: &str, rows: Vec<Row>) -> Result<u64> {
        with_timeout(
            "save_table",
            self.timeout,
            writer::save_rows(&mut self.conn, table, rows),
        )
        .await
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            debug!("Closing connection failed: {}", e);
        }
    }
}

//! DataBridge Backends
//!
//! One capability interface over two storage models:
//! - [`relational`]: MySQL, PostgreSQL and SQLite through sqlx
//! - [`keyvalue`]: DynamoDB, plus an in-memory document store
//!
//! [`bridge::Bridge`] runs each client operation on a freshly opened handle.

pub mod backend;
pub mod bridge;
pub mod descriptor;
pub mod exporter;
pub mod keyvalue;
pub mod relational;

pub use backend::{with_timeout, Backend};
pub use bridge::{open_backend, Bridge, Connector, DataPage, DefaultConnector};
pub use descriptor::{resolve, BackendKind, ConnectionDescriptor, KeyValueCredentials};
pub use exporter::{export_table, render_csv, CsvExport};
pub use keyvalue::{DocumentStore, DynamoStore, KeyValueBackend, MemoryDocumentStore};
pub use relational::{classify_statement, RelationalBackend, SqlDialect, StatementKind};

//! DataBridge Common
//!
//! Shared pieces used by the backends and the HTTP server:
//! - [`error`]: the error taxonomy every operation reports through
//! - [`types`]: the normalized row/column model both storage backends map onto
//! - [`config`]: file, environment and default configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{BackendOptions, BridgeConfig, LoggingConfig, ServerConfig};
pub use error::{BridgeError, Result};
pub use types::{Column, ColumnDef, ColumnSchema, ColumnType, QueryResult, Row, TableRecord, Value};

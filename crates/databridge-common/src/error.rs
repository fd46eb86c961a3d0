//! Error types for DataBridge
//!
//! Every component failure maps onto one variant of [`BridgeError`]; the HTTP
//! layer turns it into the uniform `{success: false, error}` response.

use thiserror::Error;

/// Result type alias using DataBridge's error type
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for DataBridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The connection payload could not be parsed for its backend
    #[error("Invalid connection description: {0}")]
    MalformedDescriptor(String),

    /// The backend tag names no supported backend
    #[error("Unsupported database type: {tag}")]
    UnsupportedBackend { tag: String },

    /// Opening the backend handle failed
    #[error("Connection failed: {detail}")]
    ConnectionFailed { detail: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Query text is empty")]
    EmptyQuery,

    /// The backend rejected a statement or read request
    #[error("Query execution failed: {detail}")]
    QueryExecutionFailed { detail: String },

    /// Persisting a derived table failed at the given input row
    #[error("Write failed at row {row_index}: {detail}")]
    WriteFailed { row_index: usize, detail: String },

    /// Derived tables can only be saved into the relational engine
    #[error("Saving tables is only supported for relational databases, not {0}")]
    UnsupportedDestination(String),

    /// Required request data is missing or unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Get HTTP status code for this error type
    ///
    /// Validation and malformed-input failures are client errors; everything
    /// coming back from a backend is reported as a server error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::MalformedDescriptor(_)
            | BridgeError::UnsupportedBackend { .. }
            | BridgeError::EmptyQuery
            | BridgeError::UnsupportedDestination(_)
            | BridgeError::InvalidRequest(_) => 400,
            BridgeError::ConnectionFailed { .. }
            | BridgeError::TableNotFound(_)
            | BridgeError::QueryExecutionFailed { .. }
            | BridgeError::WriteFailed { .. }
            | BridgeError::Timeout { .. }
            | BridgeError::Export(_)
            | BridgeError::Config(_)
            | BridgeError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable name of the variant, used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::MalformedDescriptor(_) => "MalformedDescriptor",
            BridgeError::UnsupportedBackend { .. } => "UnsupportedBackend",
            BridgeError::ConnectionFailed { .. } => "ConnectionFailed",
            BridgeError::TableNotFound(_) => "TableNotFound",
            BridgeError::EmptyQuery => "EmptyQuery",
            BridgeError::QueryExecutionFailed { .. } => "QueryExecutionFailed",
            BridgeError::WriteFailed { .. } => "WriteFailed",
            BridgeError::UnsupportedDestination(_) => "UnsupportedDestination",
            BridgeError::InvalidRequest(_) => "InvalidRequest",
            BridgeError::Timeout { .. } => "Timeout",
            BridgeError::Export(_) => "Export",
            BridgeError::Config(_) => "Config",
            BridgeError::Internal(_) => "Internal",
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        BridgeError::ConnectionFailed {
            detail: detail.into(),
        }
    }

    pub fn query(detail: impl Into<String>) -> Self {
        BridgeError::QueryExecutionFailed {
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::InvalidRequest(e.to_string())
    }
}

//! `/api/*` handlers
//!
//! Every request carries its own connection description; handlers delegate to
//! [`Bridge`] and translate results into the JSON contract. Failures always
//! answer `{success: false, error}`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{header, HeaderValue, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use thiserror::Error;
use tracing::{error, instrument, warn};

use databridge_backends::Bridge;
use databridge_common::{BridgeError, QueryResult, Row};

/// Shared handler state
pub struct AppState {
    pub bridge: Bridge,
}

type ApiResult = Result<Response, ApiError>;
type Body<T> = Result<Json<T>, JsonRejection>;

// ===== Request Types =====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub db_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub db_type: Option<String>,
    /// Overrides the configured page limit
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTableRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub data: Vec<Map<String, JsonValue>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTableRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub table_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub column_name: String,
    #[serde(default)]
    pub transformation_code: Option<String>,
}

// ===== Handlers =====

#[instrument(skip_all)]
pub async fn connect(State(state): State<Arc<AppState>>, body: Body<ConnectRequest>) -> ApiResult {
    let Json(req) = body?;
    let tables = state
        .bridge
        .connect(req.db_type.as_deref(), &req.connection_string)
        .await?;

    Ok(Json(json!({ "success": true, "tables": tables })).into_response())
}

#[instrument(skip(state, body))]
pub async fn table_columns(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    body: Body<ConnectRequest>,
) -> ApiResult {
    let Json(req) = body?;
    let schema = state
        .bridge
        .list_columns(req.db_type.as_deref(), &req.connection_string, &table)
        .await?;

    Ok(Json(json!({
        "success": true,
        "columns": schema.names(),
        "schema": schema.columns,
    }))
    .into_response())
}

#[instrument(skip(state, body))]
pub async fn table_data(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    body: Body<DataRequest>,
) -> ApiResult {
    let Json(req) = body?;
    let page = state
        .bridge
        .get_data(
            req.db_type.as_deref(),
            &req.connection_string,
            &table,
            req.limit,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "columns": page.record.columns,
        "rawData": page.record.rows,
        "samples": page.samples,
    }))
    .into_response())
}

#[instrument(skip_all)]
pub async fn execute_sql(State(state): State<Arc<AppState>>, body: Body<ExecuteRequest>) -> ApiResult {
    let Json(req) = body?;
    let result = state
        .bridge
        .execute(&req.connection_string, &req.query)
        .await?;

    let response = match result {
        QueryResult::Rows { columns, rows } => json!({
            "success": true,
            "columns": columns,
            "results": rows,
        }),
        QueryResult::Status {
            message,
            rows_affected,
        } => json!({
            "success": true,
            "message": message,
            "rowsAffected": rows_affected,
        }),
    };
    Ok(Json(response).into_response())
}

#[instrument(skip_all)]
pub async fn save_joined_table(
    State(state): State<Arc<AppState>>,
    body: Body<SaveTableRequest>,
) -> ApiResult {
    let Json(req) = body?;
    let rows: Vec<Row> = req.data.into_iter().map(Row::from_json_object).collect();
    let written = state
        .bridge
        .save_table(
            req.db_type.as_deref(),
            &req.connection_string,
            &req.table_name,
            rows,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Joined table {} saved to SQL.", req.table_name),
        "rowsWritten": written,
    }))
    .into_response())
}

#[instrument(skip_all)]
pub async fn export_joined_table(
    State(state): State<Arc<AppState>>,
    body: Body<ExportTableRequest>,
) -> ApiResult {
    let Json(req) = body?;
    let export = state
        .bridge
        .export_table(
            req.db_type.as_deref(),
            &req.connection_string,
            &req.table_name,
        )
        .await?;

    let disposition = attachment(&export.filename)?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
        .into_response())
}

/// `Content-Disposition` value for a download named `filename`.
///
/// The name is sent as a quoted string; characters a header cannot carry
/// become `_`.
fn attachment(filename: &str) -> Result<HeaderValue, ApiError> {
    let mut quoted = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            ' '..='~' => quoted.push(c),
            _ => quoted.push('_'),
        }
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", quoted))
        .map_err(|e| ApiError::Header(e.to_string()))
}

/// Sample values of one column, paired with an untransformed copy
#[instrument(skip_all)]
pub async fn preview(State(state): State<Arc<AppState>>, body: Body<TransformRequest>) -> ApiResult {
    let Json(req) = body?;
    let original = state
        .bridge
        .preview_column(
            req.db_type.as_deref(),
            &req.connection_string,
            &req.table_name,
            &req.column_name,
        )
        .await?;
    let transformed = original.clone();

    Ok(Json(json!({
        "success": true,
        "preview": {
            "original": original,
            "transformed": transformed,
        }
    }))
    .into_response())
}

#[instrument(skip_all)]
pub async fn transform(body: Body<TransformRequest>) -> ApiResult {
    let Json(req) = body?;
    Err(ApiError::NotImplemented(format!(
        "Transforming column '{}' is not supported; use /api/preview to inspect values",
        req.column_name
    )))
}

// ===== Errors =====

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Invalid request body: {0}")]
    BadBody(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("Invalid response header: {0}")]
    Header(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadBody(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Bridge(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::BadBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Header(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = match &self {
            ApiError::Bridge(e) => e.kind(),
            ApiError::BadBody(_) => "BadBody",
            ApiError::NotImplemented(_) => "NotImplemented",
            ApiError::Header(_) => "Header",
        };

        if status.is_server_error() {
            error!(kind, status = status.as_u16(), "Request failed: {}", self);
        } else {
            warn!(kind, status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

//! One native sqlx connection per engine
//!
//! Each engine keeps its own driver so that column types are decoded from the
//! engine's type information rather than a lowest-common-denominator mapping.

use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Column as _, Connection, Row as _, Statement as _};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use databridge_common::{BridgeError, Result, Row};

use super::decode::decode_row;
use super::dialect::SqlDialect;

/// An open connection to one of the supported engines
pub enum SqlConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

/// Evaluate `$body` with `$c` bound to the engine's native connection.
///
/// The body is expanded once per engine, so it may use driver-specific types.
macro_rules! dispatch {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            $crate::relational::connection::SqlConnection::MySql($c) => $body,
            $crate::relational::connection::SqlConnection::Postgres($c) => $body,
            $crate::relational::connection::SqlConnection::Sqlite($c) => $body,
        }
    };
}
pub(crate) use dispatch;

pub(crate) fn query_error(e: sqlx::Error) -> BridgeError {
    BridgeError::query(e.to_string())
}

impl SqlConnection {
    pub async fn open(dialect: SqlDialect, url: &str) -> Result<Self> {
        let conn = match dialect {
            SqlDialect::MySql => MySqlConnection::connect(url).await.map(Self::MySql),
            SqlDialect::Postgres => PgConnection::connect(url).await.map(Self::Postgres),
            SqlDialect::Sqlite => SqliteConnection::connect(url).await.map(Self::Sqlite),
        };
        conn.map_err(|e| BridgeError::connection(e.to_string()))
    }

    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        match self {
            SqlConnection::MySql(_) => SqlDialect::MySql,
            SqlConnection::Postgres(_) => SqlDialect::Postgres,
            SqlConnection::Sqlite(_) => SqlDialect::Sqlite,
        }
    }

    /// Run a row-producing statement with text parameters
    pub async fn fetch(&mut self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
        dispatch!(self, c => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = query.bind(param.as_str());
            }
            let rows = query.fetch_all(&mut *c).await.map_err(query_error)?;
            rows.iter().map(decode_row).collect()
        })
    }

    /// Run a catalog query whose columns are all text
    pub async fn fetch_text(
        &mut self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<Vec<Option<String>>>> {
        dispatch!(self, c => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = query.bind(param.as_str());
            }
            let rows = query.fetch_all(&mut *c).await.map_err(query_error)?;
            rows.iter()
                .map(|row| {
                    (0..row.len())
                        .map(|i| {
                            row.try_get_unchecked::<Option<String>, _>(i)
                                .map_err(query_error)
                        })
                        .collect()
                })
                .collect()
        })
    }

    pub async fn close(self) -> Result<()> {
        dispatch!(self, c => c.close().await.map_err(query_error))
    }
}

/// Column names of `sql` from its prepared description.
///
/// Used when a read returns no rows and therefore carries no row metadata.
pub(crate) fn describe_columns<'c, E>(executor: E, sql: &'c str) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'c>>
where
    E: sqlx::Executor<'c> + 'c,
{
    Box::pin(async move {
        match executor.prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                warn!("Describing statement failed: {}", e);
                Vec::new()
            }
        }
    })
}

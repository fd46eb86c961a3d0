//! Native row decoding
//!
//! Cells are decoded from each engine's own type names. Dates and times
//! become their textual form, exact numerics keep their decimal text, JSON
//! documents become nested values and anything unrecognised is read as text.

use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column, ColumnIndex, Row as _, TypeInfo, ValueRef};

use databridge_common::{BridgeError, Result, Row, Value};

use super::connection::query_error;

type CellResult = std::result::Result<Value, sqlx::Error>;

/// A driver row whose cells can be mapped onto [`Value`]
pub(crate) trait NativeRow: sqlx::Row {
    /// Decode a non-null cell. `declared` is the column's type, `actual` the
    /// type the engine reported for this value.
    fn decode_cell(&self, index: usize, declared: &str, actual: &str) -> CellResult;
}

/// Convert a driver row into the shared row model
pub(crate) fn decode_row<R>(row: &R) -> Result<Row>
where
    R: NativeRow,
    usize: ColumnIndex<R>,
{
    let mut out = Row::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index).map_err(query_error)?;
        if raw.is_null() {
            out.push(column.name(), Value::Null);
            continue;
        }
        let actual = raw.type_info().name().to_string();
        let value = row
            .decode_cell(index, column.type_info().name(), &actual)
            .map_err(|e| {
                BridgeError::query(format!(
                    "cannot decode column '{}' of type {}: {}",
                    column.name(),
                    actual,
                    e
                ))
            })?;
        out.push(column.name(), value);
    }
    Ok(out)
}

impl NativeRow for SqliteRow {
    // SQLite reports the storage class of each value; the declared column
    // type only matters for booleans stored as integers.
    fn decode_cell(&self, index: usize, declared: &str, actual: &str) -> CellResult {
        match actual {
            "INTEGER" if declared.eq_ignore_ascii_case("BOOLEAN") => {
                self.try_get(index).map(Value::Bool)
            }
            "INTEGER" => self.try_get(index).map(Value::Integer),
            "REAL" => self.try_get(index).map(Value::Float),
            "BLOB" => self.try_get(index).map(Value::Bytes),
            _ => self.try_get(index).map(Value::String),
        }
    }
}

impl NativeRow for PgRow {
    fn decode_cell(&self, index: usize, _declared: &str, actual: &str) -> CellResult {
        match actual {
            "BOOL" => self.try_get(index).map(Value::Bool),
            "INT2" => self.try_get::<i16, _>(index).map(|v| Value::Integer(v.into())),
            "INT4" => self.try_get::<i32, _>(index).map(|v| Value::Integer(v.into())),
            "INT8" => self.try_get(index).map(Value::Integer),
            "FLOAT4" => self.try_get::<f32, _>(index).map(|v| Value::Float(v.into())),
            "FLOAT8" => self.try_get(index).map(Value::Float),
            "NUMERIC" => self
                .try_get::<Decimal, _>(index)
                .map(|v| Value::String(v.to_string())),
            "UUID" => self
                .try_get::<Uuid, _>(index)
                .map(|v| Value::String(v.to_string())),
            "DATE" => self
                .try_get::<NaiveDate, _>(index)
                .map(|v| Value::String(v.to_string())),
            "TIME" => self
                .try_get::<NaiveTime, _>(index)
                .map(|v| Value::String(v.to_string())),
            "TIMESTAMP" => self
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| Value::String(v.to_string())),
            "TIMESTAMPTZ" => self
                .try_get::<DateTime<Utc>, _>(index)
                .map(|v| Value::String(v.to_rfc3339())),
            "JSON" | "JSONB" => self.try_get::<JsonValue, _>(index).map(Value::from),
            "BYTEA" => self.try_get(index).map(Value::Bytes),
            _ => self.try_get(index).map(Value::String),
        }
    }
}

impl NativeRow for MySqlRow {
    // Text, decimal, enum and set values travel as character data in both
    // protocols, so they are read without the driver's type check.
    fn decode_cell(&self, index: usize, _declared: &str, actual: &str) -> CellResult {
        match actual {
            "BOOLEAN" => self.try_get_unchecked(index).map(Value::Bool),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                self.try_get(index).map(Value::Integer)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => self.try_get::<u64, _>(index).map(Value::from),
            "YEAR" => self
                .try_get_unchecked::<u16, _>(index)
                .map(|v| Value::Integer(v.into())),
            "FLOAT" => self.try_get::<f32, _>(index).map(|v| Value::Float(v.into())),
            "DOUBLE" => self.try_get(index).map(Value::Float),
            "DATE" => self
                .try_get::<NaiveDate, _>(index)
                .map(|v| Value::String(v.to_string())),
            "TIME" => self
                .try_get::<NaiveTime, _>(index)
                .map(|v| Value::String(v.to_string())),
            "DATETIME" | "TIMESTAMP" => self
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| Value::String(v.to_string())),
            "JSON" => self.try_get::<JsonValue, _>(index).map(Value::from),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => self.try_get_unchecked(index).map(Value::Bytes),
            _ => self.try_get_unchecked(index).map(Value::String),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnection;
    use sqlx::Connection;

    async fn first_row(sql: &str) -> Row {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let rows = sqlx::query(sql).fetch_all(&mut conn).await.unwrap();
        decode_row(&rows[0]).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_storage_classes() {
        let row = first_row("SELECT 1 AS i, 2.5 AS f, 'x' AS s, x'00ff' AS b, NULL AS n").await;
        assert_eq!(row.get("i"), Some(&Value::Integer(1)));
        assert_eq!(row.get("f"), Some(&Value::Float(2.5)));
        assert_eq!(row.get("s"), Some(&Value::from("x")));
        assert_eq!(row.get("b"), Some(&Value::Bytes(vec![0x00, 0xff])));
        assert_eq!(row.get("n"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_sqlite_declared_types() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE ev (created DATETIME, flag BOOLEAN, price NUMERIC, day DATE)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO ev VALUES ('2024-05-01 10:30:00', 1, 9.5, '2024-05-01')")
            .execute(&mut conn)
            .await
            .unwrap();

        let rows = sqlx::query("SELECT * FROM ev")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        let row = decode_row(&rows[0]).unwrap();
        assert_eq!(row.get("created"), Some(&Value::from("2024-05-01 10:30:00")));
        assert_eq!(row.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(row.get("price"), Some(&Value::Float(9.5)));
        assert_eq!(row.get("day"), Some(&Value::from("2024-05-01")));
    }
}

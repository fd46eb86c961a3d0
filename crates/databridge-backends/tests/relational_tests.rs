//! Relational backend tests against SQLite database files

use std::time::Duration;

use databridge_backends::{Backend, Bridge, RelationalBackend, SqlDialect};
use databridge_common::{BackendOptions, BridgeError, ColumnType, QueryResult, Row, Value};
use tempfile::TempDir;

struct TestDb {
    _dir: TempDir,
    dsn: String,
}

fn create_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");
    let dsn = format!("sqlite://{}?mode=rwc", path.display());
    TestDb { _dir: dir, dsn }
}

async fn open(db: &TestDb) -> RelationalBackend {
    RelationalBackend::connect(&db.dsn, Duration::from_secs(10))
        .await
        .unwrap()
}

async fn seed_users(db: &TestDb, count: usize) {
    let mut backend = open(db).await;
    backend
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
        .await
        .unwrap();
    for i in 0..count {
        backend
            .execute(&format!(
                "INSERT INTO users (id, name, score) VALUES ({}, 'user{}', {}.5)",
                i, i, i
            ))
            .await
            .unwrap();
    }
    Box::new(backend).close().await;
}

fn bridge() -> Bridge {
    Bridge::new(BackendOptions::default())
}

fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(n, v)| ((*n).to_string(), v.clone()))
        .collect()
}

// ===== Introspection =====

mod introspection {
    use super::*;

    #[tokio::test]
    async fn test_connect_lists_tables_once() {
        let db = create_db();
        seed_users(&db, 1).await;
        let mut backend = open(&db).await;
        assert_eq!(backend.dialect(), SqlDialect::Sqlite);
        backend.execute("CREATE TABLE orders (id INTEGER)").await.unwrap();
        Box::new(backend).close().await;

        let mut tables = bridge().connect(Some("sqlite"), &db.dsn).await.unwrap();
        tables.sort();
        assert_eq!(tables, vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn test_columns_in_declared_order_with_types() {
        let db = create_db();
        seed_users(&db, 0).await;

        let schema = bridge()
            .list_columns(None, &db.dsn, "users")
            .await
            .unwrap();
        assert_eq!(schema.names(), vec!["id", "name", "score"]);
        assert_eq!(schema.columns[0].inferred_type, ColumnType::Numeric);
        assert_eq!(schema.columns[1].inferred_type, ColumnType::Text);
        assert_eq!(schema.columns[2].inferred_type, ColumnType::Numeric);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let db = create_db();
        seed_users(&db, 0).await;

        let err = bridge()
            .list_columns(None, &db.dsn, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TableNotFound(ref t) if t == "ghost"));

        let err = bridge()
            .get_data(None, &db.dsn, "ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        let err = bridge()
            .connect(None, "sqlite:///definitely/not/here/db.sqlite")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionFailed { .. }));
    }
}

// ===== Reading =====

mod reading {
    use super::*;

    #[tokio::test]
    async fn test_get_data_is_bounded_and_export_is_not() {
        let db = create_db();
        seed_users(&db, 150).await;

        let page = bridge()
            .get_data(Some("sqlite"), &db.dsn, "users", Some(100))
            .await
            .unwrap();
        assert_eq!(page.record.len(), 100);
        assert_eq!(page.samples.len(), 5);

        let export = bridge()
            .export_table(Some("sqlite"), &db.dsn, "users")
            .await
            .unwrap();
        assert_eq!(export.rows, 150);
    }

    #[tokio::test]
    async fn test_default_page_limit() {
        let db = create_db();
        seed_users(&db, 120).await;

        let page = bridge().get_data(None, &db.dsn, "users", None).await.unwrap();
        assert_eq!(page.record.len(), 100);
    }

    #[tokio::test]
    async fn test_rows_match_column_order() {
        let db = create_db();
        seed_users(&db, 3).await;

        let page = bridge().get_data(None, &db.dsn, "users", None).await.unwrap();
        assert_eq!(page.record.columns, vec!["id", "name", "score"]);
        for r in &page.record.rows {
            assert_eq!(
                r.names().collect::<Vec<_>>(),
                page.record.columns.iter().map(String::as_str).collect::<Vec<_>>()
            );
        }
        assert_eq!(page.record.rows[1].get("id"), Some(&Value::Integer(1)));
        assert_eq!(page.record.rows[1].get("name"), Some(&Value::from("user1")));
        assert_eq!(page.record.rows[1].get("score"), Some(&Value::Float(1.5)));
    }

    #[tokio::test]
    async fn test_empty_table_keeps_catalog_columns() {
        let db = create_db();
        seed_users(&db, 0).await;

        let page = bridge().get_data(None, &db.dsn, "users", None).await.unwrap();
        assert!(page.record.is_empty());
        assert_eq!(page.record.columns, vec!["id", "name", "score"]);
    }

    #[tokio::test]
    async fn test_temporal_boolean_and_numeric_columns() {
        let db = create_db();
        let mut backend = open(&db).await;
        backend
            .execute("CREATE TABLE ev (id INTEGER, created DATETIME, flag BOOLEAN, price NUMERIC)")
            .await
            .unwrap();
        backend
            .execute("INSERT INTO ev VALUES (1, '2024-05-01 10:30:00', 1, 9.5)")
            .await
            .unwrap();
        backend
            .execute("INSERT INTO ev VALUES (2, NULL, 0, 3)")
            .await
            .unwrap();
        Box::new(backend).close().await;

        let page = bridge().get_data(None, &db.dsn, "ev", None).await.unwrap();
        let first = &page.record.rows[0];
        assert_eq!(first.get("created"), Some(&Value::from("2024-05-01 10:30:00")));
        assert_eq!(first.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(first.get("price"), Some(&Value::Float(9.5)));
        assert_eq!(page.record.rows[1].get("created"), Some(&Value::Null));

        let export = bridge().export_table(None, &db.dsn, "ev").await.unwrap();
        assert_eq!(
            String::from_utf8(export.bytes).unwrap(),
            "id,created,flag,price\n1,2024-05-01 10:30:00,true,9.5\n2,,false,3\n"
        );
    }

    #[tokio::test]
    async fn test_quoted_identifiers() {
        let db = create_db();
        let mut backend = open(&db).await;
        backend
            .execute("CREATE TABLE \"odd \"\"name\" (\"a b\" TEXT)")
            .await
            .unwrap();
        backend
            .execute("INSERT INTO \"odd \"\"name\" VALUES ('x')")
            .await
            .unwrap();

        let record = backend.get_data("odd \"name", 10).await.unwrap();
        assert_eq!(record.columns, vec!["a b"]);
        assert_eq!(record.rows[0].get("a b"), Some(&Value::from("x")));
    }

    #[tokio::test]
    async fn test_preview_column() {
        let db = create_db();
        seed_users(&db, 8).await;

        let values = bridge()
            .preview_column(None, &db.dsn, "users", "name")
            .await
            .unwrap();
        assert_eq!(values.len(), 5);
        assert_eq!(values[0], Value::from("user0"));

        let err = bridge()
            .preview_column(None, &db.dsn, "users", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }
}

// ===== Query execution =====

mod execution {
    use super::*;

    #[tokio::test]
    async fn test_select_returns_rows() {
        let db = create_db();
        match bridge().execute(&db.dsn, "SELECT 1 AS one").await.unwrap() {
            QueryResult::Rows { columns, rows } => {
                assert_eq!(columns, vec!["one"]);
                assert_eq!(rows[0].get("one"), Some(&Value::Integer(1)));
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_select_keeps_column_names() {
        let db = create_db();
        seed_users(&db, 0).await;
        match bridge()
            .execute(&db.dsn, "SELECT id, name AS label FROM users")
            .await
            .unwrap()
        {
            QueryResult::Rows { columns, rows } => {
                assert_eq!(columns, vec!["id", "label"]);
                assert!(rows.is_empty());
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_select_decodes_declared_types() {
        let db = create_db();
        let mut backend = open(&db).await;
        backend
            .execute("CREATE TABLE flags (on_off BOOLEAN, at DATETIME)")
            .await
            .unwrap();
        backend
            .execute("INSERT INTO flags VALUES (0, '2023-12-31 23:59:59')")
            .await
            .unwrap();

        match backend.execute("SELECT * FROM flags").await.unwrap() {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows[0].get("on_off"), Some(&Value::Bool(false)));
                assert_eq!(rows[0].get("at"), Some(&Value::from("2023-12-31 23:59:59")));
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ddl_returns_status() {
        let db = create_db();
        let result = bridge()
            .execute(&db.dsn, "CREATE TABLE t (id INTEGER)")
            .await
            .unwrap();
        assert!(matches!(
            result,
            QueryResult::Status { ref message, .. } if message == "Query executed successfully"
        ));
    }

    #[tokio::test]
    async fn test_status_carries_rows_affected() {
        let db = create_db();
        seed_users(&db, 4).await;
        let result = bridge()
            .execute(&db.dsn, "UPDATE users SET name = 'same'")
            .await
            .unwrap();
        assert!(matches!(result, QueryResult::Status { rows_affected: 4, .. }));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_connecting() {
        let err = bridge()
            .execute("sqlite:///definitely/not/here/db.sqlite", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_rejected_statement() {
        let db = create_db();
        let err = bridge()
            .execute(&db.dsn, "SELECT * FROM nowhere")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::QueryExecutionFailed { .. }));
    }
}

// ===== Saving and exporting =====

mod saving {
    use super::*;

    #[tokio::test]
    async fn test_save_then_export_round_trips_text() {
        let db = create_db();
        let rows = vec![
            row(&[
                ("id", Value::Integer(1)),
                ("name", Value::from("Ada")),
                ("active", Value::Bool(true)),
            ]),
            row(&[
                ("id", Value::Integer(2)),
                ("name", Value::from("Lovelace, A.")),
                ("extra", Value::from("dropped")),
            ]),
        ];

        let written = bridge()
            .save_table(None, &db.dsn, "joined", rows)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let export = bridge().export_table(None, &db.dsn, "joined").await.unwrap();
        assert_eq!(export.filename, "joined.csv");
        assert_eq!(
            String::from_utf8(export.bytes).unwrap(),
            "id,name,active\n1,Ada,true\n2,\"Lovelace, A.\",\n"
        );

        let schema = bridge().list_columns(None, &db.dsn, "joined").await.unwrap();
        assert!(schema
            .columns
            .iter()
            .all(|c| c.inferred_type == ColumnType::Text));
    }

    #[tokio::test]
    async fn test_saved_numbers_export_as_written() {
        let db = create_db();
        let input = serde_json::json!({"f": 1.0, "big": u64::MAX, "e": 1e21, "n": -12});
        let rows = vec![Row::from_json_object(input.as_object().unwrap().clone())];

        bridge().save_table(None, &db.dsn, "nums", rows).await.unwrap();

        let export = bridge().export_table(None, &db.dsn, "nums").await.unwrap();
        assert_eq!(
            String::from_utf8(export.bytes).unwrap(),
            "f,big,e,n\n1.0,18446744073709551615,1e21,-12\n"
        );
    }

    #[tokio::test]
    async fn test_save_replaces_existing_table() {
        let db = create_db();
        seed_users(&db, 10).await;

        let rows = vec![row(&[("label", Value::from("only"))])];
        bridge().save_table(None, &db.dsn, "users", rows).await.unwrap();

        let page = bridge().get_data(None, &db.dsn, "users", None).await.unwrap();
        assert_eq!(page.record.columns, vec!["label"]);
        assert_eq!(page.record.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_row_rolls_back_whole_save() {
        let db = create_db();
        seed_users(&db, 3).await;

        let rows = vec![
            row(&[("tags", Value::from("ok"))]),
            row(&[("tags", Value::Array(vec![Value::from("nested")]))]),
        ];
        let err = bridge()
            .save_table(None, &db.dsn, "users", rows)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::WriteFailed { row_index: 1, .. }));

        let page = bridge().get_data(None, &db.dsn, "users", None).await.unwrap();
        assert_eq!(page.record.columns, vec!["id", "name", "score"]);
        assert_eq!(page.record.len(), 3);
    }

    #[tokio::test]
    async fn test_save_validation() {
        let db = create_db();
        let err = bridge()
            .save_table(None, &db.dsn, "t", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));

        let rows = vec![row(&[("a", Value::Integer(1))])];
        let err = bridge()
            .save_table(None, &db.dsn, " ", rows.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));

        let err = bridge()
            .save_table(Some("dynamodb"), "{}", "t", rows)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedDestination(_)));
    }

    #[tokio::test]
    async fn test_unknown_backend_tag() {
        let err = bridge()
            .connect(Some("mongo"), "mongodb://localhost:27017")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedBackend { ref tag } if tag == "mongo"));
    }
}

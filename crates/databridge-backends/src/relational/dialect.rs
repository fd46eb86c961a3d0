//! SQL dialect differences: identifier quoting, placeholders and catalog queries

use databridge_common::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySql,
    Postgres,
    Sqlite,
}

impl SqlDialect {
    /// Detect the dialect from a DSN and return the URL the driver expects.
    ///
    /// SQLAlchemy-style schemes such as `mysql+pymysql://` are accepted and
    /// reduced to their base scheme.
    pub fn from_dsn(dsn: &str) -> Result<(Self, String)> {
        let dsn = dsn.trim();
        let (scheme, rest) = dsn.split_once(':').ok_or_else(|| {
            BridgeError::connection("connection string has no scheme (expected e.g. mysql://...)")
        })?;
        let base = scheme.split('+').next().unwrap_or_default().to_ascii_lowercase();

        let (dialect, canonical) = match base.as_str() {
            "mysql" | "mariadb" => (SqlDialect::MySql, "mysql"),
            "postgres" | "postgresql" => (SqlDialect::Postgres, "postgres"),
            "sqlite" => (SqlDialect::Sqlite, "sqlite"),
            other => {
                return Err(BridgeError::connection(format!(
                    "unsupported connection string scheme '{}'",
                    other
                )))
            }
        };
        Ok((dialect, format!("{}:{}", canonical, rest)))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::MySql => "mysql",
            SqlDialect::Postgres => "postgres",
            SqlDialect::Sqlite => "sqlite",
        }
    }

    /// Whether `DROP`/`CREATE TABLE` can be rolled back with the surrounding
    /// transaction
    #[must_use]
    pub fn transactional_ddl(&self) -> bool {
        !matches!(self, SqlDialect::MySql)
    }

    /// Quote an identifier, doubling any embedded quote character
    #[must_use]
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", ident.replace('`', "``")),
            SqlDialect::Postgres | SqlDialect::Sqlite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    #[must_use]
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", index),
            SqlDialect::MySql | SqlDialect::Sqlite => "?".to_string(),
        }
    }

    /// Catalog query yielding one text column of table names
    #[must_use]
    pub fn list_tables_sql(&self) -> &'static str {
        match self {
            SqlDialect::MySql => {
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
                 WHERE table_schema = DATABASE()"
            }
            SqlDialect::Postgres => {
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = current_schema()"
            }
            SqlDialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
            }
        }
    }

    /// Catalog query yielding `(name, native type)` in ordinal order for the
    /// table bound as the only parameter
    #[must_use]
    pub fn columns_sql(&self) -> &'static str {
        match self {
            SqlDialect::MySql => {
                "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR) \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position"
            }
            SqlDialect::Postgres => {
                "SELECT column_name::text, data_type::text \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position"
            }
            SqlDialect::Sqlite => "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
        }
    }

    #[must_use]
    pub fn select_sql(&self, table: &str, limit: Option<usize>) -> String {
        let quoted = self.quote_identifier(table);
        match limit {
            Some(limit) => format!("SELECT * FROM {} LIMIT {}", quoted, limit),
            None => format!("SELECT * FROM {}", quoted),
        }
    }

    #[must_use]
    pub fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// `CREATE TABLE` with every column typed `TEXT`
    #[must_use]
    pub fn create_text_table_sql(&self, table: &str, columns: &[String]) -> String {
        let defs = columns
            .iter()
            .map(|c| format!("{} TEXT", self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.quote_identifier(table), defs)
    }

    #[must_use]
    pub fn insert_sql(&self, table: &str, columns: &[String]) -> String {
        let names = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let params = (1..=columns.len())
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            names,
            params
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_dsn() {
        let (dialect, url) = SqlDialect::from_dsn("mysql+pymysql://u:p@h/db").unwrap();
        assert_eq!(dialect, SqlDialect::MySql);
        assert_eq!(url, "mysql://u:p@h/db");

        let (dialect, url) = SqlDialect::from_dsn("postgresql://h/db").unwrap();
        assert_eq!(dialect, SqlDialect::Postgres);
        assert_eq!(url, "postgres://h/db");

        let (dialect, _) = SqlDialect::from_dsn("sqlite::memory:").unwrap();
        assert_eq!(dialect, SqlDialect::Sqlite);

        assert!(matches!(
            SqlDialect::from_dsn("oracle://h/db").unwrap_err(),
            BridgeError::ConnectionFailed { .. }
        ));
        assert!(SqlDialect::from_dsn("no-scheme").is_err());
    }

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(SqlDialect::MySql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(SqlDialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(
            SqlDialect::Sqlite.quote_identifier("x; DROP TABLE y"),
            "\"x; DROP TABLE y\""
        );
    }

    #[test]
    fn test_insert_placeholders() {
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            SqlDialect::Postgres.insert_sql("t", &cols),
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES ($1, $2)"
        );
        assert_eq!(
            SqlDialect::MySql.insert_sql("t", &cols),
            "INSERT INTO `t` (`id`, `name`) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_ddl() {
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            SqlDialect::Sqlite.create_text_table_sql("joined", &cols),
            "CREATE TABLE \"joined\" (\"id\" TEXT, \"name\" TEXT)"
        );
        assert_eq!(
            SqlDialect::MySql.drop_table_sql("joined"),
            "DROP TABLE IF EXISTS `joined`"
        );
        assert_eq!(
            SqlDialect::MySql.select_sql("users", Some(100)),
            "SELECT * FROM `users` LIMIT 100"
        );
        assert!(!SqlDialect::MySql.transactional_ddl());
        assert!(SqlDialect::Postgres.transactional_ddl());
        assert!(SqlDialect::Sqlite.transactional_ddl());
    }
}

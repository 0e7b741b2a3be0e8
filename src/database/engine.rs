//! DuckDB-based MySQL reader
//!
//! Every call opens its own in-memory DuckDB connection, attaches the MySQL
//! database read-only, runs one statement and drops the connection.
//! Connection parameters travel in a temporary DuckDB secret as quoted SQL
//! literals, so passwords may hold spaces, `=` or quotes.

use super::extractor::TableSource;
use crate::config::MysqlConfig;
use crate::error::{Error, Result};
use crate::types::Record;
use duckdb::Connection;
use std::fmt;
use tracing::debug;

/// Alias of the attached MySQL catalog inside DuckDB
const SOURCE_DB: &str = "source_db";

/// Name of the connection-scoped secret holding the MySQL credentials
const SOURCE_SECRET: &str = "source_db_secret";

/// Where and how to reach MySQL
#[derive(Clone)]
pub struct MysqlConnectionInfo {
    /// Host (the local end of the tunnel)
    pub host: String,
    /// Port (the local end of the tunnel)
    pub port: u16,
    /// User
    pub user: String,
    /// Password
    pub password: String,
    /// Database (schema)
    pub database: String,
}

impl MysqlConnectionInfo {
    /// Connection through a tunnel listening on `127.0.0.1:local_port`
    pub fn through_tunnel(mysql: &MysqlConfig, local_port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: local_port,
            user: mysql.user.clone(),
            password: mysql.password.clone(),
            database: mysql.database.clone(),
        }
    }

    /// `CREATE SECRET` statement carrying the connection parameters
    fn secret_sql(&self) -> String {
        format!(
            "CREATE OR REPLACE TEMPORARY SECRET {SOURCE_SECRET} (TYPE MYSQL, HOST {}, PORT {}, USER {}, PASSWORD {}, DATABASE {});",
            quote_literal(&self.host),
            self.port,
            quote_literal(&self.user),
            quote_literal(&self.password),
            quote_literal(&self.database),
        )
    }
}

impl fmt::Debug for MysqlConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// MySQL tables read through DuckDB
#[derive(Debug, Clone)]
pub struct MysqlSource {
    info: MysqlConnectionInfo,
}

impl MysqlSource {
    /// Create a source
    pub fn new(info: MysqlConnectionInfo) -> Self {
        Self { info }
    }

    /// Open a connection with the MySQL database attached
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to create DuckDB connection: {e}")))?;

        conn.execute_batch("INSTALL mysql; LOAD mysql;")
            .map_err(|e| Error::database(format!("Failed to load mysql extension: {e}")))?;

        conn.execute_batch(&self.info.secret_sql())
            .map_err(|e| Error::database(format!("Failed to register MySQL credentials: {e}")))?;

        let attach_sql =
            format!("ATTACH '' AS {SOURCE_DB} (TYPE MYSQL, SECRET {SOURCE_SECRET}, READ_ONLY);");
        conn.execute_batch(&attach_sql).map_err(|e| {
            Error::database(format!(
                "Failed to attach MySQL at {}:{}: {e}",
                self.info.host, self.info.port
            ))
        })?;

        Ok(conn)
    }
}

impl TableSource for MysqlSource {
    fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_catalog = ? AND table_schema = ? \
                 ORDER BY table_name",
            )
            .map_err(|e| Error::database(format!("Failed to prepare table listing: {e}")))?;

        let tables = stmt
            .query_map([SOURCE_DB, self.info.database.as_str()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| Error::database(format!("Failed to list tables: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(format!("Failed to read table name: {e}")))?;

        Ok(tables)
    }

    fn read_table(&self, table: &str) -> Result<Vec<Record>> {
        let conn = self.connect()?;

        let query = format!(
            "SELECT * FROM {SOURCE_DB}.{}.{}",
            quote_ident(&self.info.database),
            quote_ident(table)
        );
        debug!(query = %query, "Reading table");

        // DuckDB writes the rows as a JSON array; reading the file back keeps
        // column types as DuckDB renders them
        let export = tempfile::Builder::new()
            .prefix("daily_extract_")
            .suffix(".json")
            .tempfile()?;
        let path = export
            .path()
            .to_str()
            .ok_or_else(|| Error::database("Temporary export path is not UTF-8"))?;

        let copy_sql = format!(
            "COPY ({query}) TO {} (FORMAT JSON, ARRAY true);",
            quote_literal(path)
        );
        conn.execute_batch(&copy_sql)
            .map_err(|e| Error::database(format!("Failed to read table '{table}': {e}")))?;

        let content = std::fs::read_to_string(export.path())?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

/// Quote an SQL string literal
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

//! Local SQLite warehouse
//!
//! Reads a file carrying the same staging and mart tables as the Snowflake
//! schema. Used for offline dashboards and in tests.

use super::{Connector, Warehouse};
use crate::error::CoreError;
use crate::models::{ResultTable, Value};
use crate::query::{Dialect, Statement};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens read-only sessions on a SQLite file
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn describe(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<Arc<dyn Warehouse>, CoreError> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || open_verified(&path))
            .await
            .map_err(|e| CoreError::connection_with("SQLite open task failed", e))??;

        tracing::info!(path = %self.path.display(), "SQLite warehouse opened");
        Ok(Arc::new(SqliteWarehouse::from_connection(conn)))
    }
}

fn open_verified(path: &Path) -> Result<Connection, CoreError> {
    if !path.exists() {
        return Err(CoreError::connection(format!(
            "SQLite database not found: {}",
            path.display()
        )));
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| CoreError::connection_with(format!("cannot open {}", path.display()), e))?;

    // A non-database file only fails once the schema is read
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
        .map_err(|e| CoreError::connection_with(format!("cannot read {}", path.display()), e))?;

    Ok(conn)
}

/// An open SQLite session
///
/// The connection is not `Sync`; statements run one at a time on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouse {
    /// Wrap an already-open connection (in-memory databases included)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &Statement) -> Result<ResultTable, CoreError> {
        let conn = Arc::clone(&self.conn);
        let statement = statement.clone();

        tokio::task::spawn_blocking(move || run_statement(&conn.lock(), &statement))
            .await
            .map_err(|e| CoreError::connection_with("SQLite query task failed", e))?
    }
}

fn run_statement(conn: &Connection, statement: &Statement) -> Result<ResultTable, CoreError> {
    let mut prepared = conn.prepare(statement.sql()).map_err(query_error)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut table = ResultTable::new(&columns);
    let mut rows = prepared
        .query(params_from_iter(statement.params().iter()))
        .map_err(query_error)?;

    while let Some(row) = rows.next().map_err(query_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(to_value(row.get_ref(idx).map_err(query_error)?));
        }
        table.push_row(values);
    }

    Ok(table)
}

fn to_value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn query_error(err: rusqlite::Error) -> CoreError {
    let sql_state = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(format!("{:?}", failure.code)),
        _ => None,
    };
    CoreError::Query {
        message: err.to_string(),
        sql_state,
    }
}

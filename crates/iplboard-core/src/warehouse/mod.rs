//! Warehouse collaborators
//!
//! The dashboard only needs one capability from a warehouse: run a statement
//! and hand back its rows. A [`Connector`] opens a [`Warehouse`] session; the
//! executor owns the connector and decides when to connect.

pub mod snowflake;
pub mod sqlite;

use crate::error::CoreError;
use crate::models::ResultTable;
use crate::query::{Dialect, Statement};
use async_trait::async_trait;
use std::sync::Arc;

pub use snowflake::{SnowflakeConnector, SnowflakeWarehouse};
pub use sqlite::{SqliteConnector, SqliteWarehouse};

/// An open warehouse session
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Dialect used to render this warehouse's statements for display
    fn dialect(&self) -> Dialect;

    /// Execute a statement and capture every returned row
    ///
    /// Fails with `Connection` when the session is unusable and with `Query`
    /// when the warehouse rejects the SQL.
    async fn execute(&self, statement: &Statement) -> Result<ResultTable, CoreError>;
}

/// Opens warehouse sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable target for logs ("snowflake://USER@ACCOUNT/DB.SCHEMA")
    fn describe(&self) -> String;

    /// Dialect of the sessions this connector opens
    fn dialect(&self) -> Dialect;

    /// Open (and verify) a session; fails with `Connection`
    async fn connect(&self) -> Result<Arc<dyn Warehouse>, CoreError>;
}

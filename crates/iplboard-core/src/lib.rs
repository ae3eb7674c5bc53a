//! iplboard-core - Core library for iplboard
//!
//! Provides season filters, query templates, the caching query executor,
//! warehouse clients, result shaping and the dashboard service.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod executor;
pub mod filter;
pub mod models;
pub mod query;
pub mod shaper;
pub mod warehouse;

pub use config::{DashboardConfig, Secrets, SnowflakeConfig};
pub use dashboard::Dashboard;
pub use error::{CoreError, SectionError};
pub use executor::{ExecutorConfig, ExecutorStats, QueryExecutor};
pub use filter::{FilterState, Season};
pub use query::{Dialect, QueryBuilder, Statement, TemplateCatalog};
pub use warehouse::{Connector, SnowflakeConnector, SqliteConnector, Warehouse};

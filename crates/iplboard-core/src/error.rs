//! Error types for iplboard-core
//!
//! One error enum for every layer (builder, executor, shaper, config) plus the
//! per-section error used by the dashboard to degrade gracefully.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error from a warehouse client (reqwest, rusqlite, ...)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for iplboard operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Query Builder
    // ===================
    #[error("Unknown query template: {template}")]
    InvalidTemplate { template: String },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    // ===================
    // Query Executor
    // ===================
    #[error("Warehouse connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Warehouse rejected query: {message}")]
    Query {
        message: String,
        sql_state: Option<String>,
    },

    // ===================
    // Result Shaper
    // ===================
    #[error("Query returned no rows (expected a value in {column})")]
    EmptyResult { column: String },

    #[error("Column {column} not found (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Column {column} holds {found}, expected {expected}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        found: String,
    },

    // ===================
    // Config Errors
    // ===================
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML in {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        CoreError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        CoreError::Query {
            message: message.into(),
            sql_state: None,
        }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        CoreError::InvalidFilter {
            message: message.into(),
        }
    }

    /// True for failures that come from the warehouse rather than from local input
    pub fn is_warehouse_error(&self) -> bool {
        matches!(self, CoreError::Connection { .. } | CoreError::Query { .. })
    }
}

/// Failure of one dashboard section
///
/// Carries a display message and an actionable suggestion so a failed chart
/// can explain itself while the other sections still render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionError {
    pub section: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl SectionError {
    pub fn new(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add an actionable suggestion to this error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create user-friendly error from CoreError with context-aware suggestions
    pub fn from_core_error(section: impl Into<String>, error: &CoreError) -> Self {
        let section = section.into();
        let suggestion = match error {
            CoreError::Connection { .. } => Some(
                "Check the [snowflake] credentials in secrets.toml and that the account is reachable"
                    .to_string(),
            ),
            CoreError::Query { .. } => Some(
                "Verify the fact tables were built by the transformation pipeline and the role can read them"
                    .to_string(),
            ),
            CoreError::MissingColumn { column, .. } => Some(format!(
                "The warehouse schema no longer exposes {}; rebuild the fact tables",
                column
            )),
            CoreError::EmptyResult { .. } => {
                Some("No data for the selected seasons; widen the season filter".to_string())
            }
            CoreError::InvalidFilter { .. } => {
                Some("Season values must be non-empty".to_string())
            }
            _ => None,
        };

        Self {
            section,
            message: error.to_string(),
            suggestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_lists_available() {
        let err = CoreError::MissingColumn {
            column: "RUNS".to_string(),
            available: vec!["PLAYER".to_string(), "WICKETS".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Column RUNS not found (available: PLAYER, WICKETS)"
        );
    }

    #[test]
    fn test_warehouse_error_classification() {
        assert!(CoreError::connection("down").is_warehouse_error());
        assert!(CoreError::query("syntax error").is_warehouse_error());
        assert!(!CoreError::invalid_filter("empty season").is_warehouse_error());
    }

    #[test]
    fn test_section_error_suggestion() {
        let err = SectionError::from_core_error("key_metrics", &CoreError::connection("timeout"));
        assert_eq!(err.section, "key_metrics");
        assert!(err.message.contains("timeout"));
        assert!(err.suggestion.unwrap().contains("secrets.toml"));

        let plain = SectionError::new("teams", "boom");
        assert!(plain.suggestion.is_none());
        assert_eq!(
            plain.with_suggestion("retry").suggestion.as_deref(),
            Some("retry")
        );
    }
}

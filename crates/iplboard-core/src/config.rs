//! Secrets and dashboard configuration
//!
//! The secrets file keeps the layout of a Streamlit `secrets.toml`:
//!
//! ```toml
//! [snowflake]
//! account = "xy12345.eu-west-1"
//! user = "ANALYST"
//! password = "<programmatic access token>"
//! warehouse = "COMPUTE_WH"
//! database = "IPL"
//! schema = "MARTS"
//!
//! [dashboard]
//! cache_ttl_secs = 600
//! ```

use crate::error::CoreError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cache TTL used when nothing else is configured (10 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Snowflake connection parameters
#[derive(Clone, Deserialize)]
pub struct SnowflakeConfig {
    pub account: String,
    /// Login name, shown in connection descriptions; the SQL API authenticates by token alone
    #[serde(default)]
    pub user: Option<String>,
    /// Sent as a bearer token; a programmatic access token unless `token_type` says otherwise
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for private-link or proxy hosts
    #[serde(default)]
    pub host: Option<String>,
}

fn default_token_type() -> String {
    "PROGRAMMATIC_ACCESS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl SnowflakeConfig {
    /// Reject empty required fields
    pub fn validate(&self) -> Result<(), CoreError> {
        let required = [
            ("account", &self.account),
            ("password", &self.password),
            ("warehouse", &self.warehouse),
            ("database", &self.database),
            ("schema", &self.schema),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig {
                message: format!("[snowflake] is missing: {}", missing.join(", ")),
            })
        }
    }

    /// Base URL of the account's SQL API
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// The password must never reach logs
impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"********")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("token_type", &self.token_type)
            .field("timeout_secs", &self.timeout_secs)
            .field("host", &self.host)
            .finish()
    }
}

/// Dashboard behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Time-to-live of cached query results
    pub cache_ttl_secs: u64,

    /// Maximum number of cached statements
    pub cache_capacity: u64,

    /// Seasons selected at load (most recent first)
    pub default_season_window: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: 256,
            default_season_window: 3,
        }
    }
}

impl DashboardConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Contents of the secrets file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub snowflake: Option<SnowflakeConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Secrets {
    /// Load and parse a secrets file
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let secrets = Self::parse(&content, path)?;
        tracing::debug!(
            path = %path.display(),
            has_snowflake = secrets.snowflake.is_some(),
            "Secrets loaded"
        );
        Ok(secrets)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The validated `[snowflake]` section
    pub fn snowflake(&self) -> Result<&SnowflakeConfig, CoreError> {
        let config = self
            .snowflake
            .as_ref()
            .ok_or_else(|| CoreError::InvalidConfig {
                message: "no [snowflake] section in secrets file".to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }
}

/// Where to look for secrets when no path is given
///
/// `.streamlit/secrets.toml` in the working directory wins, then
/// `<config dir>/iplboard/secrets.toml`.
pub fn default_secrets_path() -> Option<PathBuf> {
    let local = PathBuf::from(".streamlit").join("secrets.toml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("iplboard").join("secrets.toml"))
}

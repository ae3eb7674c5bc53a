//! iplboard - IPL analytics dashboard

mod cli;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use iplboard_core::config::default_secrets_path;
use iplboard_core::{
    Connector, Dashboard, DashboardConfig, Dialect, FilterState, QueryBuilder, Secrets,
    SnowflakeConnector, SqliteConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "iplboard",
    version,
    about = "IPL analytics dashboard",
    long_about = "Key metrics, leaderboards, phase scoring, match outcomes and team standings\n\
                  for the Indian Premier League, computed in a Snowflake warehouse (or a local\n\
                  SQLite export of the same tables) and served as JSON or printed as tables.\n\
                  \n\
                  Examples:\n\
                    iplboard                             # Serve the JSON API on port 3333 (default)\n\
                    iplboard serve --port 8080           # Custom port\n\
                    iplboard seasons                     # List seasons (* = default selection)\n\
                    iplboard summary                     # Dashboard for the last 3 seasons\n\
                    iplboard summary -s 2019,2020        # Dashboard for chosen seasons\n\
                    iplboard summary -s ''               # Dashboard for every season\n\
                    iplboard sql top-run-scorers -s 2020 # Show a template's SQL\n\
                    iplboard --sqlite ipl.db summary     # Read a local SQLite export\n\
                  \n\
                  Environment Variables:\n\
                    IPLBOARD_SECRETS                     # Path to secrets.toml\n\
                    IPLBOARD_SQLITE                      # Path to a SQLite export\n\
                    IPLBOARD_NO_COLOR                    # Disable ANSI colors (log-friendly)\n\
                    RUST_LOG                             # Log filter (default: info)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Path to secrets.toml (default: .streamlit/secrets.toml, then the user config dir)
    #[arg(long, env = "IPLBOARD_SECRETS", global = true)]
    secrets: Option<PathBuf>,

    /// Read from a SQLite export instead of Snowflake
    #[arg(long, env = "IPLBOARD_SQLITE", global = true)]
    sqlite: Option<PathBuf>,

    /// Query cache TTL in seconds (0 disables caching)
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "IPLBOARD_NO_COLOR", global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve the JSON API (default)
    Serve {
        /// Port for web server
        #[arg(long, default_value = "3333")]
        port: u16,
    },
    /// List available seasons
    Seasons {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every dashboard section and exit
    Summary {
        /// Comma-separated seasons; empty for all (default: most recent seasons)
        #[arg(long, short = 's')]
        seasons: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List query templates
    Templates {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the SQL a template builds for a season selection
    Sql {
        /// Template id (see `iplboard templates`)
        template: String,
        /// Comma-separated seasons; empty or absent for all
        #[arg(long, short = 's')]
        seasons: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so table and JSON output stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!std::env::var_os("IPLBOARD_NO_COLOR").is_some_and(|v| !v.is_empty()))
        .init();

    let cli = Cli::parse();
    let options = cli.options();
    let no_color = cli.no_color;

    match cli.mode {
        None => run_serve(&options, 3333).await?,
        Some(Mode::Serve { port }) => run_serve(&options, port).await?,
        Some(Mode::Seasons { json }) => run_seasons(&options, json).await?,
        Some(Mode::Summary { seasons, json }) => {
            run_summary(&options, seasons.as_deref(), json, no_color).await?
        }
        Some(Mode::Templates { json }) => run_templates(json, no_color),
        Some(Mode::Sql {
            template,
            seasons,
            json,
        }) => run_sql(&options, &template, seasons.as_deref(), json)?,
    }

    Ok(())
}

/// Warehouse and cache options shared by every command
struct Options {
    secrets: Option<PathBuf>,
    sqlite: Option<PathBuf>,
    cache_ttl: Option<u64>,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            secrets: self.secrets.clone(),
            sqlite: self.sqlite.clone(),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl Options {
    /// Secrets file, if one was given or exists at a default location
    fn load_secrets(&self) -> Result<Option<Secrets>> {
        if let Some(path) = &self.secrets {
            let secrets = Secrets::load(path)
                .with_context(|| format!("Failed to load secrets from {}", path.display()))?;
            return Ok(Some(secrets));
        }

        match default_secrets_path() {
            Some(path) if path.exists() => Secrets::load(&path)
                .map(Some)
                .with_context(|| format!("Failed to load secrets from {}", path.display())),
            _ => Ok(None),
        }
    }

    fn dashboard_config(&self, secrets: Option<&Secrets>) -> DashboardConfig {
        let mut config = secrets.map(|s| s.dashboard.clone()).unwrap_or_default();
        if let Some(ttl) = self.cache_ttl {
            config.cache_ttl_secs = ttl;
        }
        config
    }

    fn connector(&self, secrets: Option<&Secrets>) -> Result<Arc<dyn Connector>> {
        if let Some(path) = &self.sqlite {
            return Ok(Arc::new(SqliteConnector::new(path)));
        }

        let Some(secrets) = secrets else {
            bail!(
                "No secrets file found. Pass --secrets, set IPLBOARD_SECRETS, \
                 create .streamlit/secrets.toml, or use --sqlite"
            );
        };
        let config = secrets
            .snowflake()
            .context("Secrets file has no usable [snowflake] section")?;
        Ok(Arc::new(SnowflakeConnector::new(config.clone())?))
    }

    fn dashboard(&self) -> Result<Arc<Dashboard>> {
        let secrets = self.load_secrets()?;
        let config = self.dashboard_config(secrets.as_ref());
        let connector = self.connector(secrets.as_ref())?;
        tracing::debug!(
            target_db = %connector.describe(),
            cache_ttl_secs = config.cache_ttl_secs,
            "Dashboard configured"
        );
        Ok(Arc::new(Dashboard::from_connector(connector, config)))
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

async fn run_serve(options: &Options, port: u16) -> Result<()> {
    let dashboard = options.dashboard()?;

    println!("\nAPI endpoints: http://localhost:{}/api/*", port);
    println!("   Dashboard:  http://localhost:{}/api/dashboard?seasons=2019,2020", port);
    println!("   Press Ctrl+C to stop\n");

    iplboard_web::run(dashboard, port).await
}

async fn run_seasons(options: &Options, json: bool) -> Result<()> {
    let dashboard = options.dashboard()?;

    let spinner = spinner();
    spinner.set_message("Loading seasons...");
    let seasons = dashboard.available_seasons().await;
    spinner.finish_and_clear();

    let seasons = seasons.context("Failed to load seasons")?;
    let default = dashboard.default_filter(&seasons);
    println!("{}", cli::format_seasons(&seasons, &default, json));
    Ok(())
}

async fn run_summary(
    options: &Options,
    seasons: Option<&str>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let dashboard = options.dashboard()?;
    let start = Instant::now();

    let spinner = spinner();
    let filter = match seasons {
        Some(list) => FilterState::parse_list(list).context("Invalid --seasons")?,
        None => {
            spinner.set_message("Loading seasons...");
            let available = dashboard.available_seasons().await;
            let available = match available {
                Ok(available) => available,
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e).context("Failed to load seasons");
                }
            };
            dashboard.default_filter(&available)
        }
    };

    spinner.set_message("Running dashboard queries...");
    let report = dashboard.render(&filter).await;
    let failed = report.failures().len();
    if json {
        spinner.finish_and_clear();
    } else {
        spinner.finish_with_message(format!(
            "✓ Rendered in {:.2}s ({} sections failed)",
            start.elapsed().as_secs_f64(),
            failed
        ));
    }

    println!("{}", cli::format_report(&report, json, no_color));
    Ok(())
}

fn run_templates(json: bool, no_color: bool) {
    let builder = QueryBuilder::default();
    let templates: Vec<_> = builder.catalog().iter().collect();
    println!("{}", cli::format_templates(&templates, json, no_color));
}

fn run_sql(options: &Options, template: &str, seasons: Option<&str>, json: bool) -> Result<()> {
    let filter =
        FilterState::parse_list(seasons.unwrap_or_default()).context("Invalid --seasons")?;
    let statement = QueryBuilder::default()
        .build(template, &filter)
        .context("Run `iplboard templates` to list template ids")?;

    let dialect = if options.sqlite.is_some() {
        Dialect::Sqlite
    } else {
        Dialect::Snowflake
    };
    println!("{}", cli::format_statement(template, &statement, dialect, json));
    Ok(())
}

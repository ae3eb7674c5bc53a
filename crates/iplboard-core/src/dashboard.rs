//! Dashboard service
//!
//! Composes the page sections from templates, the shared executor and the
//! shaper. Each section is an independent async operation; `render` runs
//! them together and isolates their failures.

use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::executor::{ExecutorConfig, QueryExecutor};
use crate::filter::{FilterState, Season};
use crate::models::dashboard::decode_rows;
use crate::models::{
    BatsmanSummary, BowlerSummary, DashboardReport, KeyMetrics, PhaseSummary, ResultTable,
    ScenarioOutcome, Section, TeamStanding, TeamStandings,
};
use crate::query::{QueryBuilder, Statement};
use crate::shaper::{extract_count, pivot, top_n};
use crate::warehouse::Connector;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Rows shown by the leaderboards
pub const LEADERBOARD_SIZE: usize = 10;
/// Teams in the win-percentage chart
pub const STANDINGS_CHART_SIZE: usize = 10;
/// Teams in the highlight cards
pub const STANDINGS_HIGHLIGHTS: usize = 5;

/// The IPL analytics dashboard
pub struct Dashboard {
    executor: Arc<QueryExecutor>,
    builder: QueryBuilder,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(executor: Arc<QueryExecutor>, builder: QueryBuilder, config: DashboardConfig) -> Self {
        Self {
            executor,
            builder,
            config,
        }
    }

    /// Dashboard over `connector` with the builtin templates
    pub fn from_connector(connector: Arc<dyn Connector>, config: DashboardConfig) -> Self {
        let executor = Arc::new(QueryExecutor::new(connector, ExecutorConfig::from(&config)));
        Self::new(executor, QueryBuilder::default(), config)
    }

    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Build the statement for a template without running it
    pub fn statement(&self, template_id: &str, filter: &FilterState) -> Result<Statement, CoreError> {
        self.builder.build(template_id, filter)
    }

    async fn query(&self, template_id: &str, filter: &FilterState) -> Result<Arc<ResultTable>, CoreError> {
        let statement = self.builder.build(template_id, filter)?;
        self.executor.execute(&statement).await
    }

    async fn count(&self, template_id: &str, filter: &FilterState) -> Result<i64, CoreError> {
        let table = self.query(template_id, filter).await?;
        extract_count(&table, "TOTAL")
    }

    /// Distinct seasons in ascending order
    pub async fn available_seasons(&self) -> Result<Vec<Season>, CoreError> {
        let table = self.query("seasons", &FilterState::all_seasons()).await?;
        let column = table.require_column("SEASON")?;

        table
            .rows()
            .map(|row| &row.values()[column])
            .filter(|value| !value.is_null())
            .map(|value| Season::new(value.to_label()))
            .collect()
    }

    /// Selection at load: the most recent `default_season_window` seasons
    pub fn default_filter(&self, available: &[Season]) -> FilterState {
        FilterState::most_recent(available, self.config.default_season_window)
    }

    /// Matches, deliveries, players, teams and sixes
    pub async fn key_metrics(&self, filter: &FilterState) -> Result<KeyMetrics, CoreError> {
        let (matches, deliveries, players, teams, sixes) = tokio::try_join!(
            self.count("total-matches", filter),
            self.count("total-deliveries", filter),
            self.count("total-players", filter),
            self.count("total-teams", filter),
            self.count("total-sixes", filter),
        )?;

        Ok(KeyMetrics {
            matches,
            deliveries,
            players,
            teams,
            sixes,
        })
    }

    pub async fn top_run_scorers(&self, filter: &FilterState) -> Result<Vec<BatsmanSummary>, CoreError> {
        let table = self.query("top-run-scorers", filter).await?;
        decode_rows(&top_n(&table, LEADERBOARD_SIZE), BatsmanSummary::from_row)
    }

    pub async fn top_wicket_takers(&self, filter: &FilterState) -> Result<Vec<BowlerSummary>, CoreError> {
        let table = self.query("top-wicket-takers", filter).await?;
        decode_rows(&top_n(&table, LEADERBOARD_SIZE), BowlerSummary::from_row)
    }

    /// Powerplay, Middle and Death, in that order
    pub async fn phase_scoring(&self, filter: &FilterState) -> Result<Vec<PhaseSummary>, CoreError> {
        let table = self.query("phase-scoring", filter).await?;
        decode_rows(&table, PhaseSummary::from_row)
    }

    /// Won/lost split for batting first and chasing
    pub async fn match_outcomes(&self, filter: &FilterState) -> Result<Vec<ScenarioOutcome>, CoreError> {
        let table = self.query("match-outcomes", filter).await?;
        let grid = pivot(&table, "SCENARIO", "RESULT", "MATCHES")?;

        let count = |scenario: &str, result: &str| {
            grid.get(scenario, result)
                .and_then(|value| value.as_i64())
                .unwrap_or(0)
        };

        Ok(grid
            .rows
            .iter()
            .map(|scenario| ScenarioOutcome {
                scenario: scenario.clone(),
                won: count(scenario, "Won"),
                lost: count(scenario, "Lost"),
            })
            .collect())
    }

    pub async fn team_standings(&self, filter: &FilterState) -> Result<TeamStandings, CoreError> {
        let table = self.query("team-standings", filter).await?;
        let decode = |rows: &ResultTable| decode_rows(rows, TeamStanding::from_row);

        Ok(TeamStandings {
            all: decode(&table)?,
            chart: decode(&top_n(&table, STANDINGS_CHART_SIZE))?,
            highlights: decode(&top_n(&table, STANDINGS_HIGHLIGHTS))?,
        })
    }

    /// Render every section for `filter`
    ///
    /// Never fails as a whole: a section that errors is reported as failed
    /// and the rest still render.
    pub async fn render(&self, filter: &FilterState) -> DashboardReport {
        let started = Instant::now();
        let (key_metrics, batting, bowling, phases, outcomes, teams) = tokio::join!(
            self.key_metrics(filter),
            self.top_run_scorers(filter),
            self.top_wicket_takers(filter),
            self.phase_scoring(filter),
            self.match_outcomes(filter),
            self.team_standings(filter),
        );

        let report = DashboardReport {
            seasons: filter.seasons().cloned().collect(),
            rendered_at: Utc::now(),
            key_metrics: Section::from_result("key_metrics", key_metrics),
            top_run_scorers: Section::from_result("top_run_scorers", batting),
            top_wicket_takers: Section::from_result("top_wicket_takers", bowling),
            phase_scoring: Section::from_result("phase_scoring", phases),
            match_outcomes: Section::from_result("match_outcomes", outcomes),
            team_standings: Section::from_result("team_standings", teams),
        };

        tracing::info!(
            seasons = filter.len(),
            failed_sections = report.failures().len(),
            duration_ms = started.elapsed().as_millis(),
            "Dashboard rendered"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Dialect;
    use crate::warehouse::{SqliteWarehouse, Warehouse};
    use async_trait::async_trait;
    use rusqlite::Connection;

    const FIXTURE: &str = include_str!("../tests/fixtures/ipl_sample.sql");

    /// Hands out one in-memory database
    struct MemoryConnector(SqliteWarehouse);

    #[async_trait]
    impl Connector for MemoryConnector {
        fn describe(&self) -> String {
            "sqlite://:memory:".to_string()
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn connect(&self) -> Result<Arc<dyn Warehouse>, CoreError> {
            Ok(Arc::new(self.0.clone()))
        }
    }

    fn dashboard_with(setup: &str) -> Dashboard {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(setup).unwrap();
        let connector = Arc::new(MemoryConnector(SqliteWarehouse::from_connection(conn)));
        Dashboard::from_connector(connector, DashboardConfig::default())
    }

    fn dashboard() -> Dashboard {
        dashboard_with(FIXTURE)
    }

    #[tokio::test]
    async fn test_available_seasons_and_default_filter() {
        let dashboard = dashboard();
        let seasons = dashboard.available_seasons().await.unwrap();
        let labels: Vec<_> = seasons.iter().map(Season::as_str).collect();
        assert_eq!(labels, ["2018", "2019", "2020", "2021"]);

        let filter = dashboard.default_filter(&seasons);
        let selected: Vec<_> = filter.seasons().map(Season::as_str).collect();
        assert_eq!(selected, ["2019", "2020", "2021"]);
    }

    #[tokio::test]
    async fn test_key_metrics_all_seasons() {
        let metrics = dashboard()
            .key_metrics(&FilterState::all_seasons())
            .await
            .unwrap();
        assert_eq!(
            metrics,
            KeyMetrics {
                matches: 12,
                deliveries: 144,
                players: 8,
                teams: 4,
                sixes: 114,
            }
        );
    }

    #[tokio::test]
    async fn test_key_metrics_filtered() {
        let filter = FilterState::parse(["2019", "2020", "2021"]).unwrap();
        let metrics = dashboard().key_metrics(&filter).await.unwrap();
        assert_eq!(metrics.matches, 9);
        assert_eq!(metrics.deliveries, 108);
        assert_eq!(metrics.sixes, 81);
    }

    #[tokio::test]
    async fn test_leaderboards_keep_sql_order() {
        let dashboard = dashboard();
        let batting = dashboard
            .top_run_scorers(&FilterState::all_seasons())
            .await
            .unwrap();
        let players: Vec<_> = batting.iter().map(|b| b.player.as_str()).collect();
        assert_eq!(
            players,
            ["MS Dhoni", "AB de Villiers", "F du Plessis", "SP Narine", "AD Russell"]
        );
        assert_eq!(batting[0].runs, 387);
        assert_eq!(batting[0].strike_rate, 166.57);

        let bowling = dashboard
            .top_wicket_takers(&FilterState::all_seasons())
            .await
            .unwrap();
        assert_eq!(bowling.len(), 2);
        assert_eq!(bowling[1].player, "SP Narine");
        assert_eq!(bowling[1].dot_balls, 73);
    }

    #[tokio::test]
    async fn test_phase_scoring_order() {
        let phases = dashboard()
            .phase_scoring(&FilterState::all_seasons())
            .await
            .unwrap();
        let names: Vec<_> = phases.iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(names, ["Powerplay", "Middle", "Death"]);
        assert_eq!(phases[2].total_runs, 128);
    }

    #[tokio::test]
    async fn test_match_outcomes_pivot() {
        let outcomes = dashboard()
            .match_outcomes(&FilterState::all_seasons())
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                ScenarioOutcome {
                    scenario: "Batting First".to_string(),
                    won: 8,
                    lost: 4,
                },
                ScenarioOutcome {
                    scenario: "Chasing".to_string(),
                    won: 4,
                    lost: 8,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_team_standings_views() {
        let standings = dashboard()
            .team_standings(&FilterState::all_seasons())
            .await
            .unwrap();
        assert_eq!(standings.all.len(), 4);
        assert_eq!(standings.chart, standings.all);
        assert_eq!(standings.highlights.len(), 4);
        assert_eq!(standings.all[3].team_name, "Kolkata Knight Riders");
        assert_eq!(standings.all[0].avg_runs, 191);
    }

    #[tokio::test]
    async fn test_empty_selection_yields_empty_sections() {
        let filter = FilterState::parse(["2019"]).unwrap();
        let dashboard = dashboard();
        assert!(dashboard.top_run_scorers(&filter).await.unwrap().is_empty());
        assert!(dashboard.team_standings(&filter).await.unwrap().all.is_empty());
    }

    #[tokio::test]
    async fn test_render_isolates_failing_sections() {
        // No bowling mart: only the wicket-takers section can fail
        let setup = FIXTURE.replace(
            "CREATE TABLE fct_bowling_performance",
            "CREATE TABLE fct_bowling_archive",
        )
        .replace(
            "INSERT INTO fct_bowling_performance",
            "INSERT INTO fct_bowling_archive",
        );
        let dashboard = dashboard_with(&setup);

        let report = dashboard.render(&FilterState::all_seasons()).await;
        assert!(!report.is_complete());
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].section, "top_wicket_takers");
        assert!(failures[0].suggestion.is_some());

        assert!(report.key_metrics.is_ready());
        assert!(report.top_run_scorers.is_ready());
        assert!(report.team_standings.is_ready());
    }

    #[tokio::test]
    async fn test_render_reuses_cache() {
        let dashboard = dashboard();
        let filter = FilterState::parse(["2020", "2021"]).unwrap();

        let first = dashboard.render(&filter).await;
        assert!(first.is_complete());
        let calls = dashboard.executor().stats().await.warehouse_calls;
        assert_eq!(calls, 10);

        dashboard.render(&filter).await;
        let stats = dashboard.executor().stats().await;
        assert_eq!(stats.warehouse_calls, calls);
        assert_eq!(stats.hits, 10);
        assert_eq!(stats.connections_opened, 1);
    }
}

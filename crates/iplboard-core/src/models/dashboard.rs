//! Typed dashboard sections decoded from result tables

use super::table::{ResultTable, RowView};
use crate::error::{CoreError, SectionError};
use crate::filter::Season;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The five metric cards at the top of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub matches: i64,
    pub deliveries: i64,
    pub players: i64,
    pub teams: i64,
    pub sixes: i64,
}

/// One entry of the run-scorers leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatsmanSummary {
    pub player: String,
    pub runs: i64,
    pub matches: i64,
    pub strike_rate: f64,
    pub fours: i64,
    pub sixes: i64,
}

impl BatsmanSummary {
    pub fn from_row(row: RowView<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            player: row.text("PLAYER")?,
            runs: row.int("RUNS")?,
            matches: row.int("MATCHES")?,
            strike_rate: row.float("STRIKE_RATE")?,
            fours: row.int("FOURS")?,
            sixes: row.int("SIXES")?,
        })
    }
}

/// One entry of the wicket-takers leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BowlerSummary {
    pub player: String,
    pub wickets: i64,
    pub matches: i64,
    pub economy: f64,
    pub dot_balls: i64,
}

impl BowlerSummary {
    pub fn from_row(row: RowView<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            player: row.text("PLAYER")?,
            wickets: row.int("WICKETS")?,
            matches: row.int("MATCHES")?,
            economy: row.float("ECONOMY")?,
            dot_balls: row.int("DOT_BALLS")?,
        })
    }
}

/// Runs and wickets in one phase of an innings (Powerplay, Middle, Death)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub total_runs: i64,
    pub wickets: i64,
}

impl PhaseSummary {
    pub fn from_row(row: RowView<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            phase: row.text("PHASE")?,
            total_runs: row.int("TOTAL_RUNS")?,
            wickets: row.int("WICKETS")?,
        })
    }
}

/// Won/lost counts for one scenario (batting first or chasing)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub won: i64,
    pub lost: i64,
}

impl ScenarioOutcome {
    pub fn total(&self) -> i64 {
        self.won + self.lost
    }

    /// Win share in percent, 0.0 when no matches were played
    pub fn win_pct(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.won as f64 * 100.0 / self.total() as f64
    }
}

/// Season-filtered team standing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStanding {
    pub team_name: String,
    pub matches: i64,
    pub wins: i64,
    pub win_pct: f64,
    pub avg_runs: i64,
}

impl TeamStanding {
    pub fn from_row(row: RowView<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            team_name: row.text("TEAM_NAME")?,
            matches: row.int("MATCHES")?,
            wins: row.int("WINS")?,
            win_pct: row.float("WIN_PCT")?,
            avg_runs: row.float("AVG_RUNS")?.round() as i64,
        })
    }
}

/// Decode every row of a table with `decode`
pub fn decode_rows<T>(
    table: &ResultTable,
    decode: impl Fn(RowView<'_>) -> Result<T, CoreError>,
) -> Result<Vec<T>, CoreError> {
    table.rows().map(decode).collect()
}

/// Outcome of one dashboard section
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    Failed { error: SectionError },
}

impl<T> Section<T> {
    /// Wrap a section result, converting the error for display
    pub fn from_result(name: &str, result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Section::Ready { data },
            Err(e) => {
                tracing::warn!(section = name, error = %e, "Dashboard section failed");
                Section::Failed {
                    error: SectionError::from_core_error(name, &e),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Ready { data } => Some(data),
            Section::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&SectionError> {
        match self {
            Section::Ready { .. } => None,
            Section::Failed { error } => Some(error),
        }
    }
}

/// Team standings plus the two derived views the page shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStandings {
    /// Every team with enough matches, best win percentage first
    pub all: Vec<TeamStanding>,
    /// Top 10 for the win-percentage chart
    pub chart: Vec<TeamStanding>,
    /// Top 5 for the highlight cards
    pub highlights: Vec<TeamStanding>,
}

/// A fully rendered dashboard
///
/// Every section renders independently: a warehouse failure in one chart
/// leaves the others intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub seasons: Vec<Season>,
    pub rendered_at: DateTime<Utc>,
    pub key_metrics: Section<KeyMetrics>,
    pub top_run_scorers: Section<Vec<BatsmanSummary>>,
    pub top_wicket_takers: Section<Vec<BowlerSummary>>,
    pub phase_scoring: Section<Vec<PhaseSummary>>,
    pub match_outcomes: Section<Vec<ScenarioOutcome>>,
    pub team_standings: Section<TeamStandings>,
}

impl DashboardReport {
    /// Errors of every failed section, in page order
    pub fn failures(&self) -> Vec<&SectionError> {
        [
            self.key_metrics.error(),
            self.top_run_scorers.error(),
            self.top_wicket_takers.error(),
            self.phase_scoring.error(),
            self.match_outcomes.error(),
            self.team_standings.error(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Format an integer with thousands separators (`12,345`)
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

//! Data models for iplboard

pub mod dashboard;
pub mod table;
pub mod value;

pub use dashboard::{
    format_thousands, BatsmanSummary, BowlerSummary, DashboardReport, KeyMetrics, PhaseSummary,
    ScenarioOutcome, Section, TeamStanding, TeamStandings,
};
pub use table::{ResultTable, RowView};
pub use value::Value;

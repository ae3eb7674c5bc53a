//! CLI output formatting
//!
//! Renders seasons, dashboard reports, templates and statements as terminal
//! tables (human) or JSON.

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use iplboard_core::models::{format_thousands, DashboardReport, Section};
use iplboard_core::query::QueryTemplate;
use iplboard_core::{Dialect, FilterState, Season, SectionError, Statement};
use serde::Serialize;

// ============================================================================
// Tables
// ============================================================================

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    // Apply colors only if enabled
    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

// ============================================================================
// Seasons
// ============================================================================

#[derive(Serialize)]
struct SeasonListing<'a> {
    seasons: &'a [Season],
    default: Vec<&'a Season>,
}

/// Format available seasons, marking the default selection
pub fn format_seasons(seasons: &[Season], default: &FilterState, json: bool) -> String {
    if json {
        return to_json(&SeasonListing {
            seasons,
            default: default.seasons().collect(),
        });
    }

    if seasons.is_empty() {
        return "No seasons found.".to_string();
    }

    seasons
        .iter()
        .map(|season| {
            if default.seasons().any(|s| s == season) {
                format!("{} *", season)
            } else {
                season.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Dashboard report
// ============================================================================

/// Format a rendered dashboard (human or JSON)
pub fn format_report(report: &DashboardReport, json: bool, no_color: bool) -> String {
    if json {
        return to_json(report);
    }

    let selection = if report.seasons.is_empty() {
        "all seasons".to_string()
    } else {
        report
            .seasons
            .iter()
            .map(Season::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = vec![format!("IPL Analytics - {}", selection)];

    out.push(section("Key Metrics", &report.key_metrics, |m| {
        let mut table = new_table(&["Metric", "Value"], no_color);
        for (label, value) in [
            ("Total Matches", m.matches),
            ("Total Deliveries", m.deliveries),
            ("Total Players", m.players),
            ("Teams", m.teams),
            ("Total Sixes", m.sixes),
        ] {
            table.add_row(Row::from(vec![label.to_string(), format_thousands(value)]));
        }
        table.to_string()
    }));

    out.push(section("Top Run Scorers", &report.top_run_scorers, |rows| {
        let mut table = new_table(
            &["Player", "Runs", "Matches", "Strike Rate", "4s", "6s"],
            no_color,
        );
        for b in rows {
            table.add_row(Row::from(vec![
                b.player.clone(),
                format_thousands(b.runs),
                b.matches.to_string(),
                format!("{:.2}", b.strike_rate),
                b.fours.to_string(),
                b.sixes.to_string(),
            ]));
        }
        non_empty(rows.is_empty(), table)
    }));

    out.push(section("Top Wicket Takers", &report.top_wicket_takers, |rows| {
        let mut table = new_table(
            &["Player", "Wickets", "Matches", "Economy", "Dot Balls"],
            no_color,
        );
        for b in rows {
            table.add_row(Row::from(vec![
                b.player.clone(),
                b.wickets.to_string(),
                b.matches.to_string(),
                format!("{:.2}", b.economy),
                format_thousands(b.dot_balls),
            ]));
        }
        non_empty(rows.is_empty(), table)
    }));

    out.push(section("Scoring by Phase", &report.phase_scoring, |rows| {
        let mut table = new_table(&["Phase", "Runs", "Wickets"], no_color);
        for p in rows {
            table.add_row(Row::from(vec![
                p.phase.clone(),
                format_thousands(p.total_runs),
                p.wickets.to_string(),
            ]));
        }
        non_empty(rows.is_empty(), table)
    }));

    out.push(section("Batting First vs Chasing", &report.match_outcomes, |rows| {
        let mut table = new_table(&["Scenario", "Won", "Lost", "Win %"], no_color);
        for o in rows {
            table.add_row(Row::from(vec![
                o.scenario.clone(),
                o.won.to_string(),
                o.lost.to_string(),
                format!("{:.1}", o.win_pct()),
            ]));
        }
        non_empty(rows.is_empty(), table)
    }));

    out.push(section("Team Standings", &report.team_standings, |standings| {
        let mut table = new_table(&["Team", "Matches", "Wins", "Win %", "Avg Runs"], no_color);
        for t in &standings.chart {
            table.add_row(Row::from(vec![
                t.team_name.clone(),
                t.matches.to_string(),
                t.wins.to_string(),
                format!("{:.1}", t.win_pct),
                t.avg_runs.to_string(),
            ]));
        }
        non_empty(standings.chart.is_empty(), table)
    }));

    out.join("\n\n")
}

fn section<T>(title: &str, section: &Section<T>, render: impl FnOnce(&T) -> String) -> String {
    match section {
        Section::Ready { data } => format!("{}\n{}", title, render(data)),
        Section::Failed { error } => format!("{}\n{}", title, format_section_error(error)),
    }
}

fn non_empty(empty: bool, table: Table) -> String {
    if empty {
        "No data for the selected seasons.".to_string()
    } else {
        table.to_string()
    }
}

fn format_section_error(error: &SectionError) -> String {
    match &error.suggestion {
        Some(suggestion) => format!("⚠ {}\n  → {}", error.message, suggestion),
        None => format!("⚠ {}", error.message),
    }
}

// ============================================================================
// Templates and statements
// ============================================================================

/// Format the template catalog (human or JSON)
pub fn format_templates(templates: &[&QueryTemplate], json: bool, no_color: bool) -> String {
    if json {
        return to_json(templates);
    }

    let mut table = new_table(&["ID", "Season filter", "Description"], no_color);
    for template in templates {
        table.add_row(Row::from(vec![
            template.id.to_string(),
            format!("{:?}", template.scope),
            template.description.to_string(),
        ]));
    }
    table.to_string()
}

#[derive(Serialize)]
struct StatementListing<'a> {
    template: &'a str,
    sql: &'a str,
    params: &'a [String],
    inline: String,
}

/// Format a built statement: bound SQL plus the inline rendering
pub fn format_statement(template: &str, statement: &Statement, dialect: Dialect, json: bool) -> String {
    let inline = statement.to_inline_sql(dialect);
    if json {
        return to_json(&StatementListing {
            template,
            sql: statement.sql(),
            params: statement.params(),
            inline,
        });
    }

    let mut lines = vec![format!("-- {} ({:?})", template, dialect), statement.sql().to_string()];
    if !statement.params().is_empty() {
        lines.push(format!("-- params: {}", statement.params().join(", ")));
        lines.push(String::new());
        lines.push("-- inline:".to_string());
        lines.push(inline);
    }
    lines.join("\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use iplboard_core::models::{BatsmanSummary, KeyMetrics, ScenarioOutcome};
    use iplboard_core::{CoreError, QueryBuilder};

    fn report() -> DashboardReport {
        DashboardReport {
            seasons: vec![Season::new("2020").unwrap(), Season::new("2021").unwrap()],
            rendered_at: Utc::now(),
            key_metrics: Section::Ready {
                data: KeyMetrics {
                    matches: 120,
                    deliveries: 28_456,
                    players: 210,
                    teams: 8,
                    sixes: 1_302,
                },
            },
            top_run_scorers: Section::Ready {
                data: vec![BatsmanSummary {
                    player: "KL Rahul".to_string(),
                    runs: 1_296,
                    matches: 27,
                    strike_rate: 133.47,
                    fours: 106,
                    sixes: 53,
                }],
            },
            top_wicket_takers: Section::Ready { data: vec![] },
            phase_scoring: Section::from_result(
                "phase_scoring",
                Err(CoreError::query("Object 'STG_DELIVERIES' does not exist")),
            ),
            match_outcomes: Section::Ready {
                data: vec![ScenarioOutcome {
                    scenario: "Chasing".to_string(),
                    won: 3,
                    lost: 1,
                }],
            },
            team_standings: Section::from_result(
                "team_standings",
                Err(CoreError::connection("timeout")),
            ),
        }
    }

    #[test]
    fn test_format_report_human() {
        let output = format_report(&report(), false, true);
        assert!(output.starts_with("IPL Analytics - 2020, 2021"));
        assert!(output.contains("28,456"));
        assert!(output.contains("KL Rahul"));
        assert!(output.contains("133.47"));
        assert!(output.contains("75.0"));
        assert!(output.contains("No data for the selected seasons."));
        assert!(output.contains("⚠ Warehouse rejected query"));
        assert!(output.contains("→ Check the [snowflake] credentials"));
    }

    #[test]
    fn test_format_report_json() {
        let output = format_report(&report(), true, false);
        assert!(output.starts_with('{'));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["key_metrics"]["status"], "ready");
        assert_eq!(value["phase_scoring"]["status"], "failed");
    }

    #[test]
    fn test_format_seasons_marks_default() {
        let seasons: Vec<Season> = ["2019", "2020", "2021"]
            .iter()
            .map(|s| Season::new(s).unwrap())
            .collect();
        let default = FilterState::most_recent(&seasons, 2);

        let output = format_seasons(&seasons, &default, false);
        assert_eq!(output, "2019\n2020 *\n2021 *");

        let json = format_seasons(&seasons, &default, true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["default"], serde_json::json!(["2020", "2021"]));

        assert_eq!(
            format_seasons(&[], &FilterState::all_seasons(), false),
            "No seasons found."
        );
    }

    #[test]
    fn test_format_templates() {
        let builder = QueryBuilder::default();
        let templates: Vec<_> = builder.catalog().iter().collect();
        let output = format_templates(&templates, false, true);
        assert!(output.contains("top-run-scorers"));
        assert!(output.contains("ByMatch"));

        let json = format_templates(&templates, true, false);
        assert!(json.starts_with('['));
    }

    #[test]
    fn test_format_statement() {
        let filter = FilterState::parse_list("2019,2020").unwrap();
        let statement = QueryBuilder::default()
            .build("total-matches", &filter)
            .unwrap();

        let output = format_statement("total-matches", &statement, Dialect::Snowflake, false);
        assert!(output.contains("season IN (?,?)"));
        assert!(output.contains("-- params: 2019, 2020"));
        assert!(output.contains("season IN ('2019','2020')"));

        let unfiltered = QueryBuilder::default()
            .build("total-matches", &FilterState::all_seasons())
            .unwrap();
        let output = format_statement("total-matches", &unfiltered, Dialect::Sqlite, false);
        assert!(!output.contains("params"));
    }
}

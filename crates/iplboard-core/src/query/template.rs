//! Query templates over the warehouse fact and staging tables
//!
//! Each template is a fixed SQL shape with `{season_filter}` slots. The
//! builder replaces every slot with a season restriction (or nothing, when
//! all seasons are selected) according to the template's [`SeasonScope`].

use crate::error::CoreError;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;

/// Placeholder replaced by the season restriction
pub const SEASON_SLOT: &str = "{season_filter}";

/// How a template's season slot restricts rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonScope {
    /// No slot: the query ignores the filter
    Unfiltered,
    /// The queried table has its own `season` column
    Direct,
    /// The queried table is keyed by `match_id`; seasons come from `stg_matches`
    ByMatch,
}

/// A named SQL shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTemplate {
    pub id: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub scope: SeasonScope,
    pub sql: Cow<'static, str>,
}

impl QueryTemplate {
    const fn builtin(
        id: &'static str,
        description: &'static str,
        scope: SeasonScope,
        sql: &'static str,
    ) -> Self {
        Self {
            id: Cow::Borrowed(id),
            description: Cow::Borrowed(description),
            scope,
            sql: Cow::Borrowed(sql),
        }
    }

    /// Define a template at startup, checking its slots against its scope
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        scope: SeasonScope,
        sql: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let template = Self {
            id: Cow::Owned(id.into()),
            description: Cow::Owned(description.into()),
            scope,
            sql: Cow::Owned(sql.into()),
        };
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let valid_id = !self.id.is_empty()
            && self
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_id {
            return Err(CoreError::InvalidConfig {
                message: format!("template id '{}' must be kebab-case", self.id),
            });
        }

        let slots = self.slot_count();
        match self.scope {
            SeasonScope::Unfiltered if slots > 0 => Err(CoreError::InvalidConfig {
                message: format!("template '{}' is unfiltered but has a season slot", self.id),
            }),
            SeasonScope::Direct | SeasonScope::ByMatch if slots == 0 => {
                Err(CoreError::InvalidConfig {
                    message: format!("template '{}' has no {} slot", self.id, SEASON_SLOT),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.sql.matches(SEASON_SLOT).count()
    }
}

pub const SEASONS: QueryTemplate = QueryTemplate::builtin(
    "seasons",
    "Distinct seasons available in the warehouse",
    SeasonScope::Unfiltered,
    "SELECT DISTINCT season FROM stg_matches ORDER BY season",
);

pub const TOTAL_MATCHES: QueryTemplate = QueryTemplate::builtin(
    "total-matches",
    "Number of matches played",
    SeasonScope::Direct,
    "SELECT COUNT(DISTINCT match_id) AS total FROM stg_matches WHERE 1=1 {season_filter}",
);

pub const TOTAL_DELIVERIES: QueryTemplate = QueryTemplate::builtin(
    "total-deliveries",
    "Number of deliveries bowled",
    SeasonScope::ByMatch,
    "SELECT COUNT(*) AS total FROM stg_deliveries WHERE 1=1 {season_filter}",
);

pub const TOTAL_PLAYERS: QueryTemplate = QueryTemplate::builtin(
    "total-players",
    "Number of distinct batsmen",
    SeasonScope::ByMatch,
    "SELECT COUNT(DISTINCT batsman) AS total FROM stg_deliveries WHERE 1=1 {season_filter}",
);

pub const TOTAL_TEAMS: QueryTemplate = QueryTemplate::builtin(
    "total-teams",
    "Number of distinct teams",
    SeasonScope::Direct,
    "SELECT COUNT(DISTINCT team_name) AS total FROM fct_team_performance WHERE 1=1 {season_filter}",
);

pub const TOTAL_SIXES: QueryTemplate = QueryTemplate::builtin(
    "total-sixes",
    "Number of sixes hit",
    SeasonScope::ByMatch,
    "SELECT SUM(sixes) AS total FROM fct_batting_performance WHERE 1=1 {season_filter}",
);

pub const TOP_RUN_SCORERS: QueryTemplate = QueryTemplate::builtin(
    "top-run-scorers",
    "Top 10 run scorers with at least 200 balls faced",
    SeasonScope::ByMatch,
    "SELECT batsman AS player, \
            SUM(runs_scored) AS runs, \
            COUNT(DISTINCT match_id) AS matches, \
            ROUND(AVG(strike_rate), 2) AS strike_rate, \
            SUM(fours) AS fours, \
            SUM(sixes) AS sixes \
     FROM fct_batting_performance \
     WHERE 1=1 {season_filter} \
     GROUP BY batsman \
     HAVING SUM(balls_faced) >= 200 \
     ORDER BY runs DESC \
     LIMIT 10",
);

pub const TOP_WICKET_TAKERS: QueryTemplate = QueryTemplate::builtin(
    "top-wicket-takers",
    "Top 10 wicket takers with at least 300 balls bowled",
    SeasonScope::ByMatch,
    "SELECT bowler AS player, \
            SUM(wickets_taken) AS wickets, \
            COUNT(DISTINCT match_id) AS matches, \
            ROUND(AVG(economy_rate), 2) AS economy, \
            SUM(dot_balls) AS dot_balls \
     FROM fct_bowling_performance \
     WHERE wickets_taken > 0 {season_filter} \
     GROUP BY bowler \
     HAVING SUM(balls_bowled) >= 300 \
     ORDER BY wickets DESC \
     LIMIT 10",
);

pub const PHASE_SCORING: QueryTemplate = QueryTemplate::builtin(
    "phase-scoring",
    "Runs and wickets per innings phase",
    SeasonScope::ByMatch,
    "SELECT phase, \
            SUM(total_runs) AS total_runs, \
            SUM(CASE WHEN is_wicket = 1 THEN 1 ELSE 0 END) AS wickets \
     FROM stg_deliveries \
     WHERE 1=1 {season_filter} \
     GROUP BY phase \
     ORDER BY CASE WHEN phase = 'Powerplay' THEN 1 WHEN phase = 'Middle' THEN 2 ELSE 3 END",
);

pub const MATCH_OUTCOMES: QueryTemplate = QueryTemplate::builtin(
    "match-outcomes",
    "Match results batting first versus chasing",
    SeasonScope::Direct,
    "SELECT CASE WHEN batted_first = 1 THEN 'Batting First' ELSE 'Chasing' END AS scenario, \
            CASE WHEN won_match = 1 THEN 'Won' ELSE 'Lost' END AS result, \
            COUNT(*) AS matches \
     FROM fct_team_performance \
     WHERE 1=1 {season_filter} \
     GROUP BY scenario, result \
     ORDER BY scenario, result DESC",
);

pub const TEAM_STANDINGS: QueryTemplate = QueryTemplate::builtin(
    "team-standings",
    "Teams with at least 5 matches ranked by win percentage",
    SeasonScope::Direct,
    "SELECT team_name, \
            COUNT(*) AS matches, \
            SUM(won_match) AS wins, \
            ROUND(SUM(won_match) * 100.0 / COUNT(*), 1) AS win_pct, \
            ROUND(AVG(runs_scored), 0) AS avg_runs \
     FROM fct_team_performance \
     WHERE 1=1 {season_filter} \
     GROUP BY team_name \
     HAVING COUNT(*) >= 5 \
     ORDER BY win_pct DESC",
);

/// Every template the dashboard ships with, in page order
pub const BUILTIN_TEMPLATES: &[QueryTemplate] = &[
    SEASONS,
    TOTAL_MATCHES,
    TOTAL_DELIVERIES,
    TOTAL_PLAYERS,
    TOTAL_TEAMS,
    TOTAL_SIXES,
    TOP_RUN_SCORERS,
    TOP_WICKET_TAKERS,
    PHASE_SCORING,
    MATCH_OUTCOMES,
    TEAM_STANDINGS,
];

/// Immutable lookup of templates by id
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    order: Vec<String>,
    templates: HashMap<String, QueryTemplate>,
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self {
            order: Vec::with_capacity(BUILTIN_TEMPLATES.len()),
            templates: HashMap::with_capacity(BUILTIN_TEMPLATES.len()),
        };
        for template in BUILTIN_TEMPLATES {
            catalog.insert(template.clone());
        }
        catalog
    }

    /// Add a template at startup; ids must be unique
    pub fn with_template(mut self, template: QueryTemplate) -> Result<Self, CoreError> {
        template.validate()?;
        if self.templates.contains_key(template.id.as_ref()) {
            return Err(CoreError::InvalidConfig {
                message: format!("duplicate template id '{}'", template.id),
            });
        }
        self.insert(template);
        Ok(self)
    }

    fn insert(&mut self, template: QueryTemplate) {
        self.order.push(template.id.to_string());
        self.templates.insert(template.id.to_string(), template);
    }

    /// Look up a template, failing with `InvalidTemplate`
    pub fn get(&self, id: &str) -> Result<&QueryTemplate, CoreError> {
        self.templates
            .get(id)
            .ok_or_else(|| CoreError::InvalidTemplate {
                template: id.to_string(),
            })
    }

    /// Templates in registration order
    pub fn iter(&self) -> impl Iterator<Item = &QueryTemplate> + '_ {
        self.order.iter().filter_map(|id| self.templates.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

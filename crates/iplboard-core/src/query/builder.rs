//! Statement builder: filter state + template → parameterized SQL

use super::dialect::Dialect;
use super::template::{QueryTemplate, SeasonScope, TemplateCatalog, SEASON_SLOT};
use crate::error::CoreError;
use crate::filter::FilterState;
use serde::Serialize;
use std::fmt;

/// SQL text with `?` placeholders and the values bound to them, in order
///
/// Equality covers both the text and the bindings, so a statement is a
/// complete cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Statement {
    sql: String,
    params: Vec<String>,
}

impl Statement {
    /// A statement without bindings
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Render with every placeholder replaced by a quoted literal
    ///
    /// For display only. Placeholders inside string literals are left alone.
    pub fn to_inline_sql(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        let mut in_literal = false;

        for ch in self.sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => match params.next() {
                    Some(value) => out.push_str(&dialect.quote_literal(value)),
                    None => out.push(ch),
                },
                _ => out.push(ch),
            }
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.sql)
        } else {
            write!(f, "{} -- params: [{}]", self.sql, self.params.join(", "))
        }
    }
}

/// Composes statements from the template catalog
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    catalog: TemplateCatalog,
}

impl QueryBuilder {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Build the statement for `template_id` under `filter`
    pub fn build(&self, template_id: &str, filter: &FilterState) -> Result<Statement, CoreError> {
        let template = self.catalog.get(template_id)?;
        Ok(Self::build_template(template, filter))
    }

    /// Build a statement from a template already in hand
    ///
    /// Season values are validated when the filter is built, so this cannot fail.
    pub fn build_template(template: &QueryTemplate, filter: &FilterState) -> Statement {
        let clause = season_clause(template.scope, filter);
        let occurrences = template.slot_count();

        let sql = match &clause {
            Some(clause) => template.sql.replace(SEASON_SLOT, clause),
            None => template.sql.replace(&format!(" {}", SEASON_SLOT), "").replace(SEASON_SLOT, ""),
        };

        let params = if clause.is_some() {
            (0..occurrences)
                .flat_map(|_| filter.seasons().map(|s| s.as_str().to_string()))
                .collect()
        } else {
            Vec::new()
        };

        Statement { sql, params }
    }
}

/// The restriction that replaces a slot, or None when nothing is filtered
fn season_clause(scope: SeasonScope, filter: &FilterState) -> Option<String> {
    if filter.is_unrestricted() {
        return None;
    }
    let placeholders = vec!["?"; filter.len()].join(",");
    match scope {
        SeasonScope::Unfiltered => None,
        SeasonScope::Direct => Some(format!("AND season IN ({})", placeholders)),
        SeasonScope::ByMatch => Some(format!(
            "AND match_id IN (SELECT match_id FROM stg_matches WHERE season IN ({}))",
            placeholders
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::template::QueryTemplate;

    fn filter(labels: &[&str]) -> FilterState {
        FilterState::parse(labels).unwrap()
    }

    #[test]
    fn test_unrestricted_has_no_season_clause() {
        let builder = QueryBuilder::default();
        for template in builder.catalog().iter() {
            let stmt = builder.build(&template.id, &FilterState::all_seasons()).unwrap();
            assert!(!stmt.sql().contains("season IN"), "{}", stmt.sql());
            assert!(!stmt.sql().contains(SEASON_SLOT));
            assert!(stmt.params().is_empty());
        }
    }

    #[test]
    fn test_total_matches_example() {
        let stmt = QueryBuilder::default()
            .build("total-matches", &filter(&["2020", "2019"]))
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT COUNT(DISTINCT match_id) AS total FROM stg_matches WHERE 1=1 AND season IN (?,?)"
        );
        assert_eq!(stmt.params(), ["2019", "2020"]);
        assert!(stmt
            .to_inline_sql(Dialect::Snowflake)
            .ends_with("season IN ('2019','2020')"));
    }

    #[test]
    fn test_by_match_scope_uses_subquery() {
        let stmt = QueryBuilder::default()
            .build("top-run-scorers", &filter(&["2019"]))
            .unwrap();
        assert!(stmt.sql().contains(
            "AND match_id IN (SELECT match_id FROM stg_matches WHERE season IN (?))"
        ));
        assert_eq!(stmt.params(), ["2019"]);
    }

    #[test]
    fn test_unfiltered_template_ignores_seasons() {
        let stmt = QueryBuilder::default()
            .build("seasons", &filter(&["2019"]))
            .unwrap();
        assert_eq!(stmt.sql(), "SELECT DISTINCT season FROM stg_matches ORDER BY season");
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_unknown_template() {
        let err = QueryBuilder::default()
            .build("total-umpires", &FilterState::all_seasons())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_params_repeat_per_slot() {
        let template = QueryTemplate::new(
            "home-vs-away",
            "",
            SeasonScope::Direct,
            "SELECT a.x FROM t a WHERE 1=1 {season_filter} UNION ALL SELECT b.x FROM t b WHERE 1=1 {season_filter}",
        )
        .unwrap();
        let stmt = QueryBuilder::build_template(&template, &filter(&["2019", "2020"]));
        assert_eq!(stmt.sql().matches("season IN (?,?)").count(), 2);
        assert_eq!(stmt.params(), ["2019", "2020", "2019", "2020"]);
    }

    #[test]
    fn test_inline_skips_placeholders_in_literals() {
        let stmt = Statement {
            sql: "SELECT '?' AS q FROM t WHERE season IN (?)".to_string(),
            params: vec!["2019".to_string()],
        };
        assert_eq!(
            stmt.to_inline_sql(Dialect::Sqlite),
            "SELECT '?' AS q FROM t WHERE season IN ('2019')"
        );
    }

    #[test]
    fn test_statement_equality_includes_params() {
        let builder = QueryBuilder::default();
        let a = builder.build("total-teams", &filter(&["2019"])).unwrap();
        let b = builder.build("total-teams", &filter(&["2020"])).unwrap();
        assert_eq!(a.sql(), b.sql());
        assert_ne!(a, b);
    }
}

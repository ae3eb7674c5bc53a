//! Result shaping: scalars, leaderboards and grouped series
//!
//! Pure functions over already-fetched tables. Leaderboard queries sort in
//! SQL, so nothing here ever reorders rows.

use crate::error::CoreError;
use crate::models::{ResultTable, Value};
use serde::Serialize;

/// Value of `column` in the first row
///
/// An empty table fails with `EmptyResult` before the column is checked.
pub fn extract_scalar<'a>(table: &'a ResultTable, column: &str) -> Result<&'a Value, CoreError> {
    let Some(first) = table.row(0) else {
        return Err(CoreError::EmptyResult {
            column: column.trim().to_uppercase(),
        });
    };
    first.get(column)
}

/// Scalar read as an integer count (SUM over no rows yields NULL → 0)
pub fn extract_count(table: &ResultTable, column: &str) -> Result<i64, CoreError> {
    let first = table.row(0).ok_or_else(|| CoreError::EmptyResult {
        column: column.trim().to_uppercase(),
    })?;
    first.int(column)
}

/// First `n` rows, order preserved; fewer rows than `n` returns them all
pub fn top_n(table: &ResultTable, n: usize) -> ResultTable {
    table.head(n)
}

/// One labelled point of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Group cell as fetched; `label` is its display form
    #[serde(skip)]
    pub group: Value,
    pub label: String,
    pub value: Value,
}

/// Distinct group label → value, in first-appearance order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupedSeries {
    points: Vec<SeriesPoint>,
}

impl GroupedSeries {
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.points
            .iter()
            .find(|p| p.label == label)
            .map(|p| &p.value)
    }

    /// Lookup by the group cell itself, so `1` and `"1"` stay distinct
    pub fn get_group(&self, group: &Value) -> Option<&Value> {
        self.points
            .iter()
            .find(|p| &p.group == group)
            .map(|p| &p.value)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.points.iter().map(|p| p.label.as_str())
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Map each distinct `group_column` value to its `value_column` value
///
/// Groups are distinct cell values (an integer `1` and the text `"1"` are
/// separate groups) and keep the order in which they first appear. When a
/// group repeats, the first row wins.
pub fn grouped_series(
    table: &ResultTable,
    group_column: &str,
    value_column: &str,
) -> Result<GroupedSeries, CoreError> {
    let group_idx = table.require_column(group_column)?;
    let value_idx = table.require_column(value_column)?;

    let mut series = GroupedSeries::default();
    for row in table.rows() {
        let values = row.values();
        let group = &values[group_idx];
        if series.get_group(group).is_none() {
            series.points.push(SeriesPoint {
                group: group.clone(),
                label: group.to_label(),
                value: values[value_idx].clone(),
            });
        }
    }
    Ok(series)
}

/// Two-level grouping: row label → (series label → value)
///
/// Used for stacked charts such as scenario × result. Both label sets keep
/// first-appearance order; a missing combination reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    pub rows: Vec<String>,
    pub series: Vec<String>,
    cells: Vec<Vec<Option<Value>>>,
}

impl PivotTable {
    pub fn get(&self, row: &str, series: &str) -> Option<&Value> {
        let r = self.rows.iter().position(|l| l == row)?;
        let s = self.series.iter().position(|l| l == series)?;
        self.cells[r][s].as_ref()
    }
}

pub fn pivot(
    table: &ResultTable,
    row_column: &str,
    series_column: &str,
    value_column: &str,
) -> Result<PivotTable, CoreError> {
    let row_idx = table.require_column(row_column)?;
    let series_idx = table.require_column(series_column)?;
    let value_idx = table.require_column(value_column)?;

    let mut pivot = PivotTable::default();
    for row in table.rows() {
        let values = row.values();
        let row_label = values[row_idx].to_label();
        let series_label = values[series_idx].to_label();

        let r = match pivot.rows.iter().position(|l| *l == row_label) {
            Some(r) => r,
            None => {
                pivot.rows.push(row_label);
                pivot.cells.push(vec![None; pivot.series.len()]);
                pivot.rows.len() - 1
            }
        };
        let s = match pivot.series.iter().position(|l| *l == series_label) {
            Some(s) => s,
            None => {
                pivot.series.push(series_label);
                for cells in &mut pivot.cells {
                    cells.push(None);
                }
                pivot.series.len() - 1
            }
        };

        if pivot.cells[r][s].is_none() {
            pivot.cells[r][s] = Some(values[value_idx].clone());
        }
    }
    Ok(pivot)
}

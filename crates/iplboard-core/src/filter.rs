//! Season filter state
//!
//! An empty selection means "all seasons"; a non-empty one restricts every
//! season-aware query to exactly those seasons.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// IPL season identifier (a year label such as "2019")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Season(String);

impl Season {
    /// Validate and wrap a season label (trimmed, must be non-empty)
    pub fn new(label: impl AsRef<str>) -> Result<Self, CoreError> {
        let trimmed = label.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CoreError::invalid_filter("season value is empty"));
        }
        Ok(Season(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Season {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Season::new(s)
    }
}

impl TryFrom<String> for Season {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Season::new(value)
    }
}

impl From<Season> for String {
    fn from(season: Season) -> Self {
        season.0
    }
}

/// Currently selected seasons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    selected_seasons: BTreeSet<Season>,
}

impl FilterState {
    /// No restriction: every season is included
    pub fn all_seasons() -> Self {
        Self::default()
    }

    pub fn from_seasons(seasons: impl IntoIterator<Item = Season>) -> Self {
        Self {
            selected_seasons: seasons.into_iter().collect(),
        }
    }

    /// Build from raw labels, failing with `InvalidFilter` on an empty label
    pub fn parse<I, S>(labels: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seasons = labels
            .into_iter()
            .map(Season::new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            selected_seasons: seasons,
        })
    }

    /// Parse a comma-separated list ("2019,2020"); an empty string selects all seasons
    pub fn parse_list(list: &str) -> Result<Self, CoreError> {
        if list.trim().is_empty() {
            return Ok(Self::all_seasons());
        }
        Self::parse(list.split(','))
    }

    /// Default selection at dashboard load: the most recent `window` seasons
    ///
    /// `available` is expected in ascending order, as the seasons query
    /// returns it. Fewer than `window` seasons selects all of them.
    pub fn most_recent(available: &[Season], window: usize) -> Self {
        let start = available.len().saturating_sub(window);
        Self::from_seasons(available[start..].iter().cloned())
    }

    pub fn select(&mut self, season: Season) -> bool {
        self.selected_seasons.insert(season)
    }

    pub fn deselect(&mut self, season: &Season) -> bool {
        self.selected_seasons.remove(season)
    }

    pub fn clear(&mut self) {
        self.selected_seasons.clear();
    }

    pub fn is_unrestricted(&self) -> bool {
        self.selected_seasons.is_empty()
    }

    /// Selected seasons in ascending order
    pub fn seasons(&self) -> impl Iterator<Item = &Season> + '_ {
        self.selected_seasons.iter()
    }

    pub fn len(&self) -> usize {
        self.selected_seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_seasons.is_empty()
    }
}

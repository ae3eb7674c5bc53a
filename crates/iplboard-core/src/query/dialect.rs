//! SQL dialect string-literal rules
//!
//! Only used to render statements inline for logs and the CLI. Queries sent
//! to a warehouse always carry their values as bound parameters.

use serde::Serialize;

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Snowflake,
    Sqlite,
}

impl Dialect {
    /// Quote a value as a single-quoted string literal
    ///
    /// Both dialects double embedded single quotes. Snowflake string literals
    /// also honor backslash escape sequences, so backslashes are doubled there.
    pub fn quote_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' if *self == Dialect::Snowflake => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
        out
    }
}

// src/record/license.rs

//! License expressions as found in package manifests

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Separators between licenses of a composite expression: `/`, `,` and the
/// words AND / OR in any case
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:and|or)\s+|[/,]").unwrap());

/// A package license, either as written in the manifest or split into its
/// constituent identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum License {
    Expression(String),
    List(Vec<String>),
}

impl Default for License {
    fn default() -> Self {
        Self::Expression(String::new())
    }
}

impl License {
    /// The individual license identifiers
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Expression(expr) => split_license_expression(expr),
            Self::List(list) => list.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Expression(expr) => expr.trim().is_empty(),
            Self::List(list) => list.is_empty(),
        }
    }
}

impl From<&str> for License {
    fn from(expr: &str) -> Self {
        Self::Expression(expr.to_string())
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => write!(f, "{expr}"),
            Self::List(list) => write!(f, "{}", list.join(", ")),
        }
    }
}

/// Split a composite license expression into license identifiers
///
/// Parentheses and `=` are dropped first, then the expression is split on
/// every separator. `"(MIT OR Apache-2.0)"`, `"MIT/Apache-2.0"` and
/// `"MIT, Apache-2.0"` all give `["MIT", "Apache-2.0"]`.
pub fn split_license_expression(expr: &str) -> Vec<String> {
    let cleaned: String = expr
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '='))
        .collect();

    SEPARATOR
        .split(&cleaned)
        .map(str::trim)
        .filter(|lic| !lic.is_empty())
        .map(String::from)
        .collect()
}

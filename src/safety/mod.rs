//! Text safety filter.
//!
//! Static, textual classification of natural-language requests and SQL
//! statements. Anything that looks like a mutating intent is rejected before
//! it reaches a generation backend or the database. The filter is deliberately
//! conservative: a banned word inside a string literal is still a rejection.

mod rules;

pub use rules::{check_request, check_sql};

use std::fmt;

use crate::error::SqlGuardError;

/// Reason a piece of text was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    /// A deny-listed word appeared (lower-cased form stored).
    BlockedKeyword(String),
    /// SQL does not start with SELECT.
    NotSelect,
    /// More than one statement terminator.
    MultipleStatements,
    /// Comment that could hide an injected suffix.
    CommentInjection,
    /// `WITH RECURSIVE` without a `LIMIT`.
    UnboundedRecursion,
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockedKeyword(word) => write!(f, "contains blocked keyword '{word}'"),
            Self::NotSelect => write!(f, "only SELECT queries are allowed"),
            Self::MultipleStatements => write!(f, "multiple SQL statements are not allowed"),
            Self::CommentInjection => write!(f, "SQL comments are not allowed"),
            Self::UnboundedRecursion => {
                write!(f, "recursive CTEs must include a LIMIT clause")
            }
        }
    }
}

impl From<SafetyViolation> for SqlGuardError {
    fn from(violation: SafetyViolation) -> Self {
        SqlGuardError::unsafe_input(violation.to_string())
    }
}

/// Returns true if a natural-language request carries no mutating intent.
pub fn is_text_safe(text: &str) -> bool {
    check_request(text).is_ok()
}

/// Returns true if `sql` is a single read-only SELECT statement.
pub fn is_sql_safe(sql: &str) -> bool {
    check_sql(sql).is_ok()
}

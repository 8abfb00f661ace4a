//! Deny-list and structural rules behind the safety filter.

use regex::Regex;
use std::sync::LazyLock;

use super::SafetyViolation;

/// Words signalling a mutating or privileged intent, matched as whole words.
const BLOCKED_WORDS: &[&str] = &[
    "delete", "drop", "truncate", "update", "insert", "modify", "destroy", "wipe", "clear",
    "erase", "alter", "create", "merge", "exec", "grant", "revoke", "call",
];

static BLOCKED_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", BLOCKED_WORDS.join("|")))
        .expect("blocked keyword pattern is valid")
});

static SELECT_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\b").expect("select pattern is valid"));

/// Any comment opener on any line. Literals containing `--` are rejected too.
static COMMENT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--|/\*").expect("comment pattern is valid"));

static WITH_RECURSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bWITH\s+RECURSIVE\b").expect("recursive pattern is valid")
});

static LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("limit pattern is valid"));

/// Checks a natural-language request against the keyword deny-list.
pub fn check_request(text: &str) -> Result<(), SafetyViolation> {
    match BLOCKED_KEYWORDS.find(text) {
        Some(m) => Err(SafetyViolation::BlockedKeyword(m.as_str().to_lowercase())),
        None => Ok(()),
    }
}

/// Checks SQL text: SELECT-only, no blocked keywords, no comments, one
/// statement at most, bounded recursion.
pub fn check_sql(sql: &str) -> Result<(), SafetyViolation> {
    if !SELECT_ONLY.is_match(sql) {
        return Err(SafetyViolation::NotSelect);
    }

    check_request(sql)?;

    if COMMENT_MARKER.is_match(sql) {
        return Err(SafetyViolation::CommentInjection);
    }

    if sql.matches(';').count() > 1 {
        return Err(SafetyViolation::MultipleStatements);
    }

    if WITH_RECURSIVE.is_match(sql) && !LIMIT.is_match(sql) {
        return Err(SafetyViolation::UnboundedRecursion);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_violation(sql: &str, expected: SafetyViolation) {
        assert_eq!(
            check_sql(sql),
            Err(expected.clone()),
            "SQL: '{}' - expected {:?}",
            sql,
            expected
        );
    }

    #[test]
    fn test_plain_select_passes() {
        assert_eq!(check_sql("SELECT id, name FROM users;"), Ok(()));
        assert_eq!(check_sql("   select count(*) from orders"), Ok(()));
        assert_eq!(
            check_sql("SELECT u.name FROM users u JOIN orders o ON u.id = o.user_id"),
            Ok(())
        );
    }

    #[test]
    fn test_every_blocked_word_is_rejected() {
        for word in BLOCKED_WORDS {
            let request = format!("please {word} the table");
            assert_eq!(
                check_request(&request),
                Err(SafetyViolation::BlockedKeyword(word.to_string())),
                "request: {request}"
            );
        }
    }

    #[test]
    fn test_blocked_words_case_insensitive() {
        assert_eq!(
            check_request("Please DROP everything"),
            Err(SafetyViolation::BlockedKeyword("drop".to_string()))
        );
    }

    #[test]
    fn test_word_boundary_prevents_false_positives() {
        assert_eq!(check_request("list users by updated_at"), Ok(()));
        assert_eq!(check_request("executive summary of callers"), Ok(()));
        assert_eq!(check_request("recreated records"), Ok(()));
    }

    #[test]
    fn test_string_literal_keyword_is_rejected() {
        assert_violation(
            "SELECT * FROM logs WHERE action = 'delete'",
            SafetyViolation::BlockedKeyword("delete".to_string()),
        );
    }

    #[test]
    fn test_non_select_rejected() {
        assert_violation("DELETE FROM users", SafetyViolation::NotSelect);
        assert_violation("UPDATE users SET a = 1", SafetyViolation::NotSelect);
        assert_violation("EXPLAIN SELECT 1", SafetyViolation::NotSelect);
        assert_violation("", SafetyViolation::NotSelect);
    }

    #[test]
    fn test_stacked_statement_rejected() {
        assert_violation(
            "SELECT 1; DROP TABLE users;",
            SafetyViolation::BlockedKeyword("drop".to_string()),
        );
        assert_violation("SELECT 1; SELECT 2;", SafetyViolation::MultipleStatements);
    }

    #[test]
    fn test_single_terminator_allowed() {
        assert_eq!(check_sql("SELECT 1;"), Ok(()));
    }

    #[test]
    fn test_comment_injection_rejected() {
        assert_violation(
            "SELECT * FROM users WHERE id = 1; --",
            SafetyViolation::CommentInjection,
        );
        assert_violation(
            "SELECT * FROM users WHERE name = 'x' -- and active",
            SafetyViolation::CommentInjection,
        );
        assert_violation(
            "SELECT * FROM users /* hidden */",
            SafetyViolation::CommentInjection,
        );
    }

    #[test]
    fn test_comment_before_trailing_newline_rejected() {
        assert_violation(
            "SELECT * FROM users WHERE name = 'x' -- and tenant_id = 5\n",
            SafetyViolation::CommentInjection,
        );
        assert_violation(
            "SELECT * FROM users WHERE id = 1; --\r\n",
            SafetyViolation::CommentInjection,
        );
    }

    #[test]
    fn test_comment_on_inner_line_rejected() {
        assert_violation(
            "SELECT * FROM users -- WHERE tenant_id = 5\nLIMIT 10",
            SafetyViolation::CommentInjection,
        );
        assert_violation(
            "SELECT id\n/* tenant filter removed */\nFROM users",
            SafetyViolation::CommentInjection,
        );
    }

    #[test]
    fn test_multiline_select_without_comments_passes() {
        assert_eq!(
            check_sql("SELECT id,\n       name\nFROM users\nWHERE id > 1\n"),
            Ok(())
        );
    }

    #[test]
    fn test_recursive_cte_requires_limit() {
        let unbounded = "SELECT * FROM (WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t) SELECT n FROM t) s";
        assert_violation(unbounded, SafetyViolation::UnboundedRecursion);

        let bounded = "SELECT * FROM (WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t) SELECT n FROM t LIMIT 10) s";
        assert_eq!(check_sql(bounded), Ok(()));
    }
}

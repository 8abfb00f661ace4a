//! Prompt construction for rewrite requests.
//!
//! Every request is one fixed system prompt plus one user turn naming the
//! instruction and the SQL. Backends map the pair onto their own wire format.

/// System prompt for every rewrite request.
const SYSTEM_PROMPT: &str = r#"You are an SQL rewriter for a PostgreSQL database.

Your only task is to output a rewritten SQL query.
Do not output explanations, markdown, comments, or any other text.
Do not repeat the instructions.
Never produce statements that modify data or schema."#;

/// User prompt template. `{instruction}` and `{sql}` are substituted.
const REWRITE_TEMPLATE: &str = r#"{instruction}

Rewrite this SQL:
{sql}

Output only the rewritten SQL. No explanation."#;

/// A rendered rewrite request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePrompt {
    pub system: String,
    pub user: String,
}

impl RewritePrompt {
    /// Creates a prompt from raw parts.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Renders the request for rewriting `sql` under `instruction`.
    pub fn for_rewrite(sql: &str, instruction: &str) -> Self {
        Self::new(SYSTEM_PROMPT, build_rewrite_prompt(sql, instruction))
    }
}

/// Builds the user turn for rewriting `sql` under `instruction`.
pub fn build_rewrite_prompt(sql: &str, instruction: &str) -> String {
    // Single pass so braces inside the SQL are left alone.
    REWRITE_TEMPLATE
        .replace("{sql}", "\u{0}")
        .replace("{instruction}", instruction.trim())
        .replace('\u{0}', sql.trim())
}

//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns. Without a
//! matching pattern it echoes the SQL from a rewrite prompt back in a
//! ```sql fence, which makes it an identity rewriter.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, SqlGuardError};
use crate::llm::{LlmClient, RewritePrompt};

const SQL_MARKER: &str = "Rewrite this SQL:\n";
const SQL_END_MARKER: &str = "\n\nOutput only";

/// Mock LLM client that returns canned responses based on input patterns.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// When set, every call fails with this message.
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern` (case-insensitive), the mock returns
    /// `response`. Mappings are checked in insertion order.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Makes every call fail with an LLM error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        match extract_prompt_sql(input) {
            Some(sql) => format!("```sql\n{}\n```", sql),
            None => "ERROR: no SQL found in prompt".to_string(),
        }
    }
}

/// Pulls the SQL out of a prompt built by [`crate::llm::build_rewrite_prompt`].
fn extract_prompt_sql(prompt: &str) -> Option<&str> {
    let start = prompt.find(SQL_MARKER)? + SQL_MARKER.len();
    let rest = &prompt[start..];
    let end = rest.find(SQL_END_MARKER).unwrap_or(rest.len());
    let sql = rest[..end].trim();
    (!sql.is_empty()).then_some(sql)
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(SqlGuardError::llm(message.clone()));
        }

        Ok(self.mock_response(&prompt.user))
    }
}

//! Rewrite instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural-language constraint handed to a generator alongside the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(String);

impl Instruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instruction {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

const DEFAULT_INSTRUCTIONS: &[&str] = &[
    "Rewrite the SQL to improve performance. Preserve all column aliases.",
    "Rewrite the SQL for readability. Do not change column names.",
    "Rewrite the SQL minimizing subqueries. Preserve results.",
    "Optimize joins and filtering. Output only the rewritten SQL.",
    "Standardize formatting and spacing. Do NOT modify logic.",
    "Rewrite the SQL using index-friendly operations. Keep output identical.",
    "Rewrite for ANSI SQL compliance. Preserve aliases.",
    "Rewrite the SQL with strict alias preservation and no aggregate simplification.",
];

const STRICT_INSTRUCTION: &str = "Rewrite the SQL ONLY for formatting and performance while keeping the query EXACTLY the same. \
STRICT RULES:
- Do NOT change the logic of the query.
- Do NOT add or remove columns.
- Do NOT rename or modify column aliases.
- Do NOT reorder SELECT columns.
- Do NOT remove subqueries or convert them into joins.
- Do NOT add window functions, GROUP BY, HAVING, ORDER BY, DISTINCT, or aggregates that do not exist.
- Do NOT add filters, remove filters, or change filter logic.
- Do NOT invent or use columns that do not exist in the original SQL.
- Maintain all WHERE, GROUP BY, HAVING, ORDER BY clauses exactly.
- Output ONLY the rewritten SQL. NO markdown, NO backticks, NO explanation.";

/// Ordered, immutable set of instructions tried for every query.
///
/// Order only matters for iteration and for breaking score ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionCatalog {
    instructions: Vec<Instruction>,
}

impl InstructionCatalog {
    /// Creates a catalog from explicit instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Catalog holding only the strict preserve-everything instruction.
    pub fn strict() -> Self {
        Self::new(vec![Instruction::new(STRICT_INSTRUCTION)])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn first(&self) -> Option<&Instruction> {
        self.instructions.first()
    }
}

impl Default for InstructionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS.iter().map(|s| Instruction::new(*s)).collect())
    }
}

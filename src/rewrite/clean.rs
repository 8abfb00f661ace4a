//! Normalization of generator output into executable SQL.
//!
//! Generators wrap their answer in markdown fences, sentence tags or a
//! leading label often enough that raw text rarely executes as-is.

/// Labels a generator may put in front of the statement. Longer labels first
/// so `Rewritten SQL:` is not reduced to `Rewritten`.
const LEADING_LABELS: &[&str] = &[
    "Rewritten SQL:",
    "Optimized Query:",
    "Efficient Query:",
    "SQL:",
];

const SENTENCE_TAGS: &[&str] = &["<s>", "</s>"];

/// Cleans generator output into a bare SQL statement.
///
/// Takes the first fenced code block when there is one, then drops stray
/// fences and backticks, `<s>`/`</s>` tags and leading labels, and collapses
/// doubled terminators. Cleaning already-clean text returns it unchanged.
pub fn clean_sql(text: &str) -> String {
    let mut sql = match extract_code_block(text) {
        Some(block) => block.to_string(),
        None => text.to_string(),
    };

    sql = sql.replace('`', "");
    sql = remove_all(sql, SENTENCE_TAGS);

    let mut sql = sql.trim();
    while let Some(rest) = strip_label(sql) {
        sql = rest.trim_start();
    }

    let mut sql = sql.to_string();
    while sql.contains(";;") {
        sql = sql.replace(";;", ";");
    }

    sql.trim().to_string()
}

/// Returns the body of the first fenced block. An unterminated fence runs to
/// the end of the text.
fn extract_code_block(text: &str) -> Option<&str> {
    let fence = text.find("```")?;
    let after_fence = &text[fence + 3..];
    // The rest of the fence line is a language tag.
    let body_start = after_fence.find('\n').map(|i| i + 1)?;
    let body = &after_fence[body_start..];

    match body.find("```") {
        Some(end) => Some(&body[..end]),
        None => Some(body),
    }
}

fn remove_all(mut text: String, needles: &[&str]) -> String {
    while let Some(needle) = needles.iter().find(|n| text.contains(**n)) {
        text = text.replace(needle, "");
    }
    text
}

fn strip_label(text: &str) -> Option<&str> {
    LEADING_LABELS.iter().find_map(|label| {
        let head = text.get(..label.len())?;
        head.eq_ignore_ascii_case(label)
            .then(|| &text[label.len()..])
    })
}

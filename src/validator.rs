use std::collections::HashSet;
use thiserror::Error;

use crate::scanner::{contains_multiple_statements, strip_literals};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Multiple SQL statements are not allowed")]
    MultipleStatements,

    #[error("Only SELECT, WITH, SHOW, DESCRIBE, and EXPLAIN queries are allowed")]
    NotReadOnly,

    #[error("Query contains potentially dangerous keyword '{0}'. Only read-only operations are allowed")]
    DangerousKeyword(String),
}

/// Leading keywords permitted to start an accepted statement.
const ALLOWED_PREFIXES: &[&str] = &["select", "show", "describe", "desc", "explain", "with"];

/// Keywords that force rejection wherever they appear outside literals,
/// regardless of the leading verb. Matched as whole words, so identifiers
/// like `created_at` do not trip on `create`. The flat anywhere-match is
/// intentionally conservative: an identifier that IS one of these words in
/// an unquoted position gets rejected too.
const DANGEROUS_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "replace", "merge",
    "call", "exec", "execute", "grant", "revoke", "set", "reset", "flush", "kill", "load",
    "import", "outfile", "dumpfile", "load_file",
    // transaction control
    "begin", "commit", "rollback", "savepoint", "start",
];

/// A statement that passed validation. `text` is the trimmed original-case
/// query (what gets executed); `normalized` is the lowercased,
/// whitespace-collapsed form used for classification only.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    text: String,
    normalized: String,
}

impl ValidatedQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Classifies raw SQL text as read-only or not. Pure: inspects the text,
/// never mutates it beyond trimming whitespace and one trailing semicolon.
pub fn validate(sql: &str) -> Result<ValidatedQuery, ValidationError> {
    let trimmed = sql.trim();
    let trimmed = match trimmed.strip_suffix(';') {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    };

    if contains_multiple_statements(trimmed) {
        return Err(ValidationError::MultipleStatements);
    }

    let normalized = normalize(trimmed);

    if !ALLOWED_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        return Err(ValidationError::NotReadOnly);
    }

    if let Some(keyword) = find_dangerous_keyword(&normalized) {
        return Err(ValidationError::DangerousKeyword(keyword.to_string()));
    }

    Ok(ValidatedQuery {
        text: trimmed.to_string(),
        normalized,
    })
}

/// Lowercases and collapses whitespace runs to single spaces.
fn normalize(sql: &str) -> String {
    sql.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_dangerous_keyword(normalized: &str) -> Option<&'static str> {
    // Literal contents are invisible to the keyword search.
    let stripped = strip_literals(normalized);

    let words: HashSet<&str> = stripped
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();

    DANGEROUS_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| words.contains(keyword))
}

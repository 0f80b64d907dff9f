use crate::rules::schema::{Operator, ValueKind};
use std::path::PathBuf;

/// Fatal errors: the rule set cannot be loaded or an input cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("rules file not found: {}", path.display())]
    RulesNotFound { path: PathBuf },

    #[error("failed to read rules file {}: {source}", path.display())]
    RulesRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules document {origin}: {reason}")]
    RulesParse { origin: String, reason: String },

    #[error("invalid rules document: {0}")]
    RulesInvalid(String),

    #[error("invalid resource snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recoverable errors from evaluating one rule against one observed value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("rule '{rule_id}' is disabled")]
    RuleDisabled { rule_id: String },

    #[error("metric '{metric}' has no threshold for environment '{environment}'")]
    NoThreshold { metric: String, environment: String },

    #[error("cannot convert {what} '{value}' to a {expected} value")]
    Coercion {
        what: &'static str,
        value: String,
        expected: ValueKind,
    },

    #[error("operator '{operator}' is not supported for {kind} values")]
    UnsupportedOperator { kind: ValueKind, operator: Operator },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

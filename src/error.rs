//! Error types for the rule evaluation core

use crate::backend::BackendKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rule evaluation operations
#[derive(Debug, Error)]
pub enum QuarryError {
    /// An `And` node has no positive pattern to establish candidate sites
    #[error("rule {rule_id}: 'and' requires at least one positive pattern")]
    EmptyAnd {
        /// Identifier of the offending rule
        rule_id: String,
    },

    /// A negated pattern appeared outside the direct children of an `And`
    #[error("rule {rule_id}: 'not' is only valid directly under 'and'")]
    MisplacedNot {
        /// Identifier of the offending rule
        rule_id: String,
    },

    /// A metavariable condition appeared outside the direct children of an `And`
    #[error("rule {rule_id}: metavariable conditions are only valid directly under 'and'")]
    MisplacedCond {
        /// Identifier of the offending rule
        rule_id: String,
    },

    /// A backend returned a match whose id does not parse back to a leaf id
    #[error("malformed leaf id '{id}' returned by the {backend} backend")]
    MalformedLeafId {
        /// The id string as received from the backend
        id: String,
        /// Which backend produced it
        backend: BackendKind,
    },

    /// A pattern was rejected by the guarded regex compiler
    #[error("unsafe regex pattern '{pattern}': {reason}")]
    UnsafeRegex {
        /// The rejected pattern source
        pattern: String,
        /// Why the pattern was rejected
        reason: String,
    },

    /// A matching backend failed
    #[error("{backend} backend failed: {message}")]
    Backend {
        /// Which backend failed
        backend: BackendKind,
        /// Backend-provided failure description
        message: String,
    },

    /// A metavariable condition expression could not be evaluated
    #[error("condition evaluation failed: {0}")]
    Condition(String),

    /// Reading a target file failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Regex compilation failed
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl QuarryError {
    /// True for the well-formedness violations of the formula language
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            QuarryError::EmptyAnd { .. }
                | QuarryError::MisplacedNot { .. }
                | QuarryError::MisplacedCond { .. }
        )
    }
}

/// Result type alias using [`QuarryError`]
pub type Result<T> = std::result::Result<T, QuarryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        let err = QuarryError::EmptyAnd {
            rule_id: "r1".to_string(),
        };
        assert!(err.is_structural());

        let err = QuarryError::Condition("boom".to_string());
        assert!(!err.is_structural());
    }

    #[test]
    fn test_error_display_carries_rule_id() {
        let err = QuarryError::MisplacedNot {
            rule_id: "rules.no-eval".to_string(),
        };
        assert!(err.to_string().contains("rules.no-eval"));
    }
}

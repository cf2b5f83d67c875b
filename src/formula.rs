//! The boolean formula language of rule bodies
//!
//! A rule body is a tree of leaf patterns combined with `and`, `or`, and
//! `not`, plus metavariable conditions. Leaves carry a backend kind; the
//! dispatcher partitions them and the evaluator combines their match sets.
//! `not` and conditions are only well-formed as direct children of an `and`;
//! the evaluator enforces that at evaluation time so malformed rules fail
//! with the rule id attached.

use crate::backend::BackendKind;
use crate::condition::CondExpr;
use crate::matches::LeafId;
use serde::{Deserialize, Serialize};

/// An atomic matchable pattern with a unique id inside its rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XPattern {
    /// Leaf identifier, unique within the enclosing formula
    pub id: LeafId,
    /// The pattern as written in the rule file
    pub text: String,
    /// Which backend interprets the pattern, with its source
    pub body: PatternBody,
}

/// Backend-specific pattern source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternBody {
    /// Structural pattern, executed against the parsed AST
    Ast(String),
    /// Indentation-sensitive textual pattern
    Doc(String),
    /// Regular expression over the raw file contents
    Regex(String),
}

impl PatternBody {
    /// The backend responsible for this pattern
    pub fn kind(&self) -> BackendKind {
        match self {
            PatternBody::Ast(_) => BackendKind::Ast,
            PatternBody::Doc(_) => BackendKind::Doc,
            PatternBody::Regex(_) => BackendKind::Regex,
        }
    }

    /// The pattern source handed to the backend
    pub fn pattern(&self) -> &str {
        match self {
            PatternBody::Ast(p) | PatternBody::Doc(p) | PatternBody::Regex(p) => p,
        }
    }
}

/// A predicate over the metavariable bindings of a candidate site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetavarCond {
    /// A boolean expression evaluated over the raw bindings
    Generic(CondExpr),
    /// A regex applied to the textual form of one binding
    Regex {
        /// The metavariable name, including the `$` sigil
        name: String,
        /// Regex source text
        regex: String,
    },
}

/// A rule body: leaves combined under boolean connectives and conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    /// A single leaf pattern
    Leaf(XPattern),
    /// All children must hold at a binding-compatible enclosing site
    And(Vec<Formula>),
    /// Any child may hold; results are concatenated
    Or(Vec<Formula>),
    /// Prunes sites enclosed by a match of the inner formula
    Not(Box<Formula>),
    /// Filters sites by a predicate over their bindings
    Cond(MetavarCond),
}

/// Collect the leaves of a formula in preorder
pub fn leaves(formula: &Formula) -> Vec<&XPattern> {
    match formula {
        Formula::Leaf(xpat) => vec![xpat],
        Formula::And(children) | Formula::Or(children) => {
            children.iter().flat_map(leaves).collect()
        }
        Formula::Not(inner) => leaves(inner),
        Formula::Cond(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: usize, body: PatternBody) -> Formula {
        Formula::Leaf(XPattern {
            id: LeafId(id),
            text: format!("pattern-{id}"),
            body,
        })
    }

    #[test]
    fn test_leaves_preorder_through_connectives() {
        let formula = Formula::And(vec![
            leaf(0, PatternBody::Ast("foo($X)".to_string())),
            Formula::Or(vec![
                leaf(1, PatternBody::Regex("bar".to_string())),
                leaf(2, PatternBody::Doc("baz: $V".to_string())),
            ]),
            Formula::Not(Box::new(leaf(3, PatternBody::Ast("qux()".to_string())))),
            Formula::Cond(MetavarCond::Regex {
                name: "$X".to_string(),
                regex: "^[0-9]+$".to_string(),
            }),
        ]);

        let ids: Vec<LeafId> = leaves(&formula).iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![LeafId(0), LeafId(1), LeafId(2), LeafId(3)]);
    }

    #[test]
    fn test_conditions_contribute_no_leaves() {
        let formula = Formula::Cond(MetavarCond::Regex {
            name: "$X".to_string(),
            regex: "a".to_string(),
        });
        assert!(leaves(&formula).is_empty());
    }

    #[test]
    fn test_body_kind_and_pattern() {
        let body = PatternBody::Regex("ba+r".to_string());
        assert_eq!(body.kind(), BackendKind::Regex);
        assert_eq!(body.pattern(), "ba+r");
    }
}

//! Rule representation and legacy body conversion
//!
//! A rule carries reporting metadata, the languages it applies to, and a
//! body. New-style bodies are a [`Formula`] directly; older rule files use a
//! flat `patterns` list that is lowered onto the formula language before
//! evaluation.

use crate::condition::CondExpr;
use crate::formula::{Formula, MetavarCond, XPattern};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Report severity attached to a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must-fix finding
    Error,
    /// Should-fix finding
    Warning,
    /// Informational finding
    Info,
}

/// Language tag of a rule or target
///
/// `none` and `generic` targets have no AST; structural patterns are
/// skipped for them rather than failing the rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// No language: match on text only
    None,
    /// Generic text target
    Generic,
    /// A concrete programming language, e.g. `python`
    Lang(String),
}

impl Language {
    /// Whether targets of this language have a parseable AST
    pub fn is_concrete(&self) -> bool {
        matches!(self, Language::Lang(_))
    }
}

impl From<String> for Language {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "none" => Language::None,
            "generic" => Language::Generic,
            _ => Language::Lang(tag),
        }
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::None => write!(f, "none"),
            Language::Generic => write!(f, "generic"),
            Language::Lang(tag) => write!(f, "{tag}"),
        }
    }
}

/// A declarative pattern rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,
    /// Message reported at each match site
    pub message: String,
    /// Report severity
    pub severity: Severity,
    /// Languages the rule applies to
    pub languages: Vec<Language>,
    /// The rule body
    pub body: RuleBody,
}

/// A rule body in either the current or the legacy shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleBody {
    /// Current shape: the formula directly
    Formula(Formula),
    /// Legacy shape: a flat patterns list
    Legacy(LegacyBody),
}

impl RuleBody {
    /// The formula to evaluate, converting the legacy shape if needed
    pub fn to_formula(&self) -> Formula {
        match self {
            RuleBody::Formula(formula) => formula.clone(),
            RuleBody::Legacy(body) => convert_legacy(body),
        }
    }
}

/// Legacy rule body: a conjunction written as a flat list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyBody {
    /// The pattern entries, combined conjunctively
    pub patterns: Vec<LegacyPattern>,
}

/// One entry of a legacy `patterns` list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyPattern {
    /// A positive pattern
    Pattern(XPattern),
    /// A negated pattern
    PatternNot(XPattern),
    /// A disjunction of nested entries
    PatternEither(Vec<LegacyPattern>),
    /// A nested conjunction
    Patterns(Vec<LegacyPattern>),
    /// Regex condition on one metavariable
    MetavariableRegex {
        /// The metavariable name, `$` sigil included
        metavariable: String,
        /// Regex source text
        regex: String,
    },
    /// Generic comparison condition
    MetavariableComparison {
        /// The comparison expression
        comparison: CondExpr,
    },
}

/// Lower a legacy body onto the formula language
///
/// The flat list becomes an `and`; `pattern-either` becomes `or`; negations
/// and metavariable entries keep their list position, so their placement
/// rules are checked by the evaluator exactly as for new-style bodies.
pub fn convert_legacy(body: &LegacyBody) -> Formula {
    Formula::And(body.patterns.iter().map(convert_pattern).collect())
}

fn convert_pattern(pattern: &LegacyPattern) -> Formula {
    match pattern {
        LegacyPattern::Pattern(xpat) => Formula::Leaf(xpat.clone()),
        LegacyPattern::PatternNot(xpat) => {
            Formula::Not(Box::new(Formula::Leaf(xpat.clone())))
        }
        LegacyPattern::PatternEither(entries) => {
            Formula::Or(entries.iter().map(convert_pattern).collect())
        }
        LegacyPattern::Patterns(entries) => {
            Formula::And(entries.iter().map(convert_pattern).collect())
        }
        LegacyPattern::MetavariableRegex {
            metavariable,
            regex,
        } => Formula::Cond(MetavarCond::Regex {
            name: metavariable.clone(),
            regex: regex.clone(),
        }),
        LegacyPattern::MetavariableComparison { comparison } => {
            Formula::Cond(MetavarCond::Generic(comparison.clone()))
        }
    }
}

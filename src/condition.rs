//! Metavariable condition evaluation
//!
//! Conditions filter candidate sites by their bindings. A generic condition
//! is a small boolean expression over the raw binding values; a regex
//! condition is lowered onto the canonical `re.match($name, "<re>")` call and
//! sent through the same expression evaluator, which is the single source of
//! truth for how a non-string binding becomes text.

use crate::error::{QuarryError, Result};
use crate::formula::MetavarCond;
use crate::metavar::Bindings;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Name of the synthesised regex-match call
pub const RE_MATCH_FUNCTION: &str = "re.match";

/// A value in a condition environment
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    /// Integer value
    Int(i64),
    /// String value
    Str(String),
    /// Boolean value
    Bool(bool),
}

/// Environment mapping metavariable names to values
pub type CondEnv = HashMap<String, EnvValue>;

/// Comparison operators of the condition expression language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Strictly less than
    Lt,
    /// Less than or equal
    Le,
    /// Strictly greater than
    Gt,
    /// Greater than or equal
    Ge,
}

impl CmpOp {
    /// Compare two environment values; mismatched types never compare equal
    pub fn compare(&self, lhs: &EnvValue, rhs: &EnvValue) -> bool {
        match (lhs, rhs) {
            (EnvValue::Int(a), EnvValue::Int(b)) => match self {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
            },
            (EnvValue::Str(a), EnvValue::Str(b)) => match self {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                _ => false,
            },
            (EnvValue::Bool(a), EnvValue::Bool(b)) => match self {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                _ => false,
            },
            _ => false,
        }
    }
}

/// A condition expression over metavariable bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CondExpr {
    /// Reference to a bound metavariable, `$` sigil included
    Var(String),
    /// Integer literal
    Int(i64),
    /// String literal
    Str(String),
    /// Boolean literal
    Bool(bool),
    /// Comparison of two sub-expressions
    Cmp {
        /// The operator
        op: CmpOp,
        /// Left operand
        lhs: Box<CondExpr>,
        /// Right operand
        rhs: Box<CondExpr>,
    },
    /// Boolean negation
    Not(Box<CondExpr>),
    /// Boolean conjunction
    And(Box<CondExpr>, Box<CondExpr>),
    /// Boolean disjunction
    Or(Box<CondExpr>, Box<CondExpr>),
    /// Builtin call, e.g. `re.match($X, "^foo")`
    Call {
        /// Function name
        function: String,
        /// Argument expressions
        args: Vec<CondExpr>,
    },
}

/// Evaluates condition expressions against an environment
///
/// The expression language and its coercions belong to the evaluator; the
/// core only builds environments and hands over expressions.
pub trait ExprEvaluator: std::fmt::Debug + Send + Sync {
    /// Evaluate `expr` to a boolean under `env`
    fn eval_bool(&self, env: &CondEnv, expr: &CondExpr) -> Result<bool>;
}

/// Build an environment from raw binding values
pub fn bindings_to_env(bindings: &Bindings) -> CondEnv {
    bindings
        .iter()
        .map(|(name, value)| {
            let env_value = match value {
                crate::metavar::MetavarValue::Int { value, .. } => EnvValue::Int(*value),
                other => EnvValue::Str(other.render()),
            };
            (name.to_string(), env_value)
        })
        .collect()
}

/// Build an environment where every binding is rendered to its textual form
pub fn bindings_to_env_stringified(bindings: &Bindings) -> CondEnv {
    bindings
        .iter()
        .map(|(name, value)| (name.to_string(), EnvValue::Str(value.render())))
        .collect()
}

/// Evaluate one metavariable condition against a site's bindings
///
/// A regex condition on an unbound name is false, not an error.
pub fn eval_condition(
    evaluator: &dyn ExprEvaluator,
    bindings: &Bindings,
    cond: &MetavarCond,
) -> Result<bool> {
    match cond {
        MetavarCond::Generic(expr) => {
            let env = bindings_to_env(bindings);
            evaluator.eval_bool(&env, expr)
        }
        MetavarCond::Regex { name, regex } => {
            if bindings.get(name).is_none() {
                return Ok(false);
            }
            let env = bindings_to_env_stringified(bindings);
            let call = CondExpr::Call {
                function: RE_MATCH_FUNCTION.to_string(),
                args: vec![
                    CondExpr::Var(name.clone()),
                    CondExpr::Str(regex.clone()),
                ],
            };
            evaluator.eval_bool(&env, &call)
        }
    }
}

/// Default expression evaluator
///
/// Supports variables, literals, comparisons, boolean connectives, and the
/// `re.match` builtin. Unknown variables make the enclosing predicate false;
/// unknown functions and malformed regexes are errors.
#[derive(Debug, Default)]
pub struct DefaultEvaluator {
    regex_cache: Mutex<HashMap<String, Regex>>,
}

impl DefaultEvaluator {
    /// Create an evaluator with an empty regex cache
    pub fn new() -> Self {
        Self::default()
    }

    fn eval_value(&self, env: &CondEnv, expr: &CondExpr) -> Result<Option<EnvValue>> {
        match expr {
            CondExpr::Var(name) => Ok(env.get(name).cloned()),
            CondExpr::Int(value) => Ok(Some(EnvValue::Int(*value))),
            CondExpr::Str(value) => Ok(Some(EnvValue::Str(value.clone()))),
            CondExpr::Bool(value) => Ok(Some(EnvValue::Bool(*value))),
            CondExpr::Cmp { op, lhs, rhs } => {
                let lhs = self.eval_value(env, lhs)?;
                let rhs = self.eval_value(env, rhs)?;
                let result = match (lhs, rhs) {
                    (Some(l), Some(r)) => op.compare(&l, &r),
                    _ => false,
                };
                Ok(Some(EnvValue::Bool(result)))
            }
            CondExpr::Not(inner) => Ok(Some(EnvValue::Bool(!self.eval_bool(env, inner)?))),
            CondExpr::And(lhs, rhs) => Ok(Some(EnvValue::Bool(
                self.eval_bool(env, lhs)? && self.eval_bool(env, rhs)?,
            ))),
            CondExpr::Or(lhs, rhs) => Ok(Some(EnvValue::Bool(
                self.eval_bool(env, lhs)? || self.eval_bool(env, rhs)?,
            ))),
            CondExpr::Call { function, args } if function == RE_MATCH_FUNCTION => {
                self.eval_re_match(env, args)
            }
            CondExpr::Call { function, .. } => Err(QuarryError::Condition(format!(
                "unsupported function '{function}'"
            ))),
        }
    }

    fn eval_re_match(&self, env: &CondEnv, args: &[CondExpr]) -> Result<Option<EnvValue>> {
        let [subject, CondExpr::Str(pattern)] = args else {
            return Err(QuarryError::Condition(format!(
                "{RE_MATCH_FUNCTION} expects a subject and a literal pattern"
            )));
        };
        let subject = match self.eval_value(env, subject)? {
            None => return Ok(Some(EnvValue::Bool(false))),
            Some(EnvValue::Str(s)) => s,
            Some(EnvValue::Int(i)) => i.to_string(),
            Some(EnvValue::Bool(b)) => b.to_string(),
        };
        let matched = {
            let mut cache = self
                .regex_cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !cache.contains_key(pattern) {
                let compiled = crate::backend::regex::compile_condition_regex(pattern)?;
                cache.insert(pattern.clone(), compiled);
            }
            cache[pattern].is_match(&subject)
        };
        Ok(Some(EnvValue::Bool(matched)))
    }
}

impl ExprEvaluator for DefaultEvaluator {
    fn eval_bool(&self, env: &CondEnv, expr: &CondExpr) -> Result<bool> {
        match self.eval_value(env, expr)? {
            Some(EnvValue::Bool(value)) => Ok(value),
            None => Ok(false),
            Some(other) => Err(QuarryError::Condition(format!(
                "expression evaluated to non-boolean value {other:?}"
            ))),
        }
    }
}

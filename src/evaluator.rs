//! Recursive evaluation of a rule formula over grouped leaf matches
//!
//! Evaluation maps a formula to the candidate sites that satisfy it. A leaf
//! looks up its matches in the per-rule index; `or` concatenates children;
//! `and` runs in three phases over its direct children: positives are
//! intersected to establish candidate sites, negations then prune, and
//! conditions filter last since they may call out to the expression
//! interpreter. `not` and conditions anywhere else are malformed.

use crate::condition::{eval_condition, ExprEvaluator};
use crate::error::{QuarryError, Result};
use crate::formula::{Formula, MetavarCond};
use crate::matches::{LeafId, PatternMatch};
use crate::metavar::ValueComparator;
use crate::ranges::{self, RangeWithBindings};
use std::collections::HashMap;

/// Matches of one rule grouped by the leaf that produced them
pub type LeafIndex = HashMap<LeafId, Vec<PatternMatch>>;

/// Evaluates formulas for one rule over one file
pub struct FormulaEvaluator<'a> {
    index: &'a LeafIndex,
    comparator: &'a dyn ValueComparator,
    conditions: &'a dyn ExprEvaluator,
    rule_id: &'a str,
}

impl<'a> FormulaEvaluator<'a> {
    /// Create an evaluator over one rule's grouped matches
    pub fn new(
        index: &'a LeafIndex,
        comparator: &'a dyn ValueComparator,
        conditions: &'a dyn ExprEvaluator,
        rule_id: &'a str,
    ) -> Self {
        Self {
            index,
            comparator,
            conditions,
            rule_id,
        }
    }

    /// Evaluate a formula to the sites that satisfy it
    pub fn eval(&self, formula: &Formula) -> Result<Vec<RangeWithBindings>> {
        match formula {
            Formula::Leaf(xpat) => Ok(self
                .index
                .get(&xpat.id)
                .map(|matches| matches.iter().map(RangeWithBindings::from_match).collect())
                .unwrap_or_default()),
            Formula::Or(children) => {
                let mut out = Vec::new();
                for child in children {
                    out.extend(self.eval(child)?);
                }
                Ok(out)
            }
            Formula::And(children) => self.eval_and(children),
            Formula::Not(_) => Err(QuarryError::MisplacedNot {
                rule_id: self.rule_id.to_string(),
            }),
            Formula::Cond(_) => Err(QuarryError::MisplacedCond {
                rule_id: self.rule_id.to_string(),
            }),
        }
    }

    fn eval_and(&self, children: &[Formula]) -> Result<Vec<RangeWithBindings>> {
        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        let mut conditions = Vec::new();
        for child in children {
            match child {
                Formula::Not(inner) => negatives.push(inner.as_ref()),
                Formula::Cond(cond) => conditions.push(cond),
                positive => positives.push(positive),
            }
        }

        let mut remaining = positives.into_iter();
        let first = remaining.next().ok_or_else(|| QuarryError::EmptyAnd {
            rule_id: self.rule_id.to_string(),
        })?;
        let mut sites = self.eval(first)?;
        for positive in remaining {
            let other = self.eval(positive)?;
            sites = ranges::intersect(self.comparator, &sites, &other);
        }
        for negative in negatives {
            let prune = self.eval(negative)?;
            sites = ranges::difference(self.comparator, &sites, &prune);
        }
        for cond in conditions {
            sites = self.filter(sites, cond)?;
        }
        Ok(sites)
    }

    fn filter(
        &self,
        sites: Vec<RangeWithBindings>,
        cond: &MetavarCond,
    ) -> Result<Vec<RangeWithBindings>> {
        ranges::filter_by(sites, |site| {
            eval_condition(self.conditions, &site.bindings, cond)
        })
    }
}

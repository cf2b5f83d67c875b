//! The range algebra combining leaf match sets
//!
//! The working unit is a byte span plus the bindings established there plus
//! the originating match record, which every operation carries through
//! unchanged. The one relation the algebra needs is binding-compatible
//! enclosure: `a` is inside `b` when `a`'s span nests in `b`'s and every
//! name both sides bind is bound to equal values.

use crate::error::Result;
use crate::loc::Span;
use crate::matches::PatternMatch;
use crate::metavar::{Bindings, ValueComparator};

/// A candidate site: span, bindings, and the match that produced it
#[derive(Debug, Clone)]
pub struct RangeWithBindings {
    /// Byte span of the site
    pub span: Span,
    /// Bindings established at the site
    pub bindings: Bindings,
    /// The match record the site was lifted from
    pub origin: PatternMatch,
}

impl RangeWithBindings {
    /// Lift a match record into the algebra
    pub fn from_match(pm: &PatternMatch) -> Self {
        Self {
            span: pm.span(),
            bindings: pm.bindings.clone(),
            origin: pm.clone(),
        }
    }
}

/// Binding-compatible enclosure: `a`'s span nests in `b`'s, and every name
/// bound by `a` is either unbound in `b` or bound to an equal value
pub fn is_enclosed_with_bindings(
    comparator: &dyn ValueComparator,
    a: &RangeWithBindings,
    b: &RangeWithBindings,
) -> bool {
    b.span.encloses(&a.span)
        && a.bindings.iter().all(|(name, value)| match b.bindings.get(name) {
            None => true,
            Some(other) => comparator.equal(value, other),
        })
}

/// Conjunction: keep each side's elements that sit binding-compatibly inside
/// some element of the other side
///
/// Whichever side is more specific survives with its own bindings and
/// origin. The same site discovered from both arguments is kept twice;
/// deduplication is left to consumers that need it.
pub fn intersect(
    comparator: &dyn ValueComparator,
    xs: &[RangeWithBindings],
    ys: &[RangeWithBindings],
) -> Vec<RangeWithBindings> {
    let mut kept: Vec<RangeWithBindings> = xs
        .iter()
        .filter(|x| ys.iter().any(|y| is_enclosed_with_bindings(comparator, x, y)))
        .cloned()
        .collect();
    kept.extend(
        ys.iter()
            .filter(|y| xs.iter().any(|x| is_enclosed_with_bindings(comparator, y, x)))
            .cloned(),
    );
    kept
}

/// Negation: drop each positive that sits binding-compatibly inside some
/// negative
///
/// Overlaps that are not full enclosures do not prune.
pub fn difference(
    comparator: &dyn ValueComparator,
    pos: &[RangeWithBindings],
    neg: &[RangeWithBindings],
) -> Vec<RangeWithBindings> {
    pos.iter()
        .filter(|p| !neg.iter().any(|n| is_enclosed_with_bindings(comparator, p, n)))
        .cloned()
        .collect()
}

/// Keep the sites accepted by a fallible predicate
pub fn filter_by<F>(xs: Vec<RangeWithBindings>, mut keep: F) -> Result<Vec<RangeWithBindings>>
where
    F: FnMut(&RangeWithBindings) -> Result<bool>,
{
    let mut kept = Vec::with_capacity(xs.len());
    for x in xs {
        if keep(&x)? {
            kept.push(x);
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::Location;
    use crate::matches::LeafId;
    use crate::metavar::{MetavarValue, TextualComparator};
    use std::path::PathBuf;

    fn location(offset: usize) -> Location {
        Location {
            file: PathBuf::from("t.x"),
            offset,
            line: 1,
            column: offset + 1,
            text: String::new(),
        }
    }

    fn site(leaf: usize, start: usize, end: usize, bindings: &[(&str, i64)]) -> RangeWithBindings {
        let bindings: Bindings = bindings
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    MetavarValue::Int {
                        value: *value,
                        loc: location(start),
                    },
                )
            })
            .collect();
        let pm = PatternMatch {
            leaf_id: LeafId(leaf),
            file: PathBuf::from("t.x"),
            start: location(start),
            end: location(end),
            bindings,
            tokens: vec![location(start)],
        };
        RangeWithBindings::from_match(&pm)
    }

    #[test]
    fn test_enclosure_requires_nested_span() {
        let cmp = TextualComparator;
        let inner = site(0, 2, 5, &[]);
        let outer = site(1, 0, 10, &[]);
        assert!(is_enclosed_with_bindings(&cmp, &inner, &outer));
        assert!(!is_enclosed_with_bindings(&cmp, &outer, &inner));
    }

    #[test]
    fn test_enclosure_reflexive() {
        let cmp = TextualComparator;
        let a = site(0, 3, 9, &[("$X", 1)]);
        assert!(is_enclosed_with_bindings(&cmp, &a, &a));
    }

    #[test]
    fn test_enclosure_tolerates_unbound_name() {
        let cmp = TextualComparator;
        let bound = site(0, 2, 5, &[("$X", 1)]);
        let unbound = site(1, 0, 10, &[]);
        assert!(is_enclosed_with_bindings(&cmp, &bound, &unbound));
    }

    #[test]
    fn test_enclosure_rejects_conflicting_binding() {
        let cmp = TextualComparator;
        let a = site(0, 2, 5, &[("$X", 1)]);
        let b = site(1, 0, 10, &[("$X", 2)]);
        assert!(!is_enclosed_with_bindings(&cmp, &a, &b));
    }

    #[test]
    fn test_intersect_keeps_both_sides_survivors() {
        let cmp = TextualComparator;
        let xs = vec![site(0, 2, 5, &[("$X", 1)])];
        let ys = vec![site(1, 0, 10, &[])];
        let out = intersect(&cmp, &xs, &ys);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].origin.leaf_id, LeafId(0));
    }

    #[test]
    fn test_intersect_duplicates_coincident_sites() {
        let cmp = TextualComparator;
        let xs = vec![site(0, 2, 5, &[])];
        let ys = vec![site(1, 2, 5, &[])];
        let out = intersect(&cmp, &xs, &ys);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_intersect_empty_side_yields_empty() {
        let cmp = TextualComparator;
        let xs = vec![site(0, 0, 5, &[])];
        assert!(intersect(&cmp, &xs, &[]).is_empty());
        assert!(intersect(&cmp, &[], &xs).is_empty());
    }

    #[test]
    fn test_intersect_results_come_from_inputs() {
        let cmp = TextualComparator;
        let xs = vec![site(0, 2, 5, &[]), site(2, 20, 25, &[])];
        let ys = vec![site(1, 0, 10, &[])];
        let out = intersect(&cmp, &xs, &ys);
        for rb in &out {
            let from_xs = xs.iter().any(|x| x.origin.leaf_id == rb.origin.leaf_id);
            let from_ys = ys.iter().any(|y| y.origin.leaf_id == rb.origin.leaf_id);
            assert!(from_xs || from_ys);
        }
    }

    #[test]
    fn test_difference_prunes_enclosed_only() {
        let cmp = TextualComparator;
        let pos = vec![site(0, 0, 6, &[]), site(0, 16, 22, &[])];
        let neg = vec![site(1, 0, 6, &[])];
        let out = difference(&cmp, &pos, &neg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].span, Span::new(16, 22));
    }

    #[test]
    fn test_difference_overlap_without_enclosure_keeps() {
        let cmp = TextualComparator;
        let pos = vec![site(0, 0, 6, &[])];
        let neg = vec![site(1, 3, 9, &[])];
        let out = difference(&cmp, &pos, &neg);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_difference_empty_negatives_is_identity() {
        let cmp = TextualComparator;
        let pos = vec![site(0, 0, 6, &[]), site(0, 8, 14, &[])];
        let out = difference(&cmp, &pos, &[]);
        assert_eq!(out.len(), pos.len());
    }

    #[test]
    fn test_difference_never_grows() {
        let cmp = TextualComparator;
        let pos = vec![site(0, 0, 6, &[]), site(0, 8, 14, &[])];
        let neg = vec![site(1, 0, 20, &[]), site(1, 0, 6, &[])];
        let out = difference(&cmp, &pos, &neg);
        assert!(out.len() <= pos.len());
    }

    #[test]
    fn test_filter_by_propagates_errors() {
        let xs = vec![site(0, 0, 6, &[])];
        let result = filter_by(xs, |_| {
            Err(crate::error::QuarryError::Condition("boom".to_string()))
        });
        assert!(result.is_err());
    }
}

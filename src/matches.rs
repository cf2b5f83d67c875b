//! Match records produced by the backends and returned by the engine

use crate::loc::{Location, Span};
use crate::metavar::Bindings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of one leaf pattern inside a rule formula
///
/// Leaf ids cross the structural backend boundary as strings and are parsed
/// back when its matches are lifted into [`PatternMatch`] records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct LeafId(pub usize);

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single site where a leaf pattern matched
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Which leaf pattern produced this match
    pub leaf_id: LeafId,
    /// File the match was found in
    pub file: PathBuf,
    /// Position of the first matched byte
    pub start: Location,
    /// Position one past the last matched byte
    pub end: Location,
    /// Metavariable bindings established at this site
    pub bindings: Bindings,
    /// Locations of the matched tokens
    pub tokens: Vec<Location>,
}

impl PatternMatch {
    /// The byte span covered by this match
    pub fn span(&self) -> Span {
        Span::new(self.start.offset, self.end.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_id_display() {
        assert_eq!(LeafId(7).to_string(), "7");
    }

    #[test]
    fn test_leaf_id_round_trips_through_string() {
        let id = LeafId(42);
        let parsed: usize = id.to_string().parse().unwrap();
        assert_eq!(LeafId(parsed), id);
    }
}

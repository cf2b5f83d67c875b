//! Fan-out of a formula's leaves to the matching backends
//!
//! Leaves are partitioned by backend kind, each backend runs over the leaves
//! it owns, and the raw output is lifted into uniform match records. The
//! combined list is ordered AST, then regex, then doc matches. A regex
//! failure on one leaf degrades that leaf to an empty result set; AST and
//! doc failures propagate and fail the rule.

use crate::backend::{
    AstMatcher, AstMatcherOptions, BackendKind, DocMatcher, MiniRule, RawAstMatch, RegexEngine,
};
use crate::engine::{CheckOptions, Target};
use crate::error::{QuarryError, Result};
use crate::formula::XPattern;
use crate::loc::{line_index_for, Location};
use crate::matches::{LeafId, PatternMatch};
use crate::metavar::{Bindings, MetavarValue};
use crate::rule::Rule;
use std::fs;
use tracing::{debug, warn};

/// Runs a rule's leaves against the configured backends
pub struct BackendDispatcher<'a> {
    ast: &'a dyn AstMatcher,
    doc: &'a dyn DocMatcher,
    regex: &'a dyn RegexEngine,
    options: &'a CheckOptions,
}

impl<'a> BackendDispatcher<'a> {
    /// Create a dispatcher over the given backends
    pub fn new(
        ast: &'a dyn AstMatcher,
        doc: &'a dyn DocMatcher,
        regex: &'a dyn RegexEngine,
        options: &'a CheckOptions,
    ) -> Self {
        Self {
            ast,
            doc,
            regex,
            options,
        }
    }

    /// Run every leaf against its backend and collect the lifted matches
    pub fn dispatch(
        &self,
        rule: &Rule,
        target: &Target,
        leaves: &[&XPattern],
    ) -> Result<Vec<PatternMatch>> {
        let mut ast_leaves = Vec::new();
        let mut doc_leaves = Vec::new();
        let mut regex_leaves = Vec::new();
        for leaf in leaves {
            match leaf.body.kind() {
                BackendKind::Ast => ast_leaves.push(*leaf),
                BackendKind::Doc => doc_leaves.push(*leaf),
                BackendKind::Regex => regex_leaves.push(*leaf),
            }
        }
        debug!(
            rule = %rule.id,
            ast = ast_leaves.len(),
            doc = doc_leaves.len(),
            regex = regex_leaves.len(),
            "dispatching leaves"
        );

        let mut matches = self.run_ast(rule, target, &ast_leaves)?;
        matches.extend(self.run_regex(target, &regex_leaves)?);
        matches.extend(self.run_doc(target, &doc_leaves)?);
        Ok(matches)
    }

    fn run_ast(
        &self,
        rule: &Rule,
        target: &Target,
        leaves: &[&XPattern],
    ) -> Result<Vec<PatternMatch>> {
        if leaves.is_empty() {
            return Ok(Vec::new());
        }
        if !target.language().is_concrete() {
            debug!(
                rule = %rule.id,
                language = %target.language(),
                "skipping ast backend for non-concrete language"
            );
            return Ok(Vec::new());
        }

        let mini_rules: Vec<MiniRule> = leaves
            .iter()
            .map(|leaf| MiniRule {
                id: leaf.id.to_string(),
                pattern: leaf.body.pattern().to_string(),
                message: rule.message.clone(),
                severity: rule.severity,
                languages: rule.languages.clone(),
            })
            .collect();
        let options = AstMatcherOptions {
            with_caching: self.options.with_caching,
        };
        let ast = target.force_ast()?;

        let raw = if self.options.one_rule_at_a_time {
            // One backend call per mini rule so a timeout can be pinned to
            // the leaf that caused it.
            let mut raw = Vec::new();
            for mini_rule in &mini_rules {
                debug!(leaf = %mini_rule.id, "running single mini rule");
                raw.extend(self.ast.check(
                    &options,
                    std::slice::from_ref(mini_rule),
                    target.file(),
                    target.language(),
                    ast,
                )?);
            }
            raw
        } else {
            self.ast.check(
                &options,
                &mini_rules,
                target.file(),
                target.language(),
                ast,
            )?
        };

        raw.into_iter()
            .map(|m| lift_ast_match(target, m))
            .collect()
    }

    fn run_regex(&self, target: &Target, leaves: &[&XPattern]) -> Result<Vec<PatternMatch>> {
        if leaves.is_empty() {
            return Ok(Vec::new());
        }
        let contents = fs::read(target.file()).map_err(|source| QuarryError::Io {
            path: target.file().to_path_buf(),
            source,
        })?;
        let index = line_index_for(target.file(), &contents);

        let mut matches = Vec::new();
        for leaf in leaves {
            let hits = self
                .regex
                .compile(leaf.body.pattern())
                .and_then(|compiled| self.regex.find_all(&compiled, &contents));
            let hits = match hits {
                Ok(hits) => hits,
                Err(err) => {
                    // A broken regex leaf contributes nothing rather than
                    // failing the whole rule.
                    warn!(leaf = %leaf.id, error = %err, "regex leaf degraded to empty");
                    continue;
                }
            };
            for hit in hits {
                let (line, column) = index.position(hit.start);
                let start = Location {
                    file: target.file().to_path_buf(),
                    offset: hit.start,
                    line,
                    column,
                    text: hit.text,
                };
                let (line, column) = index.position(hit.end);
                let end = Location {
                    file: target.file().to_path_buf(),
                    offset: hit.end,
                    line,
                    column,
                    text: String::new(),
                };
                matches.push(PatternMatch {
                    leaf_id: leaf.id,
                    file: target.file().to_path_buf(),
                    tokens: vec![start.clone()],
                    start,
                    end,
                    bindings: Bindings::new(),
                });
            }
        }
        Ok(matches)
    }

    fn run_doc(&self, target: &Target, leaves: &[&XPattern]) -> Result<Vec<PatternMatch>> {
        if leaves.is_empty() {
            return Ok(Vec::new());
        }
        let source = fs::read_to_string(target.file()).map_err(|source| QuarryError::Io {
            path: target.file().to_path_buf(),
            source,
        })?;
        let doc = self.doc.parse(&source)?;

        let mut matches = Vec::new();
        for leaf in leaves {
            let hits = self
                .doc
                .search(true, &source, leaf.body.pattern(), &doc)?;
            for hit in hits {
                // The document matcher only reports the first position of a
                // region, so start and end coincide.
                let start = hit.start.to_location(target.file(), "");
                let mut bindings = Bindings::new();
                for (name, capture) in &hit.named_captures {
                    let loc = capture.loc.to_location(target.file(), capture.value.clone());
                    let value = match capture.value.parse::<i64>() {
                        Ok(value) => MetavarValue::Int { value, loc },
                        Err(_) => MetavarValue::Str {
                            value: capture.value.clone(),
                            loc,
                        },
                    };
                    bindings.insert(format!("${name}"), value);
                }
                matches.push(PatternMatch {
                    leaf_id: leaf.id,
                    file: target.file().to_path_buf(),
                    start: start.clone(),
                    end: start.clone(),
                    bindings,
                    tokens: vec![start],
                });
            }
        }
        Ok(matches)
    }
}

fn lift_ast_match(target: &Target, raw: RawAstMatch) -> Result<PatternMatch> {
    let leaf_id = raw
        .rule_id
        .parse::<usize>()
        .map(LeafId)
        .map_err(|_| QuarryError::MalformedLeafId {
            id: raw.rule_id.clone(),
            backend: BackendKind::Ast,
        })?;
    Ok(PatternMatch {
        leaf_id,
        file: target.file().to_path_buf(),
        start: raw.start,
        end: raw.end,
        bindings: raw.bindings,
        tokens: raw.tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AstHandle;
    use crate::loc::LineIndex;
    use crate::rule::Language;
    use std::path::Path;

    fn raw_match(rule_id: &str) -> RawAstMatch {
        let loc = Location {
            file: Path::new("t.x").to_path_buf(),
            offset: 0,
            line: 1,
            column: 1,
            text: String::new(),
        };
        RawAstMatch {
            rule_id: rule_id.to_string(),
            start: loc.clone(),
            end: loc.clone(),
            bindings: Bindings::new(),
            tokens: vec![loc],
        }
    }

    fn target() -> Target {
        Target::new(
            Path::new("t.x"),
            Language::Lang("x".to_string()),
            || Ok(AstHandle::new(())),
        )
    }

    #[test]
    fn test_lift_parses_leaf_id() {
        let lifted = lift_ast_match(&target(), raw_match("17")).unwrap();
        assert_eq!(lifted.leaf_id, LeafId(17));
    }

    #[test]
    fn test_lift_rejects_malformed_id() {
        let err = lift_ast_match(&target(), raw_match("not-a-number")).unwrap_err();
        assert!(matches!(err, QuarryError::MalformedLeafId { .. }));
    }

    #[test]
    fn test_line_index_matches_doc_position_convention() {
        let contents = b"abc\ndef\n";
        let index = LineIndex::new(contents);
        let pos = crate::backend::DocPosition {
            line: 2,
            bol_offset: 4,
            offset: 6,
        };
        assert_eq!(index.position(pos.offset), (pos.line, 3));
    }
}

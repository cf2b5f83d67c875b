//! The per-rule evaluation driver
//!
//! One [`Engine`] holds the configured backends, the value comparator, and
//! the condition evaluator. [`Engine::check`] runs a sequence of rules
//! against one target file: for each rule it lowers the body to a formula,
//! dispatches the leaves to the backends, groups the matches by leaf id,
//! evaluates the formula, and converts the surviving sites back into match
//! records, invoking the caller's hook once per emitted match.

use crate::backend::dispatch::BackendDispatcher;
use crate::backend::regex::SafeRegexEngine;
use crate::backend::{
    AstHandle, AstMatcher, DocMatcher, NullAstMatcher, NullDocMatcher, RegexEngine,
};
use crate::condition::{DefaultEvaluator, ExprEvaluator};
use crate::error::Result;
use crate::evaluator::{FormulaEvaluator, LeafIndex};
use crate::formula;
use crate::loc::Location;
use crate::matches::PatternMatch;
use crate::metavar::{Bindings, TextualComparator, ValueComparator};
use crate::rule::{Language, Rule};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Callback invoked once per emitted match, in emission order
pub type MatchHook<'a> = dyn FnMut(&Bindings, &[Location]) + 'a;

/// Evaluation options
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Passed through to the structural backend's caching layer
    pub with_caching: bool,
    /// Run the structural backend one mini rule at a time so timeouts can
    /// be attributed to a single leaf
    pub one_rule_at_a_time: bool,
}

/// One target file with its language tag and lazily-parsed AST
pub struct Target {
    file: PathBuf,
    language: Language,
    ast: OnceCell<AstHandle>,
    parse: Box<dyn Fn() -> Result<AstHandle> + Send + Sync>,
}

impl Target {
    /// Create a target; `parse` runs at most once, and only if a rule
    /// actually needs the AST
    pub fn new(
        file: impl Into<PathBuf>,
        language: Language,
        parse: impl Fn() -> Result<AstHandle> + Send + Sync + 'static,
    ) -> Self {
        Self {
            file: file.into(),
            language,
            ast: OnceCell::new(),
            parse: Box::new(parse),
        }
    }

    /// Path of the target file
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Language tag of the target
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Force the AST, parsing on first use
    pub fn force_ast(&self) -> Result<&AstHandle> {
        self.ast.get_or_try_init(|| (self.parse)())
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("file", &self.file)
            .field("language", &self.language)
            .field("ast_forced", &self.ast.get().is_some())
            .finish_non_exhaustive()
    }
}

/// The formula evaluation engine
#[derive(Debug, Clone)]
pub struct Engine {
    ast: Arc<dyn AstMatcher>,
    doc: Arc<dyn DocMatcher>,
    regex: Arc<dyn RegexEngine>,
    comparator: Arc<dyn ValueComparator>,
    conditions: Arc<dyn ExprEvaluator>,
    options: CheckOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default backends: no structural or document
    /// matcher, the guarded regex engine, textual value comparison, and the
    /// builtin condition evaluator
    pub fn new() -> Self {
        Self {
            ast: Arc::new(NullAstMatcher),
            doc: Arc::new(NullDocMatcher),
            regex: Arc::new(SafeRegexEngine::new()),
            comparator: Arc::new(TextualComparator),
            conditions: Arc::new(DefaultEvaluator::new()),
            options: CheckOptions::default(),
        }
    }

    /// Install a structural AST matcher
    pub fn with_ast_matcher(mut self, matcher: Arc<dyn AstMatcher>) -> Self {
        self.ast = matcher;
        self
    }

    /// Install a document matcher
    pub fn with_doc_matcher(mut self, matcher: Arc<dyn DocMatcher>) -> Self {
        self.doc = matcher;
        self
    }

    /// Install a regex engine
    pub fn with_regex_engine(mut self, engine: Arc<dyn RegexEngine>) -> Self {
        self.regex = engine;
        self
    }

    /// Install a metavariable value comparator
    pub fn with_comparator(mut self, comparator: Arc<dyn ValueComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Install a condition expression evaluator
    pub fn with_expr_evaluator(mut self, evaluator: Arc<dyn ExprEvaluator>) -> Self {
        self.conditions = evaluator;
        self
    }

    /// Set evaluation options
    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    /// Evaluate `rules` against `target` in input order
    ///
    /// Returns the emitted matches of all rules concatenated; `hook` is
    /// called once per match, in emission order. A failing rule fails the
    /// whole call; callers that want to continue past a bad rule invoke
    /// `check` per rule.
    pub fn check(
        &self,
        hook: &mut MatchHook<'_>,
        rules: &[Rule],
        target: &Target,
    ) -> Result<Vec<PatternMatch>> {
        let mut out = Vec::new();
        for rule in rules {
            out.extend(self.check_rule(hook, rule, target)?);
        }
        Ok(out)
    }

    fn check_rule(
        &self,
        hook: &mut MatchHook<'_>,
        rule: &Rule,
        target: &Target,
    ) -> Result<Vec<PatternMatch>> {
        let formula = rule.body.to_formula();
        let leaves = formula::leaves(&formula);
        debug!(
            rule = %rule.id,
            file = %target.file().display(),
            leaves = leaves.len(),
            "checking rule"
        );

        let dispatcher = BackendDispatcher::new(
            self.ast.as_ref(),
            self.doc.as_ref(),
            self.regex.as_ref(),
            &self.options,
        );
        let matches = dispatcher.dispatch(rule, target, &leaves)?;

        let mut index = LeafIndex::new();
        for pm in matches {
            index.entry(pm.leaf_id).or_default().push(pm);
        }

        let evaluator = FormulaEvaluator::new(
            &index,
            self.comparator.as_ref(),
            self.conditions.as_ref(),
            &rule.id,
        );
        let sites = evaluator.eval(&formula)?;

        let mut out = Vec::with_capacity(sites.len());
        for site in sites {
            let pm = site.origin;
            hook(&pm.bindings, &pm.tokens);
            out.push(pm);
        }
        Ok(out)
    }
}

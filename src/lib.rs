//! Formula evaluation core for a multi-language static pattern matcher
//!
//! A rule names leaf patterns of three kinds (structural AST patterns,
//! indentation-sensitive document patterns, and regexes) and combines them
//! with `and`, `or`, `not`, and metavariable conditions. Given one target
//! file, the engine fans the leaves out to the matching backends, lifts
//! their results into a uniform range representation, and evaluates the
//! formula to the set of code regions that satisfy it, each annotated with
//! the metavariable bindings that witness the match.
//!
//! The AST and document matchers are external: install them on the engine
//! through the [`backend::AstMatcher`] and [`backend::DocMatcher`] traits.
//! A guarded regex engine and a small condition-expression evaluator ship
//! as defaults.
//!
//! # Example
//!
//! ```no_run
//! use quarry::{Engine, Formula, Language, PatternBody, Rule, RuleBody, Severity, Target, XPattern};
//! use quarry::{backend::AstHandle, LeafId};
//!
//! # fn example() -> anyhow::Result<()> {
//! let rule = Rule {
//!     id: "no-todo-markers".to_string(),
//!     message: "leftover TODO marker".to_string(),
//!     severity: Severity::Warning,
//!     languages: vec![Language::Generic],
//!     body: RuleBody::Formula(Formula::Leaf(XPattern {
//!         id: LeafId(0),
//!         text: "TODO\\(".to_string(),
//!         body: PatternBody::Regex("TODO\\(".to_string()),
//!     })),
//! };
//!
//! let target = Target::new("src/main.c", Language::Generic, || Ok(AstHandle::new(())));
//! let engine = Engine::new();
//! let mut hook = |bindings: &quarry::Bindings, _tokens: &[quarry::Location]| {
//!     assert!(bindings.is_empty());
//! };
//! let matches = engine.check(&mut hook, &[rule], &target)?;
//! for pm in &matches {
//!     println!("{}:{}:{}", pm.file.display(), pm.start.line, pm.start.column);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use condition::{CmpOp, CondEnv, CondExpr, DefaultEvaluator, EnvValue, ExprEvaluator};
pub use engine::{CheckOptions, Engine, MatchHook, Target};
pub use error::{QuarryError, Result};
pub use formula::{Formula, MetavarCond, PatternBody, XPattern};
pub use loc::{LineIndex, Location, Span};
pub use matches::{LeafId, PatternMatch};
pub use metavar::{Bindings, MetavarValue, NodeHandle, TextualComparator, ValueComparator};
pub use ranges::RangeWithBindings;
pub use rule::{convert_legacy, Language, LegacyBody, LegacyPattern, Rule, RuleBody, Severity};

/// Matching backend interfaces and the default regex engine
pub mod backend;

/// Metavariable condition evaluation
pub mod condition;

/// The per-rule evaluation driver
pub mod engine;

/// Error types
pub mod error;

/// Recursive formula evaluation
pub mod evaluator;

/// The formula language of rule bodies
pub mod formula;

/// Source locations and offset conversion
pub mod loc;

/// Match records
pub mod matches;

/// Metavariable values and binding sets
pub mod metavar;

/// The range algebra
pub mod ranges;

/// Rule representation and legacy conversion
pub mod rule;

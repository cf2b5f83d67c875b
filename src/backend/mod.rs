//! Matching backend interfaces
//!
//! Three backends execute leaf patterns: a structural matcher over the
//! parsed AST, an indentation-sensitive document matcher, and a regex
//! engine over raw bytes. The core talks to each through a trait and lifts
//! their raw output into uniform match records; the engines themselves live
//! outside this crate, except for the default regex engine.

use crate::error::Result;
use crate::loc::Location;
use crate::metavar::Bindings;
use crate::rule::{Language, Severity};
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub mod dispatch;
pub mod regex;

/// The three kinds of matching backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Structural AST matcher
    Ast,
    /// Indentation-sensitive document matcher
    Doc,
    /// Regular-expression matcher
    Regex,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ast => write!(f, "ast"),
            BackendKind::Doc => write!(f, "doc"),
            BackendKind::Regex => write!(f, "regex"),
        }
    }
}

/// Opaque handle to a parsed AST
///
/// Produced by the external parser, forced lazily, and passed through to the
/// structural backend, which downcasts to its own tree type.
#[derive(Clone)]
pub struct AstHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl AstHandle {
    /// Wrap a parser-specific tree
    pub fn new<T: Any + Send + Sync>(tree: T) -> Self {
        Self {
            inner: Arc::new(tree),
        }
    }

    /// Borrow the parser-specific tree, if it has the expected type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for AstHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstHandle").finish_non_exhaustive()
    }
}

/// Opaque handle to a parsed indentation-sensitive document
#[derive(Clone)]
pub struct DocHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl DocHandle {
    /// Wrap a matcher-specific document
    pub fn new<T: Any + Send + Sync>(doc: T) -> Self {
        Self {
            inner: Arc::new(doc),
        }
    }

    /// Borrow the matcher-specific document, if it has the expected type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for DocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocHandle").finish_non_exhaustive()
    }
}

/// Single-pattern adapter record handed to the structural backend
#[derive(Debug, Clone)]
pub struct MiniRule {
    /// Leaf id, stringified
    pub id: String,
    /// Pattern source
    pub pattern: String,
    /// Message inherited from the enclosing rule
    pub message: String,
    /// Severity inherited from the enclosing rule
    pub severity: Severity,
    /// Languages the pattern applies to
    pub languages: Vec<Language>,
}

/// Options passed through to the structural backend
#[derive(Debug, Clone, Copy, Default)]
pub struct AstMatcherOptions {
    /// Whether the backend may reuse cached per-file state
    pub with_caching: bool,
}

/// A raw match reported by the structural backend
#[derive(Debug, Clone)]
pub struct RawAstMatch {
    /// Id of the mini rule that matched, as given in [`MiniRule::id`]
    pub rule_id: String,
    /// Position of the first matched byte
    pub start: Location,
    /// Position one past the last matched byte
    pub end: Location,
    /// Metavariable bindings established by the match
    pub bindings: Bindings,
    /// Locations of the matched tokens
    pub tokens: Vec<Location>,
}

/// Structural AST matcher
pub trait AstMatcher: fmt::Debug + Send + Sync {
    /// Run `mini_rules` against one parsed file
    fn check(
        &self,
        options: &AstMatcherOptions,
        mini_rules: &[MiniRule],
        file: &Path,
        language: &Language,
        ast: &AstHandle,
    ) -> Result<Vec<RawAstMatch>>;
}

/// A position as reported by the document matcher: line number, byte offset
/// of the start of that line, and byte offset of the position itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocPosition {
    /// Line number, 1-based
    pub line: usize,
    /// Byte offset of the first character of the line
    pub bol_offset: usize,
    /// Byte offset of the position
    pub offset: usize,
}

impl DocPosition {
    /// Convert to a [`Location`]; the column is the distance from the start
    /// of the line plus one
    pub fn to_location(&self, file: &Path, text: impl Into<String>) -> Location {
        Location {
            file: file.to_path_buf(),
            offset: self.offset,
            line: self.line,
            column: self.offset - self.bol_offset + 1,
            text: text.into(),
        }
    }
}

/// A named capture reported by the document matcher
#[derive(Debug, Clone)]
pub struct DocCapture {
    /// Captured text
    pub value: String,
    /// Where the capture starts
    pub loc: DocPosition,
}

/// A raw hit reported by the document matcher
#[derive(Debug, Clone)]
pub struct RawDocMatch {
    /// First position of the matched region
    pub start: DocPosition,
    /// Captures keyed by metavariable name, without the `$` sigil
    pub named_captures: Vec<(String, DocCapture)>,
}

/// Indentation-sensitive document matcher
pub trait DocMatcher: fmt::Debug + Send + Sync {
    /// Parse `source` into the matcher's document representation
    fn parse(&self, source: &str) -> Result<DocHandle>;

    /// Search `doc` for one pattern
    fn search(
        &self,
        case_sensitive: bool,
        source: &str,
        pattern: &str,
        doc: &DocHandle,
    ) -> Result<Vec<RawDocMatch>>;
}

/// A compiled regular expression, opaque to the core
#[derive(Clone)]
pub struct CompiledRegex {
    inner: Arc<dyn Any + Send + Sync>,
    text: String,
}

impl CompiledRegex {
    /// Wrap an engine-specific compiled pattern with its source text
    pub fn new<T: Any + Send + Sync>(compiled: T, text: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(compiled),
            text: text.into(),
        }
    }

    /// Borrow the engine-specific compiled pattern
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The pattern source this was compiled from
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRegex")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// One match reported by the regex engine
#[derive(Debug, Clone)]
pub struct RegexHit {
    /// Byte offset of the first matched byte
    pub start: usize,
    /// Byte offset one past the last matched byte
    pub end: usize,
    /// Matched text, lossily decoded
    pub text: String,
}

/// Regular-expression engine over raw file bytes
pub trait RegexEngine: fmt::Debug + Send + Sync {
    /// Compile one pattern
    fn compile(&self, pattern: &str) -> Result<CompiledRegex>;

    /// Find all non-overlapping matches in `haystack`
    fn find_all(&self, compiled: &CompiledRegex, haystack: &[u8]) -> Result<Vec<RegexHit>>;
}

/// Structural backend that reports no matches
///
/// Installed by default until a real matcher is configured; rules whose AST
/// leaves reach it simply find nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAstMatcher;

impl AstMatcher for NullAstMatcher {
    fn check(
        &self,
        _options: &AstMatcherOptions,
        _mini_rules: &[MiniRule],
        _file: &Path,
        _language: &Language,
        _ast: &AstHandle,
    ) -> Result<Vec<RawAstMatch>> {
        Ok(Vec::new())
    }
}

/// Document backend that reports no matches
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDocMatcher;

impl DocMatcher for NullDocMatcher {
    fn parse(&self, _source: &str) -> Result<DocHandle> {
        Ok(DocHandle::new(()))
    }

    fn search(
        &self,
        _case_sensitive: bool,
        _source: &str,
        _pattern: &str,
        _doc: &DocHandle,
    ) -> Result<Vec<RawDocMatch>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Ast.to_string(), "ast");
        assert_eq!(BackendKind::Doc.to_string(), "doc");
        assert_eq!(BackendKind::Regex.to_string(), "regex");
    }

    #[test]
    fn test_doc_position_column() {
        let pos = DocPosition {
            line: 3,
            bol_offset: 20,
            offset: 24,
        };
        let loc = pos.to_location(Path::new("t.x"), "");
        assert_eq!(loc.line, 3);
        assert_eq!(loc.column, 5);
        assert_eq!(loc.offset, 24);
    }

    #[test]
    fn test_handles_downcast() {
        let ast = AstHandle::new(vec![1_u8, 2, 3]);
        assert_eq!(ast.downcast_ref::<Vec<u8>>().map(Vec::len), Some(3));
        assert!(ast.downcast_ref::<String>().is_none());
    }
}

//! Default regex engine with guarded compilation
//!
//! Rule files are untrusted input, so patterns go through a guard before
//! compilation: a length cap, a nesting-depth cap, and a compiled-size
//! limit. Matching runs over raw bytes so reported offsets are exact even
//! for files that are not valid UTF-8.

use crate::backend::{CompiledRegex, RegexEngine, RegexHit};
use crate::error::{QuarryError, Result};
use regex::bytes;

/// Maximum accepted pattern length in bytes
const MAX_PATTERN_LENGTH: usize = 1000;

/// Maximum group nesting depth
const MAX_NESTING_DEPTH: usize = 20;

/// Compiled program size limit (2 MB)
const MAX_COMPILED_SIZE: usize = 2 * 1024 * 1024;

/// Reject patterns that are too long or too deeply nested
pub(crate) fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(QuarryError::UnsafeRegex {
            pattern: pattern.to_string(),
            reason: "empty pattern".to_string(),
        });
    }
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(QuarryError::UnsafeRegex {
            pattern: pattern.to_string(),
            reason: format!(
                "pattern length {} exceeds limit {MAX_PATTERN_LENGTH}",
                pattern.len()
            ),
        });
    }
    let mut depth: usize = 0;
    let mut escaped = false;
    for ch in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Err(QuarryError::UnsafeRegex {
                        pattern: pattern.to_string(),
                        reason: format!("group nesting exceeds depth {MAX_NESTING_DEPTH}"),
                    });
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Compile a condition regex for text matching, with the same guards as the
/// byte engine
pub(crate) fn compile_condition_regex(pattern: &str) -> Result<regex::Regex> {
    validate_pattern(pattern)?;
    let compiled = regex::RegexBuilder::new(pattern)
        .size_limit(MAX_COMPILED_SIZE)
        .build()?;
    Ok(compiled)
}

/// Regex engine backed by byte-oriented matching
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeRegexEngine;

impl SafeRegexEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl RegexEngine for SafeRegexEngine {
    fn compile(&self, pattern: &str) -> Result<CompiledRegex> {
        validate_pattern(pattern)?;
        let compiled = bytes::RegexBuilder::new(pattern)
            .size_limit(MAX_COMPILED_SIZE)
            .build()?;
        Ok(CompiledRegex::new(compiled, pattern))
    }

    fn find_all(&self, compiled: &CompiledRegex, haystack: &[u8]) -> Result<Vec<RegexHit>> {
        let regex = compiled.downcast_ref::<bytes::Regex>().ok_or_else(|| {
            QuarryError::Backend {
                backend: crate::backend::BackendKind::Regex,
                message: format!(
                    "pattern '{}' was not compiled by this engine",
                    compiled.text()
                ),
            }
        })?;
        Ok(regex
            .find_iter(haystack)
            .map(|m| RegexHit {
                start: m.start(),
                end: m.end(),
                text: String::from_utf8_lossy(m.as_bytes()).into_owned(),
            })
            .collect())
    }
}

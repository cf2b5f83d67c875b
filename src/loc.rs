//! Source locations, byte spans, and offset-to-position conversion
//!
//! Positions are 1-based for lines and columns and 0-based for byte offsets.
//! Conversion tables are cached process-wide per file; the cache is additive
//! and correctness never depends on an entry persisting across calls.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A resolved position in one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File the position refers to
    pub file: PathBuf,
    /// Byte offset from the start of the file, 0-based
    pub offset: usize,
    /// Line number, 1-based
    pub line: usize,
    /// Column number in bytes, 1-based
    pub column: usize,
    /// Source text at this position, possibly empty
    pub text: String,
}

/// A half-open byte interval in one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Offset of the first byte, inclusive
    pub start: usize,
    /// Offset one past the last byte, exclusive
    pub end: usize,
}

impl Span {
    /// Create a span; `start` must not exceed `end`
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} exceeds end {end}");
        Self { start, end }
    }

    /// Whether `other` lies fully inside this span
    pub fn encloses(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Byte-offset to line/column conversion table for one file
///
/// Lines are delimited by `\n`; the column of an offset is the number of
/// bytes since the last newline plus one.
#[derive(Debug)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the table by scanning `contents` for newlines
    pub fn new(contents: &[u8]) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in contents.iter().enumerate() {
            if *byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a `(line, column)` pair
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        (line, column)
    }

    /// Convert a `(line, column)` pair back to a byte offset
    pub fn offset(&self, line: usize, column: usize) -> usize {
        self.line_starts[line - 1] + column - 1
    }

    /// Number of lines in the indexed file
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Process-wide cache of conversion tables, keyed by file path
static LINE_INDEXES: Lazy<Mutex<HashMap<PathBuf, Arc<LineIndex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch the conversion table for `file`, building it from `contents` on first use
pub fn line_index_for(file: &Path, contents: &[u8]) -> Arc<LineIndex> {
    let mut cache = LINE_INDEXES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .entry(file.to_path_buf())
        .or_insert_with(|| Arc::new(LineIndex::new(contents)))
        .clone()
}

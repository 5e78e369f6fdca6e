//! The Source Registry owns loaded source buffers, maps file paths to
//! line-index metadata, and answers "what line/column is byte N on?".
//! Everything downstream of the lexer (parser, evaluator, diagnostics)
//! reaches source text and positions only through this module.

pub mod registry;
pub mod span;

pub use registry::{SourceId, SourceRegistry};
pub use span::{Location, Span, Spanned};

use std::path::PathBuf;

/// A single loaded source buffer together with its line index. Cheap
/// to share: callers hold an `Rc<Source>` rather than copying text.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub contents: String,
    line_index: LineIndex,
}

impl Source {
    pub fn new(path: PathBuf, contents: String) -> Source {
        let line_index = LineIndex::build(&contents);
        Source { path, contents, line_index }
    }

    /// Builds an in-memory source with a synthetic path, for tests and
    /// for the handful of callers (e.g. `SessionConfig` parsing) that
    /// have no real file backing them.
    pub fn in_memory(contents: impl Into<String>) -> Source {
        Source::new(PathBuf::from("<memory>"), contents.into())
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }
}

/// A half-open `[begin, end)` byte range describing one line, along
/// with its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    pub line: u32,
    pub begin: usize,
    pub end: usize,
}

impl LineRecord {
    fn contains(&self, offset: usize) -> bool {
        offset >= self.begin && offset < self.end
    }
}

/// Maps byte offsets to `{line, column}` pairs. Built once per source,
/// then queried any number of times by span resolution.
#[derive(Debug, PartialEq, Eq)]
pub struct LineIndex {
    lines: Vec<LineRecord>,
}

impl LineIndex {
    fn build(contents: &str) -> LineIndex {
        let mut lines = Vec::new();
        let mut begin = 0;
        let mut line = 1;

        for (offset, ch) in contents.char_indices() {
            if ch == '\n' {
                lines.push(LineRecord { line, begin, end: offset + 1 });
                begin = offset + 1;
                line += 1;
            }
        }
        lines.push(LineRecord { line, begin, end: contents.len() + 1 });

        LineIndex { lines }
    }

    /// Returns the `(line, column)` a byte offset falls on. Offsets
    /// past the end of the source clamp to the last line/column.
    pub fn locate(&self, offset: usize) -> (u32, u32) {
        let record = self
            .lines
            .iter()
            .find(|record| record.contains(offset))
            .or_else(|| self.lines.last())
            .copied()
            .unwrap_or(LineRecord { line: 1, begin: 0, end: 0 });

        let column = (offset.saturating_sub(record.begin)) as u32 + 1;
        (record.line, column)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locates_first_line() {
        let source = Source::in_memory("abc\ndef\n");
        assert_eq!(source.line_index().locate(0), (1, 1));
        assert_eq!(source.line_index().locate(2), (1, 3));
    }

    #[test]
    fn locates_second_line() {
        let source = Source::in_memory("abc\ndef\n");
        assert_eq!(source.line_index().locate(4), (2, 1));
        assert_eq!(source.line_index().locate(6), (2, 3));
    }

    #[test]
    fn clamps_past_the_end() {
        let source = Source::in_memory("abc");
        let (line, _) = source.line_index().locate(1000);
        assert_eq!(line, 1);
    }
}

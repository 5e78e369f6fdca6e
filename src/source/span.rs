use std::fmt;
use std::rc::Rc;

use super::Source;

/// A location resolved from a byte offset via a source's line index.
/// Cheap to construct; only materialized when a diagnostic is actually
/// rendered, never carried around speculatively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: std::path::PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// A region of source code, much like a `&str` but carrying a
/// reference-counted pointer back to the `Source` it came from, so
/// spans can be combined and compared without re-reading the file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Span {
    source: Option<Rc<Source>>,
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(source: &Rc<Source>, offset: usize, length: usize) -> Span {
        Span { source: Some(Rc::clone(source)), offset, length }
    }

    pub fn point(source: &Rc<Source>, offset: usize) -> Span {
        Span { source: Some(Rc::clone(source)), offset, length: 1 }
    }

    /// An empty span carries no source; combining it with any other
    /// span just yields that other span unchanged.
    pub fn empty() -> Span {
        Span { source: None, offset: 0, length: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }

    pub fn source(&self) -> Option<&Rc<Source>> {
        self.source.as_ref()
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Combine two (disjoint or overlapping) spans into the smallest
    /// span that contains both. Both must point at the same source
    /// unless one of them is empty.
    pub fn combine(a: &Span, b: &Span) -> Span {
        if a.is_empty() { return b.clone(); }
        if b.is_empty() { return a.clone(); }

        if a.source != b.source {
            panic!("can not combine two spans from different sources");
        }

        let offset = a.offset.min(b.offset);
        let end = a.end().max(b.end());
        Span { source: a.source.clone(), offset, length: end - offset }
    }

    /// Resolves this span's start into a `Location` using the owning
    /// source's line index. Returns `None` for an empty span.
    pub fn location(&self) -> Option<Location> {
        let source = self.source.as_ref()?;
        let (line, column) = source.line_index().locate(self.offset);
        Some(Location { path: source.path.clone(), line, column })
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(loc) => write!(f, "{}", loc),
            None => write!(f, "<unknown location>"),
        }
    }
}

/// Pairs a value with the span it was parsed from. Used throughout the
/// lexer, parser and evaluator to carry provenance without every
/// datastructure needing its own span field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(item: T, span: Span) -> Spanned<T> {
        Spanned { item, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned { item: f(self.item), span: self.span }
    }
}

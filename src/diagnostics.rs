//! A single accumulating diagnostic result, threaded explicitly through
//! the parser and evaluator (never a thread-local or a global). See
//! SPEC_FULL.md §3.1 and §7.

use std::fmt;

use crate::source::Location;

/// The closed set of stable diagnostic identifiers the core can raise.
/// Modeled as an enum rather than loose string literals so a typo in a
/// code can't silently become a new diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticCode {
    #[error("P001")]
    ProgramRootMustBeProgramNode,
    #[error("P002")]
    UnknownType,
    #[error("P014")]
    InvalidParameterDeclaration,
    #[error("P018")]
    NonNamespaceQualifier,
    #[error("P019")]
    UnableToInferType,
    #[error("P027")]
    AssignmentArityMismatch,
    #[error("P041")]
    InvalidNumericLiteral,
    #[error("P071")]
    AstNodeEvaluationFailed,
    #[error("B016")]
    ExpectedToken,
    #[error("B021")]
    NoParselet,
    #[error("B027")]
    TypeExpected,
    #[error("C021")]
    ModuleLoadFailed,
    #[error("C024")]
    InvalidStatement,
}

impl DiagnosticCode {
    /// Whether this condition is classified as fatal per §7: arity
    /// mismatches, unresolved type annotations, malformed literals, and
    /// unparseable tokens. Everything else is a warning-class note.
    pub fn is_fatal(self) -> bool {
        use DiagnosticCode::*;
        matches!(
            self,
            ProgramRootMustBeProgramNode
                | AssignmentArityMismatch
                | UnableToInferType
                | InvalidNumericLiteral
                | AstNodeEvaluationFailed
                | ExpectedToken
                | NoParselet
                | TypeExpected
                | ModuleLoadFailed
                | InvalidStatement
                | NonNamespaceQualifier
        )
    }
}

/// One structured diagnostic entry: a stable code, a human-readable
/// message, optional extra detail, and (when available) a resolved
/// source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub detail: Option<String>,
    pub location: Option<Location>,
    pub fatal: bool,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: Option<Location>) -> Diagnostic {
        Diagnostic {
            fatal: code.is_fatal(),
            code,
            message: message.into(),
            detail: None,
            location,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Diagnostic {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{} ", location)?;
        }
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// The accumulating result threaded through a whole compilation. Once
/// a fatal diagnostic is appended, `has_fatal` latches and never
/// clears for the session — the pipeline may still keep elaborating to
/// surface more diagnostics, but the caller knows not to trust the
/// resulting element graph for code generation.
#[derive(Debug, Default)]
pub struct DiagnosticResult {
    entries: Vec<Diagnostic>,
    has_fatal: bool,
}

impl DiagnosticResult {
    pub fn new() -> DiagnosticResult {
        DiagnosticResult::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.fatal {
            log::warn!("fatal diagnostic: {}", diagnostic);
            self.has_fatal = true;
        } else {
            log::debug!("diagnostic: {}", diagnostic);
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, location: Option<Location>) {
        self.push(Diagnostic::new(code, message, location));
    }

    pub fn is_fatal(&self) -> bool {
        self.has_fatal
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.fatal)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.fatal)
    }

    pub fn of_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.code == code)
    }
}

/// Truly unrecoverable conditions that never get a chance to become a
/// `Diagnostic` — e.g. a source file that can't be read at all, before
/// there is even a `Source` to attach a location to.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("could not read source file {path}: {source}")]
    SourceRead { path: std::path::PathBuf, #[source] source: std::io::Error },

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fatal_latches_and_does_not_clear() {
        let mut result = DiagnosticResult::new();
        assert!(!result.is_fatal());
        result.error(DiagnosticCode::UnableToInferType, "unable to infer type: x", None);
        assert!(result.is_fatal());
        result.error(DiagnosticCode::NoParselet, "no prefix parselet", None);
        assert!(result.is_fatal());
        assert_eq!(result.entries().len(), 2);
    }

    #[test]
    fn filters_by_code() {
        let mut result = DiagnosticResult::new();
        result.error(DiagnosticCode::AssignmentArityMismatch, "arity mismatch", None);
        result.error(DiagnosticCode::AssignmentArityMismatch, "arity mismatch again", None);
        result.error(DiagnosticCode::UnknownType, "unknown type", None);
        assert_eq!(result.of_code(DiagnosticCode::AssignmentArityMismatch).count(), 2);
    }
}

//! `Session`: orchestrates one compilation (SPEC_FULL.md §2 "Session",
//! §4.9, §4.10). Owns the source registry, the scope manager (which in
//! turn owns the element store), the accumulating diagnostic result,
//! and the evaluator's per-path module cache and source stack. Nothing
//! here is process-global — a caller may run several independent
//! `Session`s, e.g. one per test, with no shared state between them
//! (SPEC_FULL.md §5, §9).

use std::path::Path;

use crate::config::SessionConfig;
use crate::diagnostics::{CoreError, DiagnosticResult};
use crate::evaluator::{install_builtins, EvalContext, Evaluator};
use crate::lexer::Lexer;
use crate::scope::ScopeManager;
use crate::source::{SourceId, SourceRegistry};

/// A root block all builtin types and every compiled module's
/// qualified-name resolution is ultimately anchored under. Not itself
/// a module — it has no source file — just a `block` that outlives the
/// whole session.
pub struct Session {
    scope: ScopeManager,
    sources: SourceRegistry,
    diagnostics: DiagnosticResult,
    evaluator: Evaluator,
    config: SessionConfig,
    root: crate::element::ElementId,
}

impl Session {
    /// Builds a fresh session with builtins already installed into its
    /// root scope, ready to compile one or more source files
    /// (SPEC_FULL.md §4.10: `Session::new` takes a `SessionConfig`).
    pub fn new(config: SessionConfig) -> Session {
        let mut scope = ScopeManager::new();
        let evaluator = Evaluator::new();
        let builder = crate::element::builder::ElementBuilder::new();

        // The session root block has no owning parent — it sits above
        // every compiled module the way a module's own block sits above
        // its declarations (SPEC_FULL.md §3 "every element has exactly
        // one parent, except the program root").
        let root_id = scope.store_mut().alloc_id();
        scope.store_mut().put(crate::element::Element {
            id: root_id,
            parent_id: None,
            location: None,
            attributes: Vec::new(),
            payload: crate::element::ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        });
        let root = root_id;

        install_builtins(&builder, &mut scope, root, &config);

        Session { scope, sources: SourceRegistry::new(), diagnostics: DiagnosticResult::new(), evaluator, config, root }
    }

    pub fn with_default_config() -> Session {
        Session::new(SessionConfig::default())
    }

    pub fn diagnostics(&self) -> &DiagnosticResult {
        &self.diagnostics
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn root(&self) -> crate::element::ElementId {
        self.root
    }

    pub fn store(&self) -> &crate::element::ElementStore {
        self.scope.store()
    }

    /// Reads, lexes, parses, and evaluates the file at `path`, returning
    /// its module element id. Re-compiling a path already loaded in
    /// this session returns the cached module rather than re-parsing
    /// (SPEC_FULL.md §4.7 "Evaluator module compilation is idempotent
    /// per source path").
    pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<crate::element::ElementId, CoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CoreError::SourceRead { path: path.to_path_buf(), source })?;
        Ok(self.compile_source(path.to_path_buf(), contents))
    }

    /// Registers `contents` under `path` (without touching the
    /// filesystem — the path need not exist) and compiles it. Used by
    /// tests and by any embedder that already has source text in hand.
    pub fn compile_source(&mut self, path: std::path::PathBuf, contents: String) -> crate::element::ElementId {
        let source_id = self.sources.insert(path, contents);
        self.compile_source_id(source_id)
    }

    fn compile_source_id(&mut self, source_id: SourceId) -> crate::element::ElementId {
        let source = self.sources.get(source_id).clone();
        let lexer = Lexer::new(source);
        let mut parser = crate::ast::parser::Parser::new(lexer);
        let program = parser.parse_program(&mut self.diagnostics);

        let mut ctx = EvalContext {
            scope: &mut self.scope,
            sources: &mut self.sources,
            diagnostics: &mut self.diagnostics,
            config: &self.config,
        };
        self.evaluator.compile_program(&mut ctx, source_id, &program)
    }

    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        self.sources.is_loaded(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compiles_a_numeric_declaration() {
        let mut session = Session::with_default_config();
        let module_id = session.compile_source(std::path::PathBuf::from("<test>"), "x: u32 := 42;".to_string());
        assert!(!session.diagnostics().is_fatal());

        let module = session.store().get(module_id).unwrap();
        let crate::element::ElementPayload::Module { block, .. } = &module.payload else { panic!("expected a module") };
        let block_element = session.store().get(*block).unwrap();
        let crate::element::ElementPayload::Block { identifiers, .. } = &block_element.payload else { panic!("expected a block") };
        assert!(identifiers.contains_key("x"));
    }

    #[test]
    fn recompiling_the_same_path_is_idempotent() {
        let mut session = Session::with_default_config();
        let path = std::path::PathBuf::from("/tmp/does-not-exist-session-test.ald");
        let first = session.compile_source(path.clone(), "x := 1;".to_string());
        let second = session.compile_source(path, "x := 2;".to_string());
        assert_eq!(first, second);
    }

    #[test]
    fn reports_assignment_arity_mismatch() {
        let mut session = Session::with_default_config();
        session.compile_source(std::path::PathBuf::from("<test>"), "a, b := 1, 2, 3;".to_string());
        assert!(session.diagnostics().is_fatal());
        assert_eq!(session.diagnostics().of_code(crate::diagnostics::DiagnosticCode::AssignmentArityMismatch).count(), 1);
    }
}

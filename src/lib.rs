//! `alder`: a bootstrap compiler front-end for the Alder systems
//! language.
//!
//! The pipeline runs source text through a fixed sequence of stages,
//! each owned by its own module:
//!
//! ```text
//! SourceRegistry -> Lexer -> Parser (Pratt) -> AstBuilder
//!   -> Evaluator (ElementBuilder + ScopeManager) -> Session
//! ```
//!
//! - [`source`] loads and indexes source text, handing out stable
//!   [`source::SourceId`]s and line/column [`source::Location`]s.
//! - [`lexer`] turns a [`source::Source`] into a stream of [`token::Token`]s.
//! - [`ast`] is the syntax layer: `ast::parser::Parser` is a Pratt
//!   parser building the [`ast::AstNode`] tree via [`ast::AstBuilder`].
//! - [`element`] is the semantic layer: a closed [`element::ElementPayload`]
//!   sum type, built by [`element::builder::ElementBuilder`] and owned by
//!   an [`element::ElementStore`] arena.
//! - [`scope`] resolves identifiers and types across nested blocks via
//!   [`scope::ScopeManager`].
//! - [`evaluator`] walks the AST and populates the element graph,
//!   including constant folding and identifier/namespace introduction.
//! - [`diagnostics`] is the accumulating, explicitly-threaded error
//!   model every stage above reports into.
//! - [`config`] is the pure, filesystem-free `SessionConfig` layer.
//! - [`session`] ties all of the above together behind a single
//!   `Session::new(config).compile_file(path)` entry point.
//!
//! ```
//! use alder::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.compile_source(std::path::PathBuf::from("<doctest>"), "x := 1 + 2;".to_string());
//! assert!(!session.diagnostics().is_fatal());
//! ```

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod element;
pub mod evaluator;
pub mod lexer;
pub mod scope;
pub mod session;
pub mod source;
pub mod token;

pub use config::SessionConfig;
pub use diagnostics::{CoreError, Diagnostic, DiagnosticCode, DiagnosticResult};
pub use session::Session;

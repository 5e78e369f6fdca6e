//! `QualifiedSymbol` (SPEC_FULL.md §4.3 `make_qualified_symbol`): the
//! ordered namespace qualifiers plus the final name extracted from a
//! `symbol` AST subtree, e.g. `core::math::pi` → `namespaces: [core,
//! math], name: pi`.

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualifiedSymbol {
    pub namespaces: Vec<String>,
    pub name: String,
}

impl QualifiedSymbol {
    pub fn simple(name: impl Into<String>) -> QualifiedSymbol {
        QualifiedSymbol { namespaces: Vec::new(), name: name.into() }
    }

    pub fn is_qualified(&self) -> bool {
        !self.namespaces.is_empty()
    }

    /// Renders `a::b::c` for diagnostics and lookups.
    pub fn display(&self) -> String {
        if self.namespaces.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespaces.join("::"), self.name)
        }
    }

    /// Prepends a namespace segment — used by the `import ... from ...`
    /// handler, which inserts the `from` clause's name ahead of the
    /// imported symbol's own namespaces (SPEC_FULL.md §4.5
    /// import_expression).
    pub fn with_leading_namespace(mut self, namespace: impl Into<String>) -> QualifiedSymbol {
        self.namespaces.insert(0, namespace.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn displays_qualified_name() {
        let symbol = QualifiedSymbol { namespaces: vec!["core".into(), "math".into()], name: "pi".into() };
        assert_eq!(symbol.display(), "core::math::pi");
    }

    #[test]
    fn prepends_from_clause_namespace() {
        let symbol = QualifiedSymbol::simple("printf").with_leading_namespace("io");
        assert_eq!(symbol.display(), "io::printf");
    }
}

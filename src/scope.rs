//! The Program / Scope Manager (SPEC_FULL.md §4.4): owns the element
//! store and the two stacks (current scopes, current top-levels) that
//! the evaluator threads qualified lookups through. Push/pop is
//! enforced structurally with RAII guards (`ScopeGuard`/`TopLevelGuard`)
//! rather than by convention, so an early `?`-propagated diagnostic
//! failure can never leave the stack unbalanced (SPEC_FULL.md §5).

use std::ops::{Deref, DerefMut};

use crate::ast::{AstNodeKind, AstRef};
use crate::element::{Element, ElementId, ElementPayload, ElementStore, QualifiedSymbol};
use crate::source::Location;

/// The `{type, location}` pair `find_identifier_type` hands back: either
/// a resolved type, or none together with the location a caller should
/// attach to a follow-up diagnostic if it needs one (SPEC_FULL.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct TypeFindResult {
    pub type_id: Option<ElementId>,
    pub location: Option<Location>,
}

/// The scope stack, the top-level stack, and the element store they
/// both index into. Single-threaded and explicitly owned by the
/// `Session` — never a global (SPEC_FULL.md §5, §9 "never process-global").
pub struct ScopeManager {
    store: ElementStore,
    scopes: Vec<ElementId>,
    top_levels: Vec<ElementId>,
}

impl ScopeManager {
    pub fn new() -> ScopeManager {
        ScopeManager { store: ElementStore::new(), scopes: Vec::new(), top_levels: Vec::new() }
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ElementStore {
        &mut self.store
    }

    /// Pushes `block` as the innermost scope, returning a guard whose
    /// `Drop` pops it — every push is matched even across an early
    /// `?`-return from a handler holding the guard.
    pub fn push_scope(&mut self, block: ElementId) -> ScopeGuard<'_> {
        log::trace!("push scope {block}");
        self.scopes.push(block);
        ScopeGuard { manager: self }
    }

    pub fn current_scope(&self) -> Option<ElementId> {
        self.scopes.last().copied()
    }

    /// Pushes `block` onto the top-level stack (module/program roots,
    /// used to anchor qualified-name resolution for imports).
    pub fn push_top_level(&mut self, block: ElementId) -> TopLevelGuard<'_> {
        log::trace!("push top level {block}");
        self.top_levels.push(block);
        TopLevelGuard { manager: self }
    }

    pub fn current_top_level(&self) -> Option<ElementId> {
        self.top_levels.last().copied()
    }

    fn block_identifiers(&self, id: ElementId) -> Option<&std::collections::HashMap<String, ElementId>> {
        match &self.store.get(id)?.payload {
            ElementPayload::Block { identifiers, .. } => Some(identifiers),
            _ => None,
        }
    }

    fn block_types(&self, id: ElementId) -> Option<&std::collections::HashMap<String, ElementId>> {
        match &self.store.get(id)?.payload {
            ElementPayload::Block { types, .. } => Some(types),
            _ => None,
        }
    }

    /// Walks from `scope` up through `parent_id` links, returning the
    /// first element found in any ancestor's identifier table.
    fn walk_up_identifier(&self, scope: ElementId, name: &str) -> Option<ElementId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.block_identifiers(id).and_then(|map| map.get(name)).copied() {
                return Some(found);
            }
            current = self.store.get(id).and_then(|e| e.parent_id);
        }
        log::trace!("identifier lookup miss for '{name}' starting at scope {scope}");
        None
    }

    fn walk_up_type(&self, scope: ElementId, name: &str) -> Option<ElementId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.block_types(id).and_then(|map| map.get(name)).copied() {
                return Some(found);
            }
            current = self.store.get(id).and_then(|e| e.parent_id);
        }
        log::trace!("type lookup miss for '{name}' starting at scope {scope}");
        None
    }

    /// The block a qualifier identifier wraps. Usually a `namespace`
    /// (identifier -> initializer -> namespace -> block), but an
    /// identifier bound to an imported module (`io := module "io.ald";`)
    /// qualifies the same way — `io::write` walks through the module's
    /// own block instead (SPEC_FULL.md §4.4, §4.6).
    fn namespace_inner_block(&self, identifier_id: ElementId) -> Option<ElementId> {
        let identifier = self.store.get(identifier_id)?;
        let ElementPayload::Identifier { initializer, .. } = &identifier.payload else { return None };
        let initializer = self.store.get((*initializer)?)?;
        let ElementPayload::Initializer { expression } = &initializer.payload else { return None };
        self.unwrap_qualifiable_block(*expression)
    }

    /// Resolves an expression element down to the block it qualifies
    /// into, following `module_reference -> module -> block` as well as
    /// the plain `namespace -> block` case.
    fn unwrap_qualifiable_block(&self, expression_id: ElementId) -> Option<ElementId> {
        let expression = self.store.get(expression_id)?;
        match &expression.payload {
            ElementPayload::Namespace { expression } => Some(*expression),
            ElementPayload::Module { block, .. } => Some(*block),
            ElementPayload::ModuleReference { resolved } => self.unwrap_qualifiable_block((*resolved)?),
            _ => None,
        }
    }

    /// Resolves a qualified symbol starting at `scope`: each leading
    /// namespace segment is looked up by walking upward in turn (only
    /// the first segment needs the upward walk — once inside a
    /// namespace's own block, later segments are looked up directly in
    /// it), then the final name is looked up in the resolved leaf block
    /// only (SPEC_FULL.md §4.4 `find_identifier`).
    pub fn find_identifier(&self, scope: ElementId, symbol: &QualifiedSymbol) -> Option<ElementId> {
        if symbol.namespaces.is_empty() {
            return self.walk_up_identifier(scope, &symbol.name);
        }

        let mut namespaces = symbol.namespaces.iter();
        let first = namespaces.next().expect("qualified symbol checked non-empty above");
        let mut block = self.namespace_inner_block(self.walk_up_identifier(scope, first)?)?;

        for name in namespaces {
            let identifier = self.block_identifiers(block)?.get(name).copied()?;
            block = self.namespace_inner_block(identifier)?;
        }

        self.block_identifiers(block)?.get(&symbol.name).copied()
    }

    pub fn find_type(&self, scope: ElementId, symbol: &QualifiedSymbol) -> Option<ElementId> {
        if symbol.namespaces.is_empty() {
            return self.walk_up_type(scope, &symbol.name);
        }

        let mut namespaces = symbol.namespaces.iter();
        let first = namespaces.next().expect("qualified symbol checked non-empty above");
        let mut block = self.namespace_inner_block(self.walk_up_identifier(scope, first)?)?;

        for name in namespaces {
            let identifier = self.block_identifiers(block)?.get(name).copied()?;
            block = self.namespace_inner_block(identifier)?;
        }

        self.block_types(block)?.get(&symbol.name).copied()
    }

    pub fn find_type_up(&self, scope: ElementId, name: &str) -> Option<ElementId> {
        self.walk_up_type(scope, name)
    }

    /// Public door into `namespace_inner_block`, for identifier
    /// introduction's namespace-materialization walk (SPEC_FULL.md §4.6
    /// step 2): is `identifier_id` usable as a qualifier, and if so,
    /// which block does `a::b` continue resolving into?
    pub fn qualifier_block(&self, identifier_id: ElementId) -> Option<ElementId> {
        self.namespace_inner_block(identifier_id)
    }

    /// Reads a declared type annotation off a `symbol` node's `rhs`
    /// (the `type_identifier` the parser's colon infix attaches — see
    /// `ast::parser`'s `Colon` handling) and resolves it by name in
    /// `scope`. A missing annotation or an unresolvable name both yield
    /// an empty result; the caller decides whether that's an error
    /// (SPEC_FULL.md §4.4 `find_identifier_type`, §4.6 step 6).
    pub fn find_identifier_type(&self, scope: ElementId, declared: Option<&AstRef>) -> TypeFindResult {
        let Some(declared) = declared else { return TypeFindResult::default() };
        let node = declared.borrow();
        if node.kind != AstNodeKind::TypeIdentifier {
            return TypeFindResult::default();
        }
        let name = node.token.value.clone();
        let location = node.token.span.location();
        drop(node);

        match self.find_type(scope, &QualifiedSymbol::simple(name)) {
            Some(type_id) => TypeFindResult { type_id: Some(type_id), location },
            None => TypeFindResult { type_id: None, location },
        }
    }

    pub fn insert_identifier(&mut self, block: ElementId, name: impl Into<String>, id: ElementId) {
        if let Some(Element { payload: ElementPayload::Block { identifiers, .. }, .. }) = self.store.get_mut(block) {
            identifiers.insert(name.into(), id);
        }
    }

    pub fn insert_type(&mut self, block: ElementId, name: impl Into<String>, id: ElementId) {
        if let Some(Element { payload: ElementPayload::Block { types, .. }, .. }) = self.store.get_mut(block) {
            types.insert(name.into(), id);
        }
    }
}

impl Default for ScopeManager {
    fn default() -> ScopeManager {
        ScopeManager::new()
    }
}

/// RAII guard returned by `push_scope`; `Drop` pops the scope stack.
/// Derefs to `&/&mut ScopeManager` so callers keep using the manager
/// through the guard without an extra indirection at every call site.
pub struct ScopeGuard<'a> {
    manager: &'a mut ScopeManager,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let popped = self.manager.scopes.pop();
        log::trace!("pop scope {popped:?}");
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeManager;
    fn deref(&self) -> &ScopeManager {
        self.manager
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeManager {
        self.manager
    }
}

pub struct TopLevelGuard<'a> {
    manager: &'a mut ScopeManager,
}

impl Drop for TopLevelGuard<'_> {
    fn drop(&mut self) {
        let popped = self.manager.top_levels.pop();
        log::trace!("pop top level {popped:?}");
    }
}

impl Deref for TopLevelGuard<'_> {
    type Target = ScopeManager;
    fn deref(&self) -> &ScopeManager {
        self.manager
    }
}

impl DerefMut for TopLevelGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeManager {
        self.manager
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::element::builder::ElementBuilder;

    fn make_root(manager: &mut ScopeManager) -> ElementId {
        let id = manager.store_mut().alloc_id();
        manager.store_mut().put(Element {
            id,
            parent_id: None,
            location: None,
            attributes: Vec::new(),
            payload: ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        });
        id
    }

    #[test]
    fn scope_guard_pops_on_drop() {
        let mut manager = ScopeManager::new();
        let root = make_root(&mut manager);
        assert_eq!(manager.current_scope(), None);
        {
            let _guard = manager.push_scope(root);
        }
        assert_eq!(manager.current_scope(), None);
    }

    #[test]
    fn finds_identifier_in_enclosing_scope() {
        let mut manager = ScopeManager::new();
        let root = make_root(&mut manager);
        let builder = ElementBuilder::new();
        let child = builder.make_block(manager.store_mut(), root);

        let x = builder.make_identifier(manager.store_mut(), root, "x", None);
        manager.insert_identifier(root, "x", x);

        let found = manager.find_identifier(child, &QualifiedSymbol::simple("x"));
        assert_eq!(found, Some(x));
    }

    #[test]
    fn resolves_qualified_namespace_chain() {
        let mut manager = ScopeManager::new();
        let root = make_root(&mut manager);
        let builder = ElementBuilder::new();

        let math_block = builder.make_block(manager.store_mut(), root);
        let math_namespace = builder.make_namespace(manager.store_mut(), root, math_block);
        let math_init = builder.make_initializer(manager.store_mut(), root, math_namespace);
        let math_ident = builder.make_identifier(manager.store_mut(), root, "math", Some(math_init));
        manager.insert_identifier(root, "math", math_ident);

        let pi = builder.make_float(manager.store_mut(), math_block, 3.14);
        manager.insert_identifier(math_block, "pi", pi);

        let symbol = QualifiedSymbol { namespaces: vec!["math".to_string()], name: "pi".to_string() };
        assert_eq!(manager.find_identifier(root, &symbol), Some(pi));
    }
}

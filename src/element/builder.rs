//! The Element Builder (SPEC_FULL.md §4.3): a stateless factory for
//! semantic program elements. Every method takes the destination
//! `ElementStore` and the owning scope explicitly rather than holding
//! either itself — the evaluator and scope manager own that state, the
//! builder only knows how to stamp out fully formed elements with their
//! parent pointers set.

use crate::ast::{AstNodeKind, AstRef};
use crate::element::{
    CommentKind, CompositeTag, Element, ElementId, ElementPayload, ElementStore, LiteralValue,
    OperatorKind, ProcedureTypeData, QualifiedSymbol, TypeData, TypeKind, Usage,
};
use crate::scope::TypeFindResult;
use crate::source::Location;

#[derive(Default)]
pub struct ElementBuilder;

impl ElementBuilder {
    pub fn new() -> ElementBuilder {
        ElementBuilder
    }

    fn alloc(
        &self,
        store: &mut ElementStore,
        parent_id: Option<ElementId>,
        location: Option<Location>,
        payload: ElementPayload,
    ) -> ElementId {
        let id = store.alloc_id();
        store.put(Element { id, parent_id, location, attributes: Vec::new(), payload });
        id
    }

    pub fn make_block(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.alloc(
            store,
            Some(parent),
            None,
            ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        )
    }

    /// A module with no owning parent: every compiled source file gets
    /// one of these as its top-level element (SPEC_FULL.md §3 "every
    /// element has exactly one parent, except the program root").
    pub fn make_root_module(&self, store: &mut ElementStore, source: crate::source::SourceId) -> ElementId {
        let module_id = store.alloc_id();
        let block_id = self.alloc(
            store,
            None,
            None,
            ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        );
        store.get_mut(block_id).expect("just allocated").parent_id = Some(module_id);
        store.put(Element { id: module_id, parent_id: None, location: None, attributes: Vec::new(), payload: ElementPayload::Module { block: block_id, source } });
        module_id
    }

    /// A module reached via `import`/`module "path"` inside another
    /// module's scope, as opposed to `make_root_module`'s parentless
    /// top-level module. Same block-then-module allocation order so the
    /// block's own `parent_id` is the module, not `parent`.
    pub fn make_module_with_parent(&self, store: &mut ElementStore, parent: ElementId, source: crate::source::SourceId) -> ElementId {
        let module_id = store.alloc_id();
        let block_id = self.alloc(
            store,
            None,
            None,
            ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        );
        store.get_mut(block_id).expect("just allocated").parent_id = Some(module_id);
        store.put(Element { id: module_id, parent_id: Some(parent), location: None, attributes: Vec::new(), payload: ElementPayload::Module { block: block_id, source } });
        module_id
    }

    pub fn make_namespace(&self, store: &mut ElementStore, parent: ElementId, expression: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Namespace { expression })
    }

    pub fn make_identifier(
        &self,
        store: &mut ElementStore,
        parent: ElementId,
        symbol: impl Into<String>,
        initializer: Option<ElementId>,
    ) -> ElementId {
        self.alloc(
            store,
            Some(parent),
            None,
            ElementPayload::Identifier {
                symbol: symbol.into(),
                type_id: None,
                initializer,
                inferred_type: false,
                is_constant: false,
                usage: Usage::Stack,
            },
        )
    }

    pub fn make_initializer(&self, store: &mut ElementStore, parent: ElementId, expression: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Initializer { expression })
    }

    /// Extracts the ordered name parts from a `symbol` AST subtree into
    /// a `symbol` element (SPEC_FULL.md §4.3 `make_symbol_from_node`).
    /// The leading parts (all but the last) become `namespaces`.
    pub fn make_symbol_from_node(&self, store: &mut ElementStore, parent: ElementId, ast: &AstRef) -> ElementId {
        let node = ast.borrow();
        debug_assert_eq!(node.kind, AstNodeKind::Symbol);
        let parts: Vec<String> = node.children.iter().map(|p| p.borrow().token.value.clone()).collect();
        let location = node.token.span.location();
        drop(node);

        let (namespaces, name_parts) = if parts.len() > 1 {
            (parts[..parts.len() - 1].to_vec(), parts)
        } else {
            (Vec::new(), parts)
        };

        self.alloc(store, Some(parent), location, ElementPayload::SymbolElement { name_parts, namespaces })
    }

    /// Same extraction as `make_symbol_from_node`, but returned directly
    /// as a `QualifiedSymbol` struct rather than an owned element — used
    /// wherever the caller only needs the name to perform a lookup
    /// (SPEC_FULL.md §4.3 `make_qualified_symbol`).
    pub fn make_qualified_symbol(&self, ast: &AstRef) -> QualifiedSymbol {
        let node = ast.borrow();
        debug_assert_eq!(node.kind, AstNodeKind::Symbol);
        let mut parts: Vec<String> = node.children.iter().map(|p| p.borrow().token.value.clone()).collect();
        let name = parts.pop().unwrap_or_default();
        QualifiedSymbol { namespaces: parts, name }
    }

    pub fn make_identifier_reference(
        &self,
        store: &mut ElementStore,
        parent: ElementId,
        symbol: QualifiedSymbol,
        resolved: Option<ElementId>,
    ) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::IdentifierReference { symbol, resolved })
    }

    pub fn make_module_reference(&self, store: &mut ElementStore, parent: ElementId, resolved: Option<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ModuleReference { resolved })
    }

    pub fn make_import(
        &self,
        store: &mut ElementStore,
        parent: ElementId,
        identifier_reference: ElementId,
        from_reference: Option<ElementId>,
        owning_module: Option<ElementId>,
    ) -> ElementId {
        self.alloc(
            store,
            Some(parent),
            None,
            ElementPayload::Import { identifier_reference, from_reference, owning_module },
        )
    }

    fn make_type(&self, store: &mut ElementStore, parent: ElementId, data: TypeData) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Type(data))
    }

    pub fn make_numeric_type(
        &self,
        store: &mut ElementStore,
        parent: ElementId,
        name: impl Into<String>,
        size_in_bytes: u32,
        min: i128,
        max: i128,
        signed: bool,
    ) -> ElementId {
        self.make_type(
            store,
            parent,
            TypeData { name: name.into(), size_in_bytes, alignment: size_in_bytes.max(1), kind: TypeKind::Numeric { min, max, signed } },
        )
    }

    pub fn make_float_type(&self, store: &mut ElementStore, parent: ElementId, name: impl Into<String>, bits: u32) -> ElementId {
        let bytes = bits / 8;
        self.make_type(store, parent, TypeData { name: name.into(), size_in_bytes: bytes, alignment: bytes, kind: TypeKind::Float { bits } })
    }

    pub fn make_bool_type(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.make_type(store, parent, TypeData { name: "bool".into(), size_in_bytes: 1, alignment: 1, kind: TypeKind::Bool })
    }

    pub fn make_string_type(&self, store: &mut ElementStore, parent: ElementId, pointer_width: u32) -> ElementId {
        self.make_type(store, parent, TypeData { name: "string".into(), size_in_bytes: pointer_width, alignment: pointer_width, kind: TypeKind::Str })
    }

    pub fn make_any_type(&self, store: &mut ElementStore, parent: ElementId, pointer_width: u32) -> ElementId {
        self.make_type(store, parent, TypeData { name: "any".into(), size_in_bytes: pointer_width * 2, alignment: pointer_width, kind: TypeKind::Any })
    }

    pub fn make_namespace_type(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.make_type(store, parent, TypeData { name: "namespace".into(), size_in_bytes: 0, alignment: 1, kind: TypeKind::Namespace })
    }

    /// A placeholder type used when an identifier's declared type
    /// cannot yet be resolved — e.g. a forward reference to a type
    /// declared later in the same module (SPEC_FULL.md §4.3
    /// `make_unknown_type_from_find_result`). Carries no back-reference
    /// to the awaiting identifier itself (the identifier already points
    /// at this type via its own `type_id` field — see DESIGN.md), only
    /// the location the lookup failed at, for diagnostics.
    pub fn make_unknown_type_from_find_result(&self, store: &mut ElementStore, parent: ElementId, find_result: &TypeFindResult) -> ElementId {
        let id = self.make_type(store, parent, TypeData { name: "unknown".into(), size_in_bytes: 0, alignment: 1, kind: TypeKind::Unknown });
        if let Some(element) = store.get_mut(id) {
            element.location = find_result.location.clone();
        }
        id
    }

    pub fn make_array_type(&self, store: &mut ElementStore, parent: ElementId, element_type: ElementId, length: Option<ElementId>) -> ElementId {
        self.make_type(
            store,
            parent,
            TypeData { name: "array".into(), size_in_bytes: 0, alignment: 0, kind: TypeKind::Array { element_type, length } },
        )
    }

    pub fn make_pointer_type(&self, store: &mut ElementStore, parent: ElementId, pointee: ElementId, pointer_width: u32) -> ElementId {
        self.make_type(
            store,
            parent,
            TypeData { name: "pointer".into(), size_in_bytes: pointer_width, alignment: pointer_width, kind: TypeKind::Pointer { pointee } },
        )
    }

    pub fn make_tuple_type(&self, store: &mut ElementStore, parent: ElementId, fields: Vec<ElementId>) -> ElementId {
        self.make_type(store, parent, TypeData { name: "tuple".into(), size_in_bytes: 0, alignment: 0, kind: TypeKind::Tuple { fields } })
    }

    pub fn make_composite_type(&self, store: &mut ElementStore, parent: ElementId, tag: CompositeTag, scope: ElementId) -> ElementId {
        let name = match tag {
            CompositeTag::Struct => "struct",
            CompositeTag::Union => "union",
            CompositeTag::Enum => "enum",
        };
        self.make_type(
            store,
            parent,
            TypeData { name: name.into(), size_in_bytes: 0, alignment: 0, kind: TypeKind::Composite { tag, scope, fields: Default::default() } },
        )
    }

    pub fn make_procedure_type(&self, store: &mut ElementStore, parent: ElementId, scope: ElementId, pointer_width: u32) -> ElementId {
        self.make_type(
            store,
            parent,
            TypeData {
                name: "proc".into(),
                size_in_bytes: pointer_width,
                alignment: pointer_width,
                kind: TypeKind::Procedure(ProcedureTypeData { scope, parameters: Vec::new(), returns: Vec::new(), instances: Vec::new(), foreign: false }),
            },
        )
    }

    pub fn make_procedure_instance(&self, store: &mut ElementStore, parent: ElementId, parent_type: ElementId, body_block: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ProcedureInstance { parent_type, body_block })
    }

    pub fn make_procedure_call(&self, store: &mut ElementStore, parent: ElementId, callee: ElementId, arguments: Vec<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ProcedureCall { callee, arguments })
    }

    pub fn make_field(&self, store: &mut ElementStore, parent: ElementId, identifier: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Field { identifier })
    }

    pub fn make_attribute(&self, store: &mut ElementStore, parent: ElementId, name: impl Into<String>, expression: Option<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Attribute { name: name.into(), expression })
    }

    pub fn make_directive(&self, store: &mut ElementStore, parent: ElementId, name: impl Into<String>, expression: Option<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Directive { name: name.into(), expression })
    }

    pub fn make_statement(&self, store: &mut ElementStore, parent: ElementId, labels: Vec<String>, root: Option<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Statement { labels, root })
    }

    pub fn make_expression(&self, store: &mut ElementStore, parent: ElementId, inner: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Expression { inner })
    }

    pub fn make_unary_operator(&self, store: &mut ElementStore, parent: ElementId, op: OperatorKind, operand: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::UnaryOperator { op, operand })
    }

    pub fn make_binary_operator(&self, store: &mut ElementStore, parent: ElementId, op: OperatorKind, lhs: ElementId, rhs: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::BinaryOperator { op, lhs, rhs })
    }

    pub fn make_cast(&self, store: &mut ElementStore, parent: ElementId, target_type: ElementId, expression: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Cast { target_type, expression })
    }

    pub fn make_transmute(&self, store: &mut ElementStore, parent: ElementId, target_type: ElementId, expression: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Transmute { target_type, expression })
    }

    pub fn make_alias(&self, store: &mut ElementStore, parent: ElementId, target: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Alias { target })
    }

    pub fn make_comment(&self, store: &mut ElementStore, parent: ElementId, kind: CommentKind, text: impl Into<String>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Comment { kind, text: text.into() })
    }

    pub fn make_if(&self, store: &mut ElementStore, parent: ElementId, predicate: ElementId, true_branch: ElementId, false_branch: Option<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::IfElement { predicate, true_branch, false_branch })
    }

    pub fn make_return(&self, store: &mut ElementStore, parent: ElementId, expressions: Vec<ElementId>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ReturnElement { expressions })
    }

    pub fn make_for(&self, store: &mut ElementStore, parent: ElementId, induction: ElementId, expression: ElementId, body: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ForElement { induction, expression, body })
    }

    pub fn make_while(&self, store: &mut ElementStore, parent: ElementId, predicate: ElementId, body: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::WhileElement { predicate, body })
    }

    pub fn make_break(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::BreakElement)
    }

    pub fn make_continue(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::ContinueElement)
    }

    pub fn make_bool(&self, store: &mut ElementStore, parent: ElementId, value: bool) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Bool(value)))
    }

    pub fn make_integer(&self, store: &mut ElementStore, parent: ElementId, value: u64) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Integer(value)))
    }

    pub fn make_float(&self, store: &mut ElementStore, parent: ElementId, value: f64) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Float(value)))
    }

    pub fn make_string(&self, store: &mut ElementStore, parent: ElementId, value: impl Into<String>) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Str(value.into())))
    }

    pub fn make_char(&self, store: &mut ElementStore, parent: ElementId, value: char) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Char(value)))
    }

    pub fn make_null(&self, store: &mut ElementStore, parent: ElementId) -> ElementId {
        self.alloc(store, Some(parent), None, ElementPayload::Literal(LiteralValue::Null))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_a_block_and_nested_identifier() {
        let mut store = ElementStore::new();
        let builder = ElementBuilder::new();
        let root = store.alloc_id();
        store.put(Element { id: root, parent_id: None, location: None, attributes: vec![], payload: ElementPayload::Literal(LiteralValue::Null) });

        let block = builder.make_block(&mut store, root);
        let ident = builder.make_identifier(&mut store, block, "x", None);
        assert_eq!(store.get(ident).unwrap().parent_id, Some(block));
    }

    #[test]
    fn qualified_symbol_splits_namespaces_from_name() {
        use crate::ast::AstBuilder;
        use crate::token::{Token, TokenKind};
        use crate::source::{Source, Span};
        use std::rc::Rc;

        let source = Rc::new(Source::in_memory("core::math::pi"));
        let mut ast_builder = AstBuilder::new();
        let symbol = ast_builder.make_node(AstNodeKind::Symbol, Token::new(0, TokenKind::Identifier, "pi", Span::new(&source, 0, 1)));
        for (i, part) in ["core", "math", "pi"].iter().enumerate() {
            let part_node = ast_builder.make_node(AstNodeKind::SymbolPart, Token::new(i as u32 + 1, TokenKind::Identifier, *part, Span::new(&source, 0, 1)));
            ast_builder.adopt(&symbol, part_node);
        }

        let builder = ElementBuilder::new();
        let qualified = builder.make_qualified_symbol(&symbol);
        assert_eq!(qualified.namespaces, vec!["core".to_string(), "math".to_string()]);
        assert_eq!(qualified.name, "pi");
    }
}

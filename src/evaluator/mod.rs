//! The AST Evaluator (SPEC_FULL.md §4.5, §4.6): walks a parsed program
//! and builds the semantic element graph, resolving and introducing
//! identifiers as it goes. Dispatch is an exhaustive `match` over
//! `AstNodeKind` for the same reason the parser's parselet tables are —
//! the set of productions is closed, so there is no benefit to a
//! virtual-dispatch visitor (SPEC_FULL.md §9).

mod builtins;
mod expr;
mod operators;

pub use builtins::install as install_builtins;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::{AstNodeKind, AstRef};
use crate::config::SessionConfig;
use crate::diagnostics::{DiagnosticCode, DiagnosticResult};
use crate::element::builder::ElementBuilder;
use crate::element::{CompositeTag, ElementId, ElementPayload, LiteralValue, Usage};
use crate::lexer::Lexer;
use crate::scope::ScopeManager;
use crate::source::{SourceId, SourceRegistry};

/// The mutable state every evaluator handler threads through: the
/// scope/element graph, the loaded sources, the accumulating
/// diagnostics, and the read-only session configuration. Bundled so
/// handler signatures don't grow a parameter every time one of them
/// needs one more of these (SPEC_FULL.md §4.5).
pub struct EvalContext<'a> {
    pub scope: &'a mut ScopeManager,
    pub sources: &'a mut SourceRegistry,
    pub diagnostics: &'a mut DiagnosticResult,
    pub config: &'a SessionConfig,
}

/// Owns the element builder and the per-source-file module cache that
/// gives `module "path";` its idempotence (SPEC_FULL.md §4.7): asking
/// to compile the same canonical path twice returns the already-built
/// module element rather than re-evaluating its AST.
pub struct Evaluator {
    builder: ElementBuilder,
    module_cache: HashMap<SourceId, ElementId>,
    /// The source file each nested `compile_program`/`compile_module_file`
    /// call is currently working through, innermost last — lets
    /// `module_expression` resolve a relative path against the importing
    /// file's own directory without threading an extra parameter through
    /// every evaluator handler (SPEC_FULL.md §4.5 "module_expression").
    source_stack: Vec<SourceId>,
}

impl Default for Evaluator {
    fn default() -> Evaluator {
        Evaluator::new()
    }
}

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator { builder: ElementBuilder::new(), module_cache: HashMap::new(), source_stack: Vec::new() }
    }

    /// The directory of the source file currently being compiled, for
    /// resolving a relative `module "path";` reference.
    fn current_source_dir(&self, ctx: &EvalContext) -> Option<PathBuf> {
        let source_id = *self.source_stack.last()?;
        ctx.sources.get(source_id).path.parent().map(PathBuf::from)
    }

    /// Compiles a parsed program into a module element with no owning
    /// parent — the entry point for a `Session`'s top-level source file.
    /// Re-entrant compiles of an already-seen `source_id` return the
    /// cached module untouched (SPEC_FULL.md §4.7).
    pub fn compile_program(&mut self, ctx: &mut EvalContext, source_id: SourceId, program: &AstRef) -> ElementId {
        if let Some(&cached) = self.module_cache.get(&source_id) {
            return cached;
        }

        let node = program.borrow();
        if node.kind != AstNodeKind::Program {
            ctx.diagnostics.error(
                DiagnosticCode::ProgramRootMustBeProgramNode,
                format!("program root must be a program node, found '{}'", node.kind),
                node.token.span.location(),
            );
        }
        let body = node.children.first().cloned();
        drop(node);

        let module_id = self.builder.make_root_module(ctx.scope.store_mut(), source_id);
        self.source_stack.push(source_id);
        self.populate_module(ctx, module_id, body.as_ref());
        self.source_stack.pop();
        self.module_cache.insert(source_id, module_id);
        module_id
    }

    /// Loads and compiles the file at `path` (resolved relative to
    /// `relative_to`, the importing module's own source directory),
    /// returning the existing module untouched if it was already
    /// compiled — the idempotence `module_expression` needs
    /// (SPEC_FULL.md §4.5, §4.7).
    fn compile_module_file(&mut self, ctx: &mut EvalContext, parent: ElementId, relative_to: Option<&Path>, raw_path: &str) -> Option<ElementId> {
        let candidate = PathBuf::from(raw_path);
        let full_path = if candidate.is_relative() {
            relative_to.map(|dir| dir.join(&candidate)).unwrap_or(candidate)
        } else {
            candidate
        };

        let source_id = match ctx.sources.load(&full_path) {
            Ok(id) => id,
            Err(error) => {
                ctx.diagnostics.error(DiagnosticCode::ModuleLoadFailed, format!("could not load module '{raw_path}': {error}"), None);
                return None;
            }
        };

        if let Some(&cached) = self.module_cache.get(&source_id) {
            return Some(cached);
        }

        let source = ctx.sources.get(source_id).clone();
        let lexer = Lexer::new(source);
        let mut parser = crate::ast::parser::Parser::new(lexer);
        let program = parser.parse_program(ctx.diagnostics);

        let node = program.borrow();
        if node.kind != AstNodeKind::Program {
            ctx.diagnostics.error(DiagnosticCode::ProgramRootMustBeProgramNode, "imported module did not parse to a program node", None);
        }
        let body = node.children.first().cloned();
        drop(node);

        let module_id = self.builder.make_module_with_parent(ctx.scope.store_mut(), parent, source_id);
        self.source_stack.push(source_id);
        self.populate_module(ctx, module_id, body.as_ref());
        self.source_stack.pop();
        self.module_cache.insert(source_id, module_id);
        Some(module_id)
    }

    fn populate_module(&mut self, ctx: &mut EvalContext, module_id: ElementId, body: Option<&AstRef>) {
        let block_id = match ctx.scope.store().get(module_id).map(|e| &e.payload) {
            Some(ElementPayload::Module { block, .. }) => *block,
            _ => return,
        };

        let _top = ctx.scope.push_top_level(block_id);
        let mut guard = ctx.scope.push_scope(block_id);
        if let Some(body) = body {
            let mut inner = EvalContext { scope: &mut *guard, sources: &mut *ctx.sources, diagnostics: &mut *ctx.diagnostics, config: ctx.config };
            self.eval_block_body(&mut inner, block_id, body);
        }
    }

    /// Evaluates a `basic_block`'s children into `block_id`'s
    /// comment/attribute/import/statement collections. Shared by module
    /// compilation and every nested scope (`if`/`while`/`for`/`proc`
    /// bodies) — they differ only in whether the caller also pushed a
    /// top-level frame (SPEC_FULL.md §4.5 "module" / "statement").
    fn eval_block_body(&mut self, ctx: &mut EvalContext, block_id: ElementId, block_ast: &AstRef) {
        let children = block_ast.borrow().children.clone();
        for child in children {
            self.eval_block_item(ctx, block_id, &child);
        }
    }

    /// Pushes a fresh block as the current scope, evaluates `block_ast`
    /// into it, and returns the block element — used for every nested
    /// body (`if`/`while`/`for`/`else`) that doesn't also need a
    /// top-level frame.
    fn eval_nested_block(&mut self, ctx: &mut EvalContext, parent_scope: ElementId, block_ast: &AstRef) -> ElementId {
        let block_id = self.builder.make_block(ctx.scope.store_mut(), parent_scope);
        let mut guard = ctx.scope.push_scope(block_id);
        let mut inner = EvalContext { scope: &mut *guard, sources: &mut *ctx.sources, diagnostics: &mut *ctx.diagnostics, config: ctx.config };
        self.eval_block_body(&mut inner, block_id, block_ast);
        block_id
    }

    fn eval_block_item(&mut self, ctx: &mut EvalContext, block_id: ElementId, item: &AstRef) {
        let kind = item.borrow().kind;
        match kind {
            AstNodeKind::LineComment | AstNodeKind::BlockComment => {
                let comment_id = self.eval_comment(ctx, block_id, item);
                push_block_field(ctx, block_id, comment_id, |b| &mut b.comments);
            }
            AstNodeKind::Statement => self.eval_statement(ctx, block_id, item),
            _ => {
                // A bare expression reached the block loop directly —
                // only possible for attributes/labels already drained
                // by `parse_statement`, or a malformed tree.
                let location = item.borrow().token.span.location();
                ctx.diagnostics.error(DiagnosticCode::InvalidStatement, format!("unexpected top-level node '{kind}'"), location);
            }
        }
    }

    /// Classifies a `statement` node's root expression into
    /// comment/import/attribute/statement (SPEC_FULL.md §4.5 "module:
    /// classifies the result") and installs it in `block_id`'s matching
    /// collection.
    fn eval_statement(&mut self, ctx: &mut EvalContext, block_id: ElementId, statement_ast: &AstRef) {
        let node = statement_ast.borrow();
        let labels: Vec<String> = node
            .lhs
            .as_ref()
            .map(|list| list.borrow().children.iter().map(|l| l.borrow().token.value.clone()).collect())
            .unwrap_or_default();
        let rhs = node.rhs.clone();
        drop(node);

        let Some(rhs) = rhs else { return };
        self.collect_attached_attributes(ctx, block_id, &rhs);

        if rhs.borrow().kind == AstNodeKind::Import {
            if let Some(import_id) = self.eval_import(ctx, block_id, &rhs) {
                push_block_field(ctx, block_id, import_id, |b| &mut b.imports);
            }
            return;
        }

        let root = self.eval_declaration_or_expression(ctx, block_id, &rhs);
        let statement_id = self.builder.make_statement(ctx.scope.store_mut(), block_id, labels, root);
        push_block_field(ctx, block_id, statement_id, |b| &mut b.statements);
    }

    /// Any `attribute` node a statement's rhs adopted after the fact
    /// (`parser::parse_statement`'s pending-attribute flush) is a child
    /// of that rhs node, not a distinct top-level item — collect and
    /// evaluate them into the enclosing block's `attributes` list.
    fn collect_attached_attributes(&mut self, ctx: &mut EvalContext, block_id: ElementId, rhs: &AstRef) {
        let attached: Vec<AstRef> = rhs.borrow().children.iter().filter(|c| c.borrow().kind == AstNodeKind::Attribute).cloned().collect();
        for attribute_ast in attached {
            let attribute_id = self.eval_attribute(ctx, block_id, &attribute_ast);
            push_block_field(ctx, block_id, attribute_id, |b| &mut b.attributes);
        }
    }

    /// The non-import half of statement classification: a bare symbol
    /// is a declaration with no initializer, an `assignment` is a
    /// declaration or reassignment (possibly several, comma-paired),
    /// and everything else is evaluated as a plain expression.
    fn eval_declaration_or_expression(&mut self, ctx: &mut EvalContext, scope_block: ElementId, rhs: &AstRef) -> Option<ElementId> {
        match rhs.borrow().kind {
            AstNodeKind::Symbol => self.declare(ctx, scope_block, rhs, None),
            AstNodeKind::Assignment => self.eval_assignment(ctx, scope_block, rhs),
            _ => self.eval_expression(ctx, scope_block, rhs),
        }
    }

    /// `a, b := 1, 2;` and plain reassignment (SPEC_FULL.md §4.5
    /// "assignment"). Arity mismatch between the flattened target and
    /// source lists is P027 and aborts the whole statement — there is
    /// no sensible partial pairing to fall back to.
    fn eval_assignment(&mut self, ctx: &mut EvalContext, scope_block: ElementId, node: &AstRef) -> Option<ElementId> {
        let borrowed = node.borrow();
        let lhs = borrowed.lhs.clone()?;
        let rhs = borrowed.rhs.clone()?;
        let location = borrowed.token.span.location();
        drop(borrowed);

        let targets = crate::ast::parser::pairs_to_list(lhs);
        let sources = crate::ast::parser::pairs_to_list(rhs);
        if targets.len() != sources.len() {
            ctx.diagnostics.error(
                DiagnosticCode::AssignmentArityMismatch,
                format!("assignment has {} target(s) but {} source(s)", targets.len(), sources.len()),
                location,
            );
            return None;
        }

        let mut last = None;
        for (target, source) in targets.iter().zip(sources.iter()) {
            if target.borrow().kind != AstNodeKind::Symbol {
                let location = target.borrow().token.span.location();
                ctx.diagnostics.error(DiagnosticCode::InvalidStatement, "assignment target must be a symbol", location);
                continue;
            }

            let qualified = self.builder.make_qualified_symbol(target);
            let existing = ctx.scope.find_identifier(scope_block, &qualified);

            last = match existing {
                Some(existing_id) => {
                    let rhs_value = self.eval_expression(ctx, scope_block, source)?;
                    let target_ref = self.builder.make_identifier_reference(ctx.scope.store_mut(), scope_block, qualified, Some(existing_id));
                    Some(self.builder.make_binary_operator(ctx.scope.store_mut(), scope_block, crate::element::OperatorKind::Assign, target_ref, rhs_value))
                }
                None => self.declare(ctx, scope_block, target, Some(source)),
            };
        }
        last
    }

    /// Identifier introduction (SPEC_FULL.md §4.6): materializes any
    /// leading qualified-namespace segments, evaluates and constant-folds
    /// the initializer, resolves the declared-or-inferred type, and
    /// installs the finished identifier in its resolved scope.
    fn declare(&mut self, ctx: &mut EvalContext, declaring_scope: ElementId, symbol_ast: &AstRef, initializer_ast: Option<&AstRef>) -> Option<ElementId> {
        let qualified = self.builder.make_qualified_symbol(symbol_ast);
        let location = symbol_ast.borrow().token.span.location();

        // Step 1/2: resolve (materializing as needed) the scope the
        // name's final segment actually lives in.
        let mut current_scope = if qualified.is_qualified() { ctx.scope.current_top_level().unwrap_or(declaring_scope) } else { declaring_scope };

        for namespace_name in &qualified.namespaces {
            current_scope = match ctx.scope.find_identifier(current_scope, &crate::element::QualifiedSymbol::simple(namespace_name.clone())) {
                Some(existing) => match ctx.scope.qualifier_block(existing) {
                    Some(block) => block,
                    None => {
                        ctx.diagnostics.error(DiagnosticCode::NonNamespaceQualifier, format!("'{namespace_name}' does not name a namespace"), location.clone());
                        return None;
                    }
                },
                None => self.materialize_namespace(ctx, current_scope, namespace_name),
            };
        }

        // Step 3: evaluate the initializer in the resolved scope.
        let raw_initializer = initializer_ast.and_then(|ast| self.eval_expression(ctx, current_scope, ast));

        // Step 4: a bare unresolved name as an initializer is rewritten
        // into an identifier-reference rather than left a dangling
        // `symbol` element.
        if let Some(init_id) = raw_initializer {
            self.rewrite_bare_symbol(ctx, current_scope, init_id);
        }

        // Step 5: wrap the initializer and attempt constant folding.
        let initializer_wrapper = raw_initializer.map(|expr_id| {
            let wrapper = self.builder.make_initializer(ctx.scope.store_mut(), current_scope, expr_id);
            self.try_fold(ctx, current_scope, wrapper);
            wrapper
        });

        let initializer_expression = initializer_wrapper.and_then(|wrapper| match ctx.scope.store().get(wrapper).map(|e| &e.payload) {
            Some(ElementPayload::Initializer { expression }) => Some(*expression),
            _ => None,
        });

        // Step 6: resolve the declared or inferred type.
        let declared = symbol_ast.borrow().rhs.clone();
        let find_result = ctx.scope.find_identifier_type(current_scope, declared.as_ref());
        let (type_id, inferred) = if let Some(base_type_id) = find_result.type_id {
            let declared_ref = declared.as_ref().expect("find_identifier_type only resolves a declared annotation");
            (Some(self.apply_type_modifiers(ctx, current_scope, declared_ref, base_type_id)), false)
        } else if declared.is_some() {
            ctx.diagnostics.error(DiagnosticCode::UnknownType, format!("unknown type for '{}'", qualified.display()), find_result.location.clone());
            (Some(self.builder.make_unknown_type_from_find_result(ctx.scope.store_mut(), current_scope, &find_result)), false)
        } else if let Some(expr_id) = initializer_expression {
            (self.infer_type_from_element(ctx, current_scope, expr_id), true)
        } else {
            (None, false)
        };

        // Step 7: no annotation, no initializer, nothing to infer from.
        if type_id.is_none() && initializer_expression.is_none() {
            ctx.diagnostics.error(DiagnosticCode::UnableToInferType, format!("unable to infer type for '{}'", qualified.display()), location.clone());
        }
        let final_type_id = type_id.or_else(|| Some(self.builder.make_unknown_type_from_find_result(ctx.scope.store_mut(), current_scope, &find_result)));

        let is_constant = initializer_expression.map(|id| ctx.scope.store().get(id).map(|e| e.payload.is_constant()).unwrap_or(false)).unwrap_or(false);

        let identifier_id = self.builder.make_identifier(ctx.scope.store_mut(), current_scope, qualified.name.clone(), initializer_wrapper);
        if let Some(element) = ctx.scope.store_mut().get_mut(identifier_id) {
            if let ElementPayload::Identifier { type_id: slot, inferred_type, is_constant: const_slot, .. } = &mut element.payload {
                *slot = final_type_id;
                *inferred_type = inferred;
                *const_slot = is_constant;
            }
        }

        // Step 8: a procedure-typed initializer gets a procedure
        // instance built from its own scope.
        if let Some(expr_id) = initializer_expression {
            self.build_procedure_instance_if_needed(ctx, current_scope, expr_id);
            // A type-valued initializer is also nameable as a type
            // (SPEC_FULL.md §9 open question — see DESIGN.md). A bare
            // name naming a builtin or alias type arrives here as a
            // resolved `identifier_reference`; chase it to the target
            // identifier's own `type_id` the same way
            // `infer_type_from_element` does.
            let aliased_type_id = match ctx.scope.store().get(expr_id).map(|e| &e.payload) {
                Some(ElementPayload::Type(_)) => Some(expr_id),
                Some(ElementPayload::IdentifierReference { resolved: Some(target), .. }) => {
                    match ctx.scope.store().get(*target).map(|e| &e.payload) {
                        Some(ElementPayload::Identifier { type_id: Some(target_type_id), .. }) => Some(*target_type_id),
                        _ => None,
                    }
                }
                _ => None,
            };
            if let Some(type_id) = aliased_type_id {
                ctx.scope.insert_type(current_scope, qualified.name.clone(), type_id);
            }
        }

        // Step 9: install the identifier under its resolved scope.
        ctx.scope.insert_identifier(current_scope, qualified.name, identifier_id);
        Some(identifier_id)
    }

    /// Creates a fresh `block` + `namespace` + `identifier` triple for
    /// an as-yet-unseen qualifier segment and installs it in `scope`
    /// (SPEC_FULL.md §4.6 step 2 "Namespace Materialization").
    fn materialize_namespace(&mut self, ctx: &mut EvalContext, scope: ElementId, name: &str) -> ElementId {
        let block_id = self.builder.make_block(ctx.scope.store_mut(), scope);
        let namespace_id = self.builder.make_namespace(ctx.scope.store_mut(), scope, block_id);
        let initializer_id = self.builder.make_initializer(ctx.scope.store_mut(), scope, namespace_id);
        let namespace_type = ctx.scope.find_type_up(scope, "namespace");

        let identifier_id = self.builder.make_identifier(ctx.scope.store_mut(), scope, name, Some(initializer_id));
        if let Some(element) = ctx.scope.store_mut().get_mut(identifier_id) {
            if let ElementPayload::Identifier { type_id, is_constant, .. } = &mut element.payload {
                *type_id = namespace_type;
                *is_constant = true;
            }
        }
        ctx.scope.insert_identifier(scope, name, identifier_id);
        block_id
    }

    fn rewrite_bare_symbol(&mut self, ctx: &mut EvalContext, scope: ElementId, element_id: ElementId) {
        let replacement = match ctx.scope.store().get(element_id).map(|e| &e.payload) {
            Some(ElementPayload::SymbolElement { name_parts, namespaces }) => {
                let name = name_parts.last().cloned().unwrap_or_default();
                let symbol = crate::element::QualifiedSymbol { namespaces: namespaces.clone(), name };
                let resolved = ctx.scope.find_identifier(scope, &symbol);
                Some(ElementPayload::IdentifierReference { symbol, resolved })
            }
            _ => None,
        };
        if let Some(payload) = replacement {
            if let Some(element) = ctx.scope.store_mut().get_mut(element_id) {
                element.payload = payload;
            }
        }
    }

    /// Attempts constant folding on an `initializer`'s wrapped
    /// expression (SPEC_FULL.md §4.6 step 5): folds a unary/binary
    /// operator over literal operands into a single literal, freeing
    /// the old operator element and repointing the initializer at the
    /// new one while preserving every other element's id.
    fn try_fold(&mut self, ctx: &mut EvalContext, scope: ElementId, initializer_id: ElementId) {
        let expression_id = match ctx.scope.store().get(initializer_id).map(|e| &e.payload) {
            Some(ElementPayload::Initializer { expression }) => *expression,
            _ => return,
        };

        let folded = match ctx.scope.store().get(expression_id).map(|e| &e.payload) {
            Some(ElementPayload::UnaryOperator { op, operand }) => {
                let literal = ctx.scope.store().get(*operand).and_then(|e| e.payload.as_literal());
                literal.and_then(|value| operators::fold_unary(*op, value))
            }
            Some(ElementPayload::BinaryOperator { op, lhs, rhs }) => {
                let lhs_literal = ctx.scope.store().get(*lhs).and_then(|e| e.payload.as_literal()).cloned();
                let rhs_literal = ctx.scope.store().get(*rhs).and_then(|e| e.payload.as_literal()).cloned();
                match (lhs_literal, rhs_literal) {
                    (Some(a), Some(b)) => operators::fold_binary(*op, &a, &b),
                    _ => None,
                }
            }
            _ => None,
        };

        let Some(folded) = folded else { return };
        ctx.scope.store_mut().remove(expression_id);
        let new_id = match folded {
            LiteralValue::Bool(v) => self.builder.make_bool(ctx.scope.store_mut(), scope, v),
            LiteralValue::Integer(v) => self.builder.make_integer(ctx.scope.store_mut(), scope, v),
            LiteralValue::Float(v) => self.builder.make_float(ctx.scope.store_mut(), scope, v),
            LiteralValue::Str(v) => self.builder.make_string(ctx.scope.store_mut(), scope, v),
            LiteralValue::Char(v) => self.builder.make_char(ctx.scope.store_mut(), scope, v),
            LiteralValue::Null => self.builder.make_null(ctx.scope.store_mut(), scope),
        };
        if let Some(element) = ctx.scope.store_mut().get_mut(initializer_id) {
            if let ElementPayload::Initializer { expression } = &mut element.payload {
                *expression = new_id;
            }
        }
    }

    /// Infers a declaration's type from its (already folded)
    /// initializer element (SPEC_FULL.md §4.6 step 6). Integer/float
    /// literal defaults are judgment calls recorded in DESIGN.md; every
    /// other case propagates a type that's already on hand.
    fn infer_type_from_element(&mut self, ctx: &mut EvalContext, scope: ElementId, element_id: ElementId) -> Option<ElementId> {
        match ctx.scope.store().get(element_id).map(|e| e.payload.clone()) {
            Some(ElementPayload::Literal(LiteralValue::Integer(_))) => ctx.scope.find_type_up(scope, &ctx.config.default_integer_type.clone()),
            Some(ElementPayload::Literal(LiteralValue::Float(_))) => ctx.scope.find_type_up(scope, "f64"),
            Some(ElementPayload::Literal(LiteralValue::Bool(_))) => ctx.scope.find_type_up(scope, "bool"),
            Some(ElementPayload::Literal(LiteralValue::Str(_))) => ctx.scope.find_type_up(scope, "string"),
            Some(ElementPayload::Literal(LiteralValue::Char(_))) => ctx.scope.find_type_up(scope, "u8"),
            Some(ElementPayload::Literal(LiteralValue::Null)) => ctx.scope.find_type_up(scope, "any"),
            Some(ElementPayload::IdentifierReference { resolved: Some(target), .. }) => match ctx.scope.store().get(target).map(|e| &e.payload) {
                Some(ElementPayload::Identifier { type_id, .. }) => *type_id,
                _ => None,
            },
            Some(ElementPayload::Type(_)) => Some(element_id),
            Some(ElementPayload::Alias { target }) => self.infer_type_from_element(ctx, scope, target),
            Some(ElementPayload::ModuleReference { .. }) => ctx.scope.find_type_up(scope, "namespace"),
            _ => None,
        }
    }

    /// Wraps a resolved base type per the `type_identifier` node's own
    /// flag word (SPEC_FULL.md §3 "a flag word (array / pointer /
    /// spread)"): `array` builds an array type around the (optionally
    /// evaluated) bracketed length expression on the node's `lhs`, then
    /// `pointer` builds a pointer type around whatever that produced —
    /// `*[4]u32` is a pointer to an array of four `u32`, matching the
    /// surface order the flags were set in by `parse_type_identifier`.
    fn apply_type_modifiers(&mut self, ctx: &mut EvalContext, scope: ElementId, declared: &AstRef, base_type_id: ElementId) -> ElementId {
        let node = declared.borrow();
        let flags = node.flags;
        let length_ast = node.lhs.clone();
        drop(node);

        let mut type_id = base_type_id;
        if flags.array {
            let length = length_ast.and_then(|ast| self.eval_expression(ctx, scope, &ast));
            type_id = self.builder.make_array_type(ctx.scope.store_mut(), scope, type_id, length);
        }
        if flags.pointer {
            let pointer_width = ctx.config.pointer_width.bytes();
            type_id = self.builder.make_pointer_type(ctx.scope.store_mut(), scope, type_id, pointer_width);
        }
        type_id
    }

    fn build_procedure_instance_if_needed(&mut self, ctx: &mut EvalContext, scope: ElementId, expr_id: ElementId) {
        let proc_scope = match ctx.scope.store().get(expr_id).map(|e| &e.payload) {
            Some(ElementPayload::Type(data)) => match &data.kind {
                crate::element::TypeKind::Procedure(p) => Some((p.scope, p.foreign)),
                _ => None,
            },
            _ => None,
        };
        let Some((proc_scope, foreign)) = proc_scope else { return };
        if foreign {
            return;
        }
        let instance_id = self.builder.make_procedure_instance(ctx.scope.store_mut(), scope, expr_id, proc_scope);
        if let Some(element) = ctx.scope.store_mut().get_mut(expr_id) {
            if let ElementPayload::Type(data) = &mut element.payload {
                if let crate::element::TypeKind::Procedure(p) = &mut data.kind {
                    p.instances.push(instance_id);
                }
            }
        }
    }

    fn eval_comment(&mut self, ctx: &mut EvalContext, scope: ElementId, node: &AstRef) -> ElementId {
        let borrowed = node.borrow();
        let kind = if borrowed.kind == AstNodeKind::LineComment { crate::element::CommentKind::Line } else { crate::element::CommentKind::Block };
        let text = borrowed.token.value.clone();
        drop(borrowed);
        self.builder.make_comment(ctx.scope.store_mut(), scope, kind, text)
    }

    fn composite_default_field_type(&self, ctx: &EvalContext, scope: ElementId, tag: CompositeTag) -> Option<ElementId> {
        match tag {
            CompositeTag::Enum => ctx.scope.find_type_up(scope, &ctx.config.default_integer_type),
            CompositeTag::Struct | CompositeTag::Union => None,
        }
    }

    /// `proc(...)` parameters: a bare symbol (stack usage, no default)
    /// or an `assignment` (a default value expression). Both forms
    /// build an `identifier` plus wrapping `field`, installed into the
    /// procedure's own scope (SPEC_FULL.md §4.5 proc_expression).
    fn eval_parameter(&mut self, ctx: &mut EvalContext, proc_scope: ElementId, param_ast: &AstRef) -> Option<ElementId> {
        let kind = param_ast.borrow().kind;
        let (symbol_ast, default_ast) = match kind {
            AstNodeKind::Assignment => {
                let borrowed = param_ast.borrow();
                (borrowed.lhs.clone()?, borrowed.rhs.clone())
            }
            AstNodeKind::Symbol => (param_ast.clone(), None),
            _ => {
                let location = param_ast.borrow().token.span.location();
                ctx.diagnostics.error(DiagnosticCode::InvalidParameterDeclaration, format!("invalid parameter declaration '{kind}'"), location);
                return None;
            }
        };

        let name = self.builder.make_qualified_symbol(&symbol_ast).name;
        let default_id = default_ast.as_ref().and_then(|ast| self.eval_expression(ctx, proc_scope, ast));
        let initializer_id = default_id.map(|id| self.builder.make_initializer(ctx.scope.store_mut(), proc_scope, id));

        let declared = symbol_ast.borrow().rhs.clone();
        let find_result = ctx.scope.find_identifier_type(proc_scope, declared.as_ref());
        let type_id = match (find_result.type_id, declared.as_ref()) {
            (Some(base_type_id), Some(declared_ref)) => Some(self.apply_type_modifiers(ctx, proc_scope, declared_ref, base_type_id)),
            _ => default_id.and_then(|id| self.infer_type_from_element(ctx, proc_scope, id)),
        };
        let type_id = Some(type_id.unwrap_or_else(|| self.builder.make_unknown_type_from_find_result(ctx.scope.store_mut(), proc_scope, &find_result)));

        let identifier_id = self.builder.make_identifier(ctx.scope.store_mut(), proc_scope, name.clone(), initializer_id);
        if let Some(element) = ctx.scope.store_mut().get_mut(identifier_id) {
            if let ElementPayload::Identifier { type_id: slot, usage, .. } = &mut element.payload {
                *slot = type_id;
                *usage = Usage::Stack;
            }
        }
        ctx.scope.insert_identifier(proc_scope, name, identifier_id);
        Some(self.builder.make_field(ctx.scope.store_mut(), proc_scope, identifier_id))
    }
}

/// Pushes `id` onto one of `block_id`'s `Block` payload vectors,
/// selected by `select` (e.g. `|b| &mut b.statements`). A no-op if
/// `block_id` doesn't resolve to a block — callers always pass an id
/// this evaluator itself just allocated as a block.
fn push_block_field(ctx: &mut EvalContext, block_id: ElementId, id: ElementId, select: impl FnOnce(&mut BlockFields) -> &mut Vec<ElementId>) {
    if let Some(element) = ctx.scope.store_mut().get_mut(block_id) {
        if let ElementPayload::Block { blocks, statements, comments, imports, attributes, .. } = &mut element.payload {
            let mut fields = BlockFields { blocks, statements, comments, imports, attributes };
            select(&mut fields).push(id);
        }
    }
}

struct BlockFields<'a> {
    blocks: &'a mut Vec<ElementId>,
    statements: &'a mut Vec<ElementId>,
    comments: &'a mut Vec<ElementId>,
    imports: &'a mut Vec<ElementId>,
    attributes: &'a mut Vec<ElementId>,
}

//! Expression-position evaluation (SPEC_FULL.md §4.5): one method per
//! `AstNodeKind` that can appear as a statement's root or an operand,
//! fanned out from `eval_expression`'s exhaustive match the same way
//! the parser's prefix/infix tables are exhaustive matches over
//! `TokenKind` rather than a dispatch table keyed by node type.

use crate::ast::{AstNodeKind, AstRef};
use crate::diagnostics::DiagnosticCode;
use crate::element::{CompositeTag, ElementId, ElementPayload, LiteralValue, OperatorKind, QualifiedSymbol, TypeKind, Usage};
use crate::token::{ConversionResult, NumberType};

use super::{operators, EvalContext, Evaluator};

impl Evaluator {
    /// The expression dispatcher. Every node kind the parser can leave
    /// in a statement's `rhs`, an operand position, or a wrapped
    /// construct's `lhs` lands here.
    pub(super) fn eval_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let kind = ast.borrow().kind;
        match kind {
            AstNodeKind::NumberLiteral => self.number_literal(ctx, scope, ast),
            AstNodeKind::StringLiteral => {
                let value = ast.borrow().token.value.clone();
                Some(self.builder.make_string(ctx.scope.store_mut(), scope, value))
            }
            AstNodeKind::CharacterLiteral => {
                let ch = ast.borrow().token.value.chars().next().unwrap_or('\0');
                Some(self.builder.make_char(ctx.scope.store_mut(), scope, ch))
            }
            AstNodeKind::BooleanLiteral => {
                let value = ast.borrow().token.as_bool();
                Some(self.builder.make_bool(ctx.scope.store_mut(), scope, value))
            }
            AstNodeKind::NullLiteral | AstNodeKind::NoneLiteral => Some(self.builder.make_null(ctx.scope.store_mut(), scope)),

            AstNodeKind::Symbol => Some(self.builder.make_symbol_from_node(ctx.scope.store_mut(), scope, ast)),

            AstNodeKind::UnaryOperator => self.unary_operator(ctx, scope, ast),
            AstNodeKind::BinaryOperator => self.binary_operator(ctx, scope, ast),
            AstNodeKind::SubscriptExpression => self.subscript_expression(ctx, scope, ast),
            AstNodeKind::Assignment => self.eval_assignment(ctx, scope, ast),

            AstNodeKind::Cast => self.cast_expression(ctx, scope, ast, false),
            AstNodeKind::Transmute => self.cast_expression(ctx, scope, ast, true),

            AstNodeKind::ProcExpression => self.proc_expression(ctx, scope, ast),
            AstNodeKind::ProcCall => self.proc_call(ctx, scope, ast),

            AstNodeKind::IfExpression | AstNodeKind::ElseIfExpression => self.if_expression(ctx, scope, ast),
            AstNodeKind::ElseExpression => self.else_expression(ctx, scope, ast),

            AstNodeKind::ForIn => self.for_in_statement(ctx, scope, ast),
            AstNodeKind::While => self.while_statement(ctx, scope, ast),
            AstNodeKind::Break => Some(self.builder.make_break(ctx.scope.store_mut(), scope)),
            AstNodeKind::Continue => Some(self.builder.make_continue(ctx.scope.store_mut(), scope)),
            AstNodeKind::Return => self.return_statement(ctx, scope, ast),

            AstNodeKind::Namespace => self.namespace_expression(ctx, scope, ast),
            AstNodeKind::Struct => self.composite_expression(ctx, scope, ast, CompositeTag::Struct),
            AstNodeKind::Union => self.composite_expression(ctx, scope, ast, CompositeTag::Union),
            AstNodeKind::Enum => self.composite_expression(ctx, scope, ast, CompositeTag::Enum),

            AstNodeKind::Module => self.module_expression(ctx, scope, ast),
            AstNodeKind::Import => self.eval_import(ctx, scope, ast),
            AstNodeKind::Alias => self.alias_expression(ctx, scope, ast),

            // Neither carries its own element kind — both are
            // transparent wrappers around a single expression.
            AstNodeKind::Defer | AstNodeKind::With => {
                let inner = ast.borrow().lhs.clone()?;
                self.resolve_symbol_or_evaluate(ctx, scope, &inner)
            }

            AstNodeKind::Expression => {
                let inner_ast = ast.borrow().lhs.clone()?;
                let inner = self.eval_expression(ctx, scope, &inner_ast)?;
                Some(self.builder.make_expression(ctx.scope.store_mut(), scope, inner))
            }

            AstNodeKind::Attribute => Some(self.eval_attribute(ctx, scope, ast)),
            AstNodeKind::Directive => Some(self.eval_directive(ctx, scope, ast)),

            AstNodeKind::LineComment | AstNodeKind::BlockComment => Some(self.eval_comment(ctx, scope, ast)),

            _ => {
                let location = ast.borrow().token.span.location();
                ctx.diagnostics.error(
                    DiagnosticCode::AstNodeEvaluationFailed,
                    format!("no evaluator for node '{kind}' in expression position"),
                    location,
                );
                None
            }
        }
    }

    /// A bare `symbol` node used as an operand resolves straight to an
    /// `identifier_reference`, skipping the intermediate `symbol`
    /// element `eval_expression` would otherwise build — every other
    /// node kind just evaluates normally (SPEC_FULL.md §4.5, the
    /// operand-resolution helper every unary/binary/cast/alias/return
    /// handler below routes through).
    fn resolve_symbol_or_evaluate(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        if ast.borrow().kind == AstNodeKind::Symbol {
            let qualified = self.builder.make_qualified_symbol(ast);
            let resolved = ctx.scope.find_identifier(scope, &qualified);
            Some(self.builder.make_identifier_reference(ctx.scope.store_mut(), scope, qualified, resolved))
        } else {
            self.eval_expression(ctx, scope, ast)
        }
    }

    fn number_literal(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let number_type = node.token.number_type;
        let is_signed = node.token.is_signed;
        let location = node.token.span.location();
        let token = node.token.clone();
        drop(node);

        match number_type {
            Some(NumberType::Integer) => {
                let (value, result) = token.parse_u64();
                if result != ConversionResult::Success {
                    ctx.diagnostics.error(DiagnosticCode::InvalidNumericLiteral, format!("invalid integer literal '{}'", token.value), location);
                    return None;
                }
                let value = if is_signed { value.wrapping_neg() } else { value };
                Some(self.builder.make_integer(ctx.scope.store_mut(), scope, value))
            }
            Some(NumberType::FloatingPoint) => {
                let (value, result) = token.parse_f64();
                if result != ConversionResult::Success {
                    ctx.diagnostics.error(DiagnosticCode::InvalidNumericLiteral, format!("invalid floating point literal '{}'", token.value), location);
                    return None;
                }
                Some(self.builder.make_float(ctx.scope.store_mut(), scope, value))
            }
            None => {
                ctx.diagnostics.error(DiagnosticCode::InvalidNumericLiteral, format!("number literal '{}' has no recorded number type", token.value), location);
                None
            }
        }
    }

    fn unary_operator(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let token_kind = node.token.kind;
        let location = node.token.span.location();
        let operand_ast = node.rhs.clone()?;
        drop(node);

        let Some(op) = operators::unary_operator_kind(token_kind) else {
            ctx.diagnostics.error(DiagnosticCode::AstNodeEvaluationFailed, format!("no unary operator for token '{token_kind}'"), location);
            return None;
        };
        let operand = self.resolve_symbol_or_evaluate(ctx, scope, &operand_ast)?;
        Some(self.builder.make_unary_operator(ctx.scope.store_mut(), scope, op, operand))
    }

    fn binary_operator(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let token_kind = node.token.kind;
        let location = node.token.span.location();
        let lhs_ast = node.lhs.clone()?;
        let rhs_ast = node.rhs.clone()?;
        drop(node);

        let Some(op) = operators::binary_operator_kind(token_kind) else {
            ctx.diagnostics.error(DiagnosticCode::AstNodeEvaluationFailed, format!("no binary operator for token '{token_kind}'"), location);
            return None;
        };
        let lhs = self.resolve_symbol_or_evaluate(ctx, scope, &lhs_ast)?;
        let rhs = self.resolve_symbol_or_evaluate(ctx, scope, &rhs_ast)?;
        Some(self.builder.make_binary_operator(ctx.scope.store_mut(), scope, op, lhs, rhs))
    }

    /// `target[index]` reuses `binary_operator`'s element shape under
    /// `OperatorKind::Index` rather than a dedicated payload variant —
    /// the AST already models it as a plain lhs/rhs pair.
    fn subscript_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let target_ast = node.lhs.clone()?;
        let index_ast = node.rhs.clone()?;
        drop(node);

        let target = self.resolve_symbol_or_evaluate(ctx, scope, &target_ast)?;
        let index = self.resolve_symbol_or_evaluate(ctx, scope, &index_ast)?;
        Some(self.builder.make_binary_operator(ctx.scope.store_mut(), scope, OperatorKind::Index, target, index))
    }

    /// `cast<T>(expr)` / `transmute<T>(expr)`: the parser hangs the
    /// `type_identifier` directly off `lhs`, so the name is one field
    /// access away — no need to walk through an intermediate symbol
    /// node the way a qualified type name would.
    fn cast_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef, is_transmute: bool) -> Option<ElementId> {
        let node = ast.borrow();
        let type_ast = node.lhs.clone()?;
        let expr_ast = node.rhs.clone()?;
        let location = node.token.span.location();
        drop(node);

        let type_name = type_ast.borrow().token.value.clone();
        let Some(type_id) = ctx.scope.find_type(scope, &QualifiedSymbol::simple(type_name.clone())) else {
            ctx.diagnostics.error(DiagnosticCode::UnknownType, format!("unknown type '{type_name}'"), location);
            return None;
        };

        let expression = self.resolve_symbol_or_evaluate(ctx, scope, &expr_ast)?;
        Some(if is_transmute {
            self.builder.make_transmute(ctx.scope.store_mut(), scope, type_id, expression)
        } else {
            self.builder.make_cast(ctx.scope.store_mut(), scope, type_id, expression)
        })
    }

    /// `proc (params) [: returns] [body]`. Parameters reuse the
    /// existing `eval_parameter` helper unchanged; returns have no
    /// declared name in source, so each gets a synthesized `_0, _1, ...`
    /// identifier the way the body can still refer to named return
    /// slots (SPEC_FULL.md §4.5 proc_expression).
    fn proc_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let return_list = node.lhs.clone()?;
        let param_list = node.rhs.clone()?;
        let body_ast = node.children.first().cloned();
        drop(node);

        let block_scope = self.builder.make_block(ctx.scope.store_mut(), scope);
        let pointer_width = ctx.config.pointer_width.bytes();
        let proc_type = self.builder.make_procedure_type(ctx.scope.store_mut(), scope, block_scope, pointer_width);

        let return_asts = return_list.borrow().children.clone();
        let mut returns = Vec::new();
        for (index, return_ast) in return_asts.iter().enumerate() {
            if return_ast.borrow().kind != AstNodeKind::Symbol {
                continue;
            }
            let Some(type_name) = return_ast.borrow().children.first().map(|part| part.borrow().token.value.clone()) else { continue };
            let type_id = ctx.scope.find_type(block_scope, &QualifiedSymbol::simple(type_name));

            let name = format!("_{index}");
            let return_identifier = self.builder.make_identifier(ctx.scope.store_mut(), block_scope, name.clone(), None);
            if let Some(element) = ctx.scope.store_mut().get_mut(return_identifier) {
                if let ElementPayload::Identifier { type_id: slot, usage, .. } = &mut element.payload {
                    *slot = type_id;
                    *usage = Usage::Stack;
                }
            }
            ctx.scope.insert_identifier(block_scope, name, return_identifier);
            returns.push(self.builder.make_field(ctx.scope.store_mut(), block_scope, return_identifier));
        }

        let param_asts = param_list.borrow().children.clone();
        let mut parameters = Vec::new();
        for param_ast in &param_asts {
            if let Some(field) = self.eval_parameter(ctx, block_scope, param_ast) {
                parameters.push(field);
            }
        }

        if let Some(element) = ctx.scope.store_mut().get_mut(proc_type) {
            if let ElementPayload::Type(data) = &mut element.payload {
                if let TypeKind::Procedure(p) = &mut data.kind {
                    p.returns = returns;
                    p.parameters = parameters;
                }
            }
        }

        if let Some(body_ast) = body_ast {
            let mut guard = ctx.scope.push_scope(block_scope);
            let mut inner = EvalContext { scope: &mut guard, sources: ctx.sources, diagnostics: ctx.diagnostics, config: ctx.config };
            self.eval_block_body(&mut inner, block_scope, &body_ast);
        }

        Some(proc_type)
    }

    /// `callee(args...)`. `parse_call` already rejects a non-symbol
    /// callee at parse time, but the evaluator re-checks since a
    /// malformed tree could still reach here from a future caller.
    fn proc_call(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let callee_ast = node.lhs.clone()?;
        let args_ast = node.rhs.clone();
        let location = node.token.span.location();
        drop(node);

        if callee_ast.borrow().kind != AstNodeKind::Symbol {
            ctx.diagnostics.error(DiagnosticCode::AstNodeEvaluationFailed, "call target must be a symbol", location);
            return None;
        }

        let qualified = self.builder.make_qualified_symbol(&callee_ast);
        let resolved = ctx.scope.find_identifier(scope, &qualified);
        let callee = self.builder.make_identifier_reference(ctx.scope.store_mut(), scope, qualified, resolved);

        let mut arguments = Vec::new();
        if let Some(args_ast) = args_ast {
            let arg_asts = args_ast.borrow().children.clone();
            for arg_ast in &arg_asts {
                if let Some(arg) = self.resolve_symbol_or_evaluate(ctx, scope, arg_ast) {
                    arguments.push(arg);
                }
            }
        }

        Some(self.builder.make_procedure_call(ctx.scope.store_mut(), scope, callee, arguments))
    }

    /// Shared by `if_expression`/`elseif_expression`: predicate on
    /// `lhs`, body in the first child, the next branch (another
    /// `elseif_expression`, an `else_expression`, or nothing) on `rhs`.
    fn if_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let predicate_ast = node.lhs.clone()?;
        let body_ast = node.children.first().cloned()?;
        let else_ast = node.rhs.clone();
        drop(node);

        let predicate = self.resolve_symbol_or_evaluate(ctx, scope, &predicate_ast)?;
        let true_branch = self.eval_nested_block(ctx, scope, &body_ast);
        let false_branch = else_ast.and_then(|ast| self.eval_expression(ctx, scope, &ast));

        Some(self.builder.make_if(ctx.scope.store_mut(), scope, predicate, true_branch, false_branch))
    }

    fn else_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let body_ast = ast.borrow().children.first().cloned()?;
        Some(self.eval_nested_block(ctx, scope, &body_ast))
    }

    fn for_in_statement(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let induction_ast = node.lhs.clone()?;
        let iterable_ast = node.rhs.clone()?;
        let body_ast = node.children.first().cloned()?;
        drop(node);

        if induction_ast.borrow().kind != AstNodeKind::Symbol {
            let location = induction_ast.borrow().token.span.location();
            ctx.diagnostics.error(DiagnosticCode::InvalidStatement, "for-loop induction variable must be a symbol", location);
            return None;
        }

        let iterable = self.resolve_symbol_or_evaluate(ctx, scope, &iterable_ast)?;

        let block_id = self.builder.make_block(ctx.scope.store_mut(), scope);
        let induction_name = self.builder.make_qualified_symbol(&induction_ast).name;
        let induction_id = self.builder.make_identifier(ctx.scope.store_mut(), block_id, induction_name.clone(), None);
        ctx.scope.insert_identifier(block_id, induction_name, induction_id);

        let mut guard = ctx.scope.push_scope(block_id);
        let mut inner = EvalContext { scope: &mut guard, sources: ctx.sources, diagnostics: ctx.diagnostics, config: ctx.config };
        self.eval_block_body(&mut inner, block_id, &body_ast);
        drop(guard);

        Some(self.builder.make_for(ctx.scope.store_mut(), scope, induction_id, iterable, block_id))
    }

    fn while_statement(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let predicate_ast = node.lhs.clone()?;
        let body_ast = node.children.first().cloned()?;
        drop(node);

        let predicate = self.resolve_symbol_or_evaluate(ctx, scope, &predicate_ast)?;
        let body = self.eval_nested_block(ctx, scope, &body_ast);
        Some(self.builder.make_while(ctx.scope.store_mut(), scope, predicate, body))
    }

    fn return_statement(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let lhs = ast.borrow().lhs.clone();
        let items = lhs.map(crate::ast::parser::pairs_to_list).unwrap_or_default();

        let mut expressions = Vec::new();
        for item in &items {
            if let Some(value) = self.resolve_symbol_or_evaluate(ctx, scope, item) {
                expressions.push(value);
            }
        }
        Some(self.builder.make_return(ctx.scope.store_mut(), scope, expressions))
    }

    fn namespace_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let inner_ast = ast.borrow().lhs.clone()?;
        let inner = self.resolve_symbol_or_evaluate(ctx, scope, &inner_ast)?;
        Some(self.builder.make_namespace(ctx.scope.store_mut(), scope, inner))
    }

    /// `struct|union|enum name? { fields }`. The body lives in the
    /// node's first child (`parse_composite` adopts it there, not on
    /// `rhs`), so field construction walks that basic block's children
    /// directly.
    fn composite_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef, tag: CompositeTag) -> Option<ElementId> {
        let node = ast.borrow();
        let name_ast = node.lhs.clone();
        let body_ast = node.children.first().cloned()?;
        drop(node);

        let composite_scope = self.builder.make_block(ctx.scope.store_mut(), scope);
        let composite_type = self.builder.make_composite_type(ctx.scope.store_mut(), scope, tag, composite_scope);

        self.add_composite_type_fields(ctx, composite_type, composite_scope, tag, &body_ast);

        if let Some(name_ast) = name_ast {
            let name = name_ast.borrow().token.value.clone();
            ctx.scope.insert_type(scope, name, composite_type);
        }

        Some(composite_type)
    }

    fn add_composite_type_fields(&mut self, ctx: &mut EvalContext, composite_type: ElementId, composite_scope: ElementId, tag: CompositeTag, body_ast: &AstRef) {
        let statements = body_ast.borrow().children.clone();
        for statement_ast in &statements {
            if statement_ast.borrow().kind != AstNodeKind::Statement {
                continue;
            }
            let Some(expr_ast) = statement_ast.borrow().rhs.clone() else { continue };
            match expr_ast.borrow().kind {
                AstNodeKind::Assignment => self.add_composite_fields_from_assignment(ctx, composite_type, composite_scope, &expr_ast),
                AstNodeKind::Symbol => self.add_composite_field_bare(ctx, composite_type, composite_scope, tag, &expr_ast),
                _ => {}
            }
        }
    }

    fn add_composite_fields_from_assignment(&mut self, ctx: &mut EvalContext, composite_type: ElementId, composite_scope: ElementId, assignment_ast: &AstRef) {
        let node = assignment_ast.borrow();
        let target_ast = node.lhs.clone();
        let source_ast = node.rhs.clone();
        drop(node);
        let (Some(target_ast), Some(source_ast)) = (target_ast, source_ast) else { return };

        let targets = crate::ast::parser::pairs_to_list(target_ast);
        let sources = crate::ast::parser::pairs_to_list(source_ast);
        for (target, source) in targets.iter().zip(sources.iter()) {
            if target.borrow().kind != AstNodeKind::Symbol {
                continue;
            }

            let name = self.builder.make_qualified_symbol(target).name;
            let declared = target.borrow().rhs.clone();
            let find_result = ctx.scope.find_identifier_type(composite_scope, declared.as_ref());

            let Some(expr) = self.eval_expression(ctx, composite_scope, source) else { continue };
            let init_id = self.builder.make_initializer(ctx.scope.store_mut(), composite_scope, expr);
            let inferred = find_result.type_id.is_none();
            let type_id = find_result.type_id.or_else(|| self.infer_type_from_element(ctx, composite_scope, expr));

            let identifier_id = self.builder.make_identifier(ctx.scope.store_mut(), composite_scope, name.clone(), Some(init_id));
            if let Some(element) = ctx.scope.store_mut().get_mut(identifier_id) {
                if let ElementPayload::Identifier { type_id: slot, inferred_type, .. } = &mut element.payload {
                    *slot = type_id;
                    *inferred_type = inferred && type_id.is_some();
                }
            }
            ctx.scope.insert_identifier(composite_scope, name.clone(), identifier_id);

            let field_id = self.builder.make_field(ctx.scope.store_mut(), composite_scope, identifier_id);
            self.register_composite_field(ctx, composite_type, name, field_id);
        }
    }

    /// A field with no initializer: enum members default to the
    /// session's integer type, struct/union members with no declared
    /// type fall back to an `unknown` placeholder (SPEC_FULL.md §4.5,
    /// `composite_default_field_type`).
    fn add_composite_field_bare(&mut self, ctx: &mut EvalContext, composite_type: ElementId, composite_scope: ElementId, tag: CompositeTag, symbol_ast: &AstRef) {
        let name = self.builder.make_qualified_symbol(symbol_ast).name;
        let declared = symbol_ast.borrow().rhs.clone();
        let find_result = ctx.scope.find_identifier_type(composite_scope, declared.as_ref());

        let type_id = find_result
            .type_id
            .or_else(|| self.composite_default_field_type(ctx, composite_scope, tag))
            .unwrap_or_else(|| self.builder.make_unknown_type_from_find_result(ctx.scope.store_mut(), composite_scope, &find_result));

        let identifier_id = self.builder.make_identifier(ctx.scope.store_mut(), composite_scope, name.clone(), None);
        if let Some(element) = ctx.scope.store_mut().get_mut(identifier_id) {
            if let ElementPayload::Identifier { type_id: slot, .. } = &mut element.payload {
                *slot = Some(type_id);
            }
        }
        ctx.scope.insert_identifier(composite_scope, name.clone(), identifier_id);

        let field_id = self.builder.make_field(ctx.scope.store_mut(), composite_scope, identifier_id);
        self.register_composite_field(ctx, composite_type, name, field_id);
    }

    fn register_composite_field(&mut self, ctx: &mut EvalContext, composite_type: ElementId, field_name: String, field_id: ElementId) {
        if let Some(element) = ctx.scope.store_mut().get_mut(composite_type) {
            if let ElementPayload::Type(data) = &mut element.payload {
                if let TypeKind::Composite { fields, .. } = &mut data.kind {
                    fields.insert(field_name, field_id);
                }
            }
        }
    }

    /// `module "path";`. A relative path resolves against the
    /// importing file's own directory (`current_source_dir`); anything
    /// else that doesn't fold down to a string literal is C021
    /// (SPEC_FULL.md §4.5, §4.7).
    fn module_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let path_ast = node.lhs.clone()?;
        let location = node.token.span.location();
        drop(node);

        let expr_id = self.resolve_symbol_or_evaluate(ctx, scope, &path_ast)?;
        let reference_id = self.builder.make_module_reference(ctx.scope.store_mut(), scope, None);

        let path_text = match ctx.scope.store().get(expr_id).map(|e| e.payload.clone()) {
            Some(ElementPayload::Literal(LiteralValue::Str(s))) => Some(s),
            _ => None,
        };

        let Some(path_text) = path_text else {
            ctx.diagnostics.error(DiagnosticCode::ModuleLoadFailed, "expected a string literal or constant string variable for a module path", location);
            return Some(reference_id);
        };

        let relative_to = self.current_source_dir(ctx);
        if let Some(module_id) = self.compile_module_file(ctx, scope, relative_to.as_deref(), &path_text) {
            if let Some(element) = ctx.scope.store_mut().get_mut(reference_id) {
                if let ElementPayload::ModuleReference { resolved } = &mut element.payload {
                    *resolved = Some(module_id);
                }
            }
        }
        Some(reference_id)
    }

    /// `import a::b [from c]`. The `from` clause's name is prepended as
    /// the leading namespace segment of the imported symbol before
    /// resolution (SPEC_FULL.md §4.5 import_expression). This is the
    /// one `eval_expression` call site `eval_statement` reaches for an
    /// `Import`-kind node directly, rather than through
    /// `eval_declaration_or_expression`.
    pub(super) fn eval_import(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let node = ast.borrow();
        let symbol_ast = node.lhs.clone()?;
        let from_ast = node.rhs.clone();
        drop(node);

        let mut qualified = self.builder.make_qualified_symbol(&symbol_ast);

        let from_reference = from_ast.as_ref().and_then(|ast| self.resolve_symbol_or_evaluate(ctx, scope, ast));
        if let Some(from_id) = from_reference {
            let from_name = match ctx.scope.store().get(from_id).map(|e| &e.payload) {
                Some(ElementPayload::IdentifierReference { symbol, .. }) => Some(symbol.name.clone()),
                _ => None,
            };
            if let Some(from_name) = from_name {
                qualified = qualified.with_leading_namespace(from_name);
            }
        }

        let resolved = ctx.scope.find_identifier(scope, &qualified);
        let identifier_reference = self.builder.make_identifier_reference(ctx.scope.store_mut(), scope, qualified, resolved);

        let owning_module = ctx.scope.current_top_level().and_then(|top| ctx.scope.store().get(top).and_then(|e| e.parent_id));
        Some(self.builder.make_import(ctx.scope.store_mut(), scope, identifier_reference, from_reference, owning_module))
    }

    fn alias_expression(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> Option<ElementId> {
        let inner_ast = ast.borrow().lhs.clone()?;
        let target = self.resolve_symbol_or_evaluate(ctx, scope, &inner_ast)?;
        Some(self.builder.make_alias(ctx.scope.store_mut(), scope, target))
    }

    pub(super) fn eval_attribute(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> ElementId {
        let (name, expression_ast) = self.attribute_or_directive_parts(ast);
        let expression = expression_ast.and_then(|ast| self.eval_expression(ctx, scope, &ast));
        self.builder.make_attribute(ctx.scope.store_mut(), scope, name, expression)
    }

    pub(super) fn eval_directive(&mut self, ctx: &mut EvalContext, scope: ElementId, ast: &AstRef) -> ElementId {
        let (name, expression_ast) = self.attribute_or_directive_parts(ast);
        let expression = expression_ast.and_then(|ast| self.eval_expression(ctx, scope, &ast));
        self.builder.make_directive(ctx.scope.store_mut(), scope, name, expression)
    }

    /// An `@`/`#` node's own token is the marker itself, not the
    /// attribute's name — unlike the original shape this is adapted
    /// from, our parser hangs the whole wrapped expression off `lhs`.
    /// The name is derived structurally: a bare symbol's last part, or
    /// a call's callee symbol.
    fn attribute_or_directive_parts(&self, ast: &AstRef) -> (String, Option<AstRef>) {
        let Some(expr_ast) = ast.borrow().lhs.clone() else { return (String::new(), None) };

        let name = match expr_ast.borrow().kind {
            AstNodeKind::Symbol => self.builder.make_qualified_symbol(&expr_ast).name,
            AstNodeKind::ProcCall => expr_ast
                .borrow()
                .lhs
                .as_ref()
                .map(|callee| self.builder.make_qualified_symbol(callee).name)
                .unwrap_or_default(),
            _ => String::new(),
        };
        (name, Some(expr_ast))
    }
}

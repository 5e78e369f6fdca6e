//! Pratt (top-down operator precedence) expression parser (SPEC_FULL.md
//! §4.1). Prefix/infix "parselet tables" are implemented as exhaustive
//! `match`es over `TokenKind` rather than boxed trait objects or a
//! runtime hashmap of closures — the set of productions is closed at
//! compile time, so a match gives the same dispatch with none of the
//! virtual-call overhead the original's parselet classes paid for
//! (SPEC_FULL.md §9).

use crate::ast::{AstBuilder, AstNodeKind, AstRef, NodeFlags};
use crate::diagnostics::{DiagnosticCode, DiagnosticResult};
use crate::lexer::TokenSource;
use crate::token::{Token, TokenKind};

/// Precedence tiers, low to high, exactly as enumerated in SPEC_FULL.md
/// §4.1. Backed by `u8` so right-associative parselets can recurse at
/// `tier - 1` without an explicit lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    Lowest = 0,
    Assignment,
    Comma,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Exponent,
    Unary,
    Cast,
    Call,
    Subscript,
    Type,
    Variable,
    BlockComment,
}

impl Precedence {
    /// One tier down, for a right-associative infix parselet's
    /// recursive call (SPEC_FULL.md §4.1: "precedence − 1").
    fn lower(self) -> Precedence {
        match self {
            Precedence::Lowest => Precedence::Lowest,
            Precedence::Assignment => Precedence::Lowest,
            Precedence::Comma => Precedence::Assignment,
            Precedence::LogicalOr => Precedence::Comma,
            Precedence::LogicalAnd => Precedence::LogicalOr,
            Precedence::BitwiseOr => Precedence::LogicalAnd,
            Precedence::BitwiseXor => Precedence::BitwiseOr,
            Precedence::BitwiseAnd => Precedence::BitwiseXor,
            Precedence::Equality => Precedence::BitwiseAnd,
            Precedence::Relational => Precedence::Equality,
            Precedence::Shift => Precedence::Relational,
            Precedence::Additive => Precedence::Shift,
            Precedence::Multiplicative => Precedence::Additive,
            Precedence::Exponent => Precedence::Multiplicative,
            Precedence::Unary => Precedence::Exponent,
            Precedence::Cast => Precedence::Unary,
            Precedence::Call => Precedence::Cast,
            Precedence::Subscript => Precedence::Call,
            Precedence::Type => Precedence::Subscript,
            Precedence::Variable => Precedence::Type,
            Precedence::BlockComment => Precedence::Variable,
        }
    }
}

/// Flattens a right-nested... in practice *left-nested* chain of
/// `pair(lhs, rhs)` nodes built by the comma infix parselet into an
/// ordered list. Walks `lhs` until it stops being a `pair`, pushing
/// each `rhs` along the way, then pushes the final `lhs`/`rhs` pair —
/// callers (argument/parameter/return/assignment-target lists) only
/// ever see a flat `Vec<AstRef>` (SPEC_FULL.md §4.1 "pairs_to_list").
pub fn pairs_to_list(node: AstRef) -> Vec<AstRef> {
    if node.borrow().kind != AstNodeKind::Pair {
        return vec![node];
    }

    let mut collected = Vec::new();
    let mut current = node;
    loop {
        let (lhs, rhs) = {
            let n = current.borrow();
            (n.lhs.clone(), n.rhs.clone())
        };
        let rhs = rhs.expect("pair node is missing its rhs");
        collected.push(rhs);
        match lhs {
            Some(l) if l.borrow().kind == AstNodeKind::Pair => current = l,
            Some(l) => {
                collected.push(l);
                break;
            }
            None => break,
        }
    }
    collected.reverse();
    collected
}

/// Consumes tokens from a `TokenSource` and builds an AST. Owns the
/// `AstBuilder` (so scope push/pop and id assignment stay local to one
/// parse) and a small lookahead buffer for `peek`.
pub struct Parser<T: TokenSource> {
    lexer: T,
    lookahead: Vec<Token>,
    pub builder: AstBuilder,
}

impl<T: TokenSource> Parser<T> {
    pub fn new(lexer: T) -> Parser<T> {
        Parser { lexer, lookahead: Vec::new(), builder: AstBuilder::new() }
    }

    fn fill(&mut self, count: usize) {
        while self.lookahead.len() < count {
            match self.lexer.next() {
                Some(token) => self.lookahead.push(token),
                None => break,
            }
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.fill(1);
        self.lookahead.first()
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().map(|t| t.kind).unwrap_or(TokenKind::EndOfFile)
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Option<Token> {
        self.fill(1);
        if self.lookahead.is_empty() {
            None
        } else {
            Some(self.lookahead.remove(0))
        }
    }

    /// `expect(kind)`: consumes a token of `kind` or reports B016 with
    /// the expected-vs-found name and location (SPEC_FULL.md §4.1).
    fn expect(&mut self, kind: TokenKind, diagnostics: &mut DiagnosticResult) -> Option<Token> {
        match self.advance() {
            Some(token) if token.kind == kind => Some(token),
            Some(token) => {
                let location = token.span.location();
                diagnostics.error(
                    DiagnosticCode::ExpectedToken,
                    format!("expected token '{}' but found '{}'", kind, token.kind),
                    location,
                );
                None
            }
            None => {
                diagnostics.error(
                    DiagnosticCode::ExpectedToken,
                    format!("expected token '{}' but found end of input", kind),
                    None,
                );
                None
            }
        }
    }

    fn current_infix_precedence(&mut self) -> Precedence {
        infix_info(self.peek_kind()).map(|(prec, _)| prec).unwrap_or(Precedence::Lowest)
    }

    /// The Pratt core (SPEC_FULL.md §4.1):
    /// 1. consume a token, dispatch its prefix parselet (B021 if none)
    /// 2. stop immediately on a line-comment or label token
    /// 3. while `min_precedence < current_infix_precedence()`, consume
    ///    and apply the infix parselet, replacing `lhs`
    pub fn parse_expression(&mut self, min_precedence: Precedence, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let token = self.advance()?;
        let is_terminal = token.is_line_comment() || token.is_label();
        let mut lhs = self.parse_prefix(token, diagnostics)?;

        if is_terminal {
            return Some(lhs);
        }

        while min_precedence < self.current_infix_precedence() {
            let token = self.advance()?;
            match self.parse_infix(lhs.clone(), token, diagnostics) {
                Some(next) => lhs = next,
                None => break,
            }
            if diagnostics.is_fatal() {
                break;
            }
        }

        Some(lhs)
    }

    fn parse_prefix(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        match token.kind {
            TokenKind::LeftParen => self.parse_group(token, diagnostics),
            TokenKind::LeftSquare => self.parse_array_subscript_type(token, diagnostics),

            TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde | TokenKind::Ampersand | TokenKind::Star => {
                self.parse_unary(token, diagnostics)
            }

            TokenKind::NumberLiteral => Some(self.builder.make_node(AstNodeKind::NumberLiteral, token)),
            TokenKind::StringLiteral => Some(self.builder.make_node(AstNodeKind::StringLiteral, token)),
            TokenKind::CharacterLiteral => Some(self.builder.make_node(AstNodeKind::CharacterLiteral, token)),
            TokenKind::True | TokenKind::False => Some(self.builder.make_node(AstNodeKind::BooleanLiteral, token)),
            TokenKind::Null => Some(self.builder.make_node(AstNodeKind::NullLiteral, token)),
            TokenKind::LineComment => Some(self.builder.make_node(AstNodeKind::LineComment, token)),
            TokenKind::BlockCommentStart => Some(self.builder.make_node(AstNodeKind::BlockComment, token)),
            TokenKind::Label => Some(self.builder.make_node(AstNodeKind::Label, token)),

            TokenKind::Identifier => self.parse_symbol(token, diagnostics),

            TokenKind::At => self.parse_attribute_or_directive(token, AstNodeKind::Attribute, diagnostics),
            TokenKind::Hash => self.parse_attribute_or_directive(token, AstNodeKind::Directive, diagnostics),

            TokenKind::Break => Some(self.builder.make_node(AstNodeKind::Break, token)),
            TokenKind::Continue => Some(self.builder.make_node(AstNodeKind::Continue, token)),
            TokenKind::Return => self.parse_wrapped(token, AstNodeKind::Return, diagnostics),
            TokenKind::Alias => self.parse_wrapped(token, AstNodeKind::Alias, diagnostics),
            TokenKind::Import => self.parse_import(token, diagnostics),
            TokenKind::Defer => self.parse_wrapped(token, AstNodeKind::Defer, diagnostics),
            TokenKind::With => self.parse_wrapped(token, AstNodeKind::With, diagnostics),
            TokenKind::Namespace => self.parse_wrapped(token, AstNodeKind::Namespace, diagnostics),
            TokenKind::Struct => self.parse_composite(token, AstNodeKind::Struct, diagnostics),
            TokenKind::Union => self.parse_composite(token, AstNodeKind::Union, diagnostics),
            TokenKind::Enum => self.parse_composite(token, AstNodeKind::Enum, diagnostics),
            TokenKind::Module => self.parse_wrapped(token, AstNodeKind::Module, diagnostics),

            TokenKind::Cast => self.parse_cast_like(token, AstNodeKind::Cast, diagnostics),
            TokenKind::Transmute => self.parse_cast_like(token, AstNodeKind::Transmute, diagnostics),

            TokenKind::Proc => self.parse_proc_expression(token, diagnostics),

            TokenKind::If => self.parse_if(token, diagnostics),
            TokenKind::For => self.parse_for_in(token, diagnostics),
            TokenKind::While => self.parse_while(token, diagnostics),

            TokenKind::LeftCurly => Some(self.parse_basic_block_from(token, diagnostics)),

            other => {
                let location = token.span.location();
                diagnostics.error(
                    DiagnosticCode::NoParselet,
                    format!("prefix parser for token '{}' not found", other),
                    location,
                );
                None
            }
        }
    }

    fn parse_infix(&mut self, lhs: AstRef, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        match token.kind {
            TokenKind::Comma => {
                let rhs = self.parse_expression(Precedence::Comma, diagnostics)?;
                Some(self.builder.with_lhs_rhs(AstNodeKind::Pair, token, Some(lhs), Some(rhs)))
            }

            TokenKind::ColonEqual | TokenKind::Equal => {
                let rhs = self.parse_expression(Precedence::Assignment.lower(), diagnostics)?;
                Some(self.builder.with_lhs_rhs(AstNodeKind::Assignment, token, Some(lhs), Some(rhs)))
            }

            TokenKind::LeftParen => self.parse_call(lhs, token, diagnostics),
            TokenKind::LeftSquare => {
                let index = self.parse_expression(Precedence::Lowest, diagnostics)?;
                self.expect(TokenKind::RightSquare, diagnostics)?;
                Some(self.builder.with_lhs_rhs(AstNodeKind::SubscriptExpression, token, Some(lhs), Some(index)))
            }

            TokenKind::BlockCommentStart => {
                let comment = self.builder.make_node(AstNodeKind::BlockComment, token);
                self.builder.adopt(&lhs, comment);
                Some(lhs)
            }

            // `name : type` — a declared-type annotation. Binds at
            // `Type` precedence (tighter than assignment), and is
            // recorded on `lhs.rhs` in place rather than wrapping a new
            // node, so a subsequent `:=`/`=` still sees `lhs` as its
            // target with the annotation attached.
            TokenKind::Colon => {
                let type_node = self.parse_type_identifier(diagnostics)?;
                lhs.borrow_mut().rhs = Some(type_node);
                Some(lhs)
            }

            _ => {
                let (precedence, right_assoc) = infix_info(token.kind)?;
                let next_min = if right_assoc { precedence.lower() } else { precedence };
                let rhs = self.parse_expression(next_min, diagnostics)?;
                Some(self.builder.binary_operator_node(lhs, token, rhs))
            }
        }
    }

    fn parse_group(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let inner = self.parse_expression(Precedence::Lowest, diagnostics)?;
        self.expect(TokenKind::RightParen, diagnostics)?;
        Some(self.builder.with_lhs_rhs(AstNodeKind::Expression, token, Some(inner), None))
    }

    fn parse_unary(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let operand = self.parse_expression(Precedence::Unary, diagnostics)?;
        Some(self.builder.with_lhs_rhs(AstNodeKind::UnaryOperator, token, None, Some(operand)))
    }

    /// Builds a `symbol` node directly (rather than via a separate `::`
    /// infix parselet): loops consuming `identifier (:: identifier)*`,
    /// one `symbol_part` child per segment.
    fn parse_symbol(&mut self, first: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let node = self.builder.make_node(AstNodeKind::Symbol, first.clone());
        let part = self.builder.make_node(AstNodeKind::SymbolPart, first);
        self.builder.adopt(&node, part);

        while self.check(TokenKind::ScopeOperator) {
            self.advance();
            let name = self.expect(TokenKind::Identifier, diagnostics)?;
            let part = self.builder.make_node(AstNodeKind::SymbolPart, name);
            self.builder.adopt(&node, part);
        }

        Some(node)
    }

    /// `*`? `[` length-expr `]`? identifier `...`? — a type reference,
    /// context-sensitive to casts, transmutes, proc signatures, and
    /// composite-type fields (SPEC_FULL.md §4.1). A leading `*` marks a
    /// pointer to whatever follows, so `*[4]u32` is a pointer to an
    /// array of four `u32`.
    fn parse_type_identifier(&mut self, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let mut flags = NodeFlags::none();
        let mut length_expr = None;

        if self.check(TokenKind::Star) {
            self.advance();
            flags.pointer = true;
        }

        if self.check(TokenKind::LeftSquare) {
            self.advance();
            if !self.check(TokenKind::RightSquare) {
                length_expr = self.parse_expression(Precedence::Variable, diagnostics);
            }
            self.expect(TokenKind::RightSquare, diagnostics)?;
            flags.array = true;
        }

        let name_token = match self.advance() {
            Some(token) if token.kind == TokenKind::Identifier => token,
            Some(token) => {
                let location = token.span.location();
                diagnostics.error(
                    DiagnosticCode::TypeExpected,
                    format!("expected a type identifier but found '{}'", token.kind),
                    location,
                );
                return None;
            }
            None => {
                diagnostics.error(DiagnosticCode::TypeExpected, "expected a type identifier but found end of input", None);
                return None;
            }
        };

        let node = self.builder.make_node(AstNodeKind::TypeIdentifier, name_token);
        if let Some(length) = length_expr.take() {
            node.borrow_mut().lhs = Some(length);
        }

        if self.check(TokenKind::DotDotDot) {
            self.advance();
            flags.spread = true;
        }

        node.borrow_mut().flags = flags;
        Some(node)
    }

    /// A leading `[` in prefix position that is not part of a cast or
    /// proc signature is a bare type identifier used as an expression
    /// (e.g. a `sizeof`-style type reference). Reuses the same
    /// context-sensitive construct as everywhere else a type is named.
    fn parse_array_subscript_type(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        self.lookahead.insert(0, token);
        self.parse_type_identifier(diagnostics)
    }

    fn parse_attribute_or_directive(&mut self, token: Token, kind: AstNodeKind, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            self.parse_expression(Precedence::Lowest, diagnostics)
        };
        Some(self.builder.with_lhs_rhs(kind, token, expr, None))
    }

    fn parse_wrapped(&mut self, token: Token, kind: AstNodeKind, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let expr = self.parse_expression(Precedence::Lowest, diagnostics)?;
        Some(self.builder.with_lhs_rhs(kind, token, Some(expr), None))
    }

    /// `import a::b [from c]`
    fn parse_import(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let symbol = self.parse_expression(Precedence::Call, diagnostics)?;
        let from = if self.check(TokenKind::From) {
            self.advance();
            self.parse_expression(Precedence::Lowest, diagnostics)
        } else {
            None
        };
        Some(self.builder.with_lhs_rhs(AstNodeKind::Import, token, Some(symbol), from))
    }

    fn parse_cast_like(&mut self, token: Token, kind: AstNodeKind, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        self.expect(TokenKind::LessThan, diagnostics)?;
        let type_node = self.parse_type_identifier(diagnostics)?;
        self.expect(TokenKind::GreaterThan, diagnostics)?;
        self.expect(TokenKind::LeftParen, diagnostics)?;
        let expr = self.parse_expression(Precedence::Lowest, diagnostics)?;
        self.expect(TokenKind::RightParen, diagnostics)?;
        Some(self.builder.with_lhs_rhs(kind, token, Some(type_node), Some(expr)))
    }

    /// `(` after a `symbol` lhs is a call; the argument list is parsed
    /// as a comma chain and flattened with `pairs_to_list`. A `(`
    /// after any other lhs has no operator connecting the two
    /// expressions and is a syntax error (SPEC_FULL.md §4.1 narrows the
    /// original's silent "treat it as an unrelated group" fallback to
    /// this — see DESIGN.md).
    fn parse_call(&mut self, lhs: AstRef, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        if lhs.borrow().kind != AstNodeKind::Symbol {
            let location = token.span.location();
            diagnostics.error(
                DiagnosticCode::NoParselet,
                "unexpected '(': the preceding expression is not callable",
                location,
            );
            return None;
        }

        let args = if self.check(TokenKind::RightParen) {
            Vec::new()
        } else {
            let list = self.parse_expression(Precedence::Comma, diagnostics)?;
            pairs_to_list(list)
        };
        self.expect(TokenKind::RightParen, diagnostics)?;

        let arg_list = self.builder.make_node(AstNodeKind::ArgumentList, token.clone());
        for arg in args {
            self.builder.adopt(&arg_list, arg);
        }

        Some(self.builder.with_lhs_rhs(AstNodeKind::ProcCall, token, Some(lhs), Some(arg_list)))
    }

    /// `proc (params) [: returns] [body]`. Returns are synthesized
    /// field names `_0, _1, ...` by the evaluator, not the parser — the
    /// parser only records the declared type list in order.
    fn parse_proc_expression(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        self.expect(TokenKind::LeftParen, diagnostics)?;
        let params = if self.check(TokenKind::RightParen) {
            Vec::new()
        } else {
            let list = self.parse_expression(Precedence::Comma, diagnostics)?;
            pairs_to_list(list)
        };
        self.expect(TokenKind::RightParen, diagnostics)?;

        let mut returns = Vec::new();
        if self.check(TokenKind::Colon) {
            self.advance();
            let list = self.parse_expression(Precedence::Comma, diagnostics)?;
            returns = pairs_to_list(list);
        }

        let body = if self.check(TokenKind::LeftCurly) {
            let open = self.advance()?;
            Some(self.parse_basic_block_from(open, diagnostics))
        } else {
            None
        };

        let param_list = self.builder.make_node(AstNodeKind::ParameterList, token.clone());
        for param in params {
            self.builder.adopt(&param_list, param);
        }
        let return_list = self.builder.make_node(AstNodeKind::ParameterList, token.clone());
        for ret in returns {
            self.builder.adopt(&return_list, ret);
        }

        let node = self.builder.with_lhs_rhs(AstNodeKind::ProcExpression, token, Some(return_list), Some(param_list));
        if let Some(body) = body {
            self.builder.adopt(&node, body);
        }
        Some(node)
    }

    /// `if pred { ... } [elseif pred { ... }]* [else { ... }]?` — a
    /// right-chain where each branch's `rhs` is the next `elseif`/`else`
    /// node and the body lives in the branch's first child.
    fn parse_if(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let predicate = self.parse_expression(Precedence::Lowest, diagnostics)?;
        let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
        let body = self.parse_basic_block_from(open, diagnostics);

        let else_branch = if self.check(TokenKind::ElseIf) {
            let keyword = self.advance()?;
            self.parse_elseif(keyword, diagnostics)
        } else if self.check(TokenKind::Else) {
            let keyword = self.advance()?;
            let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
            let else_body = self.parse_basic_block_from(open, diagnostics);
            let node = self.builder.make_node(AstNodeKind::ElseExpression, keyword);
            self.builder.adopt(&node, else_body);
            Some(node)
        } else {
            None
        };

        let node = self.builder.with_lhs_rhs(AstNodeKind::IfExpression, token, Some(predicate), else_branch);
        self.builder.adopt(&node, body);
        Some(node)
    }

    fn parse_elseif(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let predicate = self.parse_expression(Precedence::Lowest, diagnostics)?;
        let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
        let body = self.parse_basic_block_from(open, diagnostics);

        let else_branch = if self.check(TokenKind::ElseIf) {
            let keyword = self.advance()?;
            self.parse_elseif(keyword, diagnostics)
        } else if self.check(TokenKind::Else) {
            let keyword = self.advance()?;
            let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
            let else_body = self.parse_basic_block_from(open, diagnostics);
            let node = self.builder.make_node(AstNodeKind::ElseExpression, keyword);
            self.builder.adopt(&node, else_body);
            Some(node)
        } else {
            None
        };

        let node = self.builder.with_lhs_rhs(AstNodeKind::ElseIfExpression, token, Some(predicate), else_branch);
        self.builder.adopt(&node, body);
        Some(node)
    }

    fn parse_for_in(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let induction = self.parse_expression(Precedence::Relational, diagnostics)?;
        self.expect(TokenKind::In, diagnostics)?;
        let iterable = self.parse_expression(Precedence::Lowest, diagnostics)?;
        let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
        let body = self.parse_basic_block_from(open, diagnostics);

        let node = self.builder.with_lhs_rhs(AstNodeKind::ForIn, token, Some(induction), Some(iterable));
        self.builder.adopt(&node, body);
        Some(node)
    }

    fn parse_while(&mut self, token: Token, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let predicate = self.parse_expression(Precedence::Lowest, diagnostics)?;
        let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
        let body = self.parse_basic_block_from(open, diagnostics);

        let node = self.builder.with_lhs_rhs(AstNodeKind::While, token, Some(predicate), None);
        self.builder.adopt(&node, body);
        Some(node)
    }

    /// `struct|union|enum name? { fields }`
    fn parse_composite(&mut self, token: Token, kind: AstNodeKind, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let name = if self.check(TokenKind::Identifier) {
            let name_token = self.advance()?;
            Some(self.builder.make_node(AstNodeKind::SymbolPart, name_token))
        } else {
            None
        };
        let open = self.expect(TokenKind::LeftCurly, diagnostics)?;
        let body = self.parse_basic_block_from(open, diagnostics);

        let node = self.builder.with_lhs_rhs(kind, token, name, None);
        self.builder.adopt(&node, body);
        Some(node)
    }

    /// `parse_scope`: begins a scope, repeatedly parses statements
    /// until `}` or end-of-file, requiring a semicolon after bare
    /// statements (not after comments or nested basic blocks), and
    /// flushing pending attributes onto the next statement's `rhs`
    /// children (SPEC_FULL.md §4.1, §4.7 "Parser statement loop").
    pub fn parse_basic_block_from(&mut self, open: Token, diagnostics: &mut DiagnosticResult) -> AstRef {
        let scope = self.builder.begin_scope(open);

        loop {
            if self.check(TokenKind::RightCurly) {
                self.advance();
                break;
            }
            if self.peek().is_none() {
                break;
            }

            match self.parse_statement(diagnostics) {
                Some(statement) => self.builder.adopt(&scope, statement),
                None => break,
            }

            if diagnostics.is_fatal() {
                break;
            }
        }

        self.builder.end_scope()
    }

    /// `parse_statement`: parses one expression; attributes queue onto
    /// the builder and loop for the next expression; a `label` queues
    /// onto a pending-labels list and loops; comments and nested basic
    /// blocks are appended as-is (not wrapped in a `statement`);
    /// anything else is wrapped in a `statement` node carrying the
    /// accumulated labels as its `lhs` and the expression as its `rhs`.
    /// Block-bodied control flow (`if`/`for`/`while`, and their
    /// `elseif`/`else` continuations) is wrapped the same way so a
    /// label can still attach, but does not require a trailing `;` —
    /// its own closing `}` already ends the statement.
    fn parse_statement(&mut self, diagnostics: &mut DiagnosticResult) -> Option<AstRef> {
        let mut pending_labels: Vec<AstRef> = Vec::new();

        loop {
            let expr = self.parse_expression(Precedence::Lowest, diagnostics)?;

            match expr.borrow().kind {
                AstNodeKind::Attribute => {
                    self.builder.queue_attribute(expr.clone());
                    continue;
                }
                AstNodeKind::Label => {
                    pending_labels.push(expr.clone());
                    continue;
                }
                AstNodeKind::LineComment | AstNodeKind::BlockComment | AstNodeKind::BasicBlock => {
                    return Some(expr);
                }
                kind => {
                    let first_token = expr.borrow().token.clone();
                    let label_list = self.builder.make_node(AstNodeKind::LabelList, first_token.clone());
                    for label in pending_labels {
                        self.builder.adopt(&label_list, label);
                    }

                    let is_block_bodied_control_flow = matches!(
                        kind,
                        AstNodeKind::IfExpression | AstNodeKind::ElseIfExpression | AstNodeKind::ElseExpression | AstNodeKind::ForIn | AstNodeKind::While
                    );
                    if !is_block_bodied_control_flow {
                        self.expect(TokenKind::Semicolon, diagnostics);
                    }

                    let statement = self.builder.with_lhs_rhs(AstNodeKind::Statement, first_token, Some(label_list), Some(expr));

                    for attribute in self.builder.take_pending_attributes() {
                        if let Some(rhs) = statement.borrow().rhs.clone() {
                            self.builder.adopt(&rhs, attribute);
                        }
                    }

                    return Some(statement);
                }
            }
        }
    }

    /// Parses an entire program: one top-level `basic_block` scope with
    /// no enclosing braces, running until end-of-file.
    pub fn parse_program(&mut self, diagnostics: &mut DiagnosticResult) -> AstRef {
        let root_token = Token::new(0, TokenKind::EndOfFile, "", crate::source::Span::empty());
        let scope = self.builder.begin_scope(root_token.clone());

        while self.peek().is_some() {
            match self.parse_statement(diagnostics) {
                Some(statement) => self.builder.adopt(&scope, statement),
                None => break,
            }
            if diagnostics.is_fatal() {
                break;
            }
        }

        let body = self.builder.end_scope();
        let program = self.builder.make_node(AstNodeKind::Program, root_token);
        self.builder.adopt(&program, body);
        program
    }
}

/// `(precedence, right_associative)` for every infix-capable operator
/// token not already special-cased in `parse_infix` (comma, assignment,
/// call, subscript, trailing block comment have bespoke handling above
/// since their node shape differs from a plain binary operator).
fn infix_info(kind: TokenKind) -> Option<(Precedence, bool)> {
    use TokenKind::*;
    match kind {
        PipePipe => Some((Precedence::LogicalOr, false)),
        AmpAmp => Some((Precedence::LogicalAnd, false)),
        Pipe => Some((Precedence::BitwiseOr, false)),
        Caret => Some((Precedence::BitwiseXor, false)),
        Ampersand => Some((Precedence::BitwiseAnd, false)),
        EqualEqual | BangEqual => Some((Precedence::Equality, false)),
        LessThan | GreaterThan | LessEqual | GreaterEqual => Some((Precedence::Relational, false)),
        ShiftLeft | ShiftRight => Some((Precedence::Shift, false)),
        Plus | Minus => Some((Precedence::Additive, false)),
        Star | Slash | Percent => Some((Precedence::Multiplicative, false)),
        Comma => Some((Precedence::Comma, false)),
        ColonEqual | Equal => Some((Precedence::Assignment, true)),
        LeftParen => Some((Precedence::Call, false)),
        LeftSquare => Some((Precedence::Subscript, false)),
        BlockCommentStart => Some((Precedence::BlockComment, false)),
        Colon => Some((Precedence::Type, false)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::source::Source;
    use std::rc::Rc;

    fn parse(text: &str) -> (AstRef, DiagnosticResult) {
        let source = Rc::new(Source::in_memory(text));
        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer);
        let mut diagnostics = DiagnosticResult::new();
        let program = parser.parse_program(&mut diagnostics);
        (program, diagnostics)
    }

    #[test]
    fn parses_simple_declaration() {
        let (program, diagnostics) = parse("x: u32 := 42;");
        assert!(diagnostics.entries().is_empty());
        let body = program.borrow().children[0].clone();
        let statement = body.borrow().children[0].clone();
        assert_eq!(statement.borrow().kind, AstNodeKind::Statement);
        let rhs = statement.borrow().rhs.clone().unwrap();
        assert_eq!(rhs.borrow().kind, AstNodeKind::Assignment);
    }

    #[test]
    fn additive_is_left_associative() {
        let (program, diagnostics) = parse("x := 1 + 2 + 3;");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let assignment = statement.borrow().rhs.clone().unwrap();
        let sum = assignment.borrow().rhs.clone().unwrap();
        assert_eq!(sum.borrow().kind, AstNodeKind::BinaryOperator);
        // left-associative: (1 + 2) + 3, so lhs of the outer `+` is
        // itself a binary operator, not a bare literal.
        let lhs = sum.borrow().lhs.clone().unwrap();
        assert_eq!(lhs.borrow().kind, AstNodeKind::BinaryOperator);
    }

    #[test]
    fn assignment_chains_right_associative() {
        let (program, diagnostics) = parse("x := y := 5;");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let outer = statement.borrow().rhs.clone().unwrap();
        assert_eq!(outer.borrow().kind, AstNodeKind::Assignment);
        let inner = outer.borrow().rhs.clone().unwrap();
        assert_eq!(inner.borrow().kind, AstNodeKind::Assignment);
    }

    #[test]
    fn qualified_symbol_collects_parts() {
        let (program, diagnostics) = parse("x := core::math::pi;");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let assignment = statement.borrow().rhs.clone().unwrap();
        let symbol = assignment.borrow().rhs.clone().unwrap();
        assert_eq!(symbol.borrow().kind, AstNodeKind::Symbol);
        assert_eq!(symbol.borrow().children.len(), 3);
    }

    #[test]
    fn missing_semicolon_reports_b016() {
        let (_program, diagnostics) = parse("x := 1");
        assert!(diagnostics.of_code(DiagnosticCode::ExpectedToken).count() >= 1);
    }

    #[test]
    fn unknown_token_reports_b021() {
        let (_program, diagnostics) = parse("x := ;");
        assert!(diagnostics.of_code(DiagnosticCode::NoParselet).count() >= 1);
    }

    #[test]
    fn typed_declaration_attaches_type_to_symbol() {
        let (program, diagnostics) = parse("x: u32 := 42;");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let assignment = statement.borrow().rhs.clone().unwrap();
        assert_eq!(assignment.borrow().kind, AstNodeKind::Assignment);
        let target = assignment.borrow().lhs.clone().unwrap();
        assert_eq!(target.borrow().kind, AstNodeKind::Symbol);
        let declared_type = target.borrow().rhs.clone().unwrap();
        assert_eq!(declared_type.borrow().kind, AstNodeKind::TypeIdentifier);
        assert_eq!(declared_type.borrow().token.value, "u32");
    }

    #[test]
    fn loop_label_is_still_recognized_ahead_of_for() {
        let (program, diagnostics) = parse("outer: for i in xs { break; }");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let labels = statement.borrow().lhs.clone().unwrap();
        assert_eq!(labels.borrow().children.len(), 1);
        assert_eq!(labels.borrow().children[0].borrow().token.value, "outer");
    }

    #[test]
    fn proc_call_builds_argument_list() {
        let (program, diagnostics) = parse("x := foo(1, 2, 3);");
        assert!(diagnostics.entries().is_empty());
        let body = &program.borrow().children[0];
        let statement = &body.borrow().children[0];
        let assignment = statement.borrow().rhs.clone().unwrap();
        let call = assignment.borrow().rhs.clone().unwrap();
        assert_eq!(call.borrow().kind, AstNodeKind::ProcCall);
        let args = call.borrow().rhs.clone().unwrap();
        assert_eq!(args.borrow().children.len(), 3);
    }
}

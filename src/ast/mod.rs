//! The AST node model and builder (SPEC_FULL.md §3 "AST Node", §4.2).
//! The parser lives in `ast::parser`; this module only owns node shape
//! and construction.

pub mod parser;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::token::Token;

/// A closed set of AST node kinds. One variant per production the
/// parser can build; the evaluator's dispatch table is keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstNodeKind {
    Program,
    Statement,
    Expression,
    Assignment,
    BasicBlock,
    Symbol,
    SymbolPart,
    TypeIdentifier,
    ArgumentList,
    ParameterList,
    Directive,
    Attribute,
    Pair,
    Label,
    LabelList,

    NullLiteral,
    NoneLiteral,
    NumberLiteral,
    StringLiteral,
    CharacterLiteral,
    BooleanLiteral,

    UnaryOperator,
    BinaryOperator,

    ProcExpression,
    ProcCall,

    IfExpression,
    ElseIfExpression,
    ElseExpression,

    ForIn,
    While,
    Break,
    Continue,
    Return,

    Namespace,
    Struct,
    Union,
    Enum,
    Module,
    Import,
    Alias,
    Defer,
    With,
    Cast,
    Transmute,

    SubscriptExpression,
    ConstantExpression,

    LineComment,
    BlockComment,
}

impl AstNodeKind {
    pub fn name(self) -> &'static str {
        use AstNodeKind::*;
        match self {
            Program => "program",
            Statement => "statement",
            Expression => "expression",
            Assignment => "assignment",
            BasicBlock => "basic_block",
            Symbol => "symbol",
            SymbolPart => "symbol_part",
            TypeIdentifier => "type_identifier",
            ArgumentList => "argument_list",
            ParameterList => "parameter_list",
            Directive => "directive",
            Attribute => "attribute",
            Pair => "pair",
            Label => "label",
            LabelList => "label_list",
            NullLiteral => "null_literal",
            NoneLiteral => "none_literal",
            NumberLiteral => "number_literal",
            StringLiteral => "string_literal",
            CharacterLiteral => "character_literal",
            BooleanLiteral => "boolean_literal",
            UnaryOperator => "unary_operator",
            BinaryOperator => "binary_operator",
            ProcExpression => "proc_expression",
            ProcCall => "proc_call",
            IfExpression => "if_expression",
            ElseIfExpression => "elseif_expression",
            ElseExpression => "else_expression",
            ForIn => "for_in_statement",
            While => "while_statement",
            Break => "break_statement",
            Continue => "continue_statement",
            Return => "return_statement",
            Namespace => "namespace_statement",
            Struct => "struct_expression",
            Union => "union_expression",
            Enum => "enum_expression",
            Module => "module",
            Import => "import_expression",
            Alias => "alias_statement",
            Defer => "defer_statement",
            With => "with_expression",
            Cast => "cast_expression",
            Transmute => "transmute_expression",
            SubscriptExpression => "subscript_expression",
            ConstantExpression => "constant_statement",
            LineComment => "line_comment",
            BlockComment => "block_comment",
        }
    }
}

impl fmt::Display for AstNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Array / pointer / spread markers attached to a type identifier node.
/// Mirrors the original's packed flags byte; kept as three bools here
/// since Rust has no use for the bit-packing and the clarity is worth
/// the extra byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub pointer: bool,
    pub array: bool,
    pub spread: bool,
}

impl NodeFlags {
    pub fn none() -> NodeFlags {
        NodeFlags::default()
    }
}

pub type AstRef = Rc<RefCell<AstNode>>;

/// One AST node. Shared via `Rc<RefCell<_>>` because a node under
/// construction may be observed through both `children` and `lhs`/`rhs`
/// before the statement wrapping it is finished (e.g. a pending label
/// attaches to whatever statement comes next).
#[derive(Debug)]
pub struct AstNode {
    pub id: u32,
    pub token: Token,
    pub kind: AstNodeKind,
    pub children: Vec<AstRef>,
    pub lhs: Option<AstRef>,
    pub rhs: Option<AstRef>,
    pub flags: NodeFlags,
    pub parent: Option<Weak<RefCell<AstNode>>>,
}

impl AstNode {
    pub fn is_kind(&self, kind: AstNodeKind) -> bool {
        self.kind == kind
    }
}

/// Owns the monotonic node id counter, the in-progress scope stack, and
/// a per-scope queue of attributes parsed before the statement they'll
/// attach to is known (SPEC_FULL.md §4.2).
pub struct AstBuilder {
    next_id: u32,
    scope_stack: Vec<AstRef>,
    pending_attributes: Vec<Vec<AstRef>>,
}

impl AstBuilder {
    pub fn new() -> AstBuilder {
        AstBuilder { next_id: 0, scope_stack: Vec::new(), pending_attributes: Vec::new() }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Stamps id/token/kind on a fresh, parentless node.
    pub fn make_node(&mut self, kind: AstNodeKind, token: Token) -> AstRef {
        let id = self.next_id();
        Rc::new(RefCell::new(AstNode {
            id,
            token,
            kind,
            children: Vec::new(),
            lhs: None,
            rhs: None,
            flags: NodeFlags::none(),
            parent: None,
        }))
    }

    /// Sets `child`'s parent back-reference to `parent`, then appends
    /// `child` to `parent.children`.
    pub fn adopt(&mut self, parent: &AstRef, child: AstRef) {
        child.borrow_mut().parent = Some(Rc::downgrade(parent));
        parent.borrow_mut().children.push(child);
    }

    pub fn with_lhs_rhs(&mut self, kind: AstNodeKind, token: Token, lhs: Option<AstRef>, rhs: Option<AstRef>) -> AstRef {
        let node = self.make_node(kind, token);
        if let Some(lhs) = lhs {
            lhs.borrow_mut().parent = Some(Rc::downgrade(&node));
            node.borrow_mut().lhs = Some(lhs);
        }
        if let Some(rhs) = rhs {
            rhs.borrow_mut().parent = Some(Rc::downgrade(&node));
            node.borrow_mut().rhs = Some(rhs);
        }
        node
    }

    pub fn binary_operator_node(&mut self, lhs: AstRef, token: Token, rhs: AstRef) -> AstRef {
        self.with_lhs_rhs(AstNodeKind::BinaryOperator, token, Some(lhs), Some(rhs))
    }

    /// Begins a new scope: a fresh `basic_block` node pushed onto the
    /// scope stack with its own pending-attribute queue. Paired with
    /// `end_scope`.
    pub fn begin_scope(&mut self, token: Token) -> AstRef {
        let block = self.make_node(AstNodeKind::BasicBlock, token);
        self.push_scope(block.clone());
        block
    }

    pub fn push_scope(&mut self, node: AstRef) {
        self.scope_stack.push(node);
        self.pending_attributes.push(Vec::new());
    }

    /// Pops the innermost scope and returns it. Panics if the stack is
    /// empty — every `begin_scope`/`push_scope` in a well-formed parse
    /// is matched by exactly one `end_scope`.
    pub fn end_scope(&mut self) -> AstRef {
        self.pending_attributes.pop();
        self.scope_stack.pop().expect("scope stack underflow")
    }

    pub fn current_scope(&self) -> Option<&AstRef> {
        self.scope_stack.last()
    }

    pub fn queue_attribute(&mut self, node: AstRef) {
        if let Some(queue) = self.pending_attributes.last_mut() {
            queue.push(node);
        }
    }

    /// Drains this scope's pending attributes, handing them to whatever
    /// statement is about to be appended (`parse_scope`'s job).
    pub fn take_pending_attributes(&mut self) -> Vec<AstRef> {
        self.pending_attributes.last_mut().map(std::mem::take).unwrap_or_default()
    }
}

impl Default for AstBuilder {
    fn default() -> AstBuilder {
        AstBuilder::new()
    }
}

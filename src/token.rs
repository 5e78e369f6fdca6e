//! Token kinds and the token record the parser consumes. The lexer
//! (src/lexer.rs) is the only producer; everything downstream only
//! depends on `Token`/`TokenKind`, never on how they were scanned
//! (SPEC_FULL.md §4.8).

use std::fmt;

use crate::source::Span;

/// A closed set of token kinds. Keyword variants are split out from
/// `Identifier` at lex time so the parser's prefix/infix tables can key
/// directly off the kind rather than re-matching string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    NumberLiteral,
    StringLiteral,
    CharacterLiteral,
    True,
    False,
    Null,
    LineComment,
    BlockCommentStart,
    BlockCommentEnd,

    // punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Ampersand,
    Pipe,
    Tilde,
    Bang,
    Equal,
    ColonEqual,
    EqualEqual,
    BangEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    AmpAmp,
    PipePipe,
    ShiftLeft,
    ShiftRight,
    Comma,
    Colon,
    ScopeOperator, // `::`
    Dot,
    DotDotDot, // spread
    Semicolon,
    At,       // attribute
    Hash,     // directive
    LeftParen,
    RightParen,
    LeftCurly,
    RightCurly,
    LeftSquare,
    RightSquare,
    Label, // `name:` used as a statement label

    // keywords
    Alias,
    Import,
    From,
    Break,
    Continue,
    Return,
    If,
    Else,
    ElseIf,
    For,
    In,
    While,
    Defer,
    With,
    Namespace,
    Struct,
    Union,
    Enum,
    Module,
    Cast,
    Transmute,
    Proc,

    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Dispatches what kind of literal a numeric token represents, and
/// whether it carries an explicit sign marker. Mirrors the original
/// `number_types_t` / sign flag pairing (SPEC_FULL.md §3, Token).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    Integer,
    FloatingPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn value(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }
}

/// The outcome of parsing a token's textual value into a concrete
/// numeric type. Distinguishes "the text just isn't a number" from
/// "the number doesn't fit" so the evaluator can raise the right kind
/// of P041 detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionResult {
    Success,
    Overflow,
    Underflow,
    Inconvertible,
}

/// A single lexical token: stable id, kind, a view into the owning
/// source (the `Span` already carries that), and — for numbers — radix
/// and signedness. `value` is materialized eagerly rather than kept as
/// a `&str` slice so tokens outlive the lexer that produced them
/// without a lifetime parameter threading through the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
    pub number_type: Option<NumberType>,
    pub radix: Radix,
    pub is_signed: bool,
}

impl Token {
    pub fn new(id: u32, kind: TokenKind, value: impl Into<String>, span: Span) -> Token {
        Token {
            id,
            kind,
            value: value.into(),
            span,
            number_type: None,
            radix: Radix::Decimal,
            is_signed: false,
        }
    }

    pub fn numeric(
        id: u32,
        value: impl Into<String>,
        span: Span,
        number_type: NumberType,
        radix: Radix,
        is_signed: bool,
    ) -> Token {
        Token {
            id,
            kind: TokenKind::NumberLiteral,
            value: value.into(),
            span,
            number_type: Some(number_type),
            radix,
            is_signed,
        }
    }

    pub fn is_line_comment(&self) -> bool {
        self.kind == TokenKind::LineComment
    }

    pub fn is_label(&self) -> bool {
        self.kind == TokenKind::Label
    }

    /// Parses this token's text as an unsigned 64-bit integer in its
    /// recorded radix. Two's-complement application for a signed
    /// marker is the caller's job (the evaluator's `number_literal`
    /// handler), not this method's — parsing and reinterpretation are
    /// kept separate so the `Overflow`/`Inconvertible` distinction
    /// stays meaningful.
    pub fn parse_u64(&self) -> (u64, ConversionResult) {
        let text = self.value.replace('_', "");
        match u64::from_str_radix(&text, self.radix.value()) {
            Ok(value) => (value, ConversionResult::Success),
            Err(_) => {
                // Distinguish "too big" from "not a number at all" so
                // callers can report a more specific P041 detail.
                if text.chars().all(|c| c.is_digit(self.radix.value())) && !text.is_empty() {
                    (0, ConversionResult::Overflow)
                } else {
                    (0, ConversionResult::Inconvertible)
                }
            }
        }
    }

    pub fn parse_f64(&self) -> (f64, ConversionResult) {
        match self.value.parse::<f64>() {
            Ok(value) if value.is_finite() => (value, ConversionResult::Success),
            Ok(value) if value == f64::INFINITY => (value, ConversionResult::Overflow),
            Ok(value) if value == f64::NEG_INFINITY => (value, ConversionResult::Underflow),
            _ => (0.0, ConversionResult::Inconvertible),
        }
    }

    pub fn as_bool(&self) -> bool {
        self.kind == TokenKind::True
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::{Source, Span};
    use std::rc::Rc;

    fn dummy_span() -> Span {
        let source = Rc::new(Source::in_memory("x"));
        Span::new(&source, 0, 1)
    }

    #[test]
    fn parses_decimal_integer() {
        let token = Token::numeric(0, "42", dummy_span(), NumberType::Integer, Radix::Decimal, false);
        assert_eq!(token.parse_u64(), (42, ConversionResult::Success));
    }

    #[test]
    fn parses_hex_integer_with_underscores() {
        let token = Token::numeric(0, "FF_00", dummy_span(), NumberType::Integer, Radix::Hexadecimal, false);
        assert_eq!(token.parse_u64(), (0xFF00, ConversionResult::Success));
    }

    #[test]
    fn flags_overflow_separately_from_inconvertible() {
        let too_big = Token::numeric(
            0,
            "999999999999999999999999",
            dummy_span(),
            NumberType::Integer,
            Radix::Decimal,
            false,
        );
        assert_eq!(too_big.parse_u64().1, ConversionResult::Overflow);

        let garbage = Token::numeric(0, "0xzz", dummy_span(), NumberType::Integer, Radix::Decimal, false);
        assert_eq!(garbage.parse_u64().1, ConversionResult::Inconvertible);
    }
}

//! A minimal, real lexer for the Language, plus the `TokenSource` trait
//! the parser depends on instead of this concrete type (SPEC_FULL.md
//! §4.8, §6). Scanning rules are deliberately unsurprising: greedy
//! longest-match over a fixed keyword/operator table. This is scaffolding
//! for the core, not the subject of this crate.

use std::collections::HashMap;
use std::rc::Rc;

use crate::source::{Source, Span};
use crate::token::{NumberType, Radix, Token, TokenKind};

/// The contract the parser needs from a token producer. A concrete
/// `Lexer` ships here so the pipeline is runnable end-to-end, but the
/// parser only ever names this trait — swapping scanning strategies
/// later never touches parser code.
pub trait TokenSource {
    fn next(&mut self) -> Option<Token>;
    fn has_next(&self) -> bool;
}

fn keyword_table() -> &'static HashMap<&'static str, TokenKind> {
    use TokenKind::*;
    static TABLE: std::sync::OnceLock<HashMap<&'static str, TokenKind>> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("true", True),
            ("false", False),
            ("null", Null),
            ("alias", Alias),
            ("import", Import),
            ("from", From),
            ("break", Break),
            ("continue", Continue),
            ("return", Return),
            ("if", If),
            ("else", Else),
            ("elseif", ElseIf),
            ("for", For),
            ("in", In),
            ("while", While),
            ("defer", Defer),
            ("with", With),
            ("namespace", Namespace),
            ("struct", Struct),
            ("union", Union),
            ("enum", Enum),
            ("module", Module),
            ("cast", Cast),
            ("transmute", Transmute),
            ("proc", Proc),
        ])
    })
}

/// Streams tokens one at a time from a `Source`'s contents. Holds no
/// buffered lookahead of its own — the parser's `look_ahead` is
/// responsible for that (SPEC_FULL.md §4.1).
pub struct Lexer {
    source: Rc<Source>,
    index: usize,
    next_id: u32,
}

impl Lexer {
    pub fn new(source: Rc<Source>) -> Lexer {
        Lexer { source, index: 0, next_id: 0 }
    }

    fn remaining(&self) -> &str {
        &self.source.contents[self.index..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn make_span(&self, start: usize, len: usize) -> Span {
        Span::new(&self.source, start, len)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.index += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Skips whitespace starting at byte offset `from` and reports
    /// whether a `for` or `while` keyword (as a whole word) begins
    /// right after it. Used to decide whether `name:` is a loop label
    /// rather than a type annotation, without committing to either
    /// token shape until the keyword is actually visible.
    fn loop_keyword_follows(&self, from: usize) -> bool {
        let rest = self.source.contents[from..].trim_start();
        for keyword in ["for", "while"] {
            if let Some(tail) = rest.strip_prefix(keyword) {
                if !tail.chars().next().map(is_identifier_continue).unwrap_or(false) {
                    return true;
                }
            }
        }
        false
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> (usize, usize) {
        let start = self.index;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.index += c.len_utf8();
            } else {
                break;
            }
        }
        (start, self.index - start)
    }

    fn next_token_inner(&mut self) -> Option<Token> {
        self.skip_whitespace();

        let c = self.peek_char()?;
        let start = self.index;
        let id = self.next_id;
        self.next_id += 1;

        // line comment: `//...`
        if c == '/' && self.peek_at(1) == Some('/') {
            let (s, len) = self.take_while(|c| c != '\n');
            let text = self.source.contents[s..s + len].to_string();
            return Some(Token::new(id, TokenKind::LineComment, text, self.make_span(start, len)));
        }

        // block comment: `/* ... */`
        if c == '/' && self.peek_at(1) == Some('*') {
            self.index += 2;
            let body_start = self.index;
            while self.index < self.source.contents.len() {
                if self.peek_char() == Some('*') && self.peek_at(1) == Some('/') {
                    break;
                }
                self.index += self.peek_char().map(|c| c.len_utf8()).unwrap_or(1);
            }
            let text = self.source.contents[body_start..self.index].to_string();
            self.index = (self.index + 2).min(self.source.contents.len());
            let len = self.index - start;
            return Some(Token::new(id, TokenKind::BlockCommentStart, text, self.make_span(start, len)));
        }

        if c.is_ascii_digit() {
            return Some(self.lex_number(id, start));
        }

        if c == '"' {
            return Some(self.lex_string(id, start));
        }

        if c == '\'' {
            return Some(self.lex_char(id, start));
        }

        if is_identifier_start(c) {
            let (s, len) = self.take_while(is_identifier_continue);
            let text = self.source.contents[s..s + len].to_string();

            // `name:` only reads as a loop label when a `for`/`while`
            // follows the colon; otherwise the colon is a plain token
            // and the parser's type-annotation infix owns it (a bare
            // type annotation like `x: u32` would otherwise be
            // swallowed as a label the same way `outer: for ...` is).
            if self.peek_char() == Some(':')
                && self.peek_at(1) != Some(':')
                && self.peek_at(1) != Some('=')
                && self.loop_keyword_follows(self.index + 1)
            {
                self.index += 1;
                return Some(Token::new(
                    id,
                    TokenKind::Label,
                    text,
                    self.make_span(start, self.index - start),
                ));
            }

            if let Some(&kind) = keyword_table().get(text.as_str()) {
                return Some(Token::new(id, kind, text, self.make_span(start, len)));
            }

            return Some(Token::new(id, TokenKind::Identifier, text, self.make_span(start, len)));
        }

        self.lex_operator(id, start)
    }

    fn lex_number(&mut self, id: u32, start: usize) -> Token {
        let mut radix = Radix::Decimal;
        if self.peek_char() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => {
                    radix = Radix::Hexadecimal;
                    self.index += 2;
                }
                Some('o') | Some('O') => {
                    radix = Radix::Octal;
                    self.index += 2;
                }
                Some('b') | Some('B') => {
                    radix = Radix::Binary;
                    self.index += 2;
                }
                _ => {}
            }
        }

        let digit_start = self.index;
        let mut number_type = NumberType::Integer;
        while let Some(c) = self.peek_char() {
            if c.is_digit(radix.value()) || c == '_' {
                self.index += 1;
            } else if radix == Radix::Decimal && c == '.' && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
            {
                number_type = NumberType::FloatingPoint;
                self.index += 1;
            } else {
                break;
            }
        }

        let digits = &self.source.contents[digit_start..self.index];
        let value = if radix == Radix::Decimal {
            digits.to_string()
        } else {
            digits.to_string()
        };
        let is_signed = false;
        let len = self.index - start;
        Token::numeric(id, value, self.make_span(start, len), number_type, radix, is_signed)
    }

    fn lex_string(&mut self, id: u32, start: usize) -> Token {
        self.index += 1; // opening quote
        let body_start = self.index;
        while let Some(c) = self.peek_char() {
            if c == '"' {
                break;
            }
            if c == '\\' {
                self.index += 1;
            }
            self.index += self.peek_char().map(|c| c.len_utf8()).unwrap_or(1);
        }
        let text = self.source.contents[body_start..self.index].to_string();
        if self.peek_char() == Some('"') {
            self.index += 1;
        }
        let len = self.index - start;
        Token::new(id, TokenKind::StringLiteral, text, self.make_span(start, len))
    }

    fn lex_char(&mut self, id: u32, start: usize) -> Token {
        self.index += 1; // opening quote
        let body_start = self.index;
        if self.peek_char() == Some('\\') {
            self.index += 1;
        }
        self.index += self.peek_char().map(|c| c.len_utf8()).unwrap_or(1);
        let text = self.source.contents[body_start..self.index].to_string();
        if self.peek_char() == Some('\'') {
            self.index += 1;
        }
        let len = self.index - start;
        Token::new(id, TokenKind::CharacterLiteral, text, self.make_span(start, len))
    }

    fn lex_operator(&mut self, id: u32, start: usize) -> Option<Token> {
        // Longest-match over a small fixed table: three-char, then
        // two-char, then single-char operators.
        const THREE: &[(&str, TokenKind)] = &[("...", TokenKind::DotDotDot)];
        const TWO: &[(&str, TokenKind)] = &[
            ("::", TokenKind::ScopeOperator),
            (":=", TokenKind::ColonEqual),
            ("==", TokenKind::EqualEqual),
            ("!=", TokenKind::BangEqual),
            ("<=", TokenKind::LessEqual),
            (">=", TokenKind::GreaterEqual),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("<<", TokenKind::ShiftLeft),
            (">>", TokenKind::ShiftRight),
        ];

        let rest = self.remaining();
        for (text, kind) in THREE {
            if rest.starts_with(text) {
                self.index += text.len();
                return Some(Token::new(id, *kind, *text, self.make_span(start, text.len())));
            }
        }
        for (text, kind) in TWO {
            if rest.starts_with(text) {
                self.index += text.len();
                return Some(Token::new(id, *kind, *text, self.make_span(start, text.len())));
            }
        }

        let c = self.peek_char()?;
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '&' => TokenKind::Ampersand,
            '|' => TokenKind::Pipe,
            '~' => TokenKind::Tilde,
            '!' => TokenKind::Bang,
            '=' => TokenKind::Equal,
            '<' => TokenKind::LessThan,
            '>' => TokenKind::GreaterThan,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '@' => TokenKind::At,
            '#' => TokenKind::Hash,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftCurly,
            '}' => TokenKind::RightCurly,
            '[' => TokenKind::LeftSquare,
            ']' => TokenKind::RightSquare,
            _ => return None,
        };
        self.index += c.len_utf8();
        Some(Token::new(id, kind, c.to_string(), self.make_span(start, c.len_utf8())))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl TokenSource for Lexer {
    fn next(&mut self) -> Option<Token> {
        self.next_token_inner()
    }

    fn has_next(&self) -> bool {
        self.index < self.source.contents.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::Source;

    fn tokens_of(text: &str) -> Vec<Token> {
        let source = Rc::new(Source::in_memory(text));
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        while let Some(token) = lexer.next() {
            out.push(token);
        }
        out
    }

    #[test]
    fn lexes_declaration() {
        let tokens = tokens_of("x: u32 := 42;");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::ColonEqual,
                TokenKind::NumberLiteral,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_qualified_symbol() {
        let tokens = tokens_of("core::math::pi");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::ScopeOperator,
                TokenKind::Identifier,
                TokenKind::ScopeOperator,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn lexes_keyword_import() {
        let tokens = tokens_of("import io;");
        assert_eq!(tokens[0].kind, TokenKind::Import);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn lexes_hex_float_and_string() {
        let tokens = tokens_of("x := 0xFF; y := 3.14; z := \"hi\";");
        assert_eq!(tokens[2].kind, TokenKind::NumberLiteral);
        assert_eq!(tokens[2].radix, Radix::Hexadecimal);
        assert_eq!(tokens[6].number_type, Some(NumberType::FloatingPoint));
        assert_eq!(tokens[10].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[10].value, "hi");
    }
}

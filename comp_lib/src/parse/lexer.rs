use crate::diagnostic::{Diagnostic, DiagnosticBuilder, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// The digits of an integer literal, without sign.
    Int(String),
    Float(f64),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    ColonEq,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(ident) if ident == name)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '.' | '#')
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '#' | '$')
}

struct Lexer<'s> {
    source: &'s str,
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<Diagnostic>,
}

impl<'s> Lexer<'s> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::from(start..self.pos),
        });
    }

    fn number(&mut self, start: usize) {
        self.eat_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
            // Digits, a dot and digits always form a valid float.
            let value = self.source[start..self.pos].parse().unwrap_or(f64::NAN);
            self.push(TokenKind::Float(value), start);
        } else {
            let digits = self.source[start..self.pos].to_owned();
            self.push(TokenKind::Int(digits), start);
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, start);
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => self.eat_while(|c| c != '\n'),
                c if c.is_ascii_digit() => self.number(start),
                c if is_ident_start(c) => {
                    self.eat_while(is_ident_continue);
                    let ident = self.source[start..self.pos].to_owned();
                    self.push(TokenKind::Ident(ident), start);
                }
                _ => {
                    self.bump();
                    let second = self.peek();
                    let mut two = |kind| {
                        self.bump();
                        Some(kind)
                    };
                    let kind = match (c, second) {
                        (':', Some('=')) => two(TokenKind::ColonEq),
                        ('=', Some('=')) => two(TokenKind::EqEq),
                        ('!', Some('=')) => two(TokenKind::NotEq),
                        ('<', Some('=')) => two(TokenKind::Le),
                        ('>', Some('=')) => two(TokenKind::Ge),
                        ('(', _) => Some(TokenKind::LParen),
                        (')', _) => Some(TokenKind::RParen),
                        ('{', _) => Some(TokenKind::LBrace),
                        ('}', _) => Some(TokenKind::RBrace),
                        ('[', _) => Some(TokenKind::LBracket),
                        (']', _) => Some(TokenKind::RBracket),
                        (',', _) => Some(TokenKind::Comma),
                        (':', _) => Some(TokenKind::Colon),
                        ('=', _) => Some(TokenKind::Eq),
                        ('<', _) => Some(TokenKind::Lt),
                        ('>', _) => Some(TokenKind::Gt),
                        ('+', _) => Some(TokenKind::Plus),
                        ('-', _) => Some(TokenKind::Minus),
                        ('*', _) => Some(TokenKind::Star),
                        ('/', _) => Some(TokenKind::Slash),
                        ('%', _) => Some(TokenKind::Percent),
                        _ => None,
                    };
                    match kind {
                        Some(kind) => self.push(kind, start),
                        None => {
                            let unexpected = &self.source[start..self.pos];
                            self.errors.push(
                                DiagnosticBuilder::new(start..self.pos)
                                    .build_syntax_error(unexpected, vec![]),
                            );
                        }
                    }
                }
            }
        }
        let end = self.source.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::from(end..end),
        });
        (self.tokens, self.errors)
    }
}

/// Splits `source` into tokens. Characters that don't start any token are reported and skipped.
/// The last token is always [`TokenKind::Eof`].
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer {
        source,
        pos: 0,
        tokens: Vec::new(),
        errors: Vec::new(),
    }
    .run()
}

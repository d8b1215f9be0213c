//! Reader for functions written in the textual form of the IR.
//!
//! ```text
//! fun div3(a: i64*, b: i64) {
//! entry:
//!     x = load a
//!     y = x / b          // one instruction per line
//!     return y
//! }
//! ```
//!
//! Instructions use the same syntax as their [`Display`](std::fmt::Display) implementation.
//! Loads and calls can give the type of their result with `x: T = ...`, call arguments with
//! `f(a: T)`. Errors are collected per line, so all of them are reported at once.


mod lexer;

use crate::diagnostic::{AggregateResult, Diagnostic, DiagnosticBuilder, Span};
use lexer::{Token, TokenKind};
use ssa_ir::{
    Argument, BinOp, CmpOp, FunctionDescriptor, Instruction, Label, Line, Type, Value, Variable,
};
use std::collections::HashMap;
use std::sync::Arc;
use vec1::Vec1;

type PResult<T> = Result<T, Diagnostic>;

/// Parses all functions in `source`.
pub fn parse(source: &str) -> AggregateResult<Vec<FunctionDescriptor>> {
    let (tokens, lex_errors) = lexer::lex(source);
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        errors: lex_errors,
        warnings: Vec::new(),
    };
    let functions = parser.module();

    let mut res = AggregateResult::new_ok(functions);
    for warning in parser.warnings {
        res.add_rec_diagnostic(warning);
    }
    for error in parser.errors {
        res.add_err(error);
    }
    res
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        let found = self.at(kind);
        if found {
            self.next();
        }
        found
    }

    fn describe(&self, token: &Token) -> String {
        match token.kind {
            TokenKind::Newline => "end of line".to_owned(),
            TokenKind::Eof => "end of file".to_owned(),
            _ => self.source[std::ops::Range::from(token.span)].to_owned(),
        }
    }

    fn unexpected(&self, expected: Vec<&str>) -> Diagnostic {
        let token = self.peek();
        DiagnosticBuilder::new(token.span).build_syntax_error(&self.describe(token), expected)
    }

    fn expect(&mut self, kind: TokenKind, text: &str) -> PResult<Span> {
        if self.at(&kind) {
            Ok(self.next().span)
        } else {
            Err(self.unexpected(vec![text]))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Span> {
        if self.peek().is_ident(keyword) {
            Ok(self.next().span)
        } else {
            Err(self.unexpected(vec![keyword]))
        }
    }

    fn ident(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => Ok((name, self.next().span)),
            _ => Err(self.unexpected(vec![what])),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// Skips the rest of the current line.
    fn recover_line(&mut self) {
        while !matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
        ) {
            self.next();
        }
    }

    /// Skips everything up to the next function.
    fn recover_function(&mut self) {
        self.next();
        while !self.peek().is_ident("fun") && !self.at(&TokenKind::Eof) {
            self.next();
        }
    }

    fn module(&mut self) -> Vec<FunctionDescriptor> {
        let mut functions = Vec::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::Eof) {
                break;
            }
            match self.function() {
                Ok((function, span)) => {
                    let name = function.name.to_string();
                    match seen.get(&name) {
                        Some(&first) => self
                            .errors
                            .push(DiagnosticBuilder::new(span).build_duplicate_function(&name, first)),
                        None => {
                            seen.insert(name, span);
                            functions.push(function);
                        }
                    }
                }
                Err(error) => {
                    self.errors.push(error);
                    self.recover_function();
                }
            }
        }
        functions
    }

    /// Parses a function, returning it with the span of its name.
    fn function(&mut self) -> PResult<(FunctionDescriptor, Span)> {
        self.expect_keyword("fun")?;
        let (name, name_span) = self.ident("function name")?;
        let mut function = FunctionDescriptor::new(Label::from(name.as_str()));

        self.expect(TokenKind::LParen, "(")?;
        let mut params: HashMap<String, Span> = HashMap::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (param, span) = self.ident("parameter name")?;
                self.expect(TokenKind::Colon, ":")?;
                let ty = self.ty()?;
                match params.get(&param) {
                    Some(&first) => self
                        .errors
                        .push(DiagnosticBuilder::new(span).build_duplicate_param(&param, first)),
                    None => {
                        params.insert(param.clone(), span);
                        function.params.push((ty, Arc::from(param)));
                    }
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        self.expect(TokenKind::LBrace, "{")?;

        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected(vec!["}"]));
            }
            match self.line() {
                Ok(line) => function.body.push(line),
                Err(error) => {
                    self.errors.push(error);
                    self.recover_line();
                }
            }
        }

        if !function
            .body
            .iter()
            .any(|line| matches!(line, Line::Instruction(_)))
        {
            self.warnings
                .push(DiagnosticBuilder::new(name_span).build_empty_function(&name));
        }
        Ok((function, name_span))
    }

    fn ty(&mut self) -> PResult<Type> {
        let (name, span) = self.ident("type")?;
        let mut ty = match name.as_str() {
            "i64" => Type::Int64,
            "blob" => {
                self.expect(TokenKind::LParen, "(")?;
                let size = self.unsigned()?;
                self.expect(TokenKind::RParen, ")")?;
                Type::Blob(size)
            }
            _ => return Err(DiagnosticBuilder::new(span).build_invalid_type(&name)),
        };
        while self.eat(&TokenKind::Star) {
            ty = ty.pointer_to();
        }
        Ok(ty)
    }

    fn line(&mut self) -> PResult<Line> {
        let TokenKind::Ident(name) = self.peek().kind.clone() else {
            return Err(self.unexpected(vec!["label", "instruction"]));
        };

        // A label stands alone on its line, otherwise `name:` starts a type annotation.
        let is_label = self.peek_nth(1).kind == TokenKind::Colon
            && matches!(
                self.peek_nth(2).kind,
                TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
            );
        if is_label {
            self.next();
            self.next();
            return Ok(Line::Label(Label::from(name)));
        }

        let instruction = match name.as_str() {
            "store" | "stack_free" | "call" | "goto" | "if" | "return" => self.statement()?,
            _ => match self.peek_nth(1).kind {
                TokenKind::Eq | TokenKind::ColonEq | TokenKind::Colon => self.definition()?,
                _ => {
                    let span = self.peek().span;
                    return Err(DiagnosticBuilder::new(span).build_unknown_instruction(&name));
                }
            },
        };
        self.end_of_line()?;
        Ok(Line::Instruction(instruction))
    }

    fn end_of_line(&mut self) -> PResult<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.next();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected(vec!["end of line"])),
        }
    }

    /// Instructions that don't define a variable.
    fn statement(&mut self) -> PResult<Instruction> {
        let (keyword, _) = self.ident("instruction")?;
        match keyword.as_str() {
            "store" => {
                let address = self.value()?;
                self.expect(TokenKind::Comma, ",")?;
                let value = self.value()?;
                Ok(Instruction::Store { address, value })
            }
            "stack_free" => {
                self.expect(TokenKind::LParen, "(")?;
                let size = self.unsigned()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(Instruction::StackFree { size })
            }
            "call" => {
                let (function, args) = self.call()?;
                Ok(Instruction::Call { function, args })
            }
            "goto" => Ok(Instruction::Jump {
                target: self.label()?,
            }),
            "if" => {
                self.expect(TokenKind::LParen, "(")?;
                let left = self.value()?;
                let op = self.comparison()?;
                let right = self.value()?;
                self.expect(TokenKind::RParen, ")")?;
                self.expect_keyword("goto")?;
                let target = self.label()?;
                Ok(Instruction::CompareJump {
                    op,
                    left,
                    right,
                    target,
                })
            }
            "return" => {
                let value = match self.peek().kind {
                    TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof => None,
                    _ => Some(self.value()?),
                };
                Ok(Instruction::Return { value })
            }
            _ => unreachable!("ICE: `{keyword}` is not a statement"),
        }
    }

    fn definition(&mut self) -> PResult<Instruction> {
        let (name, _) = self.ident("variable")?;
        let lhs = Variable::new(name);

        let annotation = match self.eat(&TokenKind::Colon) {
            true => {
                let start = self.peek().span;
                let ty = self.ty()?;
                Some((ty, start.to(self.tokens[self.pos - 1].span)))
            }
            false => None,
        };
        if self.eat(&TokenKind::ColonEq) {
            if let Some((_, span)) = annotation {
                return Err(DiagnosticBuilder::new(span).build_unexpected_annotation());
            }
            let rhs = self.value()?;
            return Ok(Instruction::Copy { lhs, rhs });
        }
        self.expect(TokenKind::Eq, "=")?;

        let token = self.peek().clone();
        let (instruction, typed) = if token.is_ident("load") {
            self.next();
            let address = self.value()?;
            let ty = annotation.clone().map_or(Type::Int64, |(ty, _)| ty);
            (Instruction::Load { lhs, ty, address }, true)
        } else if token.is_ident("call") {
            self.next();
            let (function, args) = self.call()?;
            let ty = annotation.clone().map_or(Type::Int64, |(ty, _)| ty);
            let call = Instruction::AssignCall {
                lhs,
                ty,
                function,
                args,
            };
            (call, true)
        } else if token.is_ident("stack_alloc") {
            self.next();
            self.expect(TokenKind::LParen, "(")?;
            let size = self.unsigned()?;
            self.expect(TokenKind::RParen, ")")?;
            (Instruction::StackAlloc { lhs, size }, false)
        } else if token.is_ident("phi") {
            self.next();
            (self.phi(lhs)?, false)
        } else if token.kind == TokenKind::LBracket && self.peek_nth(1).is_ident("externally") {
            self.next();
            self.next();
            self.expect_keyword("assigned")?;
            self.expect(TokenKind::RBracket, "]")?;
            (Instruction::External { lhs, reg: None }, false)
        } else {
            (self.expression(lhs)?, false)
        };

        match annotation {
            Some((_, span)) if !typed => {
                Err(DiagnosticBuilder::new(span).build_unexpected_annotation())
            }
            _ => Ok(instruction),
        }
    }

    /// `a`, `a op b` or `a as T`.
    fn expression(&mut self, lhs: Variable) -> PResult<Instruction> {
        let left = self.value()?;
        let op = match self.peek().kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            _ if self.peek().is_ident("as") => {
                self.next();
                let ty = self.ty()?;
                return Ok(Instruction::Coerce {
                    lhs,
                    value: left,
                    ty,
                });
            }
            _ => return Ok(Instruction::Assign { lhs, rhs: left }),
        };
        self.next();
        let right = self.value()?;
        Ok(Instruction::Binary {
            lhs,
            op,
            left,
            right,
        })
    }

    fn phi(&mut self, lhs: Variable) -> PResult<Instruction> {
        let mut entries = Vec::new();
        loop {
            self.expect(TokenKind::LBracket, "[")?;
            let label = self.label()?;
            self.expect(TokenKind::Comma, ",")?;
            let value = self.value()?;
            self.expect(TokenKind::RBracket, "]")?;
            entries.push((label, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Instruction::Phi { lhs, entries })
    }

    /// `f(a, b: T)`, after the `call` keyword.
    fn call(&mut self) -> PResult<(Arc<str>, Vec<Argument>)> {
        let (function, _) = self.ident("function name")?;
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let value = self.value()?;
                let ty = match self.eat(&TokenKind::Colon) {
                    true => self.ty()?,
                    false => Type::Int64,
                };
                args.push(Argument::new(value, ty));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok((Arc::from(function), args))
    }

    fn comparison(&mut self) -> PResult<CmpOp> {
        let op = match self.peek().kind {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::Ne,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Ge => CmpOp::Ge,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Le => CmpOp::Le,
            _ => return Err(self.unexpected(vec!["==", "!=", ">", ">=", "<", "<="])),
        };
        self.next();
        Ok(op)
    }

    fn label(&mut self) -> PResult<Label> {
        self.ident("label").map(|(name, _)| Label::from(name))
    }

    fn value(&mut self) -> PResult<Value> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) if name == "qword" => {
                self.next();
                self.expect(TokenKind::LBracket, "[")?;
                self.expect_keyword("rbp")?;
                self.expect(TokenKind::Plus, "+")?;
                let offset = self.integer()?;
                self.expect(TokenKind::RBracket, "]")?;
                Ok(Value::Frame(offset))
            }
            TokenKind::Ident(name) => {
                self.next();
                Ok(Value::Var(Variable::new(name)))
            }
            TokenKind::Int(_) | TokenKind::Minus | TokenKind::Float(_) => self.number(),
            TokenKind::LBracket => {
                self.next();
                let value = if self.peek().is_ident("undefined") {
                    self.next();
                    Value::Undefined
                } else {
                    self.expect_keyword("rbp")?;
                    self.expect(TokenKind::Minus, "-")?;
                    Value::StackAddr(self.integer()?)
                };
                self.expect(TokenKind::RBracket, "]")?;
                Ok(value)
            }
            TokenKind::LBrace => {
                self.next();
                let mut values = Vec1::new(self.value()?);
                while self.eat(&TokenKind::Comma) {
                    values.push(self.value()?);
                }
                self.expect(TokenKind::RBrace, "}")?;
                Ok(Value::Composite(values))
            }
            _ => Err(self.unexpected(vec!["value"])),
        }
    }

    fn number(&mut self) -> PResult<Value> {
        let negative = self.eat(&TokenKind::Minus);
        let token = self.next();
        match token.kind {
            TokenKind::Int(digits) => {
                let literal = match negative {
                    true => format!("-{digits}"),
                    false => digits,
                };
                literal
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| DiagnosticBuilder::new(token.span).build_invalid_integer(&literal))
            }
            TokenKind::Float(x) => Ok(Value::Float(if negative { -x } else { x })),
            _ => Err(DiagnosticBuilder::new(token.span)
                .build_syntax_error(&self.describe(&token), vec!["number"])),
        }
    }

    fn integer(&mut self) -> PResult<i64> {
        let span = self.peek().span;
        match self.number()? {
            Value::Int(i) => Ok(i),
            _ => Err(DiagnosticBuilder::new(span).build_syntax_error("float", vec!["integer"])),
        }
    }

    fn unsigned(&mut self) -> PResult<u32> {
        let span = self.peek().span;
        let i = self.integer()?;
        u32::try_from(i)
            .map_err(|_| DiagnosticBuilder::new(span).build_invalid_integer(&i.to_string()))
    }
}

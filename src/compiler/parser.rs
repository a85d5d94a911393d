//! Lexing and parsing for worm source text
//!
//! The surface language is an indentation-sensitive subset: integer
//! literals only, `if`/`while`/`def` statements, and calls to `print`,
//! `int`, `input` and user-defined functions. Anything outside the subset
//! is a compile error with the offending line number.

use crate::compiler::CompileError;
use crate::compiler::ast::{BinOp, BoolOp, CmpOp, Expr, Module, Stmt, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    // keywords
    If,
    Elif,
    Else,
    While,
    Def,
    Return,
    Break,
    Continue,
    And,
    Or,
    Not,
    True,
    False,
    // operators and punctuation
    Plus,
    Minus,
    Star,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashSlashAssign,
    PercentAssign,
    Walrus,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    // layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

fn keyword_or_ident(word: String) -> Token {
    match word.as_str() {
        "if" => Token::If,
        "elif" => Token::Elif,
        "else" => Token::Else,
        "while" => Token::While,
        "def" => Token::Def,
        "return" => Token::Return,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "True" => Token::True,
        "False" => Token::False,
        _ => Token::Ident(word),
    }
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>, CompileError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut line_number = 0;

    for (index, raw) in source.lines().enumerate() {
        line_number = index + 1;

        let mut width = 0;
        let mut body_start = 0;
        for character in raw.chars() {
            match character {
                ' ' => width += 1,
                '\t' => width += 8 - width % 8,
                _ => break,
            }
            body_start += character.len_utf8();
        }
        let body = &raw[body_start..];
        if body.is_empty() || body.starts_with('#') {
            continue;
        }

        if width > *indents.last().unwrap() {
            indents.push(width);
            tokens.push((Token::Indent, line_number));
        } else {
            while width < *indents.last().unwrap() {
                indents.pop();
                tokens.push((Token::Dedent, line_number));
            }
            if width != *indents.last().unwrap() {
                return Err(CompileError::new("Inconsistent indentation.", line_number));
            }
        }

        lex_line(body, line_number, &mut tokens)?;
        tokens.push((Token::Newline, line_number));
    }

    while indents.len() > 1 {
        indents.pop();
        tokens.push((Token::Dedent, line_number));
    }
    tokens.push((Token::Eof, line_number + 1));
    Ok(tokens)
}

fn lex_line(
    text: &str,
    line: usize,
    tokens: &mut Vec<(Token, usize)>,
) -> Result<(), CompileError> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '#' {
            break;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                return Err(CompileError::new("Non-integer literal.", line));
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<i64>()
                .map_err(|_| CompileError::new("Integer literal too large.", line))?;
            tokens.push((Token::Int(value), line));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push((keyword_or_ident(word), line));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('/', Some('/')) => {
                if chars.get(i + 2) == Some(&'=') {
                    (Token::SlashSlashAssign, 3)
                } else {
                    (Token::SlashSlash, 2)
                }
            }
            ('/', _) => return Err(CompileError::new("Unsupported operator '/'.", line)),
            ('*', Some('*')) => return Err(CompileError::new("Unsupported operator '**'.", line)),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtE, 2),
            ('>', Some('=')) => (Token::GtE, 2),
            ('+', Some('=')) => (Token::PlusAssign, 2),
            ('-', Some('=')) => (Token::MinusAssign, 2),
            ('*', Some('=')) => (Token::StarAssign, 2),
            ('%', Some('=')) => (Token::PercentAssign, 2),
            (':', Some('=')) => (Token::Walrus, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            (';', _) => (Token::Semicolon, 1),
            _ => {
                return Err(CompileError::new(
                    format!("Unexpected character '{}'.", c),
                    line,
                ));
            }
        };
        tokens.push((token, line));
        i += width;
    }
    Ok(())
}

/// Parse worm source text into a [`Module`]
pub fn parse(source: &str) -> Result<Module, CompileError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let body = parser.statements_until(&Token::Eof)?;
    Ok(Module { body })
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.position].0
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[index].0
    }

    fn line(&self) -> usize {
        self.tokens[self.position].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].0.clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), CompileError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(CompileError::new("Unexpected token.", self.line()))
        }
    }

    fn statements_until(&mut self, end: &Token) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        while self.peek() != end {
            body.extend(self.statement()?);
        }
        Ok(body)
    }

    /// One logical line: a compound statement, or a `;`-separated run of
    /// simple statements, optionally ending in a compound statement
    fn statement(&mut self) -> Result<Vec<Stmt>, CompileError> {
        if let Some(compound) = self.compound_statement()? {
            return Ok(vec![compound]);
        }
        let mut statements = vec![self.simple_statement()?];
        while self.eat(&Token::Semicolon) {
            if *self.peek() == Token::Newline {
                break;
            }
            if let Some(compound) = self.compound_statement()? {
                // the compound statement's suite consumed the line ending
                statements.push(compound);
                return Ok(statements);
            }
            statements.push(self.simple_statement()?);
        }
        self.expect(&Token::Newline)?;
        Ok(statements)
    }

    fn compound_statement(&mut self) -> Result<Option<Stmt>, CompileError> {
        match self.peek() {
            Token::If => Ok(Some(self.if_statement()?)),
            Token::While => Ok(Some(self.while_statement()?)),
            Token::Def => Ok(Some(self.def_statement()?)),
            _ => Ok(None),
        }
    }

    fn simple_statement_line(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut statements = vec![self.simple_statement()?];
        while self.eat(&Token::Semicolon) {
            if *self.peek() == Token::Newline {
                break;
            }
            statements.push(self.simple_statement()?);
        }
        Ok(statements)
    }

    /// The statements of an indented block, or of an inline suite after `:`
    fn suite(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(&Token::Colon)?;
        if self.eat(&Token::Newline) {
            self.expect(&Token::Indent)?;
            let body = self.statements_until(&Token::Dedent)?;
            self.expect(&Token::Dedent)?;
            Ok(body)
        } else {
            let body = self.simple_statement_line()?;
            self.expect(&Token::Newline)?;
            Ok(body)
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.expect(&Token::If)?;
        let test = self.expression()?;
        let body = self.suite()?;
        let orelse = self.else_clause()?;
        Ok(Stmt::If {
            test,
            body,
            orelse,
            line,
        })
    }

    fn else_clause(&mut self) -> Result<Vec<Stmt>, CompileError> {
        if *self.peek() == Token::Elif {
            let line = self.line();
            self.advance();
            let test = self.expression()?;
            let body = self.suite()?;
            let orelse = self.else_clause()?;
            Ok(vec![Stmt::If {
                test,
                body,
                orelse,
                line,
            }])
        } else if self.eat(&Token::Else) {
            self.suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn while_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.expect(&Token::While)?;
        let test = self.expression()?;
        let body = self.suite()?;
        Ok(Stmt::While { test, body, line })
    }

    fn def_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.expect(&Token::Def)?;
        let Token::Ident(name) = self.advance() else {
            return Err(CompileError::new("Expected a function name.", line));
        };
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                let param_line = self.line();
                let Token::Ident(param) = self.advance() else {
                    return Err(CompileError::new("Expected a parameter name.", param_line));
                };
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.suite()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            body,
            line,
        })
    }

    fn simple_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        match self.peek() {
            Token::Return => {
                self.advance();
                let value = self.expression()?;
                Ok(Stmt::Return { value, line })
            }
            Token::Break => {
                self.advance();
                Ok(Stmt::Break { line })
            }
            Token::Continue => {
                self.advance();
                Ok(Stmt::Continue { line })
            }
            _ => {
                let expr = self.expression()?;
                match self.peek().clone() {
                    Token::Assign => {
                        self.advance();
                        let target = Parser::assignment_target(expr)?;
                        let value = self.expression()?;
                        if *self.peek() == Token::Assign {
                            return Err(CompileError::new("Multiple assignment targets.", line));
                        }
                        Ok(Stmt::Assign {
                            target,
                            value,
                            line,
                        })
                    }
                    Token::PlusAssign
                    | Token::MinusAssign
                    | Token::StarAssign
                    | Token::SlashSlashAssign
                    | Token::PercentAssign => {
                        let op = match self.advance() {
                            Token::PlusAssign => BinOp::Add,
                            Token::MinusAssign => BinOp::Sub,
                            Token::StarAssign => BinOp::Mul,
                            Token::SlashSlashAssign => BinOp::FloorDiv,
                            Token::PercentAssign => BinOp::Mod,
                            _ => unreachable!(),
                        };
                        let target = Parser::assignment_target(expr)?;
                        let value = self.expression()?;
                        Ok(Stmt::AugAssign {
                            target,
                            op,
                            value,
                            line,
                        })
                    }
                    _ => Ok(Stmt::ExprStmt { value: expr, line }),
                }
            }
        }
    }

    fn assignment_target(expr: Expr) -> Result<String, CompileError> {
        match expr {
            Expr::Name { id, .. } => Ok(id),
            other => Err(CompileError::new(
                "Cannot assign to this expression.",
                other.line(),
            )),
        }
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        let body = self.or_expr()?;
        if *self.peek() == Token::If {
            let line = self.line();
            self.advance();
            let test = self.or_expr()?;
            self.expect(&Token::Else)?;
            let orelse = self.expression()?;
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
                line,
            });
        }
        Ok(body)
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let left = self.and_expr()?;
        if *self.peek() == Token::Or {
            let line = self.line();
            self.advance();
            let right = self.and_expr()?;
            if *self.peek() == Token::Or {
                return Err(CompileError::new("Non-binary boolean operator.", line));
            }
            return Ok(Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                line,
            });
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let left = self.not_expr()?;
        if *self.peek() == Token::And {
            let line = self.line();
            self.advance();
            let right = self.not_expr()?;
            if *self.peek() == Token::And {
                return Err(CompileError::new("Non-binary boolean operator.", line));
            }
            return Ok(Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
                line,
            });
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, CompileError> {
        if *self.peek() == Token::Not {
            let line = self.line();
            self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                line,
            });
        }
        self.comparison()
    }

    fn comparison_op(&self) -> Option<CmpOp> {
        match self.peek() {
            Token::EqEq => Some(CmpOp::Eq),
            Token::NotEq => Some(CmpOp::NotEq),
            Token::Lt => Some(CmpOp::Lt),
            Token::Gt => Some(CmpOp::Gt),
            Token::LtE => Some(CmpOp::LtE),
            Token::GtE => Some(CmpOp::GtE),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let left = self.arith()?;
        if let Some(op) = self.comparison_op() {
            let line = self.line();
            self.advance();
            let right = self.arith()?;
            if self.comparison_op().is_some() {
                return Err(CompileError::new("Chained comparison.", line));
            }
            return Ok(Expr::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
                line,
            });
        }
        Ok(left)
    }

    fn arith(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.term()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.unary()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            _ => return self.atom(),
        };
        let line = self.line();
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
            line,
        })
    }

    fn atom(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.advance() {
            Token::Int(value) => Ok(Expr::Constant { value, line }),
            Token::True => Ok(Expr::Constant { value: 1, line }),
            Token::False => Ok(Expr::Constant { value: 0, line }),
            Token::Ident(id) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        args.push(self.expression()?);
                        while self.eat(&Token::Comma) {
                            args.push(self.expression()?);
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call {
                        func: id,
                        args,
                        line,
                    })
                } else {
                    Ok(Expr::Name { id, line })
                }
            }
            Token::LParen => {
                // a walrus is only legal inside parentheses
                let expr = if matches!(self.peek(), Token::Ident(_))
                    && *self.peek_at(1) == Token::Walrus
                {
                    let target_line = self.line();
                    let Token::Ident(target) = self.advance() else {
                        unreachable!()
                    };
                    self.advance();
                    let value = self.expression()?;
                    Expr::NamedExpr {
                        target,
                        value: Box::new(value),
                        line: target_line,
                    }
                } else {
                    self.expression()?
                };
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            _ => Err(CompileError::new("Unexpected token.", line)),
        }
    }
}

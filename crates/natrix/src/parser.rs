//! Recursive-descent parser from tokens to the typed AST.
//!
//! The grammar is a simplified slice of Python's expression grammar with
//! the usual precedence ladder (`or` → `and` → `not` → comparison →
//! arithmetic → unary → power → call → atom). One token of lookahead is
//! enough everywhere; assignment needs a second to tell `x = …` and
//! `x: T = …` from an expression statement.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::{
    ast::{
        Block, BinaryOperator, BoolOperator, CmpOperator, Expr, ExprLoc, ExprRef, Identifier, Module, Stmt, StmtKind,
        UnaryOperator,
    },
    complex::PyComplex,
    errors::{Error, ErrorKind, EvalResult},
    lexer::string_value,
    token::{CodeRange, Token, TokenKind},
};

/// Parses a token stream into a [`Module`].
///
/// On a syntax fault the parser synchronizes to the next statement
/// boundary and keeps going so later faults are still detected, then
/// reports the first error collected.
pub fn parse(tokens: Vec<Token>) -> EvalResult<Module> {
    Parser::new(tokens).file_input()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Error>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    // === entry ===

    fn file_input(mut self) -> EvalResult<Module> {
        let start = self.peek_range();
        let mut body = Block::new();
        while !self.check(TokenKind::EndMarker) {
            // Stray layout tokens between top-level statements.
            if self.matches(TokenKind::Newline) || self.matches(TokenKind::Dedent) {
                continue;
            }
            match self.statement() {
                Ok(stmt) => body.push(Rc::new(stmt)),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        if let Some(first) = self.errors.drain(..).next() {
            return Err(first);
        }
        let range = start.cover(self.peek_range());
        Ok(Module { body, range })
    }

    /// Discards tokens up to the next plausible statement boundary.
    fn synchronize(&mut self) {
        self.advance();
        loop {
            match self.peek_kind() {
                TokenKind::EndMarker => return,
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::For
                | TokenKind::While
                | TokenKind::Def
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // === statements ===

    fn statement(&mut self) -> EvalResult<Stmt> {
        match self.peek_kind() {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Def => self.function_def(),
            _ => self.simple_statement(),
        }
    }

    fn simple_statement(&mut self) -> EvalResult<Stmt> {
        let start = self.peek_range();
        let kind = match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Newline) {
                    None
                } else {
                    Some(self.test()?)
                };
                StmtKind::Return(value)
            }
            TokenKind::From => self.from_import()?,
            TokenKind::Global => {
                self.advance();
                StmtKind::Global(self.identifier()?)
            }
            TokenKind::NonLocal => {
                self.advance();
                StmtKind::NonLocal(self.identifier()?)
            }
            TokenKind::Assert => {
                self.advance();
                StmtKind::Assert(self.test()?)
            }
            TokenKind::Name if self.kind_at(1) == TokenKind::Equal => {
                let name = self.identifier()?;
                self.advance();
                StmtKind::Assign {
                    name,
                    value: self.test()?,
                }
            }
            TokenKind::Name if self.kind_at(1) == TokenKind::Colon => {
                let name = self.identifier()?;
                self.advance();
                let annotation = self.test()?;
                self.expect(TokenKind::Equal)?;
                StmtKind::AnnAssign {
                    name,
                    annotation,
                    value: self.test()?,
                }
            }
            _ => StmtKind::Expr(self.test()?),
        };
        let range = start.cover(self.previous_range());
        self.expect(TokenKind::Newline)?;
        Ok(Stmt::new(range, kind))
    }

    fn from_import(&mut self) -> EvalResult<StmtKind> {
        self.advance();
        let module = self.identifier()?;
        self.expect(TokenKind::Import)?;
        let mut names = vec![self.identifier()?];
        while self.matches(TokenKind::Comma) {
            names.push(self.identifier()?);
        }
        Ok(StmtKind::FromImport { module, names })
    }

    fn if_statement(&mut self) -> EvalResult<Stmt> {
        let start = self.peek_range();
        // `elif` re-enters here and behaves exactly like `if`.
        self.advance();
        let test = self.test()?;
        self.expect(TokenKind::Colon)?;
        let body = self.block()?;
        let orelse = match self.peek_kind() {
            TokenKind::Elif => {
                let nested = self.if_statement()?;
                Some(vec![Rc::new(nested)])
            }
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                Some(self.block()?)
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::NoElseBlockError,
                    "this 'if' has no 'elif' or 'else' block",
                    start,
                ));
            }
        };
        let range = start.cover(self.previous_range());
        Ok(Stmt::new(range, StmtKind::If { test, body, orelse }))
    }

    fn while_statement(&mut self) -> EvalResult<Stmt> {
        let start = self.peek_range();
        self.advance();
        let test = self.test()?;
        self.expect(TokenKind::Colon)?;
        let body = self.block()?;
        let range = start.cover(self.previous_range());
        Ok(Stmt::new(range, StmtKind::While { test, body }))
    }

    fn for_statement(&mut self) -> EvalResult<Stmt> {
        let start = self.peek_range();
        self.advance();
        let target = self.identifier()?;
        self.expect(TokenKind::In)?;
        let iter = self.test()?;
        self.expect(TokenKind::Colon)?;
        let body = self.block()?;
        let range = start.cover(self.previous_range());
        Ok(Stmt::new(range, StmtKind::For { target, iter, body }))
    }

    fn function_def(&mut self) -> EvalResult<Stmt> {
        let start = self.peek_range();
        self.advance();
        let name = self.identifier()?;
        self.expect(TokenKind::LeftParen)?;
        let params = self.parameters()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::Colon)?;
        let body = self.block()?;
        let range = start.cover(self.previous_range());
        Ok(Stmt::new(range, StmtKind::FunctionDef { name, params, body }))
    }

    fn parameters(&mut self) -> EvalResult<Vec<Identifier>> {
        let mut params = Vec::new();
        if self.check(TokenKind::Name) {
            params.push(self.identifier()?);
            while self.matches(TokenKind::Comma) {
                params.push(self.identifier()?);
            }
        }
        Ok(params)
    }

    /// Parses `NEWLINE INDENT stmt+ DEDENT`.
    fn block(&mut self) -> EvalResult<Block> {
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut body = Block::new();
        while !self.check(TokenKind::Dedent) && !self.check(TokenKind::EndMarker) {
            if self.matches(TokenKind::Newline) {
                continue;
            }
            body.push(Rc::new(self.statement()?));
        }
        self.expect(TokenKind::Dedent)?;
        if body.is_empty() {
            return Err(Error::new(
                ErrorKind::GenericUnexpectedSyntaxError,
                "a block must contain at least one statement",
                self.previous_range(),
            ));
        }
        Ok(body)
    }

    // === expressions ===

    fn test(&mut self) -> EvalResult<ExprRef> {
        if self.check(TokenKind::Lambda) {
            return self.lambda();
        }
        let start = self.peek_range();
        let body = self.or_test()?;
        if self.matches(TokenKind::If) {
            let test = self.or_test()?;
            self.expect(TokenKind::Else)?;
            let orelse = self.test()?;
            let range = start.cover(self.previous_range());
            return Ok(self.expr(range, Expr::Ternary { test, body, orelse }));
        }
        Ok(body)
    }

    fn lambda(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        self.advance();
        let params = self.parameters()?;
        self.expect(TokenKind::Colon)?;
        let body = self.test()?;
        let range = start.cover(self.previous_range());
        Ok(self.expr(range, Expr::Lambda { params, body }))
    }

    fn or_test(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut left = self.and_test()?;
        while self.matches(TokenKind::Or) {
            let right = self.and_test()?;
            let range = start.cover(self.previous_range());
            left = self.expr(
                range,
                Expr::BoolOp {
                    left,
                    op: BoolOperator::Or,
                    right,
                },
            );
        }
        Ok(left)
    }

    fn and_test(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut left = self.not_test()?;
        while self.matches(TokenKind::And) {
            let right = self.not_test()?;
            let range = start.cover(self.previous_range());
            left = self.expr(
                range,
                Expr::BoolOp {
                    left,
                    op: BoolOperator::And,
                    right,
                },
            );
        }
        Ok(left)
    }

    fn not_test(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        if self.matches(TokenKind::Not) {
            let operand = self.not_test()?;
            let range = start.cover(self.previous_range());
            return Ok(self.expr(
                range,
                Expr::Unary {
                    op: UnaryOperator::Not,
                    operand,
                },
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut left = self.arith_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => CmpOperator::Lt,
                TokenKind::Greater => CmpOperator::Gt,
                TokenKind::EqEqual => CmpOperator::Eq,
                TokenKind::GreaterEqual => CmpOperator::GtE,
                TokenKind::LessEqual => CmpOperator::LtE,
                TokenKind::NotEqual => CmpOperator::NotEq,
                TokenKind::Is => CmpOperator::Is,
                TokenKind::IsNot => CmpOperator::IsNot,
                TokenKind::In => CmpOperator::In,
                TokenKind::NotIn => CmpOperator::NotIn,
                _ => return Ok(left),
            };
            let op_range = self.peek_range();
            self.advance();
            let right = self.arith_expr()?;
            let range = start.cover(self.previous_range());
            left = self.expr(range, Expr::Compare { left, op, op_range, right });
        }
    }

    fn arith_expr(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut left = self.term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => return Ok(left),
            };
            let op_range = self.peek_range();
            self.advance();
            let right = self.term()?;
            let range = start.cover(self.previous_range());
            left = self.expr(range, Expr::Binary { left, op, op_range, right });
        }
    }

    fn term(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut left = self.factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Mult,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                TokenKind::DoubleSlash => BinaryOperator::FloorDiv,
                _ => return Ok(left),
            };
            let op_range = self.peek_range();
            self.advance();
            let right = self.factor()?;
            let range = start.cover(self.previous_range());
            left = self.expr(range, Expr::Binary { left, op, op_range, right });
        }
    }

    /// Unary `+`/`-` is right-recursive, so `--x` parses as `-(-x)`.
    fn factor(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let op = match self.peek_kind() {
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Minus => UnaryOperator::Minus,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.factor()?;
        let range = start.cover(self.previous_range());
        Ok(self.expr(range, Expr::Unary { op, operand }))
    }

    /// `**` binds tighter than unary on its left and re-enters `factor`
    /// on its right, so `2 ** -3` works and `2 ** 3 ** 2` nests rightward.
    fn power(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let left = self.atom_expr()?;
        if self.check(TokenKind::DoubleStar) {
            let op_range = self.peek_range();
            self.advance();
            let right = self.factor()?;
            let range = start.cover(self.previous_range());
            return Ok(self.expr(
                range,
                Expr::Binary {
                    left,
                    op: BinaryOperator::Pow,
                    op_range,
                    right,
                },
            ));
        }
        Ok(left)
    }

    /// An atom followed by any number of call suffixes; `f()()` chains
    /// left-associatively.
    fn atom_expr(&mut self) -> EvalResult<ExprRef> {
        let start = self.peek_range();
        let mut callee = self.atom()?;
        while self.matches(TokenKind::LeftParen) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                args.push(self.test()?);
                while self.matches(TokenKind::Comma) {
                    args.push(self.test()?);
                }
            }
            self.expect(TokenKind::RightParen)?;
            let range = start.cover(self.previous_range());
            callee = self.expr(range, Expr::Call { callee, args });
        }
        Ok(callee)
    }

    fn atom(&mut self) -> EvalResult<ExprRef> {
        let token = self.advance();
        let range = token.range;
        let expr = match token.kind {
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::None => Expr::None,
            TokenKind::String => Expr::Str(string_value(&token.lexeme)),
            TokenKind::Number => Expr::Float(parse_float(&token.lexeme)),
            TokenKind::BigInt => Expr::Int(parse_big_int(&token.lexeme)),
            TokenKind::Complex => {
                let digits = &token.lexeme[..token.lexeme.len() - 1];
                Expr::Complex(PyComplex::new(0.0, parse_float(digits)))
            }
            TokenKind::Name => Expr::Name(Identifier::new(token.lexeme, range)),
            TokenKind::LeftParen => {
                let inner = self.test()?;
                self.expect(TokenKind::RightParen)?;
                let full = range.cover(self.previous_range());
                return Ok(self.expr(full, Expr::Grouping(inner)));
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::GenericUnexpectedSyntaxError,
                    format!("unexpected {} here", token.kind),
                    range,
                ));
            }
        };
        Ok(self.expr(range, expr))
    }

    fn identifier(&mut self) -> EvalResult<Identifier> {
        let token = self.expect(TokenKind::Name)?;
        Ok(Identifier::new(token.lexeme, token.range))
    }

    // === token plumbing ===

    fn expr(&self, range: CodeRange, expr: Expr) -> ExprRef {
        Rc::new(ExprLoc::new(range, expr))
    }

    fn peek(&self) -> &Token {
        // The tokenizer guarantees a trailing EndMarker, so indexing past
        // the end only happens after a parse already failed.
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens.last().expect("token stream always ends with EndMarker")
        })
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_range(&self) -> CodeRange {
        self.peek().range
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::EndMarker, |t| t.kind)
    }

    fn previous_range(&self) -> CodeRange {
        if self.pos == 0 {
            return self.peek_range();
        }
        self.tokens
            .get(self.pos - 1)
            .map_or_else(|| self.peek_range(), |t| t.range)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> EvalResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(Error::new(
                ErrorKind::ExpectedTokenError,
                format!("expected {} but found {}", kind, found.kind),
                found.range,
            ))
        }
    }
}

/// Parses a float lexeme, tolerating digit-group underscores.
fn parse_float(lexeme: &str) -> f64 {
    let cleaned: String = lexeme.chars().filter(|c| *c != '_').collect();
    cleaned.parse().unwrap_or(f64::INFINITY)
}

/// Parses an integer lexeme of any width, including `0x`/`0o`/`0b` forms.
fn parse_big_int(lexeme: &str) -> BigInt {
    let cleaned: String = lexeme.chars().filter(|c| *c != '_').collect();
    let (digits, radix) = match cleaned.get(..2) {
        Some("0x" | "0X") => (&cleaned[2..], 16),
        Some("0o" | "0O") => (&cleaned[2..], 8),
        Some("0b" | "0B") => (&cleaned[2..], 2),
        _ => (cleaned.as_str(), 10),
    };
    BigInt::parse_bytes(digits.as_bytes(), radix).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> Module {
        parse(tokenize(source).unwrap()).unwrap()
    }

    fn parse_error(source: &str) -> ErrorKind {
        parse(tokenize(source).unwrap()).expect_err("expected parse error").kind
    }

    fn only_expr(module: &Module) -> ExprRef {
        match &module.body[0].kind {
            StmtKind::Expr(expr) => Rc::clone(expr),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn double_negation_nests_rightward() {
        let module = parse_source("--x\n");
        let Expr::Unary { op, operand } = &only_expr(&module).expr else {
            panic!("expected unary")
        };
        assert_eq!(*op, UnaryOperator::Minus);
        assert!(matches!(&operand.expr, Expr::Unary { .. }));
    }

    #[test]
    fn power_binds_tighter_than_unary() {
        // -2 ** 2 parses as -(2 ** 2)
        let module = parse_source("-2 ** 2\n");
        let Expr::Unary { operand, .. } = &only_expr(&module).expr else {
            panic!("expected unary")
        };
        assert!(matches!(
            &operand.expr,
            Expr::Binary {
                op: BinaryOperator::Pow,
                ..
            }
        ));
    }

    #[test]
    fn chained_calls_nest_left() {
        let module = parse_source("f(1)(2)\n");
        let Expr::Call { callee, args } = &only_expr(&module).expr else {
            panic!("expected call")
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(&callee.expr, Expr::Call { .. }));
    }

    #[test]
    fn chained_comparison_nests_left() {
        let module = parse_source("a < b < c\n");
        let Expr::Compare { left, op, .. } = &only_expr(&module).expr else {
            panic!("expected comparison")
        };
        assert_eq!(*op, CmpOperator::Lt);
        assert!(matches!(&left.expr, Expr::Compare { .. }));
    }

    #[test]
    fn ternary_and_lambda() {
        let module = parse_source("lambda x, y: x if x > y else y\n");
        let Expr::Lambda { params, body } = &only_expr(&module).expr else {
            panic!("expected lambda")
        };
        assert_eq!(params.len(), 2);
        assert!(matches!(&body.expr, Expr::Ternary { .. }));
    }

    #[test]
    fn literal_parsing() {
        let module = parse_source("0xFF\n");
        assert!(matches!(&only_expr(&module).expr, Expr::Int(i) if *i == BigInt::from(255)));
        let module = parse_source("2.5e2\n");
        assert!(matches!(&only_expr(&module).expr, Expr::Float(f) if *f == 250.0));
        let module = parse_source("3j\n");
        assert!(
            matches!(&only_expr(&module).expr, Expr::Complex(c) if c.real == 0.0 && c.imag == 3.0)
        );
    }

    #[test]
    fn if_requires_else_or_elif() {
        assert_eq!(parse_error("if x:\n    pass\n"), ErrorKind::NoElseBlockError);
        let module = parse_source("if x:\n    pass\nelif y:\n    pass\nelse:\n    pass\n");
        let StmtKind::If { orelse: Some(orelse), .. } = &module.body[0].kind else {
            panic!("expected if statement")
        };
        assert!(matches!(&orelse[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn annotated_assignment() {
        let module = parse_source("x: int = 5\n");
        assert!(matches!(&module.body[0].kind, StmtKind::AnnAssign { .. }));
    }

    #[test]
    fn from_import_names() {
        let module = parse_source("from rune import burn, peek\n");
        let StmtKind::FromImport { module: m, names } = &module.body[0].kind else {
            panic!("expected from-import")
        };
        assert_eq!(m.name, "rune");
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn missing_colon_is_expected_token_error() {
        assert_eq!(parse_error("while x\n    pass\n"), ErrorKind::ExpectedTokenError);
    }

    #[test]
    fn node_ranges_are_ordered() {
        let module = parse_source("def f(a, b):\n    return a + b\nf(1, 2)\n");
        fn walk(expr: &ExprLoc) {
            assert!(expr.range.start().index <= expr.range.end().index);
            match &expr.expr {
                Expr::Unary { operand, .. } => walk(operand),
                Expr::Binary { left, right, .. }
                | Expr::BoolOp { left, right, .. }
                | Expr::Compare { left, right, .. } => {
                    walk(left);
                    walk(right);
                }
                Expr::Call { callee, args } => {
                    walk(callee);
                    args.iter().for_each(|a| walk(a));
                }
                _ => {}
            }
        }
        for stmt in &module.body {
            assert!(stmt.range.start().index <= stmt.range.end().index);
            if let StmtKind::Expr(expr) = &stmt.kind {
                walk(expr);
            }
        }
    }
}

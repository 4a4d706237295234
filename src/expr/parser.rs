//! Predicate recursive descent parser.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons /
//! `is [not] null` / `[not] in [...]`, `+ -`, `* / %`, unary minus.
//! Unlike Python, `&` and `|` bind looser than comparisons, so
//! `a > 1 & b < 2` means `(a > 1) & (b < 2)`.

use crate::model::Value;
use crate::{Error, Result};
use super::ast::*;
use super::lexer::{Token, TokenKind};

/// Parser state: wraps a token slice with cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?} '{}'", kind, tok.kind, tok.text)))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::SyntaxError {
            position: self.peek().span.start,
            message: msg,
        }
    }
}

/// Parse a full token stream into one expression.
pub fn parse_predicate(tokens: &[Token]) -> Result<Expr> {
    if tokens.is_empty() {
        return Err(Error::SyntaxError { position: 0, message: "Empty expression".into() });
    }
    let mut p = Parser::new(tokens);
    if p.at(TokenKind::Eof) {
        return Err(p.error("Empty expression".into()));
    }
    let expr = parse_or_expr(&mut p)?;
    if !p.at(TokenKind::Eof) {
        let tok = p.peek();
        return Err(p.error(format!("Unexpected trailing input '{}'", tok.text)));
    }
    Ok(expr)
}

fn parse_or_expr(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_and_expr(p)?;
    while p.eat(TokenKind::Or) {
        let right = parse_and_expr(p)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and_expr(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_not_expr(p)?;
    while p.eat(TokenKind::And) {
        let right = parse_not_expr(p)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_not_expr(p: &mut Parser) -> Result<Expr> {
    if p.eat(TokenKind::Not) {
        let expr = parse_not_expr(p)?;
        Ok(Expr::Not(Box::new(expr)))
    } else {
        parse_comparison(p)
    }
}

fn parse_comparison(p: &mut Parser) -> Result<Expr> {
    let left = parse_addition(p)?;

    // IS NULL / IS NOT NULL
    if p.eat(TokenKind::Is) {
        let negated = p.eat(TokenKind::Not);
        p.expect(TokenKind::Null)?;
        return Ok(Expr::IsNull { expr: Box::new(left), negated });
    }

    // IN / NOT IN
    if p.at(TokenKind::In) || (p.at(TokenKind::Not) && p.peek_kind_at(1) == TokenKind::In) {
        let negated = p.eat(TokenKind::Not);
        p.expect(TokenKind::In)?;
        let list = parse_literal_list(p)?;
        return Ok(Expr::InList { expr: Box::new(left), list, negated });
    }

    let op = match p.peek_kind() {
        TokenKind::Eq => Some(CmpOp::Eq),
        TokenKind::Neq => Some(CmpOp::Neq),
        TokenKind::Lt => Some(CmpOp::Lt),
        TokenKind::Lte => Some(CmpOp::Lte),
        TokenKind::Gt => Some(CmpOp::Gt),
        TokenKind::Gte => Some(CmpOp::Gte),
        _ => None,
    };

    if let Some(op) = op {
        p.advance();
        let right = parse_addition(p)?;
        return Ok(Expr::Compare { left: Box::new(left), op, right: Box::new(right) });
    }

    Ok(left)
}

fn parse_addition(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_multiplication(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Plus => ArithOp::Add,
            TokenKind::Minus => ArithOp::Sub,
            _ => break,
        };
        p.advance();
        let right = parse_multiplication(p)?;
        left = Expr::Arith { left: Box::new(left), op, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_multiplication(p: &mut Parser) -> Result<Expr> {
    let mut left = parse_unary(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Star => ArithOp::Mul,
            TokenKind::Slash => ArithOp::Div,
            TokenKind::Percent => ArithOp::Mod,
            _ => break,
        };
        p.advance();
        let right = parse_unary(p)?;
        left = Expr::Arith { left: Box::new(left), op, right: Box::new(right) };
    }
    Ok(left)
}

fn parse_unary(p: &mut Parser) -> Result<Expr> {
    if p.eat(TokenKind::Minus) {
        // Fold negative literals so `x in [-1]` and `x > -1` read the same.
        return Ok(match parse_unary(p)? {
            Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
            Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
            other => Expr::Negate(Box::new(other)),
        });
    }
    parse_primary(p)
}

fn parse_primary(p: &mut Parser) -> Result<Expr> {
    match p.peek_kind() {
        TokenKind::LParen => {
            p.advance();
            let expr = parse_or_expr(p)?;
            p.expect(TokenKind::RParen)?;
            Ok(expr)
        }
        TokenKind::Identifier => {
            let tok = p.advance();
            Ok(Expr::Column(tok.text.clone()))
        }
        _ => Ok(Expr::Literal(parse_literal(p)?)),
    }
}

fn parse_literal(p: &mut Parser) -> Result<Value> {
    match p.peek_kind() {
        TokenKind::Integer => {
            let tok = p.advance();
            tok.text.parse::<i64>().map(Value::Int).map_err(|_| {
                Error::SyntaxError { position: tok.span.start, message: "Invalid integer".into() }
            })
        }
        TokenKind::Float => {
            let tok = p.advance();
            tok.text.parse::<f64>().map(Value::Float).map_err(|_| {
                Error::SyntaxError { position: tok.span.start, message: "Invalid float".into() }
            })
        }
        TokenKind::StringLiteral => Ok(Value::String(p.advance().text.clone())),
        TokenKind::True => {
            p.advance();
            Ok(Value::Bool(true))
        }
        TokenKind::False => {
            p.advance();
            Ok(Value::Bool(false))
        }
        TokenKind::Null => {
            p.advance();
            Ok(Value::Null)
        }
        TokenKind::Minus => {
            p.advance();
            match parse_literal(p)? {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(p.error(format!("Cannot negate {}", other.type_name()))),
            }
        }
        _ => {
            let tok = p.peek();
            Err(p.error(format!("Expected expression, got {:?} '{}'", tok.kind, tok.text)))
        }
    }
}

fn parse_literal_list(p: &mut Parser) -> Result<Vec<Value>> {
    p.expect(TokenKind::LBracket)?;
    let mut items = Vec::new();
    if !p.at(TokenKind::RBracket) {
        items.push(parse_literal(p)?);
        while p.eat(TokenKind::Comma) {
            items.push(parse_literal(p)?);
        }
    }
    p.expect(TokenKind::RBracket)?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn parse(s: &str) -> Result<Expr> {
        parse_predicate(&tokenize(s)?)
    }

    #[test]
    fn test_precedence() {
        let e = parse("a > 1 & b < 2 | c == 'x'").unwrap();
        let expected = col("a").gt(lit(1)).and(col("b").lt(lit(2))).or(col("c").eq(lit("x")));
        assert_eq!(e, expected);
    }

    #[test]
    fn test_arithmetic_binds_tighter_than_comparison() {
        let e = parse("a + b * 2 >= 10").unwrap();
        let expected = col("a").add(col("b").mul(lit(2))).gte(lit(10));
        assert_eq!(e, expected);
    }

    #[test]
    fn test_is_null_and_in_list() {
        let e = parse("x is not null and y not in [1, -2, 'z']").unwrap();
        let expected = Expr::And(
            Box::new(col("x").is_not_null()),
            Box::new(Expr::InList {
                expr: Box::new(col("y")),
                list: vec![Value::Int(1), Value::Int(-2), Value::from("z")],
                negated: true,
            }),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_not_and_tilde() {
        assert_eq!(parse("~(a == 1)").unwrap(), parse("not a == 1").unwrap());
    }

    #[test]
    fn test_display_round_trip() {
        let e = parse("(amount * 2 > 10.5) | ~(`unit price` in [1, 2])").unwrap();
        assert_eq!(parse(&e.to_string()).unwrap(), e);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse(""), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse("a >"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse("(a > 1"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse("a > 1 b"), Err(Error::SyntaxError { .. })));
    }
}

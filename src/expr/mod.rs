//! # Selection Expressions
//!
//! Boolean predicates over property columns, written either as text
//! (`"(_TYPE_ == 'transfer') & (amount > 100)"`) or with the builder API
//! (`col("amount").gt(lit(100))`).
//!
//! ```text
//! &str ──tokenize──→ tokens ──parse──→ Expr ──evaluate(df)──→ RowMask
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod eval;

pub use ast::{col, lit, ArithOp, CmpOp, Expr};
pub use eval::evaluate;

use crate::Result;

/// Parse a predicate string into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(input)?;
    parser::parse_predicate(&tokens)
}

/// Anything that can be turned into a selection predicate.
pub trait IntoPredicate {
    fn into_predicate(self) -> Result<Expr>;
}

impl IntoPredicate for Expr {
    fn into_predicate(self) -> Result<Expr> {
        Ok(self)
    }
}

impl IntoPredicate for &Expr {
    fn into_predicate(self) -> Result<Expr> {
        Ok(self.clone())
    }
}

impl IntoPredicate for &str {
    fn into_predicate(self) -> Result<Expr> {
        parse(self)
    }
}

impl IntoPredicate for String {
    fn into_predicate(self) -> Result<Expr> {
        parse(&self)
    }
}

impl IntoPredicate for &String {
    fn into_predicate(self) -> Result<Expr> {
        parse(self)
    }
}

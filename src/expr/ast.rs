//! Predicate expression tree.
//!
//! Pure data plus builder helpers. Column references are names only; they
//! are resolved against a table's live columns at evaluation time.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use crate::model::Value;

/// A selection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: `amount`, `_TYPE_`
    Column(String),
    /// Literal value
    Literal(Value),
    /// Comparison: `a >= 3`
    Compare { left: Box<Expr>, op: CmpOp, right: Box<Expr> },
    /// Arithmetic: `a + b`
    Arith { left: Box<Expr>, op: ArithOp, right: Box<Expr> },
    /// Numeric negation: `-a`
    Negate(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `a is null` / `a is not null`
    IsNull { expr: Box<Expr>, negated: bool },
    /// `a in [1, 2]` / `a not in [1, 2]`
    InList { expr: Box<Expr>, list: Vec<Value>, negated: bool },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq, Neq, Lt, Lte, Gt, Gte,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add, Sub, Mul, Div, Mod,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    fn compare(self, op: CmpOp, other: Expr) -> Expr {
        Expr::Compare { left: Box::new(self), op, right: Box::new(other) }
    }

    fn arith(self, op: ArithOp, other: Expr) -> Expr {
        Expr::Arith { left: Box::new(self), op, right: Box::new(other) }
    }

    pub fn eq(self, other: Expr) -> Expr { self.compare(CmpOp::Eq, other) }
    pub fn neq(self, other: Expr) -> Expr { self.compare(CmpOp::Neq, other) }
    pub fn lt(self, other: Expr) -> Expr { self.compare(CmpOp::Lt, other) }
    pub fn lte(self, other: Expr) -> Expr { self.compare(CmpOp::Lte, other) }
    pub fn gt(self, other: Expr) -> Expr { self.compare(CmpOp::Gt, other) }
    pub fn gte(self, other: Expr) -> Expr { self.compare(CmpOp::Gte, other) }

    pub fn add(self, other: Expr) -> Expr { self.arith(ArithOp::Add, other) }
    pub fn sub(self, other: Expr) -> Expr { self.arith(ArithOp::Sub, other) }
    pub fn mul(self, other: Expr) -> Expr { self.arith(ArithOp::Mul, other) }
    pub fn div(self, other: Expr) -> Expr { self.arith(ArithOp::Div, other) }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull { expr: Box::new(self), negated: false }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull { expr: Box::new(self), negated: true }
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// Names of all columns the expression reads, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::Compare { left, right, .. } | Expr::Arith { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::Negate(e) | Expr::Not(e) => e.collect_columns(out),
            Expr::IsNull { expr, .. } | Expr::InList { expr, .. } => expr.collect_columns(out),
        }
    }
}

impl BitAnd for Expr {
    type Output = Expr;
    fn bitand(self, rhs: Expr) -> Expr { self.and(rhs) }
}

impl BitOr for Expr {
    type Output = Expr;
    fn bitor(self, rhs: Expr) -> Expr { self.or(rhs) }
}

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr { Expr::Not(Box::new(self)) }
}

// ============================================================================
// Display (re-parseable)
// ============================================================================

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if plain { write!(f, "{name}") } else { write!(f, "`{name}`") }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write_ident(f, name),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Compare { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Arith { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Negate(e) => write!(f, "-{e}"),
            Expr::And(l, r) => write!(f, "({l} and {r})"),
            Expr::Or(l, r) => write!(f, "({l} or {r})"),
            Expr::Not(e) => write!(f, "not {e}"),
            Expr::IsNull { expr, negated } => {
                write!(f, "({expr} is {}null)", if *negated { "not " } else { "" })
            }
            Expr::InList { expr, list, negated } => {
                write!(f, "({expr} {}in [", if *negated { "not " } else { "" })?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "])")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_operators() {
        let e = col("a").gt(lit(1)) & !col("b").is_null();
        assert_eq!(e.columns(), vec!["a", "b"]);
        assert_eq!(e.to_string(), "((a > 1) and not (b is null))");
    }

    #[test]
    fn test_display_quotes_odd_names() {
        let e = col("unit price").lte(lit(2.5));
        assert_eq!(e.to_string(), "(`unit price` <= 2.5)");
    }
}

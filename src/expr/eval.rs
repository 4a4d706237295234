//! Vectorized predicate evaluation against a partitioned table.
//!
//! Evaluation runs in two phases. `bind` walks the tree once against the
//! table schema: every column must exist and every operator must receive
//! operands of a kind it accepts, so type errors surface before any row is
//! touched. The array pass then evaluates the tree bottom-up over each
//! partition's record batch with Arrow kernels, producing one array per
//! node. Comparisons and boolean connectives follow SQL three-valued logic
//! (Arrow nulls propagate, `and`/`or` are Kleene), and an unknown
//! predicate does not select its row.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, Scalar};
use arrow::compute::kernels::{boolean, cmp, nullif::nullif, numeric, zip::zip};
use arrow::compute::{cast, is_not_null, is_null, prep_null_mask_filter};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use hashbrown::HashMap;

use crate::frame::{DataFrame, RowMask};
use crate::model::{ColumnData, DType, Value};
use crate::{Error, Result};
use super::ast::{ArithOp, CmpOp, Expr};

/// Coarse operand kind used for type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Numeric,
    Text,
    /// Only the `null` literal has this kind; it is compatible with anything.
    Null,
}

impl Kind {
    fn of_dtype(dtype: DType) -> Kind {
        match dtype {
            DType::Bool => Kind::Bool,
            DType::Utf8 => Kind::Text,
            _ => Kind::Numeric,
        }
    }

    fn of_value(v: &Value) -> Kind {
        match v {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) | Value::Float(_) => Kind::Numeric,
            Value::String(_) => Kind::Text,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "BOOLEAN",
            Kind::Numeric => "NUMERIC",
            Kind::Text => "STRING",
            Kind::Null => "NULL",
        }
    }

    fn compatible(self, other: Kind) -> bool {
        self == other || self == Kind::Null || other == Kind::Null
    }
}

fn type_error(expected: Kind, got: Kind, context: &Expr) -> Error {
    Error::TypeError {
        expected: expected.name().into(),
        got: format!("{} in {context}", got.name()),
    }
}

/// Check `expr` against the schema of `df` and return its result kind.
fn bind(expr: &Expr, df: &DataFrame) -> Result<Kind> {
    match expr {
        Expr::Column(name) => df
            .dtype(name)
            .map(Kind::of_dtype)
            .ok_or_else(|| Error::ColumnNotFound(name.clone())),
        Expr::Literal(v) => Ok(Kind::of_value(v)),
        Expr::Compare { left, right, .. } => {
            let (l, r) = (bind(left, df)?, bind(right, df)?);
            if !l.compatible(r) {
                return Err(type_error(l, r, expr));
            }
            Ok(Kind::Bool)
        }
        Expr::Arith { left, right, .. } => {
            for side in [left, right] {
                let k = bind(side, df)?;
                if !k.compatible(Kind::Numeric) {
                    return Err(type_error(Kind::Numeric, k, expr));
                }
            }
            Ok(Kind::Numeric)
        }
        Expr::Negate(inner) => {
            let k = bind(inner, df)?;
            if !k.compatible(Kind::Numeric) {
                return Err(type_error(Kind::Numeric, k, expr));
            }
            Ok(Kind::Numeric)
        }
        Expr::And(l, r) | Expr::Or(l, r) => {
            for side in [l, r] {
                let k = bind(side, df)?;
                if !k.compatible(Kind::Bool) {
                    return Err(type_error(Kind::Bool, k, expr));
                }
            }
            Ok(Kind::Bool)
        }
        Expr::Not(inner) => {
            let k = bind(inner, df)?;
            if !k.compatible(Kind::Bool) {
                return Err(type_error(Kind::Bool, k, expr));
            }
            Ok(Kind::Bool)
        }
        Expr::IsNull { expr: inner, .. } => {
            bind(inner, df)?;
            Ok(Kind::Bool)
        }
        Expr::InList { expr: inner, list, .. } => {
            let k = bind(inner, df)?;
            for item in list {
                let ik = Kind::of_value(item);
                if !k.compatible(ik) {
                    return Err(type_error(k, ik, expr));
                }
            }
            Ok(Kind::Bool)
        }
    }
}

/// Evaluate a boolean predicate over every row of `df`.
///
/// The returned mask has the same partition layout as `df`; rows whose
/// predicate is false or unknown are unselected.
pub fn evaluate(expr: &Expr, df: &DataFrame) -> Result<RowMask> {
    let kind = bind(expr, df)?;
    if kind != Kind::Bool {
        return Err(Error::TypeError {
            expected: Kind::Bool.name().into(),
            got: format!("{} from predicate {expr}", kind.name()),
        });
    }

    let mut positions = HashMap::new();
    for name in expr.columns() {
        positions.insert(name, df.position(name)?);
    }
    let ctx = Context { positions };

    let partitions = df
        .partitions()
        .iter()
        .map(|batch| {
            let result = ctx.eval(expr, batch)?;
            to_boolean(&result)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RowMask::from_arrays(partitions))
}

// ============================================================================
// Array evaluation
// ============================================================================

/// Column positions of a bound expression.
struct Context<'a> {
    positions: HashMap<&'a str, usize>,
}

impl Context<'_> {
    fn eval(&self, expr: &Expr, batch: &RecordBatch) -> Result<ArrayRef> {
        let len = batch.num_rows();
        match expr {
            Expr::Column(name) => {
                let pos = self
                    .positions
                    .get(name.as_str())
                    .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
                Ok(batch.column(*pos).clone())
            }
            Expr::Literal(v) => literal(v, len),
            Expr::Compare { left, op, right } => {
                let (l, r) = coerce(self.eval(left, batch)?, self.eval(right, batch)?)?;
                let result = match op {
                    CmpOp::Eq => cmp::eq(&l, &r)?,
                    CmpOp::Neq => cmp::neq(&l, &r)?,
                    CmpOp::Lt => cmp::lt(&l, &r)?,
                    CmpOp::Lte => cmp::lt_eq(&l, &r)?,
                    CmpOp::Gt => cmp::gt(&l, &r)?,
                    CmpOp::Gte => cmp::gt_eq(&l, &r)?,
                };
                Ok(Arc::new(result))
            }
            Expr::Arith { left, op, right } => arith(*op, self.eval(left, batch)?, self.eval(right, batch)?),
            Expr::Negate(inner) => {
                let v = numeric_operand(&self.eval(inner, batch)?, true)?;
                match numeric::neg(&v) {
                    Ok(negated) => Ok(negated),
                    // i64::MIN has no integer negation.
                    Err(_) => Ok(numeric::neg(&cast(&v, &DataType::Float64)?)?),
                }
            }
            Expr::And(l, r) => {
                let (l, r) = (to_boolean(&self.eval(l, batch)?)?, to_boolean(&self.eval(r, batch)?)?);
                Ok(Arc::new(boolean::and_kleene(&l, &r)?))
            }
            Expr::Or(l, r) => {
                let (l, r) = (to_boolean(&self.eval(l, batch)?)?, to_boolean(&self.eval(r, batch)?)?);
                Ok(Arc::new(boolean::or_kleene(&l, &r)?))
            }
            Expr::Not(inner) => Ok(Arc::new(boolean::not(&to_boolean(&self.eval(inner, batch)?)?)?)),
            Expr::IsNull { expr: inner, negated } => {
                let v = self.eval(inner, batch)?;
                let result = if *negated { is_not_null(v.as_ref())? } else { is_null(v.as_ref())? };
                Ok(Arc::new(result))
            }
            Expr::InList { expr: inner, list, negated } => {
                let v = self.eval(inner, batch)?;
                let mut found = BooleanArray::from(vec![false; len]);
                for item in list {
                    let (l, r) = coerce(v.clone(), literal(item, len)?)?;
                    found = boolean::or_kleene(&found, &cmp::eq(&l, &r)?)?;
                }
                // A missing operand is never a member, even of an empty list.
                let found = nullif(&found, &is_null(v.as_ref())?)?;
                let found = to_boolean(&found)?;
                Ok(Arc::new(if *negated { boolean::not(&found)? } else { found }))
            }
        }
    }
}

/// `value` repeated `len` times; a null literal is an Arrow null array.
fn literal(value: &Value, len: usize) -> Result<ArrayRef> {
    match value.natural_dtype() {
        Some(dtype) => Ok(ColumnData::constant(dtype, value, len)?.into_array()),
        None => Ok(new_null_array(&DataType::Null, len)),
    }
}

fn to_boolean(array: &ArrayRef) -> Result<BooleanArray> {
    Ok(cast(array, &DataType::Boolean)?.as_boolean().clone())
}

fn is_integral(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Int32 | DataType::Int64 | DataType::Null)
}

/// Bring both operands of a comparison to one Arrow type: integers compare
/// as int64, mixed numbers as float64, and a null side takes the other
/// side's type.
fn coerce(l: ArrayRef, r: ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    let target = match (l.data_type(), r.data_type()) {
        (DataType::Null, DataType::Null) => DataType::Boolean,
        (a, b) if a == b => a.clone(),
        (DataType::Null, t) | (t, DataType::Null) => t.clone(),
        (a, b) if is_integral(a) && is_integral(b) => DataType::Int64,
        _ => DataType::Float64,
    };
    Ok((cast(&l, &target)?, cast(&r, &target)?))
}

/// A numeric operand as int64 (when integral and `keep_int`) or float64.
fn numeric_operand(array: &ArrayRef, keep_int: bool) -> Result<ArrayRef> {
    let target = if keep_int && is_integral(array.data_type()) { DataType::Int64 } else { DataType::Float64 };
    Ok(cast(array, &target)?)
}

/// Numeric arithmetic. Integer overflow falls back to float; division is
/// always true division; division or modulo by zero yields null.
fn arith(op: ArithOp, l: ArrayRef, r: ArrayRef) -> Result<ArrayRef> {
    let keep_int = op != ArithOp::Div && is_integral(l.data_type()) && is_integral(r.data_type());
    let (l, r) = (numeric_operand(&l, keep_int)?, numeric_operand(&r, keep_int)?);
    let zero = zero_of(r.data_type());
    let result = match op {
        ArithOp::Add => numeric::add(&l, &r),
        ArithOp::Sub => numeric::sub(&l, &r),
        ArithOp::Mul => numeric::mul(&l, &r),
        ArithOp::Div => nonzero(&r, &zero).and_then(|r| numeric::div(&l, &r)),
        ArithOp::Mod => nonzero(&r, &zero).and_then(|r| floored_rem(&l, &r, &zero)),
    };
    match result {
        Ok(out) => Ok(out),
        Err(ArrowError::ArithmeticOverflow(_)) if keep_int => {
            arith(op, cast(&l, &DataType::Float64)?, cast(&r, &DataType::Float64)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn zero_of(data_type: &DataType) -> Scalar<ArrayRef> {
    let zero: ArrayRef = match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(vec![0])),
        _ => Arc::new(Float64Array::from(vec![0.0])),
    };
    Scalar::new(zero)
}

/// `divisor` with its zeros turned into nulls.
fn nonzero(divisor: &ArrayRef, zero: &Scalar<ArrayRef>) -> std::result::Result<ArrayRef, ArrowError> {
    nullif(divisor.as_ref(), &cmp::eq(divisor, zero)?)
}

/// Remainder taking the sign of the divisor.
fn floored_rem(l: &ArrayRef, r: &ArrayRef, zero: &Scalar<ArrayRef>) -> std::result::Result<ArrayRef, ArrowError> {
    let m = numeric::rem(l, r)?;
    let signs_differ = cmp::neq(&cmp::lt(&m, zero)?, &cmp::lt(r, zero)?)?;
    let shift = boolean::and(&cmp::neq(&m, zero)?, &signs_differ)?;
    zip(&prep_null_mask_filter(&shift), &numeric::add_wrapping(&m, r)?, &m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::{col, lit};
    use crate::expr::parse;
    use pretty_assertions::assert_eq;

    fn table() -> DataFrame {
        DataFrame::from_columns(
            vec![
                ("id", ColumnData::from(vec![1i64, 2, 3, 4])),
                ("kind", ColumnData::from(vec![Some("a"), Some("b"), None, Some("a")])),
                ("score", ColumnData::from(vec![Some(1.5f64), None, Some(3.0), Some(-2.0)])),
                ("flag", ColumnData::from(vec![true, false, true, false])),
            ],
            2,
        )
        .unwrap()
    }

    fn selected(pred: &str) -> Vec<i64> {
        let df = table();
        let mask = evaluate(&parse(pred).unwrap(), &df).unwrap();
        df.filter(&mask)
            .unwrap()
            .column("id")
            .unwrap()
            .values()
            .iter()
            .filter_map(Value::as_int)
            .collect()
    }

    #[test]
    fn test_mask_keeps_partition_layout() {
        let df = table();
        let mask = evaluate(&col("id").gt(lit(0)), &df).unwrap();
        assert_eq!(mask.partition_lens(), df.partition_lens());
        assert_eq!(mask.count_selected(), 4);
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        assert_eq!(selected("score > 0"), vec![1, 3]);
        assert_eq!(selected("~(score > 0)"), vec![4]);
        assert_eq!(selected("score is null"), vec![2]);
    }

    #[test]
    fn test_three_valued_or() {
        // Row 2 has a null score but `flag` is false, so `or` stays unknown.
        assert_eq!(selected("score > 0 | flag"), vec![1, 3]);
        assert_eq!(selected("score > 0 | id == 2"), vec![1, 2, 3]);
    }

    #[test]
    fn test_in_list_and_strings() {
        assert_eq!(selected("kind in ['a']"), vec![1, 4]);
        assert_eq!(selected("kind not in ['a']"), vec![2]);
        assert_eq!(selected("id in [2.0, 4]"), vec![2, 4]);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(selected("id * 2 + 1 == 7"), vec![3]);
        assert_eq!(selected("id / 2 == 1.5"), vec![3]);
        assert_eq!(selected("-id % 3 == 2"), vec![1, 4]);
        // Division by zero is unknown, never an error.
        assert_eq!(selected("id / 0 > 0"), Vec::<i64>::new());
    }

    #[test]
    fn test_in_list_with_null_item() {
        // A miss against a list holding null is unknown, so `not in` drops it too.
        assert_eq!(selected("id in [1, null]"), vec![1]);
        assert_eq!(selected("id not in [1, null]"), Vec::<i64>::new());
        assert_eq!(selected("kind not in []"), vec![1, 2, 4]);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let big = (1i64 << 53) + 1;
        let df = DataFrame::from_columns(vec![("ts", ColumnData::from(vec![Some(big - 1), Some(big), None]))], 2)
            .unwrap();
        let mask = evaluate(&col("ts").eq(lit(big)), &df).unwrap();
        assert_eq!(mask.count_selected(), 1);
        let ts = df.filter(&mask).unwrap().column("ts").unwrap();
        assert_eq!(ts.values(), vec![Value::Int(big)]);
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let df = DataFrame::new(vec![("n", ColumnData::from(vec![i64::MAX, 1]))]).unwrap();
        let mask = evaluate(&parse("n + 1 > 0").unwrap(), &df).unwrap();
        assert_eq!(mask.count_selected(), 2);
        let mask = evaluate(&parse("-n < 0").unwrap(), &df).unwrap();
        assert_eq!(mask.count_selected(), 2);
    }

    #[test]
    fn test_bind_errors() {
        let df = table();
        let err = evaluate(&parse("missing > 1").unwrap(), &df).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(c) if c == "missing"));
        let err = evaluate(&parse("kind > 1").unwrap(), &df).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
        let err = evaluate(&parse("id + 1").unwrap(), &df).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
        let err = evaluate(&parse("kind & flag").unwrap(), &df).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }
}

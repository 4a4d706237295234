//! Typed, nullable columns backed by Arrow arrays.

use std::sync::Arc;

use arrow::array::{
    new_empty_array, Array, ArrayRef, AsArray, BooleanArray, Float32Array,
    Float64Array, Int32Array, Int64Array, StringArray, UInt64Array,
};
use arrow::compute::{self, CastOptions};
use arrow::compute::kernels::zip::zip;
use arrow::datatypes::{Float32Type, Float64Type, Int32Type, Int64Type};

use crate::{Error, Result};
use super::{DType, Key, Value};

/// The values of one column in one partition.
///
/// Wraps an Arrow array whose type is always the Arrow form of `dtype`.
#[derive(Debug, Clone)]
pub struct ColumnData {
    dtype: DType,
    array: ArrayRef,
}

impl ColumnData {
    /// Wrap an array produced by a kernel that preserves `dtype`.
    pub(crate) fn wrap(dtype: DType, array: ArrayRef) -> Self {
        Self { dtype, array }
    }

    /// Adopt an Arrow array. Fails for array types property columns
    /// cannot hold.
    pub fn from_array(array: ArrayRef) -> Result<Self> {
        let dtype = DType::from_arrow(array.data_type()).ok_or_else(|| Error::TypeError {
            expected: "bool, int32, int64, float32, float64 or utf8 array".into(),
            got: array.data_type().to_string(),
        })?;
        Ok(Self { dtype, array })
    }

    /// An empty column of the given dtype.
    pub fn empty(dtype: DType) -> Self {
        Self::wrap(dtype, new_empty_array(&dtype.to_arrow()))
    }

    /// Build a column of `dtype` from loose values.
    pub fn from_values(dtype: DType, values: &[Value]) -> Result<Self> {
        let mismatch = |v: &Value| Error::TypeError {
            expected: dtype.name().into(),
            got: v.type_name().into(),
        };
        let array: ArrayRef = match dtype {
            DType::Bool => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Bool(b) => Ok(Some(*b)),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<BooleanArray>>()?,
            ),
            DType::Int32 => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        other => {
                            let i = other.as_int().ok_or_else(|| mismatch(other))?;
                            i32::try_from(i).map(Some).map_err(|_| Error::CastError {
                                from: DType::Int64,
                                to: DType::Int32,
                                reason: format!("{i} is out of range"),
                            })
                        }
                    })
                    .collect::<Result<Int32Array>>()?,
            ),
            DType::Int64 => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Int(i) => Ok(Some(*i)),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Int64Array>>()?,
            ),
            DType::Float32 => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        other => other.as_float().map(|f| Some(f as f32)).ok_or_else(|| mismatch(other)),
                    })
                    .collect::<Result<Float32Array>>()?,
            ),
            DType::Float64 => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        other => other.as_float().map(Some).ok_or_else(|| mismatch(other)),
                    })
                    .collect::<Result<Float64Array>>()?,
            ),
            DType::Utf8 => Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::String(s) => Ok(Some(s.as_str())),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<StringArray>>()?,
            ),
        };
        Ok(Self::wrap(dtype, array))
    }

    /// A column repeating `value` `len` times, stored as `dtype`.
    pub fn constant(dtype: DType, value: &Value, len: usize) -> Result<Self> {
        let single = Self::from_values(dtype, std::slice::from_ref(value))?;
        let indices = UInt64Array::from(vec![0u64; len]);
        let repeated = compute::take(single.array.as_ref(), &indices, None)?;
        Ok(Self::wrap(dtype, repeated))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn into_array(self) -> ArrayRef {
        self.array
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.array.null_count()
    }

    /// The value at row `i`.
    pub fn get(&self, i: usize) -> Value {
        if self.array.is_null(i) {
            return Value::Null;
        }
        match self.dtype {
            DType::Bool => Value::Bool(self.array.as_boolean().value(i)),
            DType::Int32 => Value::Int(self.array.as_primitive::<Int32Type>().value(i) as i64),
            DType::Int64 => Value::Int(self.array.as_primitive::<Int64Type>().value(i)),
            DType::Float32 => Value::Float(self.array.as_primitive::<Float32Type>().value(i) as f64),
            DType::Float64 => Value::Float(self.array.as_primitive::<Float64Type>().value(i)),
            DType::Utf8 => Value::String(self.array.as_string::<i32>().value(i).to_owned()),
        }
    }

    pub fn key(&self, i: usize) -> Key {
        Key::from(self.get(i))
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Gather rows by index; `None` yields a missing value.
    pub fn take(&self, indices: &[Option<usize>]) -> Result<ColumnData> {
        let indices: UInt64Array = indices.iter().map(|i| i.map(|i| i as u64)).collect();
        let taken = compute::take(self.array.as_ref(), &indices, None)?;
        Ok(Self::wrap(self.dtype, taken))
    }

    /// Concatenate columns of one dtype.
    pub fn concat(dtype: DType, parts: &[&ColumnData]) -> Result<ColumnData> {
        if let Some(other) = parts.iter().find(|c| c.dtype != dtype) {
            return Err(Error::TypeError {
                expected: dtype.name().into(),
                got: other.dtype.name().into(),
            });
        }
        if parts.is_empty() {
            return Ok(Self::empty(dtype));
        }
        let arrays: Vec<&dyn Array> = parts.iter().map(|c| c.array.as_ref()).collect();
        Ok(Self::wrap(dtype, compute::concat(&arrays)?))
    }

    /// Convert to `to`.
    ///
    /// Only value-preserving conversions succeed: a value that does not
    /// survive the round trip back to the source dtype (a fractional or
    /// out-of-range float cast to an integer, an integer beyond 2^53 cast
    /// to float64, anything but 0/1 cast to bool) fails with a
    /// `CastError`. Float to float narrowing is exempt. Text never
    /// converts.
    pub fn cast(&self, to: DType) -> Result<ColumnData> {
        let from = self.dtype;
        if from == to {
            return Ok(self.clone());
        }
        if from == DType::Utf8 || to == DType::Utf8 {
            return Err(Error::CastError { from, to, reason: "text columns cannot be converted".into() });
        }
        let options = CastOptions { safe: false, ..Default::default() };
        let cast_error = |e: arrow::error::ArrowError| Error::CastError { from, to, reason: e.to_string() };

        let converted = compute::cast_with_options(self.array.as_ref(), &to.to_arrow(), &options)
            .map_err(cast_error)?;
        if !(from.is_float() && to.is_float()) {
            let back = compute::cast_with_options(converted.as_ref(), &from.to_arrow(), &options)
                .map_err(cast_error)?;
            if back.as_ref() != self.array.as_ref() {
                let back = Self::wrap(from, back);
                let row = (0..self.len()).find(|&i| back.get(i) != self.get(i)).unwrap_or(0);
                return Err(Error::CastError {
                    from,
                    to,
                    reason: format!("{} is not exactly representable", self.get(row)),
                });
            }
        }
        Ok(Self::wrap(to, converted))
    }

    /// Replace missing values with `value`.
    pub fn fill_null(&self, value: &Value) -> Result<ColumnData> {
        if self.null_count() == 0 {
            return Ok(self.clone());
        }
        let fill = Self::constant(self.dtype, value, self.len())?;
        let present = compute::is_not_null(self.array.as_ref())?;
        let filled = zip(&present, &self.array, &fill.array)?;
        Ok(Self::wrap(self.dtype, filled))
    }
}

impl PartialEq for ColumnData {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.array.as_ref() == other.array.as_ref()
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! column_from {
    ($dtype:ident, $array:ty, $($item:ty),+) => {
        $(
            impl From<Vec<$item>> for ColumnData {
                fn from(v: Vec<$item>) -> Self {
                    ColumnData::wrap(DType::$dtype, Arc::new(<$array>::from(v)))
                }
            }
        )+
    };
}

column_from!(Bool, BooleanArray, bool, Option<bool>);
column_from!(Int32, Int32Array, i32, Option<i32>);
column_from!(Int64, Int64Array, i64, Option<i64>);
column_from!(Float32, Float32Array, f32, Option<f32>);
column_from!(Float64, Float64Array, f64, Option<f64>);
column_from!(Utf8, StringArray, &str, Option<&str>, String, Option<String>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_restores_unified_integers() {
        let unified = ColumnData::from(vec![Some(1.0f64), None, Some(-4.0)]);
        let restored = unified.cast(DType::Int64).unwrap();
        assert_eq!(restored, ColumnData::from(vec![Some(1i64), None, Some(-4)]));
    }

    #[test]
    fn test_cast_rejects_fractional() {
        let col = ColumnData::from(vec![1.5f64]);
        assert!(matches!(col.cast(DType::Int32), Err(Error::CastError { .. })));
    }

    #[test]
    fn test_cast_rejects_inexact_float() {
        let col = ColumnData::from(vec![Some(1i64), Some((1 << 53) + 1), None]);
        let err = col.cast(DType::Float64).unwrap_err();
        assert!(matches!(err, Error::CastError { ref reason, .. } if reason.contains("9007199254740993")));
        assert!(ColumnData::from(vec![1i64 << 53]).cast(DType::Float64).is_ok());
    }

    #[test]
    fn test_cast_bool_round_trip() {
        let col = ColumnData::from(vec![true, false]);
        let widened = col.cast(DType::Float64).unwrap();
        assert_eq!(widened.cast(DType::Bool).unwrap(), col);
        assert!(ColumnData::from(vec![2.0f64]).cast(DType::Bool).is_err());
    }

    #[test]
    fn test_take_with_gaps() {
        let col = ColumnData::from(vec!["a", "b"]);
        let out = col.take(&[Some(1), None, Some(0)]).unwrap();
        assert_eq!(out.values(), vec![Value::from("b"), Value::Null, Value::from("a")]);
        assert_eq!(out.null_count(), 1);
    }

    #[test]
    fn test_from_values_type_mismatch() {
        let err = ColumnData::from_values(DType::Int64, &[Value::Int(1), Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
        let err = ColumnData::from_values(DType::Int32, &[Value::Int(1 << 40)]).unwrap_err();
        assert!(matches!(err, Error::CastError { .. }));
    }

    #[test]
    fn test_fill_null() {
        let col = ColumnData::from(vec![Some(2i64), None]);
        let filled = col.fill_null(&Value::Int(7)).unwrap();
        assert_eq!(filled, ColumnData::from(vec![2i64, 7]));
        assert_eq!(filled.dtype(), DType::Int64);
    }

    #[test]
    fn test_from_array_rejects_unsupported_types() {
        let array: ArrayRef = Arc::new(arrow::array::UInt8Array::from(vec![1u8]));
        assert!(matches!(ColumnData::from_array(array), Err(Error::TypeError { .. })));
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
        assert_eq!(ColumnData::from_array(array).unwrap(), ColumnData::from(vec![Some(1i64), None]));
    }
}

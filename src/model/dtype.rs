//! Column data types.

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

/// Logical type of a property column.
///
/// Every column is nullable; a missing value is an Arrow null in the
/// column's array regardless of its dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Utf8 => "utf8",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// The smallest dtype both `self` and `other` can be represented in,
    /// or `None` when the two are not unifiable (e.g. text and numbers).
    pub fn supertype(&self, other: DType) -> Option<DType> {
        use DType::*;
        if *self == other {
            return Some(*self);
        }
        match (*self, other) {
            (Int32, Int64) | (Int64, Int32) => Some(Int64),
            (Float32, Float64) | (Float64, Float32) => Some(Float64),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(Float64),
            (Bool, b) if b.is_numeric() => Some(Float64),
            (a, Bool) if a.is_numeric() => Some(Float64),
            _ => None,
        }
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            DType::Bool => DataType::Boolean,
            DType::Int32 => DataType::Int32,
            DType::Int64 => DataType::Int64,
            DType::Float32 => DataType::Float32,
            DType::Float64 => DataType::Float64,
            DType::Utf8 => DataType::Utf8,
        }
    }

    /// The dtype of an Arrow array type, `None` for types property columns
    /// cannot hold.
    pub fn from_arrow(data_type: &DataType) -> Option<DType> {
        match data_type {
            DataType::Boolean => Some(DType::Bool),
            DataType::Int32 => Some(DType::Int32),
            DataType::Int64 => Some(DType::Int64),
            DataType::Float32 => Some(DType::Float32),
            DataType::Float64 => Some(DType::Float64),
            DataType::Utf8 => Some(DType::Utf8),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

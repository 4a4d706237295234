//! # Table Model
//!
//! Pure data types shared by the table engine, the property stores and
//! the expression evaluator. No I/O, no state.

pub mod dtype;
pub mod value;
pub mod column;

pub use dtype::DType;
pub use value::{Key, Value};
pub use column::ColumnData;

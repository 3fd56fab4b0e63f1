// Data module: columns, tables, views and the relational data model
// Author: Gabriel Demetrios Lafis

mod columns;
mod container;
mod csv;
mod data_frame;
mod data_model;
mod json;
#[cfg(feature = "arrow")]
mod parquet;
mod placeholder;
mod roles;
mod slicing;
mod source;
mod star_schema;
mod subroles;
mod table;
mod view;

pub mod time;

pub use columns::*;
pub use container::*;
pub use self::csv::*;
pub use data_frame::*;
pub use data_model::*;
pub use json::*;
#[cfg(feature = "arrow")]
pub use self::parquet::*;
pub use placeholder::*;
pub use roles::*;
pub use slicing::*;
pub use source::*;
pub use star_schema::*;
pub use subroles::*;
pub use table::*;
pub use view::*;

use chrono::NaiveDateTime;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::comm::CommError;

/// Default formats tried when parsing strings into time stamps
pub const TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%s%z", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// Unit assigned to time stamps
pub const TIME_STAMP_UNIT: &str = "time stamp";

/// Suffix that restricts a unit to comparisons
pub const COMPARISON_ONLY: &str = ", comparison only";

/// Represents an error in the data module
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("Index error: {0}")]
    Index(String),
    #[error("Key error: {0}")]
    Key(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl DataError {
    /// Whether the error was raised locally, before any round trip
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            DataError::Type(_) | DataError::Value(_) | DataError::Index(_) | DataError::Key(_)
        )
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Comm(CommError::Json(err))
    }
}

#[cfg(feature = "arrow")]
impl From<arrow::error::ArrowError> for DataError {
    fn from(err: arrow::error::ArrowError) -> Self {
        DataError::Comm(CommError::Arrow(err))
    }
}

/// A literal operand
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    String(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// The kind of column view a literal of this type becomes
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Float(_) | Value::Timestamp(_) => ColumnType::FloatColumnView,
            Value::String(_) => ColumnType::StringColumnView,
            Value::Boolean(_) => ColumnType::BooleanColumnView,
        }
    }

    /// The literal as it appears in `value_`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Float(v) => json!(v),
            Value::String(v) => json!(v),
            Value::Boolean(v) => json!(v),
            Value::Timestamp(v) => json!(timestamp_to_seconds(v)),
        }
    }

    /// Encode as a constant column
    pub fn to_cmd(&self) -> JsonValue {
        json!({
            "operator_": "const",
            "value_": self.to_json(),
            "type_": self.column_type().as_str(),
        })
    }
}

/// Seconds since epoch, the representation of time stamps inside the engine
pub fn timestamp_to_seconds(ts: &NaiveDateTime) -> f64 {
    let utc = ts.and_utc();
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Float(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

// Remote evaluation of column expressions
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{
    BooleanColumnView, Column, ColumnExpr, FloatColumn, FloatColumnView, StringColumn,
    StringColumnView,
};
use crate::comm::{CommError, Session, FOUND};
use crate::data::{validate_subroles, DataError};

#[cfg(feature = "arrow")]
use arrow::record_batch::RecordBatch;

/// Number of rows of a column or table as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Finite(usize),
    /// Constants, `rowid()` and other generators without a table
    Infinite,
    /// The engine could not tell without evaluating the expression
    Unknown,
}

impl Length {
    /// Parse the engine's reply to an `nrows` command
    pub fn parse(reply: &str) -> Result<Length, CommError> {
        match reply {
            "infinite" => Ok(Length::Infinite),
            "unknown" => Ok(Length::Unknown),
            n => n
                .trim()
                .parse::<usize>()
                .map(Length::Finite)
                .map_err(|_| CommError::Protocol(format!("Unexpected number of rows: '{}'", n))),
        }
    }

    pub fn finite(&self) -> Option<usize> {
        match self {
            Length::Finite(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Length::Infinite)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Length::Finite(n) => write!(f, "{}", n),
            Length::Infinite => write!(f, "infinite"),
            Length::Unknown => write!(f, "unknown"),
        }
    }
}

/// A page of a column rendered as strings by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnContent {
    pub total: usize,
    pub data: Vec<String>,
}

#[derive(Deserialize)]
struct RawContent {
    #[serde(rename = "recordsTotal")]
    records_total: usize,
    data: Vec<Vec<JsonValue>>,
}

impl ColumnContent {
    fn from_json(msg: &str) -> Result<Self, CommError> {
        if !msg.starts_with('{') {
            return Err(CommError::Engine(msg.to_string()));
        }

        let raw: RawContent = serde_json::from_str(msg)?;

        let data = raw
            .data
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|v| match v {
                JsonValue::String(s) => s,
                other => other.to_string(),
            })
            .collect();

        Ok(ColumnContent {
            total: raw.records_total,
            data,
        })
    }
}

fn column_cmd(col: &(impl ColumnExpr + ?Sized), suffix: &str) -> JsonValue {
    json!({
        "type_": format!("{}.{}", col.column_type().command_prefix(), suffix),
        "name_": "",
        "col_": col.to_cmd(),
    })
}

/// Round trips that every column supports
pub trait Evaluate: ColumnExpr {
    /// Number of rows, without retrieving the data
    fn nrows(&self, session: &Session) -> Result<Length, DataError> {
        let mut sock = session.send_and_expect(&column_cmd(self, "nrows"), FOUND)?;
        Ok(Length::parse(&sock.recv_string()?)?)
    }

    /// Rows `[start, start + length)` rendered as strings
    fn content(&self, session: &Session, start: usize, length: usize) -> Result<ColumnContent, DataError> {
        let mut cmd = column_cmd(self, "get_content");
        cmd["draw_"] = json!(1);
        cmd["start_"] = json!(start);
        cmd["length_"] = json!(length);

        let mut sock = session.send_and_get_socket(&cmd)?;
        Ok(ColumnContent::from_json(&sock.recv_string()?)?)
    }

    /// A single entry; negative indices count from the end
    fn get_scalar(&self, session: &Session, index: i64) -> Result<String, DataError> {
        let index = if index < 0 {
            let len = self.nrows(session)?.finite().ok_or_else(|| {
                DataError::Index("Negative indices require a column of known length.".to_string())
            })?;
            index + len as i64
        } else {
            index
        };

        if index < 0 {
            return Err(DataError::Index("Index out of bounds.".to_string()));
        }

        let content = self.content(session, index as usize, 1)?;

        if (index as usize) >= content.total && content.total > 0 {
            return Err(DataError::Index("Index out of bounds.".to_string()));
        }

        content
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DataError::Index("Index out of bounds.".to_string()))
    }

    /// Retrieve the evaluated column as Arrow record batches
    #[cfg(feature = "arrow")]
    fn fetch_batches(&self, session: &Session) -> Result<Vec<RecordBatch>, DataError> {
        let mut sock = session.send_and_get_socket(&column_cmd(self, "get"))?;
        sock.expect_success()?;
        let batches = sock.recv_arrow_stream()?;

        if self.column_type().is_float() {
            sock.expect_success()?;
        }

        Ok(batches)
    }
}

impl Evaluate for FloatColumn {}
impl Evaluate for FloatColumnView {}
impl Evaluate for StringColumn {}
impl Evaluate for StringColumnView {}
impl Evaluate for BooleanColumnView {}
impl Evaluate for Column {}

/// Subroles and unit, carried by float and string columns
pub trait ColumnMetadata: ColumnExpr {
    fn subroles(&self, session: &Session) -> Result<Vec<String>, DataError> {
        if self.column_type().is_boolean() {
            return Ok(Vec::new());
        }

        let mut sock = session.send_and_get_socket(&column_cmd(self, "get_subroles"))?;
        sock.expect_success()?;
        Ok(sock.recv_string_column()?)
    }

    fn unit(&self, session: &Session) -> Result<String, DataError> {
        if self.column_type().is_boolean() {
            return Ok(String::new());
        }

        let mut sock = session.send_and_get_socket(&column_cmd(self, "get_unit"))?;
        sock.expect_success()?;
        Ok(sock.recv_string()?)
    }
}

impl ColumnMetadata for FloatColumn {}
impl ColumnMetadata for FloatColumnView {}
impl ColumnMetadata for StringColumn {}
impl ColumnMetadata for StringColumnView {}
impl ColumnMetadata for Column {}

impl Column {
    /// Add subroles to the ones the column already carries on the engine
    pub fn with_appended_subroles<S: AsRef<str>>(
        &self,
        session: &Session,
        subroles: &[S],
    ) -> Result<Column, DataError> {
        validate_subroles(subroles)?;

        let mut combined = self.subroles(session)?;
        combined.extend(subroles.iter().map(|s| s.as_ref().to_string()));

        self.with_subroles(combined.as_slice())
    }
}

fn set_metadata(
    session: &Session,
    prefix: &str,
    suffix: &str,
    target: (&str, &str, &str),
    field: (&str, JsonValue),
) -> Result<(), DataError> {
    let (df_name, name, role) = target;
    let (key, value) = field;

    let mut cmd = json!({
        "type_": format!("{}.{}", prefix, suffix),
        "df_name_": df_name,
        "name_": name,
        "role_": role,
    });
    cmd[key] = value;

    session.send(&cmd)?;
    Ok(())
}

macro_rules! named_column_setters {
    ($($t:ident => $prefix:expr),*) => {
        $(
            impl $t {
                /// Replace the subroles of the column in its data frame
                pub fn set_subroles<S: AsRef<str>>(&self, session: &Session, subroles: &[S]) -> Result<(), DataError> {
                    validate_subroles(subroles)?;

                    let subroles: Vec<&str> = subroles.iter().map(AsRef::as_ref).collect();

                    set_metadata(
                        session,
                        $prefix,
                        "set_subroles",
                        (self.df_name(), self.name(), self.role().as_str()),
                        ("subroles_", json!(subroles)),
                    )
                }

                /// Replace the unit of the column in its data frame
                pub fn set_unit(&self, session: &Session, unit: &str) -> Result<(), DataError> {
                    set_metadata(
                        session,
                        $prefix,
                        "set_unit",
                        (self.df_name(), self.name(), self.role().as_str()),
                        ("unit_", json!(unit)),
                    )
                }
            }
        )*
    };
}

named_column_setters!(FloatColumn => "FloatColumn", StringColumn => "StringColumn");

#[cfg(feature = "arrow")]
mod values {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{DataType, Float64Type, TimeUnit, TimestampNanosecondType};
    use arrow::record_batch::RecordBatch;

    use super::*;

    fn first_column(batch: &RecordBatch) -> Result<&arrow::array::ArrayRef, DataError> {
        if batch.num_columns() == 0 {
            return Err(DataError::Comm(CommError::Protocol(
                "The engine sent a batch without columns".to_string(),
            )));
        }
        Ok(batch.column(0))
    }

    /// Numbers from float or time stamp batches; time stamps become seconds
    pub fn floats_from_batches(batches: &[RecordBatch]) -> Result<Vec<f64>, DataError> {
        let mut out = Vec::new();

        for batch in batches {
            let col = first_column(batch)?;

            match col.data_type() {
                DataType::Float64 => {
                    out.extend(col.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)));
                }
                DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                    out.extend(
                        col.as_primitive::<TimestampNanosecondType>()
                            .iter()
                            .map(|v| v.map(|ns| ns as f64 / 1e9).unwrap_or(f64::NAN)),
                    );
                }
                other => {
                    return Err(DataError::Type(format!("Expected a numerical column, got {}", other)))
                }
            }
        }

        Ok(out)
    }

    pub fn strings_from_batches(batches: &[RecordBatch]) -> Result<Vec<Option<String>>, DataError> {
        let mut out = Vec::new();

        for batch in batches {
            let col = first_column(batch)?;

            match col.data_type() {
                DataType::Utf8 => {
                    out.extend(col.as_string::<i32>().iter().map(|v| v.map(str::to_string)));
                }
                DataType::LargeUtf8 => {
                    out.extend(col.as_string::<i64>().iter().map(|v| v.map(str::to_string)));
                }
                other => {
                    return Err(DataError::Type(format!("Expected a string column, got {}", other)))
                }
            }
        }

        Ok(out)
    }

    pub fn bools_from_batches(batches: &[RecordBatch]) -> Result<Vec<bool>, DataError> {
        let mut out = Vec::new();

        for batch in batches {
            let col = first_column(batch)?;

            if col.data_type() != &DataType::Boolean {
                return Err(DataError::Type(format!(
                    "Expected a boolean column, got {}",
                    col.data_type()
                )));
            }

            let arr = col.as_boolean();
            out.extend((0..arr.len()).map(|i| arr.is_valid(i) && arr.value(i)));
        }

        Ok(out)
    }
}

#[cfg(feature = "arrow")]
pub use values::{bools_from_batches, floats_from_batches, strings_from_batches};

/// Retrieve numerical data
#[cfg(feature = "arrow")]
pub trait FloatValues: Evaluate {
    /// All entries; missing values are NaN
    fn to_vec(&self, session: &Session) -> Result<Vec<f64>, DataError> {
        floats_from_batches(&self.fetch_batches(session)?)
    }

    /// Distinct entries
    fn unique(&self, session: &Session) -> Result<Vec<f64>, DataError> {
        let mut sock = session.send_and_get_socket(&column_cmd(self, "unique"))?;
        sock.expect_success()?;
        let batches = sock.recv_arrow_stream()?;
        sock.expect_success()?;

        floats_from_batches(&batches)
    }
}

#[cfg(feature = "arrow")]
impl FloatValues for FloatColumn {}
#[cfg(feature = "arrow")]
impl FloatValues for FloatColumnView {}

/// Retrieve categorical data
#[cfg(feature = "arrow")]
pub trait StringValues: Evaluate {
    fn to_strings(&self, session: &Session) -> Result<Vec<Option<String>>, DataError> {
        strings_from_batches(&self.fetch_batches(session)?)
    }

    fn unique(&self, session: &Session) -> Result<Vec<String>, DataError> {
        let mut sock = session.send_and_get_socket(&column_cmd(self, "unique"))?;
        sock.expect_success()?;
        let batches = sock.recv_arrow_stream()?;

        Ok(strings_from_batches(&batches)?.into_iter().flatten().collect())
    }
}

#[cfg(feature = "arrow")]
impl StringValues for StringColumn {}
#[cfg(feature = "arrow")]
impl StringValues for StringColumnView {}

#[cfg(feature = "arrow")]
impl BooleanColumnView {
    /// All entries of the mask
    pub fn to_bools(&self, session: &Session) -> Result<Vec<bool>, DataError> {
        bools_from_batches(&self.fetch_batches(session)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length() {
        assert_eq!(Length::parse("42").unwrap(), Length::Finite(42));
        assert_eq!(Length::parse("infinite").unwrap(), Length::Infinite);
        assert_eq!(Length::parse("unknown").unwrap(), Length::Unknown);
        assert!(Length::parse("lots").is_err());
    }

    #[test]
    fn test_column_content() {
        let msg = r#"{"draw":1,"recordsTotal":3,"recordsFiltered":3,"data":[["a"],["b"]]}"#;

        let content = ColumnContent::from_json(msg).unwrap();

        assert_eq!(content.total, 3);
        assert_eq!(content.data, vec!["a", "b"]);

        // Anything but JSON is an error message from the engine
        assert!(ColumnContent::from_json("DataFrame 'x' not found").is_err());
    }

    #[test]
    fn test_column_cmd_prefix() {
        use crate::data::{rowid, FloatOps};

        let cmd = column_cmd(&rowid().greater(1.0), "nrows");

        assert_eq!(cmd["type_"], "BooleanColumn.nrows");
        assert_eq!(cmd["col_"]["operator_"], "greater");
    }

    #[cfg(feature = "arrow")]
    #[test]
    fn test_floats_from_time_stamps() {
        use arrow::array::TimestampNanosecondArray;
        use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
        use std::sync::Arc;

        let schema = Schema::new(vec![Field::new(
            "column",
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            true,
        )]);
        let array = TimestampNanosecondArray::from(vec![Some(1_500_000_000), None]);
        let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(array)]).unwrap();

        let values = floats_from_batches(&[batch]).unwrap();

        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan());
    }
}

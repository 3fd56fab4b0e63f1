// Eager aggregations resolved on the engine
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde_json::{json, Value as JsonValue};

use super::{ColumnExpr, FloatColumn, FloatColumnView, StringColumn, StringColumnView};
use crate::comm::{CommError, Session};
use crate::data::DataError;

/// Aggregations the engine can compute over a whole column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    AssertEqual,
    Avg,
    Count,
    CountCategorical,
    CountDistinct,
    Max,
    Median,
    Min,
    Stddev,
    Sum,
    Var,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::AssertEqual => "assert_equal",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::CountCategorical => "count_categorical",
            Aggregation::CountDistinct => "count_distinct",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
            Aggregation::Min => "min",
            Aggregation::Stddev => "stddev",
            Aggregation::Sum => "sum",
            Aggregation::Var => "var",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the wire command of an aggregation
pub fn aggregation_cmd(col: &impl ColumnExpr, aggregation: Aggregation, alias: &str) -> JsonValue {
    json!({
        "type_": format!("{}.aggregate", col.column_type().command_prefix()),
        "name_": "",
        "aggregation_": {
            "type_": aggregation.as_str(),
            "col_": col.to_cmd(),
            "as_": alias,
        },
    })
}

/// Send an aggregation and read back the scalar result
pub fn aggregate(
    session: &Session,
    col: &impl ColumnExpr,
    aggregation: Aggregation,
    alias: &str,
) -> Result<f64, DataError> {
    let cmd = aggregation_cmd(col, aggregation, alias);

    let mut sock = session.send_and_get_socket(&cmd)?;
    sock.expect_success()?;

    let matrix = sock.recv_float_matrix()?;

    matrix.data.first().copied().ok_or_else(|| {
        DataError::Comm(CommError::Protocol(format!(
            "Aggregation '{}' returned no value",
            aggregation
        )))
    })
}

/// Aggregations over numerical columns
pub trait FloatAggregations: ColumnExpr + Sized {
    /// Fails on the engine unless all entries are equal
    fn assert_equal(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::AssertEqual, "new_column")
    }

    fn avg(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Avg, "new_column")
    }

    fn count(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Count, "new_column")
    }

    fn max(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Max, "new_column")
    }

    fn median(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Median, "new_column")
    }

    fn min(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Min, "new_column")
    }

    fn stddev(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Stddev, "new_column")
    }

    fn sum(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Sum, "new_column")
    }

    fn var(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::Var, "new_column")
    }
}

impl FloatAggregations for FloatColumn {}
impl FloatAggregations for FloatColumnView {}

/// Aggregations over categorical columns
pub trait StringAggregations: ColumnExpr + Sized {
    /// Number of non-null entries
    fn count(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::CountCategorical, "new_column")
    }

    fn count_distinct(&self, session: &Session) -> Result<f64, DataError> {
        aggregate(session, self, Aggregation::CountDistinct, "new_column")
    }
}

impl StringAggregations for StringColumn {}
impl StringAggregations for StringColumnView {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;

    #[test]
    fn test_aggregation_cmd() {
        let col = FloatColumn::new("amount", Role::Numerical, "loans");

        let cmd = aggregation_cmd(&col, Aggregation::Median, "new_column");

        assert_eq!(cmd["type_"], "FloatColumn.aggregate");
        assert_eq!(cmd["aggregation_"]["type_"], "median");
        assert_eq!(cmd["aggregation_"]["col_"]["name_"], "amount");
        assert_eq!(cmd["aggregation_"]["as_"], "new_column");
    }

    #[test]
    fn test_string_count_is_categorical() {
        let col = StringColumn::new("id", Role::JoinKey, "loans");

        let cmd = aggregation_cmd(&col, Aggregation::CountCategorical, "new_column");

        assert_eq!(cmd["type_"], "StringColumn.aggregate");
        assert_eq!(cmd["aggregation_"]["type_"], "count_categorical");
    }
}

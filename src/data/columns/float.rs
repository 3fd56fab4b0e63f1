// Numerical columns and the float operator library
// Author: Gabriel Demetrios Lafis

use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use super::{
    arange_len, BooleanColumnView, Column, ColumnExpr, ColumnType, Extra, NamedColumn, Node,
    Operand, StringColumnView,
};
use crate::data::{validate_subroles, DataError, Role, Value};

static NUM_FLOAT_COLUMNS: AtomicUsize = AtomicUsize::new(0);

/// Handle for numerical data that is kept in the engine
#[derive(Debug, Clone, PartialEq)]
pub struct FloatColumn {
    inner: Arc<NamedColumn>,
}

impl FloatColumn {
    /// Create a new handle; an empty name is replaced by "FloatColumn N"
    pub fn new(name: &str, role: Role, df_name: &str) -> Self {
        let n = NUM_FLOAT_COLUMNS.fetch_add(1, Ordering::Relaxed) + 1;

        let name = if name.is_empty() {
            format!("FloatColumn {}", n)
        } else {
            name.to_string()
        };

        FloatColumn {
            inner: Arc::new(NamedColumn {
                name,
                role,
                df_name: df_name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Name of the data frame holding the column
    pub fn df_name(&self) -> &str {
        &self.inner.df_name
    }
}

impl ColumnExpr for FloatColumn {
    fn to_column(&self) -> Column {
        Column::Float(self.clone())
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::FloatColumn
    }

    fn to_cmd(&self) -> JsonValue {
        self.inner.to_cmd(ColumnType::FloatColumn)
    }
}

/// Lazily evaluated view on numerical data
#[derive(Debug, Clone, PartialEq)]
pub struct FloatColumnView {
    node: Arc<Node>,
}

impl FloatColumnView {
    pub(crate) fn from_node(node: Node) -> Self {
        FloatColumnView {
            node: Arc::new(node),
        }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    /// Operator that produced this view
    pub fn operator(&self) -> &str {
        &self.node.operator
    }

    /// Number of rows described by an `arange` view, known without a round trip
    pub fn range_len(&self) -> Option<usize> {
        match self.node.extra {
            Extra::Range { start, stop, step } => Some(arange_len(start, stop, step)),
            _ => None,
        }
    }
}

impl ColumnExpr for FloatColumnView {
    fn to_column(&self) -> Column {
        Column::FloatView(self.clone())
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::FloatColumnView
    }

    fn to_cmd(&self) -> JsonValue {
        self.node.to_cmd()
    }
}

/// Anything that can stand on the right of a float operator
pub trait IntoFloatOperand {
    fn into_float_operand(self) -> Operand;
}

macro_rules! float_operand_from {
    ($($t:ty),*) => {
        $(
            impl IntoFloatOperand for $t {
                fn into_float_operand(self) -> Operand {
                    Operand::from(self)
                }
            }
        )*
    };
}

float_operand_from!(f64, i32, i64, NaiveDateTime, FloatColumn, FloatColumnView, &FloatColumn, &FloatColumnView);

impl IntoFloatOperand for Value {
    fn into_float_operand(self) -> Operand {
        Operand::Value(self)
    }
}

fn float_view(operator: &str, operand1: Operand, operand2: Option<Operand>) -> FloatColumnView {
    FloatColumnView::from_node(Node::new(
        ColumnType::FloatColumnView,
        operator,
        Some(operand1),
        operand2,
    ))
}

fn boolean_view(operator: &str, operand1: Operand, operand2: Option<Operand>) -> BooleanColumnView {
    BooleanColumnView::from_node(Node::new(
        ColumnType::BooleanColumnView,
        operator,
        Some(operand1),
        operand2,
    ))
}

/// Operators shared by [`FloatColumn`] and [`FloatColumnView`]
pub trait FloatOps: ColumnExpr {
    fn abs(&self) -> FloatColumnView {
        float_view("abs", self.operand(), None)
    }

    fn acos(&self) -> FloatColumnView {
        float_view("acos", self.operand(), None)
    }

    fn asin(&self) -> FloatColumnView {
        float_view("asin", self.operand(), None)
    }

    fn atan(&self) -> FloatColumnView {
        float_view("atan", self.operand(), None)
    }

    fn cbrt(&self) -> FloatColumnView {
        float_view("cbrt", self.operand(), None)
    }

    fn ceil(&self) -> FloatColumnView {
        float_view("ceil", self.operand(), None)
    }

    fn cos(&self) -> FloatColumnView {
        float_view("cos", self.operand(), None)
    }

    fn erf(&self) -> FloatColumnView {
        float_view("erf", self.operand(), None)
    }

    fn exp(&self) -> FloatColumnView {
        float_view("exp", self.operand(), None)
    }

    fn floor(&self) -> FloatColumnView {
        float_view("floor", self.operand(), None)
    }

    /// Gamma function
    fn gamma(&self) -> FloatColumnView {
        float_view("tgamma", self.operand(), None)
    }

    /// Natural logarithm of the absolute value of the gamma function
    fn lgamma(&self) -> FloatColumnView {
        float_view("lgamma", self.operand(), None)
    }

    /// Natural logarithm
    fn log(&self) -> FloatColumnView {
        float_view("log", self.operand(), None)
    }

    /// Round to nearest
    fn round(&self) -> FloatColumnView {
        float_view("round", self.operand(), None)
    }

    fn sin(&self) -> FloatColumnView {
        float_view("sin", self.operand(), None)
    }

    fn sqrt(&self) -> FloatColumnView {
        float_view("sqrt", self.operand(), None)
    }

    fn tan(&self) -> FloatColumnView {
        float_view("tan", self.operand(), None)
    }

    fn pow(&self, exponent: impl IntoFloatOperand) -> FloatColumnView {
        float_view("pow", self.operand(), Some(exponent.into_float_operand()))
    }

    /// Extract the year from a time stamp
    fn year(&self) -> FloatColumnView {
        float_view("year", self.operand(), None)
    }

    fn month(&self) -> FloatColumnView {
        float_view("month", self.operand(), None)
    }

    fn day(&self) -> FloatColumnView {
        float_view("day", self.operand(), None)
    }

    fn hour(&self) -> FloatColumnView {
        float_view("hour", self.operand(), None)
    }

    fn minute(&self) -> FloatColumnView {
        float_view("minute", self.operand(), None)
    }

    fn second(&self) -> FloatColumnView {
        float_view("second", self.operand(), None)
    }

    /// Day of the week, Sunday is 0
    fn weekday(&self) -> FloatColumnView {
        float_view("weekday", self.operand(), None)
    }

    /// Day of the year, January 1 is 0
    fn yearday(&self) -> FloatColumnView {
        float_view("yearday", self.operand(), None)
    }

    fn equal_to(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("num_equal_to", self.operand(), Some(other.into_float_operand()))
    }

    fn not_equal_to(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("num_not_equal_to", self.operand(), Some(other.into_float_operand()))
    }

    fn greater(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("greater", self.operand(), Some(other.into_float_operand()))
    }

    fn greater_equal(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("greater_equal", self.operand(), Some(other.into_float_operand()))
    }

    fn less(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("less", self.operand(), Some(other.into_float_operand()))
    }

    fn less_equal(&self, other: impl IntoFloatOperand) -> BooleanColumnView {
        boolean_view("less_equal", self.operand(), Some(other.into_float_operand()))
    }

    fn is_inf(&self) -> BooleanColumnView {
        boolean_view("is_inf", self.operand(), None)
    }

    fn is_nan(&self) -> BooleanColumnView {
        boolean_view("is_nan", self.operand(), None)
    }

    /// Missing numbers are NaN on the engine
    fn is_null(&self) -> BooleanColumnView {
        self.is_nan()
    }

    /// Transform into a string column
    fn as_str(&self) -> StringColumnView {
        StringColumnView::from_node(Node::new(
            ColumnType::StringColumnView,
            "as_str",
            Some(self.operand()),
            None,
        ))
    }

    /// Replace the entries where `condition` holds by `values`
    fn update(&self, condition: &BooleanColumnView, values: impl IntoFloatOperand) -> FloatColumnView {
        FloatColumnView::from_node(
            Node::new(
                ColumnType::FloatColumnView,
                "num_update",
                Some(self.operand()),
                Some(values.into_float_operand()),
            )
            .with_extra(Extra::Condition(condition.clone())),
        )
    }

    /// Return a view carrying exactly these subroles
    fn with_subroles<S: AsRef<str>>(&self, subroles: &[S]) -> Result<FloatColumnView, DataError> {
        validate_subroles(subroles)?;

        let subroles = subroles.iter().map(|s| s.as_ref().to_string()).collect();

        Ok(FloatColumnView::from_node(
            Node::new(ColumnType::FloatColumnView, "num_with_subroles", Some(self.operand()), None)
                .with_extra(Extra::Subroles(subroles)),
        ))
    }

    /// Return a view carrying a new unit
    fn with_unit(&self, unit: &str) -> FloatColumnView {
        FloatColumnView::from_node(
            Node::new(ColumnType::FloatColumnView, "num_with_unit", Some(self.operand()), None)
                .with_extra(Extra::Unit(unit.to_string())),
        )
    }

    /// Keep the rows selected by a range, index or mask expression
    fn subselect_operand(&self, indices: Operand) -> FloatColumnView {
        float_view("num_subselection", self.operand(), Some(indices))
    }
}

impl FloatOps for FloatColumn {}
impl FloatOps for FloatColumnView {}

macro_rules! float_binary_ops {
    ($($t:ty),*) => {
        $(
            impl<T: IntoFloatOperand> Add<T> for $t {
                type Output = FloatColumnView;

                fn add(self, rhs: T) -> FloatColumnView {
                    float_view("plus", self.operand(), Some(rhs.into_float_operand()))
                }
            }

            impl<T: IntoFloatOperand> Sub<T> for $t {
                type Output = FloatColumnView;

                fn sub(self, rhs: T) -> FloatColumnView {
                    float_view("minus", self.operand(), Some(rhs.into_float_operand()))
                }
            }

            impl<T: IntoFloatOperand> Mul<T> for $t {
                type Output = FloatColumnView;

                fn mul(self, rhs: T) -> FloatColumnView {
                    float_view("multiplies", self.operand(), Some(rhs.into_float_operand()))
                }
            }

            impl<T: IntoFloatOperand> Div<T> for $t {
                type Output = FloatColumnView;

                fn div(self, rhs: T) -> FloatColumnView {
                    float_view("divides", self.operand(), Some(rhs.into_float_operand()))
                }
            }

            impl<T: IntoFloatOperand> Rem<T> for $t {
                type Output = FloatColumnView;

                fn rem(self, rhs: T) -> FloatColumnView {
                    float_view("fmod", self.operand(), Some(rhs.into_float_operand()))
                }
            }

            impl Neg for $t {
                type Output = FloatColumnView;

                fn neg(self) -> FloatColumnView {
                    float_view("multiplies", self.operand(), Some(Operand::from(-1.0)))
                }
            }
        )*
    };
}

float_binary_ops!(FloatColumn, FloatColumnView, &FloatColumn, &FloatColumnView);

// Literal on the left: 1.0 - col
macro_rules! float_reverse_ops {
    ($lit:ty => $($t:ty),*) => {
        $(
            impl Add<$t> for $lit {
                type Output = FloatColumnView;

                fn add(self, rhs: $t) -> FloatColumnView {
                    float_view("plus", Operand::from(self), Some(rhs.operand()))
                }
            }

            impl Sub<$t> for $lit {
                type Output = FloatColumnView;

                fn sub(self, rhs: $t) -> FloatColumnView {
                    float_view("minus", Operand::from(self), Some(rhs.operand()))
                }
            }

            impl Mul<$t> for $lit {
                type Output = FloatColumnView;

                fn mul(self, rhs: $t) -> FloatColumnView {
                    float_view("multiplies", Operand::from(self), Some(rhs.operand()))
                }
            }

            impl Div<$t> for $lit {
                type Output = FloatColumnView;

                fn div(self, rhs: $t) -> FloatColumnView {
                    float_view("divides", Operand::from(self), Some(rhs.operand()))
                }
            }

            impl Rem<$t> for $lit {
                type Output = FloatColumnView;

                fn rem(self, rhs: $t) -> FloatColumnView {
                    float_view("fmod", Operand::from(self), Some(rhs.operand()))
                }
            }
        )*
    };
}

float_reverse_ops!(f64 => FloatColumn, FloatColumnView, &FloatColumn, &FloatColumnView);
float_reverse_ops!(i32 => FloatColumn, FloatColumnView, &FloatColumn, &FloatColumnView);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amount() -> FloatColumn {
        FloatColumn::new("amount", Role::Numerical, "loans")
    }

    #[test]
    fn test_named_column_cmd() {
        assert_eq!(
            amount().to_cmd(),
            json!({
                "operator_": "FloatColumn",
                "df_name_": "loans",
                "name_": "amount",
                "role_": "numerical",
                "type_": "FloatColumn",
            })
        );
    }

    #[test]
    fn test_auto_naming() {
        let col = FloatColumn::new("", Role::UnusedFloat, "");
        assert!(col.name().starts_with("FloatColumn "));
    }

    #[test]
    fn test_arithmetic_builds_new_nodes() {
        let col = amount();

        // Binary operator with a literal on the right
        let view = &col + 1.0;
        assert_eq!(view.operator(), "plus");
        assert_eq!(view.to_cmd()["operand1_"], col.to_cmd());
        assert_eq!(view.to_cmd()["operand2_"]["value_"], 1.0);

        // Literal on the left keeps operand order
        let view = 1.0 - &col;
        assert_eq!(view.operator(), "minus");
        assert_eq!(view.to_cmd()["operand1_"]["operator_"], "const");

        // Negation multiplies by -1
        let view = -col.clone();
        assert_eq!(view.operator(), "multiplies");
        assert_eq!(view.to_cmd()["operand2_"]["value_"], -1.0);

        // The base column is untouched
        assert_eq!(col, amount());
    }

    #[test]
    fn test_unary_and_datetime_operators() {
        let col = amount();

        assert_eq!(col.gamma().operator(), "tgamma");
        assert_eq!(col.sqrt().abs().to_cmd()["operand1_"]["operator_"], "sqrt");
        assert_eq!(col.weekday().operator(), "weekday");
        assert_eq!(col.is_null().to_cmd()["operator_"], "is_nan");
    }

    #[test]
    fn test_update_carries_condition() {
        let col = amount();
        let cond = col.greater(10.0);

        let cmd = col.update(&cond, 10.0).to_cmd();

        assert_eq!(cmd["operator_"], "num_update");
        assert_eq!(cmd["condition_"]["operator_"], "greater");
    }

    #[test]
    fn test_with_subroles_validates() {
        let col = amount();

        let view = col.with_subroles(&["exclude predictors"]).unwrap();
        assert_eq!(view.to_cmd()["subroles_"], json!(["exclude predictors"]));

        assert!(col.with_subroles(&["exclude nothing"]).is_err());
    }

    #[test]
    fn test_with_unit() {
        let cmd = amount().with_unit("EUR").to_cmd();

        assert_eq!(cmd["operator_"], "num_with_unit");
        assert_eq!(cmd["unit_"], "EUR");
    }
}

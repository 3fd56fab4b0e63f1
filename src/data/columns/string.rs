// Categorical columns and the string operator library
// Author: Gabriel Demetrios Lafis

use std::ops::Add;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{
    BooleanColumnView, Column, ColumnExpr, ColumnType, Extra, FloatColumn, FloatColumnView,
    FloatOps, NamedColumn, Node, Operand,
};
use crate::data::{validate_subroles, DataError, Role, TIME_FORMATS};

static NUM_STRING_COLUMNS: AtomicUsize = AtomicUsize::new(0);

/// Handle for categorical data that is kept in the engine
#[derive(Debug, Clone, PartialEq)]
pub struct StringColumn {
    inner: Arc<NamedColumn>,
}

impl StringColumn {
    /// Create a new handle; an empty name is replaced by "StringColumn N"
    pub fn new(name: &str, role: Role, df_name: &str) -> Self {
        let n = NUM_STRING_COLUMNS.fetch_add(1, Ordering::Relaxed) + 1;

        let name = if name.is_empty() {
            format!("StringColumn {}", n)
        } else {
            name.to_string()
        };

        StringColumn {
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

    pub fn df_name(&self) -> &str {
        &self.inner.df_name
    }
}

impl ColumnExpr for StringColumn {
    fn to_column(&self) -> Column {
        Column::String(self.clone())
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::StringColumn
    }

    fn to_cmd(&self) -> JsonValue {
        self.inner.to_cmd(ColumnType::StringColumn)
    }
}

/// Lazily evaluated view on categorical data
#[derive(Debug, Clone, PartialEq)]
pub struct StringColumnView {
    node: Arc<Node>,
}

impl StringColumnView {
    pub(crate) fn from_node(node: Node) -> Self {
        StringColumnView {
            node: Arc::new(node),
        }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    pub fn operator(&self) -> &str {
        &self.node.operator
    }
}

impl ColumnExpr for StringColumnView {
    fn to_column(&self) -> Column {
        Column::StringView(self.clone())
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::StringColumnView
    }

    fn to_cmd(&self) -> JsonValue {
        self.node.to_cmd()
    }
}

/// Anything that can be compared with or written into a string column
pub trait IntoStringOperand {
    fn into_string_operand(self) -> Operand;
}

macro_rules! string_operand_from {
    ($($t:ty),*) => {
        $(
            impl IntoStringOperand for $t {
                fn into_string_operand(self) -> Operand {
                    Operand::from(self)
                }
            }
        )*
    };
}

string_operand_from!(&str, String, StringColumn, StringColumnView, &StringColumn, &StringColumnView);

/// Anything that can be concatenated to a string column; numbers and
/// booleans are cast with `as_str` first
pub trait Concatenable {
    fn into_concat_operand(self) -> Operand;
}

macro_rules! concat_as_string {
    ($($t:ty),*) => {
        $(
            impl Concatenable for $t {
                fn into_concat_operand(self) -> Operand {
                    self.into_string_operand()
                }
            }
        )*
    };
}

concat_as_string!(&str, String, StringColumn, StringColumnView, &StringColumn, &StringColumnView);

macro_rules! concat_cast {
    ($($t:ty),*) => {
        $(
            impl Concatenable for $t {
                fn into_concat_operand(self) -> Operand {
                    Operand::from(self.as_str())
                }
            }
        )*
    };
}

concat_cast!(FloatColumn, FloatColumnView, &FloatColumn, &FloatColumnView, BooleanColumnView, &BooleanColumnView);

fn string_view(operator: &str, operand1: Operand, operand2: Option<Operand>) -> StringColumnView {
    StringColumnView::from_node(Node::new(
        ColumnType::StringColumnView,
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

/// Operators shared by [`StringColumn`] and [`StringColumnView`]
pub trait StringOps: ColumnExpr {
    /// Append another string, column or cast column
    fn concat(&self, other: impl Concatenable) -> StringColumnView {
        string_view("concat", self.operand(), Some(other.into_concat_operand()))
    }

    /// Whether `other` is contained in each entry
    fn contains(&self, other: impl IntoStringOperand) -> BooleanColumnView {
        boolean_view("contains", self.operand(), Some(other.into_string_operand()))
    }

    /// Substring of `len` characters starting at `begin`
    fn substr(&self, begin: usize, len: usize) -> StringColumnView {
        StringColumnView::from_node(
            Node::new(ColumnType::StringColumnView, "substr", Some(self.operand()), None)
                .with_extra(Extra::Substr { begin, len }),
        )
    }

    fn equal_to(&self, other: impl IntoStringOperand) -> BooleanColumnView {
        boolean_view("str_equal_to", self.operand(), Some(other.into_string_operand()))
    }

    fn not_equal_to(&self, other: impl IntoStringOperand) -> BooleanColumnView {
        boolean_view("str_not_equal_to", self.operand(), Some(other.into_string_operand()))
    }

    fn is_null(&self) -> BooleanColumnView {
        boolean_view("is_null", self.operand(), None)
    }

    /// Parse the entries as numbers
    fn as_num(&self) -> FloatColumnView {
        FloatColumnView::from_node(Node::new(
            ColumnType::FloatColumnView,
            "as_num",
            Some(self.operand()),
            None,
        ))
    }

    /// Parse the entries as time stamps; an empty list uses [`TIME_FORMATS`]
    fn as_ts<S: AsRef<str>>(&self, time_formats: &[S]) -> FloatColumnView {
        let formats: Vec<String> = if time_formats.is_empty() {
            TIME_FORMATS.iter().map(|f| f.to_string()).collect()
        } else {
            time_formats.iter().map(|f| f.as_ref().to_string()).collect()
        };

        FloatColumnView::from_node(
            Node::new(ColumnType::FloatColumnView, "as_ts", Some(self.operand()), None)
                .with_extra(Extra::TimeFormats(formats)),
        )
    }

    /// Replace the entries where `condition` holds by `values`
    fn update(&self, condition: &BooleanColumnView, values: impl IntoStringOperand) -> StringColumnView {
        StringColumnView::from_node(
            Node::new(
                ColumnType::StringColumnView,
                "str_update",
                Some(self.operand()),
                Some(values.into_string_operand()),
            )
            .with_extra(Extra::Condition(condition.clone())),
        )
    }

    /// Return a view carrying exactly these subroles
    fn with_subroles<S: AsRef<str>>(&self, subroles: &[S]) -> Result<StringColumnView, DataError> {
        validate_subroles(subroles)?;

        let subroles = subroles.iter().map(|s| s.as_ref().to_string()).collect();

        Ok(StringColumnView::from_node(
            Node::new(ColumnType::StringColumnView, "str_with_subroles", Some(self.operand()), None)
                .with_extra(Extra::Subroles(subroles)),
        ))
    }

    fn with_unit(&self, unit: &str) -> StringColumnView {
        StringColumnView::from_node(
            Node::new(ColumnType::StringColumnView, "str_with_unit", Some(self.operand()), None)
                .with_extra(Extra::Unit(unit.to_string())),
        )
    }

    fn subselect_operand(&self, indices: Operand) -> StringColumnView {
        string_view("str_subselection", self.operand(), Some(indices))
    }
}

impl StringOps for StringColumn {}
impl StringOps for StringColumnView {}

macro_rules! string_concat_ops {
    ($($t:ty),*) => {
        $(
            impl<T: Concatenable> Add<T> for $t {
                type Output = StringColumnView;

                fn add(self, rhs: T) -> StringColumnView {
                    self.concat(rhs)
                }
            }

            impl Add<$t> for &str {
                type Output = StringColumnView;

                fn add(self, rhs: $t) -> StringColumnView {
                    string_view("concat", Operand::from(self), Some(rhs.operand()))
                }
            }
        )*
    };
}

string_concat_ops!(StringColumn, StringColumnView, &StringColumn, &StringColumnView);

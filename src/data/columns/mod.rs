// Lazily evaluated column expressions
// Author: Gabriel Demetrios Lafis

mod aggregation;
mod boolean;
mod float;
mod remote;
mod string;

pub use aggregation::*;
pub use boolean::*;
pub use float::*;
pub use remote::*;
pub use string::*;

use std::collections::VecDeque;
use std::fmt;

use serde_json::{json, Map, Value as JsonValue};

use super::{DataError, Role, Value};

/// The five kinds of column handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    FloatColumn,
    FloatColumnView,
    StringColumn,
    StringColumnView,
    BooleanColumnView,
}

impl ColumnType {
    /// Get the wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::FloatColumn => "FloatColumn",
            ColumnType::FloatColumnView => "FloatColumnView",
            ColumnType::StringColumn => "StringColumn",
            ColumnType::StringColumnView => "StringColumnView",
            ColumnType::BooleanColumnView => "BooleanColumnView",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ColumnType::FloatColumn | ColumnType::FloatColumnView)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ColumnType::StringColumn | ColumnType::StringColumnView)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::BooleanColumnView)
    }

    /// Prefix of the column commands handled by the engine for this kind
    pub(crate) fn command_prefix(&self) -> &'static str {
        if self.is_float() {
            "FloatColumn"
        } else if self.is_string() {
            "StringColumn"
        } else {
            "BooleanColumn"
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A column that physically exists in a data frame on the engine
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NamedColumn {
    pub name: String,
    pub role: Role,
    pub df_name: String,
}

impl NamedColumn {
    fn to_cmd(&self, kind: ColumnType) -> JsonValue {
        json!({
            "operator_": kind.as_str(),
            "df_name_": self.df_name,
            "name_": self.name,
            "role_": self.role.as_str(),
            "type_": kind.as_str(),
        })
    }
}

/// Operator-specific fields of a view node
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Extra {
    None,
    Substr { begin: usize, len: usize },
    TimeFormats(Vec<String>),
    Condition(BooleanColumnView),
    Subroles(Vec<String>),
    Unit(String),
    Range { start: f64, stop: f64, step: f64 },
    Seed(u32),
    Const(Value),
}

/// An immutable node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub kind: ColumnType,
    pub operator: String,
    pub operand1: Option<Operand>,
    pub operand2: Option<Operand>,
    pub extra: Extra,
}

impl Node {
    /// Create a node whose operand types are guaranteed by the caller's signature
    pub fn new(
        kind: ColumnType,
        operator: &str,
        operand1: Option<Operand>,
        operand2: Option<Operand>,
    ) -> Self {
        Node {
            kind,
            operator: operator.to_string(),
            operand1,
            operand2,
            extra: Extra::None,
        }
    }

    /// Create a node after checking every operand against the operator
    pub fn checked(
        kind: ColumnType,
        operator: &str,
        operand1: Option<Operand>,
        operand2: Option<Operand>,
    ) -> Result<Self, DataError> {
        for operand in operand1.iter().chain(operand2.iter()) {
            check_operand(kind, operator, operand.column_type())?;
        }

        Ok(Node::new(kind, operator, operand1, operand2))
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = extra;
        self
    }

    fn to_cmd(&self) -> JsonValue {
        let mut cmd = Map::new();

        cmd.insert("type_".to_string(), json!(self.kind.as_str()));
        cmd.insert("operator_".to_string(), json!(self.operator));

        if let Some(operand) = &self.operand1 {
            cmd.insert("operand1_".to_string(), operand.to_cmd());
        }

        if let Some(operand) = &self.operand2 {
            cmd.insert("operand2_".to_string(), operand.to_cmd());
        }

        match &self.extra {
            Extra::None => {}
            Extra::Substr { begin, len } => {
                cmd.insert("begin_".to_string(), json!(begin));
                cmd.insert("len_".to_string(), json!(len));
            }
            Extra::TimeFormats(formats) => {
                cmd.insert("time_formats_".to_string(), json!(formats));
            }
            Extra::Condition(condition) => {
                cmd.insert("condition_".to_string(), condition.to_cmd());
            }
            Extra::Subroles(subroles) => {
                cmd.insert("subroles_".to_string(), json!(subroles));
            }
            Extra::Unit(unit) => {
                cmd.insert("unit_".to_string(), json!(unit));
            }
            Extra::Range { start, stop, step } => {
                cmd.insert("start_".to_string(), json!(start));
                cmd.insert("stop_".to_string(), json!(stop));
                cmd.insert("step_".to_string(), json!(step));
            }
            Extra::Seed(seed) => {
                cmd.insert("seed_".to_string(), json!(seed));
            }
            Extra::Const(value) => {
                cmd.insert("value_".to_string(), value.to_json());
            }
        }

        JsonValue::Object(cmd)
    }
}

/// Enforce the operand types an operator accepts
pub(crate) fn check_operand(
    kind: ColumnType,
    operator: &str,
    operand: ColumnType,
) -> Result<(), DataError> {
    let wrong = |expected: &str| {
        Err(DataError::Type(format!(
            "This operator can only be applied to a {}!",
            expected
        )))
    };

    match kind {
        ColumnType::FloatColumnView => match operator {
            "num_subselection" => Ok(()),
            "as_num" | "as_ts" if !operand.is_string() => wrong("StringColumn"),
            "as_num" | "as_ts" => Ok(()),
            "boolean_as_num" if !operand.is_boolean() => wrong("BooleanColumn"),
            "boolean_as_num" => Ok(()),
            _ if !operand.is_float() => wrong("FloatColumn"),
            _ => Ok(()),
        },
        ColumnType::StringColumnView => match operator {
            "str_subselection" => Ok(()),
            "as_str" if operand.is_string() => wrong("FloatColumn or a BooleanColumn"),
            "as_str" => Ok(()),
            _ if !operand.is_string() => wrong("StringColumn"),
            _ => Ok(()),
        },
        ColumnType::BooleanColumnView => match operator {
            "and" | "or" | "xor" | "not" if !operand.is_boolean() => wrong("BooleanColumn"),
            _ => Ok(()),
        },
        ColumnType::FloatColumn | ColumnType::StringColumn => Err(DataError::Type(format!(
            "A {} refers to data on the engine and cannot be built from operators",
            kind
        ))),
    }
}

/// Either a literal or a nested column expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Column(Column),
}

impl Operand {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Operand::Value(value) => value.column_type(),
            Operand::Column(column) => column.column_type(),
        }
    }

    pub fn to_cmd(&self) -> JsonValue {
        match self {
            Operand::Value(value) => value.to_cmd(),
            Operand::Column(column) => column.to_cmd(),
        }
    }
}

macro_rules! operand_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_value!(f64, i32, i64, bool, &str, String, chrono::NaiveDateTime);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl<T: ColumnExpr> From<&T> for Operand {
    fn from(col: &T) -> Self {
        Operand::Column(col.to_column())
    }
}

impl From<Column> for Operand {
    fn from(col: Column) -> Self {
        Operand::Column(col)
    }
}

impl From<FloatColumn> for Operand {
    fn from(col: FloatColumn) -> Self {
        Operand::Column(Column::Float(col))
    }
}

impl From<FloatColumnView> for Operand {
    fn from(col: FloatColumnView) -> Self {
        Operand::Column(Column::FloatView(col))
    }
}

impl From<StringColumn> for Operand {
    fn from(col: StringColumn) -> Self {
        Operand::Column(Column::String(col))
    }
}

impl From<StringColumnView> for Operand {
    fn from(col: StringColumnView) -> Self {
        Operand::Column(Column::StringView(col))
    }
}

impl From<BooleanColumnView> for Operand {
    fn from(col: BooleanColumnView) -> Self {
        Operand::Column(Column::Boolean(col))
    }
}

/// Common surface of every column handle
pub trait ColumnExpr {
    /// Wrap into the closed sum type
    fn to_column(&self) -> Column;

    fn column_type(&self) -> ColumnType;

    /// Serialize to the wire command
    fn to_cmd(&self) -> JsonValue {
        self.to_column().to_cmd()
    }

    /// Self as an operand of another node
    fn operand(&self) -> Operand {
        Operand::Column(self.to_column())
    }
}

/// Any column handle
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(FloatColumn),
    FloatView(FloatColumnView),
    String(StringColumn),
    StringView(StringColumnView),
    Boolean(BooleanColumnView),
}

impl ColumnExpr for Column {
    fn to_column(&self) -> Column {
        self.clone()
    }

    fn column_type(&self) -> ColumnType {
        match self {
            Column::Float(_) => ColumnType::FloatColumn,
            Column::FloatView(_) => ColumnType::FloatColumnView,
            Column::String(_) => ColumnType::StringColumn,
            Column::StringView(_) => ColumnType::StringColumnView,
            Column::Boolean(_) => ColumnType::BooleanColumnView,
        }
    }

    fn to_cmd(&self) -> JsonValue {
        match self {
            Column::Float(col) => col.to_cmd(),
            Column::FloatView(col) => col.to_cmd(),
            Column::String(col) => col.to_cmd(),
            Column::StringView(col) => col.to_cmd(),
            Column::Boolean(col) => col.to_cmd(),
        }
    }
}

impl Column {
    /// Name of a physical column
    pub fn name(&self) -> Option<&str> {
        match self {
            Column::Float(col) => Some(col.name()),
            Column::String(col) => Some(col.name()),
            _ => None,
        }
    }

    /// Name used in messages: the first physical column found breadth-first,
    /// or the view's type and operator
    pub fn infer_name(&self) -> String {
        let mut queue: VecDeque<&Column> = VecDeque::from([self]);

        while let Some(current) = queue.pop_front() {
            if let Some(name) = current.name() {
                return name.to_string();
            }

            if let Some(node) = current.node() {
                for operand in node.operand1.iter().chain(node.operand2.iter()) {
                    if let Operand::Column(col) = operand {
                        queue.push_back(col);
                    }
                }
            }
        }

        match self.node() {
            Some(node) => format!("{}.{}", node.kind, node.operator),
            None => self.column_type().to_string(),
        }
    }

    pub(crate) fn node(&self) -> Option<&Node> {
        match self {
            Column::FloatView(col) => Some(col.node()),
            Column::StringView(col) => Some(col.node()),
            Column::Boolean(col) => Some(col.node()),
            _ => None,
        }
    }

    /// Cast into the string family
    pub fn as_str(&self) -> Column {
        match self {
            Column::Float(col) => Column::StringView(col.as_str()),
            Column::FloatView(col) => Column::StringView(col.as_str()),
            Column::Boolean(col) => Column::StringView(col.as_str()),
            _ => self.clone(),
        }
    }

    /// Cast into the float family
    pub fn as_num(&self) -> Column {
        match self {
            Column::String(col) => Column::FloatView(col.as_num()),
            Column::StringView(col) => Column::FloatView(col.as_num()),
            Column::Boolean(col) => Column::FloatView(col.as_num()),
            _ => self.clone(),
        }
    }

    /// Equality with run-time type checking
    pub fn try_equal_to(&self, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        self.compare(other.into(), "equal_to")
    }

    /// Inequality with run-time type checking
    pub fn try_not_equal_to(&self, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        self.compare(other.into(), "not_equal_to")
    }

    fn compare(&self, other: Operand, suffix: &str) -> Result<BooleanColumnView, DataError> {
        let own = self.column_type();
        let theirs = other.column_type();

        let (prefix, allowed): (&str, &[&str]) = if own.is_float() {
            ("num", &["float", "FloatColumn", "FloatColumnView"])
        } else if own.is_string() {
            ("str", &["str", "StringColumn", "StringColumnView"])
        } else {
            ("bool", &["bool", "BooleanColumnView"])
        };

        let compatible = (own.is_float() && theirs.is_float())
            || (own.is_string() && theirs.is_string())
            || (own.is_boolean() && theirs.is_boolean());

        if !compatible {
            let mut msg = format!(
                "Can only compare {} with: {}. You can explicitly cast columns via `.as_num()` or `.as_str()`.",
                own,
                allowed.join(", ")
            );

            if let Column::String(col) = self {
                if col.role() == Role::JoinKey {
                    msg.push_str(" Hint: join_keys are always StringColumn(View)s.");
                }
            }

            return Err(DataError::Type(msg));
        }

        let operator = format!("{}_{}", prefix, suffix);
        Ok(BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            &operator,
            Some(self.operand()),
            Some(other),
        )))
    }

    /// Ordering comparison, only defined for the float family
    pub fn try_compare(&self, operator: &str, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        if !matches!(operator, "greater" | "greater_equal" | "less" | "less_equal") {
            return Err(DataError::Value(format!("Unknown comparison: '{}'", operator)));
        }

        let other = other.into();

        if !self.column_type().is_float() || !other.column_type().is_float() {
            return Err(DataError::Type(format!(
                "Can only compare {} with: float, FloatColumn, FloatColumnView. You can explicitly cast columns via `.as_num()` or `.as_str()`.",
                self.column_type()
            )));
        }

        Ok(BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            operator,
            Some(self.operand()),
            Some(other),
        )))
    }

    /// `+` with run-time type checking: numbers add, strings concatenate
    pub fn try_add(&self, other: impl Into<Operand>) -> Result<Column, DataError> {
        let other = other.into();
        let own = self.column_type();
        let theirs = other.column_type();

        if own.is_float() && theirs.is_float() {
            return self.try_arithmetic("plus", other);
        }

        if own.is_string() || theirs.is_string() {
            let lhs = self.as_str();
            let rhs = match other {
                Operand::Column(col) => Operand::Column(col.as_str()),
                Operand::Value(Value::String(s)) => Operand::Value(Value::String(s)),
                Operand::Value(v) => {
                    return Err(DataError::Type(format!(
                        "Cannot concatenate {} with a literal of type {}",
                        own,
                        v.column_type()
                    )))
                }
            };

            let node = Node::checked(
                ColumnType::StringColumnView,
                "concat",
                Some(lhs.operand()),
                Some(rhs),
            )?;
            return Ok(Column::StringView(StringColumnView::from_node(node)));
        }

        Err(DataError::Type(format!(
            "Cannot add {} and {}.",
            own, theirs
        )))
    }

    /// Float arithmetic (`plus`, `minus`, `multiplies`, `divides`, `fmod`, `pow`)
    /// with run-time type checking
    pub fn try_arithmetic(&self, operator: &str, other: impl Into<Operand>) -> Result<Column, DataError> {
        if !matches!(operator, "plus" | "minus" | "multiplies" | "divides" | "fmod" | "pow") {
            return Err(DataError::Value(format!("Unknown arithmetic operator: '{}'", operator)));
        }

        let node = Node::checked(
            ColumnType::FloatColumnView,
            operator,
            Some(self.operand()),
            Some(other.into()),
        )?;

        Ok(Column::FloatView(FloatColumnView::from_node(node)))
    }

    fn try_combine(&self, operator: &str, other: Operand) -> Result<BooleanColumnView, DataError> {
        let own = self.column_type();
        let theirs = other.column_type();

        if !own.is_boolean() || !theirs.is_boolean() {
            return Err(DataError::Type(format!(
                "Boolean operators require two BooleanColumnViews, got {} and {}.",
                own, theirs
            )));
        }

        Ok(BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            operator,
            Some(self.operand()),
            Some(other),
        )))
    }

    pub fn try_and(&self, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        self.try_combine("and", other.into())
    }

    pub fn try_or(&self, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        self.try_combine("or", other.into())
    }

    pub fn try_xor(&self, other: impl Into<Operand>) -> Result<BooleanColumnView, DataError> {
        self.try_combine("xor", other.into())
    }

    pub fn try_not(&self) -> Result<BooleanColumnView, DataError> {
        match self {
            Column::Boolean(col) => Ok(col.is_false()),
            other => Err(DataError::Type(format!(
                "Boolean operators require a BooleanColumnView, got {}.",
                other.column_type()
            ))),
        }
    }

    /// Re-apply a subselection, keeping the column's kind
    pub(crate) fn subselect(&self, indices: Operand) -> Column {
        match self {
            Column::Float(col) => Column::FloatView(col.subselect_operand(indices)),
            Column::FloatView(col) => Column::FloatView(col.subselect_operand(indices)),
            Column::String(col) => Column::StringView(col.subselect_operand(indices)),
            Column::StringView(col) => Column::StringView(col.subselect_operand(indices)),
            Column::Boolean(col) => Column::Boolean(col.subselect_operand(indices)),
        }
    }

    /// Attach a unit; boolean views carry none and are returned unchanged
    pub fn with_unit(&self, unit: &str) -> Column {
        match self {
            Column::Float(col) => Column::FloatView(col.with_unit(unit)),
            Column::FloatView(col) => Column::FloatView(col.with_unit(unit)),
            Column::String(col) => Column::StringView(col.with_unit(unit)),
            Column::StringView(col) => Column::StringView(col.with_unit(unit)),
            Column::Boolean(_) => self.clone(),
        }
    }

    /// Replace the subroles; boolean views carry none and are returned unchanged
    pub fn with_subroles<S: AsRef<str>>(&self, subroles: &[S]) -> Result<Column, DataError> {
        Ok(match self {
            Column::Float(col) => Column::FloatView(col.with_subroles(subroles)?),
            Column::FloatView(col) => Column::FloatView(col.with_subroles(subroles)?),
            Column::String(col) => Column::StringView(col.with_subroles(subroles)?),
            Column::StringView(col) => Column::StringView(col.with_subroles(subroles)?),
            Column::Boolean(_) => self.clone(),
        })
    }

    /// Cast so the column fits the storage family of `role`
    pub fn cast_for_role<S: AsRef<str>>(&self, role: Role, time_formats: &[S]) -> Column {
        let kind = self.column_type();

        if (kind.is_boolean() || kind.is_float()) && role.is_categorical_family() {
            return self.as_str();
        }

        if (kind.is_boolean() || kind.is_string()) && role.is_numerical_family() {
            return match self {
                Column::String(col) if role == Role::TimeStamp => Column::FloatView(col.as_ts(time_formats)),
                Column::StringView(col) if role == Role::TimeStamp => Column::FloatView(col.as_ts(time_formats)),
                Column::String(col) => Column::FloatView(col.as_num()),
                Column::StringView(col) => Column::FloatView(col.as_num()),
                Column::Boolean(col) => Column::FloatView(col.as_num()),
                _ => self.clone(),
            };
        }

        self.clone()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} '{}'", self.column_type(), name),
            None => write!(f, "{} ({})", self.column_type(), self.infer_name()),
        }
    }
}

impl std::ops::BitAnd for Column {
    type Output = Result<BooleanColumnView, DataError>;

    fn bitand(self, rhs: Column) -> Self::Output {
        self.try_and(rhs)
    }
}

impl std::ops::BitOr for Column {
    type Output = Result<BooleanColumnView, DataError>;

    fn bitor(self, rhs: Column) -> Self::Output {
        self.try_or(rhs)
    }
}

impl std::ops::BitXor for Column {
    type Output = Result<BooleanColumnView, DataError>;

    fn bitxor(self, rhs: Column) -> Self::Output {
        self.try_xor(rhs)
    }
}

macro_rules! column_from {
    ($($t:ident => $variant:ident),*) => {
        $(
            impl From<$t> for Column {
                fn from(col: $t) -> Self {
                    Column::$variant(col)
                }
            }
        )*
    };
}

column_from!(
    FloatColumn => Float,
    FloatColumnView => FloatView,
    StringColumn => String,
    StringColumnView => StringView,
    BooleanColumnView => Boolean
);

/// Build a column from a literal; the engine treats it as infinitely long
pub fn from_value(value: impl Into<Value>) -> Column {
    let value = value.into();
    let kind = value.column_type();
    let node = Node::new(kind, "const", None, None).with_extra(Extra::Const(value));

    match kind {
        ColumnType::StringColumnView => Column::StringView(StringColumnView::from_node(node)),
        ColumnType::BooleanColumnView => Column::Boolean(BooleanColumnView::from_node(node)),
        _ => Column::FloatView(FloatColumnView::from_node(node)),
    }
}

/// Evenly spaced values in `[start, stop)`
pub fn arange(start: f64, stop: f64, step: f64) -> FloatColumnView {
    FloatColumnView::from_node(
        Node::new(ColumnType::FloatColumnView, "arange", None, None)
            .with_extra(Extra::Range { start, stop, step }),
    )
}

/// Row numbers of the table, starting at 0
pub fn rowid() -> FloatColumnView {
    FloatColumnView::from_node(Node::new(ColumnType::FloatColumnView, "rowid", None, None))
}

/// Uniformly distributed random numbers in `[0, 1)`
pub fn random(seed: u32) -> FloatColumnView {
    FloatColumnView::from_node(
        Node::new(ColumnType::FloatColumnView, "random", None, None).with_extra(Extra::Seed(seed)),
    )
}

/// Number of elements an `arange` describes
pub fn arange_len(start: f64, stop: f64, step: f64) -> usize {
    if step == 0.0 || !step.is_finite() {
        return 0;
    }

    let n = ((stop - start) / step).ceil();

    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

// Tables: data frames and the views layered on top of them
// Author: Gabriel Demetrios Lafis

use serde_json::Value as JsonValue;

use super::{
    validate_subroles, Column, ColumnExpr, ColumnMetadata, DataError, DataFrame, Freshness, Length,
    Placeholder, Role, Roles, RowCount, Selection, View, COMPARISON_ONLY, TIME_FORMATS,
    TIME_STAMP_UNIT,
};
use crate::comm::Session;
use crate::utils::validate_name;

/// Either a data frame or a view on one
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    DataFrame(DataFrame),
    View(Box<View>),
}

impl Table {
    pub fn name(&self) -> &str {
        match self {
            Table::DataFrame(df) => df.name(),
            Table::View(view) => view.name(),
        }
    }

    /// Roles of the visible columns
    pub fn roles(&self) -> Roles {
        match self {
            Table::DataFrame(df) => df.roles().clone(),
            Table::View(view) => view.roles(),
        }
    }

    pub fn colnames(&self) -> Vec<String> {
        self.roles().colnames()
    }

    pub fn get_column(&self, name: &str) -> Result<Column, DataError> {
        match self {
            Table::DataFrame(df) => df.get_column(name),
            Table::View(view) => view.get_column(name),
        }
    }

    pub fn to_cmd(&self) -> JsonValue {
        match self {
            Table::DataFrame(df) => df.to_cmd(),
            Table::View(view) => view.to_cmd(),
        }
    }

    /// Last change of the underlying data frame when this handle was refreshed
    pub fn last_change(&self) -> &str {
        match self {
            Table::DataFrame(df) => df.last_change_snapshot(),
            Table::View(view) => view.last_change(),
        }
    }

    /// The data frame at the bottom of the view chain
    pub fn root(&self) -> &DataFrame {
        match self {
            Table::DataFrame(df) => df,
            Table::View(view) => view.base().root(),
        }
    }

    /// Warn if a view was built on an older state of its data frame
    ///
    /// Data frames are always fresh and need no round trip.
    pub fn check(&self, session: &Session) -> Result<Freshness, DataError> {
        match self {
            Table::DataFrame(_) => Ok(Freshness::Fresh),
            Table::View(view) => view.check(session),
        }
    }

    /// Number of rows; views of unknown length are counted on the engine
    pub fn nrows(&self, session: &Session) -> Result<Length, DataError> {
        match self {
            Table::DataFrame(df) => Ok(Length::Finite(df.nrows(session)?)),
            Table::View(view) => view.nrows(session, true),
        }
    }

    /// Re-read the roles of the underlying data frame
    pub fn refresh(&mut self, session: &Session) -> Result<(), DataError> {
        match self {
            Table::DataFrame(df) => df.refresh(session).map(|_| ()),
            Table::View(view) => view.refresh(session),
        }
    }

    pub fn to_placeholder(&self, name: Option<&str>) -> Placeholder {
        Placeholder::new(name.unwrap_or_else(|| self.name()), self.roles())
    }

    /// A view that carries `new` as an additional column
    pub fn with_column(&self, new: NewColumn) -> Result<View, DataError> {
        Ok(View::new(self.clone()).adding(new.resolve()?))
    }

    /// A view without the given columns
    pub fn drop<S: AsRef<str>>(&self, names: &[S]) -> Result<View, DataError> {
        let colnames = self.colnames();
        let names = check_names(names, &colnames)?;

        Ok(View::new(self.clone()).dropping(names))
    }

    /// A view restricted to a subset of rows
    ///
    /// Single rows are checked against the length of a one-row view, so
    /// out-of-bounds indices fail without evaluating the full table.
    pub fn where_(&self, session: &Session, selection: impl Into<Selection>) -> Result<View, DataError> {
        let selection = selection.into();

        let sub = {
            let rows = TableRowCount::new(session, self);
            selection.resolve(&rows)?
        };

        let view = View::new(self.clone()).subselected(sub.to_column());

        if let Selection::Index(_) = selection {
            if view.nrows(session, true)? == Length::Finite(0) {
                return Err(DataError::Index("Index out of bounds.".to_string()));
            }
        }

        Ok(view)
    }

    /// A view where the columns are moved to `role`, cast across families if needed
    pub fn with_role<S: AsRef<str>, T: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        role: Role,
        time_formats: &[T],
    ) -> Result<View, DataError> {
        check_names(names, &self.colnames())?;

        let time_formats = default_time_formats(time_formats);

        fold_columns(self, names, |table, name| {
            let col = table.get_column(name)?;

            let unit = if role == Role::TimeStamp {
                format!("{}{}", TIME_STAMP_UNIT, COMPARISON_ONLY)
            } else {
                col.unit(session)?
            };

            let subroles = col.subroles(session)?;

            NewColumn::new(col, name)
                .role(role)
                .subroles(subroles.as_slice())
                .unit(&unit)
                .time_formats(time_formats.as_slice())
                .resolve()
        })
    }

    /// A view where the columns carry new subroles
    pub fn with_subroles<S: AsRef<str>, T: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        subroles: &[T],
        append: bool,
    ) -> Result<View, DataError> {
        validate_subroles(subroles)?;
        check_names(names, &self.colnames())?;

        fold_columns(self, names, |table, name| {
            let col = table.get_column(name)?;
            let role = table.roles().column(name);
            let unit = col.unit(session)?;

            let subroles = if append {
                merge_subroles(&col.subroles(session)?, subroles)
            } else {
                subroles.iter().map(|s| s.as_ref().to_string()).collect()
            };

            let mut new = NewColumn::new(col, name).subroles(subroles.as_slice()).unit(&unit);
            if let Some(role) = role {
                new = new.role(role);
            }
            new.resolve()
        })
    }

    /// A view where the columns carry a new unit
    pub fn with_unit<S: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        unit: &str,
        comparison_only: bool,
    ) -> Result<View, DataError> {
        check_names(names, &self.colnames())?;

        let unit = if comparison_only {
            format!("{}{}", unit, COMPARISON_ONLY)
        } else {
            unit.to_string()
        };

        fold_columns(self, names, |table, name| {
            let col = table.get_column(name)?;
            let role = table.roles().column(name);
            let subroles = col.subroles(session)?;

            let mut new = NewColumn::new(col, name).subroles(subroles.as_slice()).unit(&unit);
            if let Some(role) = role {
                new = new.role(role);
            }
            new.resolve()
        })
    }
}

impl Table {
    /// One boolean target per distinct value of a categorical column, encoded as numbers
    ///
    /// The new targets are named `column=value`; the source column is dropped.
    #[cfg(feature = "arrow")]
    pub fn make_target_columns(&self, session: &Session, colname: &str) -> Result<View, DataError> {
        use super::{FloatValues, StringValues, Value};
        use log::warn;

        let col = self.get_column(colname)?;

        let labels: Vec<Value> = match &col {
            Column::Float(c) => c.unique(session)?.into_iter().map(Value::Float).collect(),
            Column::FloatView(c) => c.unique(session)?.into_iter().map(Value::Float).collect(),
            Column::String(c) => c.unique(session)?.into_iter().map(Value::String).collect(),
            Column::StringView(c) => c.unique(session)?.into_iter().map(Value::String).collect(),
            Column::Boolean(_) => {
                return Err(DataError::Type(format!(
                    "'{}' is a boolean column. Use it as a target directly.",
                    colname
                )))
            }
        };

        if labels.len() > 10 {
            warn!(
                "'{}' has {} distinct values. Every value becomes a target column.",
                colname,
                labels.len()
            );
        }

        let mut table = self.clone();

        for label in labels {
            let name = match &label {
                Value::String(s) => format!("{}={}", colname, s),
                other => format!("{}={}", colname, other.to_json()),
            };

            let target = col.try_equal_to(label)?.as_num();
            let new = NewColumn::new(Column::FloatView(target), &name).role(Role::Target);

            table = Table::from(table.with_column(new)?);
        }

        table.drop(&[colname])
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self {
        Table::DataFrame(df)
    }
}

impl From<View> for Table {
    fn from(view: View) -> Self {
        Table::View(Box::new(view))
    }
}

/// Layer one added column per name, each on top of the previous view
fn fold_columns<S, F>(base: &Table, names: &[S], mut added: F) -> Result<View, DataError>
where
    S: AsRef<str>,
    F: FnMut(&Table, &str) -> Result<AddedColumn, DataError>,
{
    let (first, rest) = names
        .split_first()
        .ok_or_else(|| DataError::Value("At least one column name is required.".to_string()))?;

    let mut view = View::new(base.clone()).adding(added(base, first.as_ref())?);

    for name in rest {
        let table = Table::from(view);
        let col = added(&table, name.as_ref())?;
        view = View::new(table).adding(col);
    }

    Ok(view)
}

fn check_names<S: AsRef<str>>(names: &[S], colnames: &[String]) -> Result<Vec<String>, DataError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            if colnames.iter().any(|c| c == name) {
                Ok(name.to_string())
            } else {
                Err(DataError::Value(format!("No column called '{}' found.", name)))
            }
        })
        .collect()
}

/// Union of two subrole lists, keeping the first occurrence
pub(crate) fn merge_subroles<S: AsRef<str>>(current: &[String], new: &[S]) -> Vec<String> {
    let mut merged: Vec<String> = current.to_vec();

    for subrole in new {
        if !merged.iter().any(|s| s == subrole.as_ref()) {
            merged.push(subrole.as_ref().to_string());
        }
    }

    merged
}

pub(crate) fn default_time_formats<S: AsRef<str>>(time_formats: &[S]) -> Vec<String> {
    if time_formats.is_empty() {
        TIME_FORMATS.iter().map(|f| f.to_string()).collect()
    } else {
        time_formats.iter().map(|f| f.as_ref().to_string()).collect()
    }
}

/// Length of a table, fetched when a selection needs it
pub struct TableRowCount<'a> {
    session: &'a Session,
    table: &'a Table,
}

impl<'a> TableRowCount<'a> {
    pub fn new(session: &'a Session, table: &'a Table) -> Self {
        TableRowCount { session, table }
    }
}

impl<'a> RowCount for TableRowCount<'a> {
    fn row_count(&self) -> Result<Length, DataError> {
        self.table.nrows(self.session)
    }
}

/// A column as it is added to a table or view
#[derive(Debug, Clone, PartialEq)]
pub struct AddedColumn {
    pub col: Column,
    pub name: String,
    pub role: Role,
    pub subroles: Vec<String>,
    pub unit: String,
}

impl AddedColumn {
    /// The `added_` entry of a view command
    pub fn to_cmd(&self, last_change: &str) -> JsonValue {
        let mut col = self.col.to_cmd();
        col["last_change_"] = JsonValue::from(last_change);

        serde_json::json!({
            "col_": col,
            "name_": self.name,
            "role_": self.role.as_str(),
            "subroles_": self.subroles,
            "unit_": self.unit,
        })
    }
}

/// Builder for a column that is about to be added
///
/// The role defaults to `unused_float` for float columns and to
/// `unused_string` otherwise. The column is cast when the role belongs to
/// the other storage family.
#[derive(Debug, Clone)]
pub struct NewColumn {
    col: Column,
    name: String,
    role: Option<Role>,
    subroles: Vec<String>,
    unit: String,
    time_formats: Vec<String>,
}

impl NewColumn {
    /// Create a new column spec
    pub fn new(col: impl Into<Column>, name: &str) -> Self {
        NewColumn {
            col: col.into(),
            name: name.to_string(),
            role: None,
            subroles: Vec::new(),
            unit: String::new(),
            time_formats: Vec::new(),
        }
    }

    /// Set the role
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the subroles
    pub fn subroles<S: AsRef<str>>(mut self, subroles: &[S]) -> Self {
        self.subroles = subroles.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Set the unit
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    /// Formats used when strings are parsed into time stamps
    pub fn time_formats<S: AsRef<str>>(mut self, time_formats: &[S]) -> Self {
        self.time_formats = time_formats.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Fill in subroles and unit the column already carries on the engine
    pub fn inherit_metadata(mut self, session: &Session) -> Result<Self, DataError> {
        if self.col.column_type().is_boolean() {
            return Ok(self);
        }

        if self.subroles.is_empty() {
            self.subroles = self.col.subroles(session)?;
        }

        if self.unit.is_empty() {
            self.unit = self.col.unit(session)?;
        }

        Ok(self)
    }

    /// Validate and cast into the form the engine stores
    pub fn resolve(self) -> Result<AddedColumn, DataError> {
        validate_name(&self.name, "name").map_err(DataError::Type)?;
        validate_subroles(self.subroles.as_slice())?;

        let role = self.role.unwrap_or(if self.col.column_type().is_float() {
            Role::UnusedFloat
        } else {
            Role::UnusedString
        });

        let time_formats = default_time_formats(self.time_formats.as_slice());

        Ok(AddedColumn {
            col: self.col.cast_for_role(role, time_formats.as_slice()),
            name: self.name,
            role,
            subroles: self.subroles,
            unit: self.unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{from_value, FloatColumn, StringColumn};

    #[test]
    fn test_new_column_defaults_role_by_family() {
        let float = NewColumn::new(FloatColumn::new("a", Role::Numerical, "df"), "a")
            .resolve()
            .unwrap();
        assert_eq!(float.role, Role::UnusedFloat);

        let string = NewColumn::new(StringColumn::new("b", Role::Categorical, "df"), "b")
            .resolve()
            .unwrap();
        assert_eq!(string.role, Role::UnusedString);

        let boolean = NewColumn::new(from_value(true), "c").resolve().unwrap();
        assert_eq!(boolean.role, Role::UnusedString);
        assert_eq!(boolean.col.to_cmd()["operator_"], "as_str");
    }

    #[test]
    fn test_new_column_casts_for_time_stamps() {
        let added = NewColumn::new(StringColumn::new("date", Role::UnusedString, "df"), "date")
            .role(Role::TimeStamp)
            .resolve()
            .unwrap();

        let cmd = added.col.to_cmd();
        assert_eq!(cmd["operator_"], "as_ts");
        assert_eq!(cmd["time_formats_"][0], TIME_FORMATS[0]);
    }

    #[test]
    fn test_new_column_rejects_bad_subroles() {
        let err = NewColumn::new(from_value(1.0), "x")
            .subroles(&["exclude everything"])
            .resolve()
            .unwrap_err();

        assert!(err.is_local());
    }

    #[test]
    fn test_merge_subroles_keeps_order() {
        let merged = merge_subroles(
            &["exclude fastprop".to_string()],
            &["exclude fastprop", "exclude multirel"],
        );

        assert_eq!(merged, vec!["exclude fastprop", "exclude multirel"]);
    }
}

// Lazy views on data frames
// Author: Gabriel Demetrios Lafis

use log::warn;
use serde_json::{json, Value as JsonValue};

use super::{
    AddedColumn, Column, ColumnExpr, CsvOptions, DataError, DataFrame, Length, NewColumn,
    Operand, Placeholder, Role, Roles, Selection, Table,
};
use crate::comm::Session;

/// Whether the data frame under a view changed after the view was built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A lazily evaluated view on a table
///
/// A view layers at most one change on its base: an added column, a set of
/// dropped columns or a row subselection. Longer chains are views of views.
/// Nothing is evaluated until the view is sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    base: Table,
    name: Option<String>,
    subselection: Option<Column>,
    added: Option<AddedColumn>,
    dropped: Vec<String>,
    initial_last_change: String,
}

impl View {
    /// Create a new view that passes its base through unchanged
    pub fn new(base: impl Into<Table>) -> Self {
        let base = base.into();

        let initial_last_change = match &base {
            Table::View(view) => view.initial_last_change.clone(),
            Table::DataFrame(df) => df.last_change_snapshot().to_string(),
        };

        View {
            base,
            name: None,
            subselection: None,
            added: None,
            dropped: Vec::new(),
            initial_last_change,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn subselected(mut self, subselection: Column) -> Self {
        self.subselection = Some(subselection);
        self
    }

    pub fn adding(mut self, added: AddedColumn) -> Self {
        self.added = Some(added);
        self
    }

    pub fn dropping(mut self, dropped: Vec<String>) -> Self {
        for name in dropped {
            if !self.dropped.contains(&name) {
                self.dropped.push(name);
            }
        }
        self
    }

    /// The name of the view, falling back to the name of the base
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.base.name())
    }

    pub fn base(&self) -> &Table {
        &self.base
    }

    pub fn added(&self) -> Option<&AddedColumn> {
        self.added.as_ref()
    }

    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn subselection(&self) -> Option<&Column> {
        self.subselection.as_ref()
    }

    /// Last change of the underlying data frame
    pub fn last_change(&self) -> &str {
        self.base.last_change()
    }

    /// Last change of the underlying data frame when the view was built
    pub fn initial_last_change(&self) -> &str {
        &self.initial_last_change
    }

    fn modify_colnames(&self, base_names: &[String], role: Role) -> Vec<String> {
        let mut names: Vec<String> = base_names
            .iter()
            .filter(|name| !self.dropped.contains(name))
            .cloned()
            .collect();

        if let Some(added) = &self.added {
            if added.role != role {
                names.retain(|name| name != &added.name);
            } else if !names.contains(&added.name) {
                names.push(added.name.clone());
            }
        }

        names
    }

    /// Roles of the visible columns
    pub fn roles(&self) -> Roles {
        let base = self.base.roles();
        let mut roles = Roles::new();

        for role in Role::ALL {
            let names = self.modify_colnames(base.get(role), role);
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            roles = roles.with(role, &names);
        }

        roles
    }

    pub fn colnames(&self) -> Vec<String> {
        self.roles().colnames()
    }

    pub fn ncols(&self) -> usize {
        self.roles().len()
    }

    fn apply_subselection(&self, col: Column) -> Column {
        match &self.subselection {
            Some(sub) => col.subselect(Operand::from(sub.clone())),
            None => col,
        }
    }

    /// Handle to a visible column, restricted to the rows of the view
    pub fn get_column(&self, name: &str) -> Result<Column, DataError> {
        if self.dropped.iter().any(|d| d == name) {
            return Err(DataError::Key(format!(
                "Cannot retrieve column '{}'. It has been dropped.",
                name
            )));
        }

        if let Some(added) = self.added.as_ref().filter(|added| added.name == name) {
            let col = added
                .col
                .with_subroles(added.subroles.as_slice())?
                .with_unit(&added.unit);
            return Ok(self.apply_subselection(col));
        }

        Ok(self.apply_subselection(self.base.get_column(name)?))
    }

    /// A view that keeps only the named columns
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<View, DataError> {
        let colnames = self.colnames();

        let missing: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !colnames.iter().any(|c| c == name))
            .collect();

        if !missing.is_empty() {
            return Err(DataError::Key(format!("{:?} not found.", missing)));
        }

        let dropped = colnames
            .into_iter()
            .filter(|c| !names.iter().any(|name| name.as_ref() == c))
            .collect();

        Ok(View::new(self.clone()).dropping(dropped))
    }

    /// The command that describes the view inside other commands
    pub fn to_cmd(&self) -> JsonValue {
        let last_change = self.last_change();

        let mut cmd = json!({ "type_": "View" });

        if let Some(added) = &self.added {
            cmd["added_"] = added.to_cmd(last_change);
        }

        if let Some(sub) = &self.subselection {
            let mut sub = sub.to_cmd();
            sub["last_change_"] = json!(last_change);
            cmd["subselection_"] = sub;
        }

        cmd["base_"] = self.base.to_cmd();
        cmd["dropped_"] = json!(self.dropped);
        cmd["name_"] = json!(self.name());
        cmd["last_change_"] = json!(last_change);

        cmd
    }

    /// Number of rows
    ///
    /// Without `force`, views whose length the engine cannot infer cheaply
    /// report [`Length::Unknown`].
    pub fn nrows(&self, session: &Session, force: bool) -> Result<Length, DataError> {
        self.check(session)?;

        let cols = self
            .colnames()
            .iter()
            .map(|name| self.get_column(name).map(|col| col.to_cmd()))
            .collect::<Result<Vec<_>, _>>()?;

        let cmd = json!({
            "type_": "View.get_nrows",
            "name_": "",
            "cols_": cols,
            "force_": force,
        });

        let mut sock = session.send_and_get_socket(&cmd)?;
        let reply = sock.recv_json()?;

        Ok(parse_records_total(&reply))
    }

    /// Compare the last change of the data frame with the one the view was built on
    pub fn check(&self, session: &Session) -> Result<Freshness, DataError> {
        let last_change = self.base.root().last_change(session)?;

        if last_change == self.initial_last_change {
            return Ok(Freshness::Fresh);
        }

        warn!(
            "The data frame underlying view '{}' was last changed at {}, which was after \
             the creation of the view. This might lead to unexpected results. You might \
             want to recreate the view.",
            self.name(),
            last_change
        );

        Ok(Freshness::Stale)
    }

    /// Re-read the roles of the underlying data frame
    pub fn refresh(&mut self, session: &Session) -> Result<(), DataError> {
        self.base.refresh(session)
    }

    pub fn to_placeholder(&self, name: Option<&str>) -> Placeholder {
        Placeholder::new(name.unwrap_or_else(|| self.name()), self.roles())
    }

    /// Materialize the view as a new data frame
    pub fn to_df(&self, session: &Session, name: &str) -> Result<DataFrame, DataError> {
        DataFrame::from_view(session, name, self)
    }

    /// Let the engine write the rows of the view into a CSV file
    pub fn to_csv(&self, session: &Session, fname: &str, options: &CsvOptions) -> Result<(), DataError> {
        self.check(session)?;

        session.send(&json!({
            "type_": "View.to_csv",
            "name_": self.name(),
            "view_": self.to_cmd(),
            "fname_": fname,
            "quotechar_": options.quotechar,
            "sep_": options.sep,
            "batch_size_": options.batch_size,
        }))?;

        Ok(())
    }

    pub fn where_(&self, session: &Session, selection: impl Into<Selection>) -> Result<View, DataError> {
        Table::from(self.clone()).where_(session, selection)
    }

    pub fn drop<S: AsRef<str>>(&self, names: &[S]) -> Result<View, DataError> {
        Table::from(self.clone()).drop(names)
    }

    pub fn with_column(&self, new: NewColumn) -> Result<View, DataError> {
        Table::from(self.clone()).with_column(new)
    }

    pub fn with_role<S: AsRef<str>, T: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        role: Role,
        time_formats: &[T],
    ) -> Result<View, DataError> {
        Table::from(self.clone()).with_role(session, names, role, time_formats)
    }

    pub fn with_subroles<S: AsRef<str>, T: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        subroles: &[T],
        append: bool,
    ) -> Result<View, DataError> {
        Table::from(self.clone()).with_subroles(session, names, subroles, append)
    }

    pub fn with_unit<S: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        unit: &str,
        comparison_only: bool,
    ) -> Result<View, DataError> {
        Table::from(self.clone()).with_unit(session, names, unit, comparison_only)
    }
}

/// `recordsTotal` of a length reply; anything else means the length is unknown
fn parse_records_total(reply: &JsonValue) -> Length {
    match reply.get("recordsTotal") {
        Some(JsonValue::Number(n)) => n.as_u64().map_or(Length::Unknown, |n| Length::Finite(n as usize)),
        Some(JsonValue::String(s)) => s.parse().map_or(Length::Unknown, Length::Finite),
        _ => Length::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;

    fn loans() -> DataFrame {
        let roles = Roles::new()
            .with(Role::Numerical, &["amount", "rate"])
            .with(Role::JoinKey, &["id"])
            .with(Role::Target, &["default"]);

        DataFrame::new("loans", roles).unwrap()
    }

    #[test]
    fn test_dropped_column_is_a_key_error() {
        let view = loans().drop(&["rate"]).unwrap();

        assert!(matches!(view.get_column("rate"), Err(DataError::Key(_))));
        assert_eq!(view.colnames(), vec!["id", "default", "amount"]);
    }

    #[test]
    fn test_dropping_twice_equals_dropping_once() {
        let once = loans().drop(&["rate"]).unwrap();
        let twice = View::new(once.clone()).dropping(vec!["rate".to_string()]);

        assert_eq!(once.colnames(), twice.colnames());
        assert_eq!(twice.dropped(), &["rate".to_string()]);
    }

    #[test]
    fn test_added_column_moves_between_roles() {
        let df = loans();
        let col = df.get_column("amount").unwrap();

        let view = df
            .with_column(NewColumn::new(col, "amount").role(Role::Target))
            .unwrap();

        let roles = view.roles();
        assert_eq!(roles.target, vec!["default", "amount"]);
        assert_eq!(roles.numerical, vec!["rate"]);
    }

    #[test]
    fn test_view_cmd_carries_added_column() {
        let df = loans();
        let amount = match df.get_column("amount").unwrap() {
            Column::Float(col) => col,
            _ => unreachable!(),
        };

        let view = df
            .with_column(NewColumn::new(Column::FloatView(amount * 2.0), "double"))
            .unwrap()
            .named("doubled");

        let cmd = view.to_cmd();

        assert_eq!(cmd["type_"], "View");
        assert_eq!(cmd["name_"], "doubled");
        assert_eq!(cmd["added_"]["name_"], "double");
        assert_eq!(cmd["added_"]["role_"], "unused_float");
        assert_eq!(cmd["base_"]["type_"], "DataFrame");
        assert!(cmd.get("subselection_").is_none());
    }

    #[test]
    fn test_name_falls_back_to_base() {
        let view = View::new(loans());
        assert_eq!(view.name(), "loans");
        assert_eq!(view.named("other").name(), "other");
    }

    #[test]
    fn test_select_columns() {
        let view = View::new(loans()).select_columns(&["id", "amount"]).unwrap();

        assert_eq!(view.colnames(), vec!["id", "amount"]);
        assert!(View::new(loans()).select_columns(&["nope"]).is_err());
    }

    #[test]
    fn test_parse_records_total() {
        assert_eq!(parse_records_total(&json!({"recordsTotal": 12})), Length::Finite(12));
        assert_eq!(parse_records_total(&json!({"recordsTotal": "7"})), Length::Finite(7));
        assert_eq!(parse_records_total(&json!({})), Length::Unknown);
    }
}

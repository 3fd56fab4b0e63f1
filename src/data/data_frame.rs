// Data frames: named tables that live on the engine
// Author: Gabriel Demetrios Lafis

use log::{debug, warn};
use serde_json::{json, Value as JsonValue};

use super::{
    default_time_formats, merge_subroles, validate_subroles, AddedColumn, Column, ColumnExpr,
    ColumnMetadata, CsvOptions, DataError, DataSource, FloatColumn, NewColumn, Placeholder, Role,
    Roles, Selection, StringColumn, Table, View, COMPARISON_ONLY, TIME_STAMP_UNIT,
};
use crate::comm::{CommError, Issues, Session, FOUND};
use crate::utils::validate_name;

/// Handle to a data frame on the engine
///
/// The handle only carries the name and the roles of the columns. Every
/// operation that touches data is a round trip; operations that change the
/// data frame refresh the roles afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    name: String,
    roles: Roles,
    last_change: String,
}

impl DataFrame {
    /// Create a new handle; fails on duplicate column names before any round trip
    pub fn new(name: &str, roles: Roles) -> Result<Self, DataError> {
        validate_name(name, "name").map_err(DataError::Value)?;
        roles.validate()?;

        Ok(DataFrame {
            name: name.to_string(),
            roles,
            last_change: String::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// Column names in display order
    pub fn colnames(&self) -> Vec<String> {
        self.roles.colnames()
    }

    pub fn ncols(&self) -> usize {
        self.roles.len()
    }

    /// Last change as of the latest refresh
    pub fn last_change_snapshot(&self) -> &str {
        &self.last_change
    }

    /// Handle to a column, typed by the storage family of its role
    pub fn get_column(&self, name: &str) -> Result<Column, DataError> {
        let role = self.roles.column(name).ok_or_else(|| {
            DataError::Key(format!(
                "Column named '{}' not found in data frame '{}'.",
                name, self.name
            ))
        })?;

        Ok(if role.is_numerical_family() {
            Column::Float(FloatColumn::new(name, role, &self.name))
        } else {
            Column::String(StringColumn::new(name, role, &self.name))
        })
    }

    /// The command that refers to this data frame inside other commands
    pub fn to_cmd(&self) -> JsonValue {
        json!({ "type_": "DataFrame", "name_": self.name })
    }

    fn cmd(&self, type_: &str) -> JsonValue {
        json!({ "type_": type_, "name_": self.name })
    }

    /// A command carrying the column names of every role bucket
    fn ingestion_cmd(&self, type_: &str, append: bool) -> Result<JsonValue, DataError> {
        if self.ncols() == 0 {
            return Err(DataError::Value(format!(
                "Reading data is only possible in a data frame with more than zero columns. \
                 Define the roles of '{}' first or use one of the from_* constructors.",
                self.name
            )));
        }

        let mut cmd = self.cmd(type_);
        cmd["append_"] = json!(append);
        cmd["categorical_"] = json!(self.roles.categorical);
        cmd["join_keys_"] = json!(self.roles.join_key);
        cmd["numerical_"] = json!(self.roles.numerical);
        cmd["targets_"] = json!(self.roles.target);
        cmd["text_"] = json!(self.roles.text);
        cmd["time_stamps_"] = json!(self.roles.time_stamp);
        cmd["unused_floats_"] = json!(self.roles.unused_float);
        cmd["unused_strings_"] = json!(self.roles.unused_string);

        Ok(cmd)
    }

    /// Re-read the roles and the last change from the engine
    pub fn refresh(&mut self, session: &Session) -> Result<&mut Self, DataError> {
        let mut sock = session.send_and_get_socket(&self.cmd("DataFrame.refresh"))?;
        let roles = sock.recv_json()?;

        self.roles = Roles::from_json(&roles)?;
        self.last_change = self.last_change(session)?;

        debug!("Refreshed data frame '{}' ({} columns)", self.name, self.ncols());

        Ok(self)
    }

    /// Number of rows
    pub fn nrows(&self, session: &Session) -> Result<usize, DataError> {
        let mut sock = session.send_and_expect(&self.cmd("DataFrame.nrows"), FOUND)?;
        let nrows = sock.recv_string()?;

        nrows
            .trim()
            .parse()
            .map_err(|_| DataError::Comm(CommError::Protocol(format!("Invalid row count '{}'", nrows))))
    }

    /// Size of the data in bytes
    pub fn nbytes(&self, session: &Session) -> Result<u64, DataError> {
        let mut sock = session.send_and_expect(&self.cmd("DataFrame.nbytes"), FOUND)?;
        let nbytes = sock.recv_string()?;

        nbytes
            .trim()
            .parse()
            .map_err(|_| DataError::Comm(CommError::Protocol(format!("Invalid byte count '{}'", nbytes))))
    }

    /// When the data frame was last changed, as reported by the engine
    pub fn last_change(&self, session: &Session) -> Result<String, DataError> {
        let mut sock = session.send_and_get_socket(&self.cmd("DataFrame.last_change"))?;
        sock.expect_success()?;
        Ok(sock.recv_string()?)
    }

    /// Add a column; subroles and unit not set on `new` are taken from the column
    pub fn add(&mut self, session: &Session, new: NewColumn) -> Result<Issues, DataError> {
        let added = new.inherit_metadata(session)?.resolve()?;
        self.add_resolved(session, &added)
    }

    fn add_resolved(&mut self, session: &Session, added: &AddedColumn) -> Result<Issues, DataError> {
        let type_ = if added.col.column_type().is_string() {
            "DataFrame.add_categorical_column"
        } else {
            "DataFrame.add_column"
        };

        let cmd = json!({
            "type_": type_,
            "name_": added.name,
            "col_": added.col.to_cmd(),
            "df_name_": self.name,
            "role_": added.role.as_str(),
            "subroles_": added.subroles,
            "unit_": added.unit,
        });

        let issues = {
            let mut sock = session.send_and_get_socket(&cmd)?;
            let issues = sock.recv_issues()?;
            sock.expect_success()?;
            issues
        };

        for issue in issues.iter() {
            warn!("{}", issue);
        }

        self.refresh(session)?;

        Ok(issues)
    }

    /// Assign a new role, casting across storage families where needed
    pub fn set_role<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        session: &Session,
        names: &[S],
        role: Role,
        time_formats: &[T],
    ) -> Result<Issues, DataError> {
        self.check_names(names)?;

        let time_formats = default_time_formats(time_formats);
        let mut issues = Vec::new();

        for name in names {
            let name = name.as_ref();
            let col = self.get_column(name)?;

            let unit = if role == Role::TimeStamp {
                format!("{}{}", TIME_STAMP_UNIT, COMPARISON_ONLY)
            } else {
                col.unit(session)?
            };

            let subroles = col.subroles(session)?;

            let added = NewColumn::new(col, name)
                .role(role)
                .subroles(subroles.as_slice())
                .unit(&unit)
                .time_formats(time_formats.as_slice())
                .resolve()?;

            issues.extend(self.add_resolved(session, &added)?);
        }

        Ok(Issues::new(issues))
    }

    /// Replace or extend the subroles of columns
    pub fn set_subroles<S: AsRef<str>, T: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        subroles: &[T],
        append: bool,
    ) -> Result<(), DataError> {
        validate_subroles(subroles)?;
        self.check_names(names)?;

        for name in names {
            let col = self.get_column(name.as_ref())?;

            let subroles = if append {
                merge_subroles(&col.subroles(session)?, subroles)
            } else {
                subroles.iter().map(|s| s.as_ref().to_string()).collect()
            };

            match col {
                Column::Float(col) => col.set_subroles(session, subroles.as_slice())?,
                Column::String(col) => col.set_subroles(session, subroles.as_slice())?,
                other => return Err(not_a_named_column(&other)),
            }
        }

        Ok(())
    }

    /// Replace the unit of columns
    pub fn set_unit<S: AsRef<str>>(
        &self,
        session: &Session,
        names: &[S],
        unit: &str,
        comparison_only: bool,
    ) -> Result<(), DataError> {
        self.check_names(names)?;

        let unit = if comparison_only {
            format!("{}{}", unit, COMPARISON_ONLY)
        } else {
            unit.to_string()
        };

        for name in names {
            match self.get_column(name.as_ref())? {
                Column::Float(col) => col.set_unit(session, &unit)?,
                Column::String(col) => col.set_unit(session, &unit)?,
                other => return Err(not_a_named_column(&other)),
            }
        }

        Ok(())
    }

    /// Remove a column from the data frame on the engine
    pub fn remove_column(&mut self, session: &Session, name: &str) -> Result<(), DataError> {
        if !self.roles.contains(name) {
            return Err(DataError::Key(format!(
                "Column named '{}' not found in data frame '{}'.",
                name, self.name
            )));
        }

        session.send(&json!({
            "type_": "DataFrame.remove_column",
            "name_": name,
            "df_name_": self.name,
        }))?;

        self.refresh(session)?;
        Ok(())
    }

    /// Delete the data frame; with `mem_only` it stays on disk and can be loaded again
    pub fn delete(&self, session: &Session, mem_only: bool) -> Result<(), DataError> {
        let mut cmd = self.cmd("DataFrame.delete");
        cmd["mem_only_"] = json!(mem_only);

        session.send(&cmd)?;
        Ok(())
    }

    /// Write the data frame to the project folder
    pub fn save(&self, session: &Session) -> Result<(), DataError> {
        session.send(&self.cmd("DataFrame.save"))?;
        Ok(())
    }

    /// Load the saved data frame, discarding changes made since the last save
    pub fn load(&mut self, session: &Session) -> Result<&mut Self, DataError> {
        session.send(&self.cmd("DataFrame.load"))?;
        self.refresh(session)
    }

    /// Make the data frame immutable; views can still be created
    pub fn freeze(&self, session: &Session) -> Result<(), DataError> {
        session.send(&self.cmd("DataFrame.freeze"))?;
        Ok(())
    }

    /// Create a new data frame from the rows of several tables
    pub fn concat(session: &Session, name: &str, tables: &[Table]) -> Result<DataFrame, DataError> {
        validate_name(name, "name").map_err(DataError::Value)?;

        if tables.is_empty() {
            return Err(DataError::Value("'tables' must not be empty.".to_string()));
        }

        let data_frames: Vec<JsonValue> = tables.iter().map(Table::to_cmd).collect();

        session.send(&json!({
            "type_": "DataFrame.concat",
            "name_": name,
            "data_frames_": data_frames,
        }))?;

        let mut df = DataFrame::new(name, Roles::new())?;
        df.refresh(session)?;
        Ok(df)
    }

    /// A deep copy under a new name
    pub fn copy(&self, session: &Session, name: &str) -> Result<DataFrame, DataError> {
        DataFrame::concat(session, name, &[Table::from(self.clone())])
    }

    /// Read CSV files that are accessible to the engine
    pub fn read_csv<S: AsRef<str>>(
        &mut self,
        session: &Session,
        fnames: &[S],
        append: bool,
        options: &CsvOptions,
    ) -> Result<&mut Self, DataError> {
        let fnames: Vec<&str> = fnames.iter().map(AsRef::as_ref).collect();

        let mut cmd = self.ingestion_cmd("DataFrame.read_csv", append)?;
        cmd["fnames_"] = json!(fnames);
        cmd["num_lines_read_"] = json!(options.num_lines_read);
        cmd["quotechar_"] = json!(options.quotechar);
        cmd["sep_"] = json!(options.sep);
        cmd["skip_"] = json!(options.skip);
        cmd["time_formats_"] = json!(default_time_formats(options.time_formats.as_slice()));

        if let Some(colnames) = &options.colnames {
            cmd["colnames_"] = json!(colnames);
        }

        session.send(&cmd)?;
        self.refresh(session)
    }

    /// Read a column-major JSON object `{"column": [values...]}`
    pub fn read_json<S: AsRef<str>>(
        &mut self,
        session: &Session,
        json_str: &str,
        append: bool,
        time_formats: &[S],
    ) -> Result<&mut Self, DataError> {
        let mut cmd = self.ingestion_cmd("DataFrame.from_json", append)?;
        cmd["time_formats_"] = json!(default_time_formats(time_formats));

        {
            let mut sock = session.send_and_get_socket(&cmd)?;
            sock.send_string(json_str)?;
            sock.expect_success()?;
        }

        self.refresh(session)
    }

    /// Read a Parquet file that is accessible to the engine
    pub fn read_parquet(&mut self, session: &Session, fname: &str, append: bool) -> Result<&mut Self, DataError> {
        let mut cmd = self.ingestion_cmd("DataFrame.read_parquet", append)?;
        cmd["fname_"] = json!(fname);

        session.send(&cmd)?;
        self.refresh(session)
    }

    /// Stream record batches to the engine
    #[cfg(feature = "arrow")]
    pub fn read_arrow(
        &mut self,
        session: &Session,
        schema: &arrow::datatypes::Schema,
        batches: &[arrow::record_batch::RecordBatch],
        append: bool,
    ) -> Result<&mut Self, DataError> {
        let cmd = self.ingestion_cmd("DataFrame.from_arrow", append)?;

        {
            let mut sock = session.send_and_get_socket(&cmd)?;
            sock.send_arrow_stream(schema, batches)?;
            sock.expect_success()?;
        }

        self.refresh(session)
    }

    /// Materialize a view into this data frame
    pub fn read_view(&mut self, session: &Session, view: &View, append: bool) -> Result<&mut Self, DataError> {
        view.check(session)?;

        let mut cmd = self.cmd("DataFrame.from_view");
        cmd["view_"] = view.to_cmd();
        cmd["append_"] = json!(append);

        session.send(&cmd)?;
        self.refresh(session)
    }

    /// Let the engine write the data frame into a CSV file
    pub fn to_csv(&self, session: &Session, fname: &str, options: &CsvOptions) -> Result<(), DataError> {
        let mut cmd = self.cmd("DataFrame.to_csv");
        cmd["fname_"] = json!(fname);
        cmd["quotechar_"] = json!(options.quotechar);
        cmd["sep_"] = json!(options.sep);
        cmd["batch_size_"] = json!(options.batch_size);

        session.send(&cmd)?;
        Ok(())
    }

    /// Create a data frame from a local source, sniffing roles the caller left out
    ///
    /// With `ignore` set, only the columns named in `roles` are read.
    pub fn from_source(
        session: &Session,
        name: &str,
        source: &impl DataSource,
        roles: Option<Roles>,
        ignore: bool,
    ) -> Result<DataFrame, DataError> {
        let table = source.read()?;
        debug!("Read {} rows from '{}'", table.nrows(), source.name());

        let roles = merge_sniffed(table.sniff_roles(), roles, ignore);

        let mut df = DataFrame::new(name, roles)?;
        df.read_json(session, &table.to_json()?, false, &[] as &[&str])?;
        Ok(df)
    }

    /// Create a data frame from a local CSV file
    pub fn from_csv_file(
        session: &Session,
        name: &str,
        path: &str,
        options: &CsvOptions,
        roles: Option<Roles>,
    ) -> Result<DataFrame, DataError> {
        let source = super::CsvSource::new(path, options.clone());
        DataFrame::from_source(session, name, &source, roles, false)
    }

    /// Create a data frame from JSON records `[{"column": value, ...}, ...]`
    pub fn from_json_records(
        session: &Session,
        name: &str,
        records: &[serde_json::Map<String, JsonValue>],
        roles: Option<Roles>,
    ) -> Result<DataFrame, DataError> {
        let source = super::JsonSource::from_records(records.to_vec());
        DataFrame::from_source(session, name, &source, roles, false)
    }

    /// Create a data frame from Arrow record batches
    #[cfg(feature = "arrow")]
    pub fn from_arrow(
        session: &Session,
        name: &str,
        schema: &arrow::datatypes::Schema,
        batches: &[arrow::record_batch::RecordBatch],
        roles: Option<Roles>,
        ignore: bool,
    ) -> Result<DataFrame, DataError> {
        let roles = merge_sniffed(super::sniff_schema(schema), roles, ignore);

        let mut df = DataFrame::new(name, roles)?;
        df.read_arrow(session, schema, batches, false)?;
        Ok(df)
    }

    /// Create a data frame from a local Parquet file
    #[cfg(feature = "arrow")]
    pub fn from_parquet_file(
        session: &Session,
        name: &str,
        path: &str,
        roles: Option<Roles>,
    ) -> Result<DataFrame, DataError> {
        let (schema, batches) = super::ParquetSource::new(path).read_batches()?;
        DataFrame::from_arrow(session, name, &schema, &batches, roles, false)
    }

    /// Create a data frame from a view
    pub fn from_view(session: &Session, name: &str, view: &View) -> Result<DataFrame, DataError> {
        let mut df = DataFrame::new(name, Roles::new())?;
        df.read_view(session, view, false)?;
        Ok(df)
    }

    pub fn to_placeholder(&self, name: Option<&str>) -> Placeholder {
        Placeholder::new(name.unwrap_or(&self.name), self.roles.clone())
    }

    /// Rows matching a selection, as a view
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

    #[cfg(feature = "arrow")]
    pub fn make_target_columns(&self, session: &Session, colname: &str) -> Result<View, DataError> {
        Table::from(self.clone()).make_target_columns(session, colname)
    }

    fn check_names<S: AsRef<str>>(&self, names: &[S]) -> Result<(), DataError> {
        if names.is_empty() {
            return Err(DataError::Value("At least one column name is required.".to_string()));
        }

        for name in names {
            if !self.roles.contains(name.as_ref()) {
                return Err(DataError::Value(format!("No column called '{}' found.", name.as_ref())));
            }
        }

        Ok(())
    }
}

/// Sniffed roles updated by the caller's; with `ignore` only the caller's count
fn merge_sniffed(sniffed: Roles, roles: Option<Roles>, ignore: bool) -> Roles {
    match roles {
        None => sniffed,
        Some(roles) if ignore => roles,
        Some(roles) => sniffed.update(&roles),
    }
}

fn not_a_named_column(col: &Column) -> DataError {
    DataError::Type(format!("{} is not a column of a data frame.", col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loans() -> DataFrame {
        let roles = Roles::new()
            .with(Role::Numerical, &["amount"])
            .with(Role::JoinKey, &["id"])
            .with(Role::TimeStamp, &["date"])
            .with(Role::Categorical, &["status"]);

        DataFrame::new("loans", roles).unwrap()
    }

    #[test]
    fn test_duplicates_fail_before_any_round_trip() {
        let roles = Roles::new()
            .with(Role::Numerical, &["amount"])
            .with(Role::UnusedString, &["amount"]);

        let err = DataFrame::new("loans", roles).unwrap_err();
        assert!(err.is_local());
    }

    #[test]
    fn test_get_column_follows_role_family() {
        let df = loans();

        assert!(matches!(df.get_column("amount").unwrap(), Column::Float(_)));
        assert!(matches!(df.get_column("date").unwrap(), Column::Float(_)));
        assert!(matches!(df.get_column("id").unwrap(), Column::String(_)));
        assert!(matches!(df.get_column("nope"), Err(DataError::Key(_))));

        let cmd = df.get_column("status").unwrap().to_cmd();
        assert_eq!(cmd["df_name_"], "loans");
        assert_eq!(cmd["role_"], "categorical");
    }

    #[test]
    fn test_ingestion_cmd_lists_roles() {
        let cmd = loans().ingestion_cmd("DataFrame.read_parquet", true).unwrap();

        assert_eq!(cmd["join_keys_"], json!(["id"]));
        assert_eq!(cmd["time_stamps_"], json!(["date"]));
        assert_eq!(cmd["unused_strings_"], json!([]));
        assert_eq!(cmd["append_"], true);
    }

    #[test]
    fn test_ingestion_requires_columns() {
        let df = DataFrame::new("empty", Roles::new()).unwrap();
        assert!(df.ingestion_cmd("DataFrame.from_json", false).is_err());
    }

    #[test]
    fn test_merge_sniffed() {
        let sniffed = Roles::new().with(Role::UnusedFloat, &["a", "b"]);
        let given = Roles::new().with(Role::Target, &["a"]);

        let merged = merge_sniffed(sniffed.clone(), Some(given.clone()), false);
        assert_eq!(merged.target, vec!["a"]);
        assert_eq!(merged.unused_float, vec!["b"]);

        assert_eq!(merge_sniffed(sniffed, Some(given.clone()), true), given);
    }
}

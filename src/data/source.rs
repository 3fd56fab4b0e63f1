// Local tables read from files before they are sent to the engine
// Author: Gabriel Demetrios Lafis

use serde_json::{Map, Value as JsonValue};

use super::{DataError, Role, Roles};

/// Represents a generic local data source
pub trait DataSource {
    /// Read the whole source into memory
    fn read(&self) -> Result<LocalTable, DataError>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// A column of a local table
#[derive(Debug, Clone, PartialEq)]
pub enum LocalColumn {
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

impl LocalColumn {
    /// Numeric if every present entry parses as a number, categorical otherwise
    pub fn infer(values: Vec<Option<String>>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = values
            .iter()
            .map(|v| match v {
                None => Some(None),
                Some(s) => s.trim().parse::<f64>().ok().map(Some),
            })
            .collect();

        match parsed {
            Some(floats) if values.iter().any(Option::is_some) => LocalColumn::Float(floats),
            _ => LocalColumn::String(values),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LocalColumn::Float(v) => v.len(),
            LocalColumn::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The role a column of this kind gets when the caller names none
    pub fn default_role(&self) -> Role {
        match self {
            LocalColumn::Float(_) => Role::UnusedFloat,
            LocalColumn::String(_) => Role::UnusedString,
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            LocalColumn::Float(values) => values
                .iter()
                .map(|v| v.filter(|f| f.is_finite()).map_or(JsonValue::Null, JsonValue::from))
                .collect(),
            LocalColumn::String(values) => values
                .iter()
                .map(|v| v.as_ref().map_or(JsonValue::Null, |s| JsonValue::from(s.as_str())))
                .collect(),
        }
    }
}

/// Represents a column-major table held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalTable {
    columns: Vec<(String, LocalColumn)>,
}

impl LocalTable {
    /// Create a new empty table
    pub fn new() -> Self {
        LocalTable::default()
    }

    /// Append a column; all columns must have the same length
    pub fn push_column(&mut self, name: &str, column: LocalColumn) -> Result<(), DataError> {
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(DataError::Value(format!("Duplicate column name '{}'.", name)));
        }

        if let Some((first, col)) = self.columns.first() {
            if col.len() != column.len() {
                return Err(DataError::Value(format!(
                    "Column '{}' has {} rows, but column '{}' has {}.",
                    name,
                    column.len(),
                    first,
                    col.len()
                )));
            }
        }

        self.columns.push((name.to_string(), column));
        Ok(())
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |(_, col)| col.len())
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn colnames(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&LocalColumn> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, col)| col)
    }

    /// Unused roles for every column: numbers are floats, everything else strings
    pub fn sniff_roles(&self) -> Roles {
        let mut roles = Roles::new();
        for (name, col) in &self.columns {
            roles = roles.with_column(name, col.default_role());
        }
        roles
    }

    /// The column-major payload of `DataFrame.from_json`
    pub fn to_json(&self) -> Result<String, DataError> {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), col.to_json()))
            .collect();

        Ok(serde_json::to_string(&JsonValue::Object(map))?)
    }
}

// JSON data source
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use super::{DataError, DataSource, LocalColumn, LocalTable};

/// JSON data source
///
/// Accepts either records (`[{"column": value, ...}, ...]`) or a
/// column-major object (`{"column": [values...]}`).
pub struct JsonSource {
    name: String,
    content: JsonContent,
}

enum JsonContent {
    File(String),
    Records(Vec<Map<String, JsonValue>>),
}

impl JsonSource {
    /// Create a new JSON data source reading from a file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_string_lossy().to_string();
        JsonSource {
            name: path.clone(),
            content: JsonContent::File(path),
        }
    }

    /// Create a new JSON data source from records already in memory
    pub fn from_records(records: Vec<Map<String, JsonValue>>) -> Self {
        JsonSource {
            name: "records".to_string(),
            content: JsonContent::Records(records),
        }
    }
}

impl DataSource for JsonSource {
    fn read(&self) -> Result<LocalTable, DataError> {
        match &self.content {
            JsonContent::Records(records) => table_from_records(records),
            JsonContent::File(path) => {
                let reader = BufReader::new(File::open(path)?);
                let value: JsonValue = serde_json::from_reader(reader)?;

                match value {
                    JsonValue::Array(items) => {
                        let records = items
                            .into_iter()
                            .map(|item| match item {
                                JsonValue::Object(map) => Ok(map),
                                other => Err(DataError::Parse(format!("Expected a JSON object, got {}", other))),
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        table_from_records(&records)
                    }
                    JsonValue::Object(columns) => table_from_columns(&columns),
                    _ => Err(DataError::Parse(
                        "Expected a JSON array of records or an object of columns".to_string(),
                    )),
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn table_from_records(records: &[Map<String, JsonValue>]) -> Result<LocalTable, DataError> {
    // Column order follows first appearance
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut table = LocalTable::new();
    for name in &names {
        let values: Vec<&JsonValue> = records
            .iter()
            .map(|r| r.get(name).unwrap_or(&JsonValue::Null))
            .collect();
        table.push_column(name, column_from_values(&values))?;
    }

    Ok(table)
}

fn table_from_columns(columns: &Map<String, JsonValue>) -> Result<LocalTable, DataError> {
    let mut table = LocalTable::new();

    for (name, values) in columns {
        let values = values
            .as_array()
            .ok_or_else(|| DataError::Parse(format!("Column '{}' is not an array", name)))?;
        let values: Vec<&JsonValue> = values.iter().collect();
        table.push_column(name, column_from_values(&values))?;
    }

    Ok(table)
}

/// Numbers and booleans become float columns, anything else a string column
fn column_from_values(values: &[&JsonValue]) -> LocalColumn {
    let numeric = values
        .iter()
        .all(|v| matches!(v, JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Null));

    if numeric && values.iter().any(|v| !v.is_null()) {
        return LocalColumn::Float(
            values
                .iter()
                .map(|v| match v {
                    JsonValue::Number(n) => n.as_f64(),
                    JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                })
                .collect(),
        );
    }

    LocalColumn::String(
        values
            .iter()
            .map(|v| match v {
                JsonValue::Null => None,
                JsonValue::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn records(value: JsonValue) -> Vec<Map<String, JsonValue>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_records_fill_missing_keys() {
        let source = JsonSource::from_records(records(json!([
            {"id": "a", "amount": 1},
            {"id": "b", "flag": true}
        ])));

        let table = source.read().unwrap();

        assert_eq!(table.colnames(), vec!["amount", "id", "flag"]);
        assert_eq!(table.column("amount"), Some(&LocalColumn::Float(vec![Some(1.0), None])));
        assert_eq!(table.column("flag"), Some(&LocalColumn::Float(vec![None, Some(1.0)])));
    }

    #[test]
    fn test_column_major_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"id": ["a", "b"], "amount": [1.5, 2]}}"#).unwrap();

        let table = JsonSource::new(file.path()).read().unwrap();

        assert_eq!(table.nrows(), 2);
        assert_eq!(table.sniff_roles().unused_string, vec!["id"]);
    }
}

// Input columns of a fitted pipeline and their importances
// Author: Gabriel Demetrios Lafis

use serde_json::Value as JsonValue;

use super::{padded_floats, recv_target_json, PipelineError};
use crate::comm::{CommError, Session};

/// Marker of columns from the population table
pub const POPULATION_MARKER: &str = "[POPULATION]";

/// Marker of columns from peripheral tables
pub const PERIPHERAL_MARKER: &str = "[PERIPHERAL]";

/// An input column for a single target
#[derive(Debug, Clone, PartialEq)]
pub struct ImportantColumn {
    pub index: usize,
    pub name: String,
    pub marker: String,
    pub table: String,
    pub target: String,
    pub importance: f64,
}

impl ImportantColumn {
    /// `marker table.name`, the way the engine describes the column
    pub fn description(&self) -> String {
        format!("{} {}.{}", self.marker, self.table, self.name)
    }
}

/// The input columns of a pipeline, for every target
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Columns {
    data: Vec<ImportantColumn>,
}

impl Columns {
    pub fn new(data: Vec<ImportantColumn>) -> Self {
        Columns { data }
    }

    /// Load the column importances from the engine
    pub fn load(session: &Session, pipeline: &str, targets: &[String]) -> Result<Self, PipelineError> {
        let mut data = Vec::new();

        for (target_num, target) in targets.iter().enumerate() {
            let obj = recv_target_json(session, "Pipeline.column_importances", pipeline, target_num)?;

            let descriptions = obj
                .get("column_descriptions_")
                .and_then(JsonValue::as_array)
                .ok_or_else(|| CommError::Protocol("Reply lacks 'column_descriptions_'".to_string()))?;

            let importances = padded_floats(&obj, "column_importances_", descriptions.len());

            data.extend(descriptions.iter().enumerate().map(|(index, description)| {
                let field = |key: &str| {
                    description
                        .get(key)
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string()
                };

                ImportantColumn {
                    index,
                    name: field("name_"),
                    marker: field("marker_"),
                    table: field("table_"),
                    target: target.clone(),
                    importance: importances[index],
                }
            }));
        }

        Ok(Columns { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImportantColumn> {
        self.data.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.data.iter().map(|column| column.name.clone()).collect()
    }

    pub fn importances(&self) -> Vec<f64> {
        self.data.iter().map(|column| column.importance).collect()
    }

    pub fn filter<F: Fn(&ImportantColumn) -> bool>(&self, predicate: F) -> Columns {
        Columns {
            data: self.data.iter().filter(|column| predicate(column)).cloned().collect(),
        }
    }

    /// Most important first
    pub fn sort_by_importance(&self) -> Columns {
        let mut data = self.data.clone();
        data.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Columns { data }
    }
}

impl<'a> IntoIterator for &'a Columns {
    type Item = &'a ImportantColumn;
    type IntoIter = std::slice::Iter<'a, ImportantColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description() {
        let column = ImportantColumn {
            index: 0,
            name: "amount".to_string(),
            marker: PERIPHERAL_MARKER.to_string(),
            table: "trans".to_string(),
            target: "default".to_string(),
            importance: 0.4,
        };

        assert_eq!(column.description(), "[PERIPHERAL] trans.amount");

        let columns = Columns::new(vec![column]);
        assert_eq!(columns.filter(|c| c.marker == POPULATION_MARKER).len(), 0);
    }
}

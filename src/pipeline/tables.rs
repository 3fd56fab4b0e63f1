// Table importances, aggregated from the column importances
// Author: Gabriel Demetrios Lafis

use super::Columns;

/// Summed importance of the columns of one table for one target
#[derive(Debug, Clone, PartialEq)]
pub struct ImportantTable {
    pub name: String,
    pub importance: f64,
    pub target: String,
    pub marker: String,
}

/// Tables of a pipeline, for every target
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tables {
    data: Vec<ImportantTable>,
}

impl Tables {
    /// Sum the column importances per table and target, in order of first appearance
    pub fn from_columns(columns: &Columns, targets: &[String]) -> Self {
        let mut data: Vec<ImportantTable> = Vec::new();

        for target in targets {
            let start = data.len();

            for column in columns.iter().filter(|column| &column.target == target) {
                match data[start..].iter_mut().find(|table| table.name == column.table) {
                    Some(table) => {
                        table.importance += column.importance;
                        table.marker = column.marker.clone();
                    }
                    None => data.push(ImportantTable {
                        name: column.table.clone(),
                        importance: column.importance,
                        target: target.clone(),
                        marker: column.marker.clone(),
                    }),
                }
            }
        }

        Tables { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImportantTable> {
        self.data.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.data.iter().map(|table| table.name.clone()).collect()
    }

    pub fn importances(&self) -> Vec<f64> {
        self.data.iter().map(|table| table.importance).collect()
    }

    pub fn targets(&self) -> Vec<String> {
        self.data.iter().map(|table| table.target.clone()).collect()
    }

    pub fn filter<F: Fn(&ImportantTable) -> bool>(&self, predicate: F) -> Tables {
        Tables {
            data: self.data.iter().filter(|table| predicate(table)).cloned().collect(),
        }
    }

    /// Most important first
    pub fn sort_by_importance(&self) -> Tables {
        let mut data = self.data.clone();
        data.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Tables { data }
    }
}

impl<'a> IntoIterator for &'a Tables {
    type Item = &'a ImportantTable;
    type IntoIter = std::slice::Iter<'a, ImportantTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

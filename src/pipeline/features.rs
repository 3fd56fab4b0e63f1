// Features learned by a fitted pipeline
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde_json::{json, Value as JsonValue};

use super::PipelineError;
use crate::comm::{CommError, Session, FOUND, SUCCESS};

/// A single feature for a single target
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub index: usize,
    pub name: String,
    pub target: String,
    pub correlation: f64,
    pub importance: f64,
}

/// The features of a pipeline, for every target
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Features {
    data: Vec<Feature>,
}

impl Features {
    /// Create a container from already loaded features
    pub fn new(data: Vec<Feature>) -> Self {
        Features { data }
    }

    /// Load names, correlations and importances from the engine
    pub fn load(session: &Session, pipeline: &str, targets: &[String]) -> Result<Self, PipelineError> {
        let mut data = Vec::new();

        for (target_num, target) in targets.iter().enumerate() {
            let correlations = recv_target_json(session, "Pipeline.feature_correlations", pipeline, target_num)?;
            let importances = recv_target_json(session, "Pipeline.feature_importances", pipeline, target_num)?;

            let names = string_list(&correlations, "feature_names_")?;
            let correlations = padded_floats(&correlations, "feature_correlations_", names.len());
            let importances = padded_floats(&importances, "feature_importances_", names.len());

            data.extend(names.into_iter().enumerate().map(|(index, name)| Feature {
                index,
                name,
                target: target.clone(),
                correlation: correlations[index],
                importance: importances[index],
            }));
        }

        Ok(Features { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.data.iter()
    }

    /// Look a feature up by name
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.data.iter().find(|feature| feature.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.data.iter().map(|feature| feature.name.clone()).collect()
    }

    pub fn correlations(&self) -> Vec<f64> {
        self.data.iter().map(|feature| feature.correlation).collect()
    }

    pub fn importances(&self) -> Vec<f64> {
        self.data.iter().map(|feature| feature.importance).collect()
    }

    /// Keep the features matching `predicate`
    pub fn filter<F: Fn(&Feature) -> bool>(&self, predicate: F) -> Features {
        Features {
            data: self.data.iter().filter(|feature| predicate(feature)).cloned().collect(),
        }
    }

    /// Most important first
    pub fn sort_by_importance(&self) -> Features {
        let mut data = self.data.clone();
        data.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Features { data }
    }

    /// Strongest absolute correlation first
    pub fn sort_by_correlation(&self) -> Features {
        let mut data = self.data.clone();
        data.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        Features { data }
    }
}

impl<'a> IntoIterator for &'a Features {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Options for transpiling the features to SQL
#[derive(Debug, Clone, PartialEq)]
pub struct SqlOptions {
    pub targets: bool,
    pub subfeatures: bool,
    pub dialect: String,
    pub schema: String,
    pub nchar_categorical: usize,
    pub nchar_join_key: usize,
    pub nchar_text: usize,
    pub size_threshold: Option<usize>,
}

impl Default for SqlOptions {
    fn default() -> Self {
        SqlOptions {
            targets: true,
            subfeatures: true,
            dialect: "sqlite3".to_string(),
            schema: String::new(),
            nchar_categorical: 128,
            nchar_join_key: 128,
            nchar_text: 4096,
            size_threshold: Some(50000),
        }
    }
}

impl SqlOptions {
    pub fn new() -> Self {
        SqlOptions::default()
    }

    pub fn with_dialect(mut self, dialect: &str) -> Self {
        self.dialect = dialect.to_string();
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn with_subfeatures(mut self, subfeatures: bool) -> Self {
        self.subfeatures = subfeatures;
        self
    }

    pub fn with_targets(mut self, targets: bool) -> Self {
        self.targets = targets;
        self
    }
}

/// SQL transpilation of a pipeline, one statement per entry
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCode {
    pub code: Vec<String>,
    pub dialect: String,
}

impl SqlCode {
    /// Fetch the transpiled features of `pipeline`
    pub fn load(session: &Session, pipeline: &str, options: &SqlOptions) -> Result<Self, PipelineError> {
        let mut cmd = json!({
            "type_": "Pipeline.to_sql",
            "name_": pipeline,
            "targets_": options.targets,
            "subfeatures_": options.subfeatures,
            "dialect_": options.dialect,
            "schema_": options.schema,
            "nchar_categorical_": options.nchar_categorical,
            "nchar_join_key_": options.nchar_join_key,
            "nchar_text_": options.nchar_text,
        });

        if let Some(size_threshold) = options.size_threshold {
            cmd["size_threshold_"] = json!(size_threshold);
        }

        let mut sock = session.send_and_expect(&cmd, FOUND)?;
        let sql = sock.recv_string()?;

        Ok(SqlCode {
            code: sql.split("\n\n\n").map(str::to_string).collect(),
            dialect: options.dialect.clone(),
        })
    }
}

impl fmt::Display for SqlCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code.join("\n\n\n"))
    }
}

/// Send a per-target command, expect `"Success!"` and parse the JSON that follows
pub(crate) fn recv_target_json(
    session: &Session,
    type_: &str,
    pipeline: &str,
    target_num: usize,
) -> Result<JsonValue, PipelineError> {
    let cmd = json!({ "type_": type_, "name_": pipeline, "target_num_": target_num });

    let mut sock = session.send_and_expect(&cmd, SUCCESS)?;
    let msg = sock.recv_string()?;

    Ok(serde_json::from_str(&msg)?)
}

pub(crate) fn string_list(obj: &JsonValue, key: &str) -> Result<Vec<String>, PipelineError> {
    let values = obj
        .get(key)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| CommError::Protocol(format!("Reply lacks '{}'", key)))?;

    Ok(values
        .iter()
        .map(|value| value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
        .collect())
}

/// Floats under `key`, padded with NaN to `len`
pub(crate) fn padded_floats(obj: &JsonValue, key: &str, len: usize) -> Vec<f64> {
    let mut values = obj
        .get(key)
        .and_then(JsonValue::as_array)
        .map(|values| values.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect::<Vec<_>>())
        .unwrap_or_default();

    values.resize(len.max(values.len()), f64::NAN);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Features {
        Features::new(vec![
            Feature {
                index: 0,
                name: "feature_1_1".to_string(),
                target: "default".to_string(),
                correlation: -0.8,
                importance: 0.2,
            },
            Feature {
                index: 1,
                name: "feature_1_2".to_string(),
                target: "default".to_string(),
                correlation: 0.5,
                importance: 0.7,
            },
        ])
    }

    #[test]
    fn test_sorting_and_filtering() {
        let features = features();

        assert_eq!(features.sort_by_importance().names(), vec!["feature_1_2", "feature_1_1"]);
        assert_eq!(features.sort_by_correlation().names(), vec!["feature_1_1", "feature_1_2"]);
        assert_eq!(features.filter(|f| f.importance > 0.5).len(), 1);
        assert_eq!(features.get("feature_1_1").unwrap().index, 0);
    }

    #[test]
    fn test_padded_floats() {
        let obj = json!({ "feature_importances_": [0.1] });

        let values = padded_floats(&obj, "feature_importances_", 3);

        assert_eq!(values.len(), 3);
        assert_eq!(values[0], 0.1);
        assert!(values[2].is_nan());
        assert!(string_list(&obj, "feature_names_").is_err());
    }
}

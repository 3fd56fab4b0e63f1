// Pipeline module: hyperparameters, the pipeline RPC layer and its results
// Author: Gabriel Demetrios Lafis

mod aggregations;
mod columns;
mod feature_learners;
mod features;
mod loss_functions;
#[allow(clippy::module_inception)]
mod pipeline;
mod predictors;
mod preprocessors;
mod scores;
mod tables;

pub use aggregations::*;
pub use columns::*;
pub use feature_learners::*;
pub use features::*;
pub use loss_functions::*;
pub use pipeline::*;
pub use predictors::*;
pub use preprocessors::*;
pub use scores::*;
pub use tables::*;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::comm::CommError;
use crate::data::DataError;

/// Represents an error in the pipeline module
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Pipeline has not been fitted: {0}")]
    NotFitted(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Comm(CommError::Json(err))
    }
}

impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::InvalidArgument(msg)
    }
}

/// Serialize hyperparameters the way the engine reads them: every key
/// gets a trailing underscore and `type_` names the algorithm.
pub(crate) fn engine_cmd<T: Serialize>(value: &T, type_: &str) -> Result<JsonValue, PipelineError> {
    let mut cmd = Map::new();
    cmd.insert("type_".to_string(), JsonValue::String(type_.to_string()));

    match serde_json::to_value(value)? {
        JsonValue::Object(fields) => {
            for (key, value) in fields {
                cmd.insert(format!("{}_", key), value);
            }
        }
        JsonValue::Null => {}
        other => {
            return Err(PipelineError::InvalidArgument(format!(
                "{} must serialize to an object, got {}",
                type_, other
            )))
        }
    }

    Ok(JsonValue::Object(cmd))
}

/// Strip the trailing underscores the engine appends to every key
pub(crate) fn strip_underscores(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(key, value)| {
                    let key = key.strip_suffix('_').unwrap_or(key);
                    (key.to_string(), strip_underscores(value))
                })
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(strip_underscores).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Params {
        min_freq: usize,
        add_dummies: bool,
    }

    #[test]
    fn test_engine_cmd() {
        let cmd = engine_cmd(&Params { min_freq: 30, add_dummies: false }, "Imputation").unwrap();

        assert_eq!(
            cmd,
            json!({ "type_": "Imputation", "min_freq_": 30, "add_dummies_": false })
        );
    }

    #[test]
    fn test_strip_underscores() {
        let scores = json!({ "history": [{ "auc_": [0.9], "set_used_": "test" }], "auc_": [0.9] });

        assert_eq!(
            strip_underscores(&scores),
            json!({ "history": [{ "auc": [0.9], "set_used": "test" }], "auc": [0.9] })
        );
    }
}

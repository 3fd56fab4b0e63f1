// Predictors and feature selectors
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{engine_cmd, PipelineError};
use crate::utils::{validate_non_negative, validate_positive, validate_range};

/// A model trained on the generated features; also used as feature selector
pub trait Predictor: fmt::Debug {
    fn type_name(&self) -> &str;

    /// Whether the predictor solves a classification problem
    fn is_classifier(&self) -> bool;

    fn validate(&self) -> Result<(), PipelineError>;

    fn to_cmd(&self) -> Result<JsonValue, PipelineError>;
}

/// Objectives accepted by the gradient boosting predictors
const CLASSIFICATION_OBJECTIVES: [&str; 2] = ["binary:logistic", "binary:logitraw"];
const REGRESSION_OBJECTIVES: [&str; 4] = ["reg:squarederror", "reg:tweedie", "reg:linear", "reg:logistic"];

/// Ordinary least squares with L2 regularization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub learning_rate: f64,
    pub reg_lambda: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        LinearRegression {
            learning_rate: 0.9,
            reg_lambda: 1e-10,
        }
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        LinearRegression::default()
    }

    pub fn with_reg_lambda(mut self, reg_lambda: f64) -> Self {
        self.reg_lambda = reg_lambda;
        self
    }
}

impl Predictor for LinearRegression {
    fn type_name(&self) -> &str {
        "LinearRegression"
    }

    fn is_classifier(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<(), PipelineError> {
        validate_positive(self.learning_rate, "learning_rate")?;
        validate_non_negative(self.reg_lambda, "reg_lambda")?;
        Ok(())
    }

    fn to_cmd(&self) -> Result<JsonValue, PipelineError> {
        self.validate()?;
        engine_cmd(self, self.type_name())
    }
}

/// Logistic regression with L2 regularization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub reg_lambda: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression {
            learning_rate: 0.9,
            reg_lambda: 1e-10,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        LogisticRegression::default()
    }

    pub fn with_reg_lambda(mut self, reg_lambda: f64) -> Self {
        self.reg_lambda = reg_lambda;
        self
    }
}

impl Predictor for LogisticRegression {
    fn type_name(&self) -> &str {
        "LogisticRegression"
    }

    fn is_classifier(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<(), PipelineError> {
        validate_positive(self.learning_rate, "learning_rate")?;
        validate_non_negative(self.reg_lambda, "reg_lambda")?;
        Ok(())
    }

    fn to_cmd(&self) -> Result<JsonValue, PipelineError> {
        self.validate()?;
        engine_cmd(self, self.type_name())
    }
}

/// Hyperparameters of the XGBoost predictors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostParams {
    pub booster: String,
    pub colsample_bylevel: f64,
    pub colsample_bytree: f64,
    pub early_stopping_rounds: usize,
    pub external_memory: bool,
    pub gamma: f64,
    pub learning_rate: f64,
    pub max_delta_step: f64,
    pub max_depth: usize,
    pub min_child_weights: f64,
    pub n_estimators: usize,
    pub n_jobs: usize,
    pub normalize_type: String,
    pub num_parallel_tree: usize,
    pub objective: String,
    pub one_drop: bool,
    pub rate_drop: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    pub sample_type: String,
    pub silent: bool,
    pub skip_drop: f64,
    pub subsample: f64,
}

impl XGBoostParams {
    fn with_objective(objective: &str) -> Self {
        XGBoostParams {
            booster: "gbtree".to_string(),
            colsample_bylevel: 1.0,
            colsample_bytree: 1.0,
            early_stopping_rounds: 10,
            external_memory: false,
            gamma: 0.0,
            learning_rate: 0.1,
            max_delta_step: 0.0,
            max_depth: 3,
            min_child_weights: 1.0,
            n_estimators: 100,
            n_jobs: 1,
            normalize_type: "tree".to_string(),
            num_parallel_tree: 1,
            objective: objective.to_string(),
            one_drop: false,
            rate_drop: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            sample_type: "uniform".to_string(),
            silent: true,
            skip_drop: 0.0,
            subsample: 1.0,
        }
    }

    fn validate(&self, objectives: &[&str]) -> Result<(), PipelineError> {
        if !["gbtree", "gblinear", "dart"].contains(&self.booster.as_str()) {
            return Err(PipelineError::InvalidArgument(
                "'booster' must either be 'gbtree', 'gblinear', or 'dart'".to_string(),
            ));
        }

        if !["forest", "tree"].contains(&self.normalize_type.as_str()) {
            return Err(PipelineError::InvalidArgument(
                "'normalize_type' must either be 'forest' or 'tree'".to_string(),
            ));
        }

        if !["uniform", "weighted"].contains(&self.sample_type.as_str()) {
            return Err(PipelineError::InvalidArgument(
                "'sample_type' must either be 'uniform' or 'weighted'".to_string(),
            ));
        }

        check_objective(&self.objective, objectives)?;

        validate_range(self.colsample_bylevel, 0.0, 1.0, "colsample_bylevel")?;
        validate_range(self.colsample_bytree, 0.0, 1.0, "colsample_bytree")?;
        validate_non_negative(self.gamma, "gamma")?;
        validate_range(self.learning_rate, 0.0, 1.0, "learning_rate")?;
        validate_non_negative(self.max_delta_step, "max_delta_step")?;
        validate_non_negative(self.min_child_weights, "min_child_weights")?;
        validate_range(self.rate_drop, 0.0, 1.0, "rate_drop")?;
        validate_non_negative(self.reg_alpha, "reg_alpha")?;
        validate_non_negative(self.reg_lambda, "reg_lambda")?;
        validate_range(self.skip_drop, 0.0, 1.0, "skip_drop")?;
        validate_range(self.subsample, 0.0, 1.0, "subsample")?;

        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidArgument(
                "'n_estimators' must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Hyperparameters of the ScaleGBM predictors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleGBMParams {
    pub colsample_bylevel: f64,
    pub colsample_bytree: f64,
    pub early_stopping_rounds: usize,
    pub gamma: f64,
    pub goss_a: f64,
    pub goss_b: f64,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weights: f64,
    pub n_estimators: usize,
    pub n_jobs: usize,
    pub objective: String,
    pub reg_lambda: f64,
    pub seed: u64,
}

impl ScaleGBMParams {
    fn with_objective(objective: &str) -> Self {
        ScaleGBMParams {
            colsample_bylevel: 1.0,
            colsample_bytree: 1.0,
            early_stopping_rounds: 10,
            gamma: 0.0,
            goss_a: 1.0,
            goss_b: 0.0,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weights: 1.0,
            n_estimators: 100,
            n_jobs: 1,
            objective: objective.to_string(),
            reg_lambda: 1.0,
            seed: 5843,
        }
    }

    fn validate(&self, objectives: &[&str]) -> Result<(), PipelineError> {
        check_objective(&self.objective, objectives)?;

        validate_range(self.colsample_bylevel, 0.0, 1.0, "colsample_bylevel")?;
        validate_range(self.colsample_bytree, 0.0, 1.0, "colsample_bytree")?;
        validate_non_negative(self.gamma, "gamma")?;
        validate_range(self.goss_a, 0.0, 1.0, "goss_a")?;
        validate_range(self.goss_b, 0.0, 1.0, "goss_b")?;
        validate_range(self.learning_rate, 0.0, 1.0, "learning_rate")?;
        validate_non_negative(self.min_child_weights, "min_child_weights")?;
        validate_non_negative(self.reg_lambda, "reg_lambda")?;

        if self.goss_a + self.goss_b > 1.0 {
            return Err(PipelineError::InvalidArgument(
                "'goss_a' and 'goss_b' must not add up to more than 1".to_string(),
            ));
        }

        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidArgument(
                "'n_estimators' must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_objective(objective: &str, objectives: &[&str]) -> Result<(), PipelineError> {
    if objectives.contains(&objective) {
        Ok(())
    } else {
        Err(PipelineError::InvalidArgument(format!(
            "'objective' must be one of {}, got '{}'",
            objectives.join(", "),
            objective
        )))
    }
}

/// Define a gradient boosting predictor wrapping a parameter struct.
macro_rules! define_gbm {
    ($name:ident, $params:ident, $objective:literal, $objectives:ident, $classifier:literal) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name {
            pub params: $params,
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    params: $params::with_objective($objective),
                }
            }
        }

        impl $name {
            pub fn new() -> Self {
                $name::default()
            }

            pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
                self.params.learning_rate = learning_rate;
                self
            }

            pub fn with_max_depth(mut self, max_depth: usize) -> Self {
                self.params.max_depth = max_depth;
                self
            }

            pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
                self.params.n_estimators = n_estimators;
                self
            }

            pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
                self.params.n_jobs = n_jobs;
                self
            }

            pub fn with_objective(mut self, objective: &str) -> Self {
                self.params.objective = objective.to_string();
                self
            }

            pub fn with_reg_lambda(mut self, reg_lambda: f64) -> Self {
                self.params.reg_lambda = reg_lambda;
                self
            }
        }

        impl Predictor for $name {
            fn type_name(&self) -> &str {
                stringify!($name)
            }

            fn is_classifier(&self) -> bool {
                $classifier
            }

            fn validate(&self) -> Result<(), PipelineError> {
                self.params.validate(&$objectives)
            }

            fn to_cmd(&self) -> Result<JsonValue, PipelineError> {
                self.validate()?;
                engine_cmd(self, self.type_name())
            }
        }
    };
}

define_gbm!(XGBoostClassifier, XGBoostParams, "binary:logistic", CLASSIFICATION_OBJECTIVES, true);
define_gbm!(XGBoostRegressor, XGBoostParams, "reg:squarederror", REGRESSION_OBJECTIVES, false);
define_gbm!(ScaleGBMClassifier, ScaleGBMParams, "binary:logistic", CLASSIFICATION_OBJECTIVES, true);
define_gbm!(ScaleGBMRegressor, ScaleGBMParams, "reg:squarederror", REGRESSION_OBJECTIVES, false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xgboost_cmd() {
        let cmd = XGBoostClassifier::new().with_n_estimators(50).to_cmd().unwrap();

        assert_eq!(cmd["type_"], "XGBoostClassifier");
        assert_eq!(cmd["n_estimators_"], 50);
        assert_eq!(cmd["objective_"], "binary:logistic");
        assert_eq!(cmd["booster_"], "gbtree");
    }

    #[test]
    fn test_objective_must_match_problem() {
        assert!(XGBoostRegressor::new().with_objective("binary:logistic").validate().is_err());
        assert!(ScaleGBMClassifier::new().with_objective("reg:squarederror").validate().is_err());
        assert!(ScaleGBMRegressor::new().validate().is_ok());
    }

    #[test]
    fn test_classifier_flags() {
        assert!(LogisticRegression::new().is_classifier());
        assert!(!LinearRegression::new().is_classifier());
        assert!(XGBoostClassifier::new().is_classifier());
        assert!(!ScaleGBMRegressor::new().is_classifier());
    }

    #[test]
    fn test_linear_regression_cmd() {
        let cmd = LinearRegression::new().with_reg_lambda(0.5).to_cmd().unwrap();

        assert_eq!(cmd["type_"], "LinearRegression");
        assert_eq!(cmd["reg_lambda_"], 0.5);
        assert!(LinearRegression::new().with_reg_lambda(-1.0).validate().is_err());
    }
}

// Feature learners: FastProp and Multirel
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{
    check_aggregations, engine_cmd, Aggregation, LossFunction, PipelineError, FASTPROP_DEFAULT,
    MULTIREL_ALL, MULTIREL_DEFAULT,
};
use crate::utils::{validate_non_negative, validate_positive, validate_range};

/// An algorithm that learns features from relational data
pub trait FeatureLearner: fmt::Debug {
    /// The name the engine knows the algorithm by
    fn type_name(&self) -> &str;

    /// The loss function set on the learner itself
    fn loss_function(&self) -> Option<LossFunction>;

    /// Check the hyperparameters locally
    fn validate(&self) -> Result<(), PipelineError>;

    /// The engine command, with `fallback` standing in for an unset loss function
    fn to_cmd(&self, fallback: LossFunction) -> Result<JsonValue, PipelineError>;
}

/// Propositionalization: generates many simple aggregation features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastProp {
    pub aggregation: Vec<Aggregation>,
    pub delta_t: f64,
    pub loss_function: Option<LossFunction>,
    pub max_lag: usize,
    pub min_df: usize,
    pub n_most_frequent: usize,
    pub num_features: usize,
    pub num_threads: usize,
    pub sampling_factor: f64,
    pub silent: bool,
    pub vocab_size: usize,
}

impl Default for FastProp {
    fn default() -> Self {
        FastProp {
            aggregation: FASTPROP_DEFAULT.to_vec(),
            delta_t: 0.0,
            loss_function: None,
            max_lag: 0,
            min_df: 30,
            n_most_frequent: 0,
            num_features: 200,
            num_threads: 0,
            sampling_factor: 1.0,
            silent: true,
            vocab_size: 500,
        }
    }
}

impl FastProp {
    /// Create a new FastProp with the engine defaults
    pub fn new() -> Self {
        FastProp::default()
    }

    pub fn with_aggregation(mut self, aggregation: &[Aggregation]) -> Self {
        self.aggregation = aggregation.to_vec();
        self
    }

    pub fn with_loss_function(mut self, loss_function: LossFunction) -> Self {
        self.loss_function = Some(loss_function);
        self
    }

    /// Lag features every `delta_t` seconds, up to `max_lag` of them
    pub fn with_lags(mut self, delta_t: f64, max_lag: usize) -> Self {
        self.delta_t = delta_t;
        self.max_lag = max_lag;
        self
    }

    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }

    pub fn with_n_most_frequent(mut self, n_most_frequent: usize) -> Self {
        self.n_most_frequent = n_most_frequent;
        self
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_sampling_factor(mut self, sampling_factor: f64) -> Self {
        self.sampling_factor = sampling_factor;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }
}

impl FeatureLearner for FastProp {
    fn type_name(&self) -> &str {
        "FastProp"
    }

    fn loss_function(&self) -> Option<LossFunction> {
        self.loss_function
    }

    fn validate(&self) -> Result<(), PipelineError> {
        check_aggregations(&self.aggregation, Aggregation::ALL, "FastProp")?;
        validate_non_negative(self.delta_t, "delta_t")?;
        validate_non_negative(self.sampling_factor, "sampling_factor")?;

        if self.num_features == 0 {
            return Err(PipelineError::InvalidArgument(
                "'num_features' must be at least 1".to_string(),
            ));
        }

        if (self.delta_t > 0.0) != (self.max_lag > 0) {
            return Err(PipelineError::InvalidArgument(
                "If you pass a non-zero value to delta_t, you must also pass a non-zero value to max_lag and vice-versa."
                    .to_string(),
            ));
        }

        Ok(())
    }

    fn to_cmd(&self, fallback: LossFunction) -> Result<JsonValue, PipelineError> {
        self.validate()?;

        let mut learner = self.clone();
        learner.loss_function.get_or_insert(fallback);

        engine_cmd(&learner, self.type_name())
    }
}

/// Multi-relational decision tree learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multirel {
    pub aggregation: Vec<Aggregation>,
    pub allow_sets: bool,
    pub delta_t: f64,
    pub grid_factor: f64,
    pub loss_function: Option<LossFunction>,
    pub max_length: usize,
    pub min_df: usize,
    pub min_num_samples: usize,
    pub num_features: usize,
    pub num_subfeatures: usize,
    pub num_threads: usize,
    #[serde(skip)]
    pub propositionalization: FastProp,
    pub regularization: f64,
    pub round_robin: bool,
    pub sampling_factor: f64,
    pub seed: u64,
    pub share_aggregations: f64,
    pub share_conditions: f64,
    pub shrinkage: f64,
    pub silent: bool,
    pub vocab_size: usize,
}

impl Default for Multirel {
    fn default() -> Self {
        Multirel {
            aggregation: MULTIREL_DEFAULT.to_vec(),
            allow_sets: true,
            delta_t: 0.0,
            grid_factor: 1.0,
            loss_function: None,
            max_length: 4,
            min_df: 30,
            min_num_samples: 1,
            num_features: 100,
            num_subfeatures: 5,
            num_threads: 0,
            propositionalization: FastProp::default(),
            regularization: 0.01,
            round_robin: false,
            sampling_factor: 1.0,
            seed: 5543,
            share_aggregations: 0.0,
            share_conditions: 1.0,
            shrinkage: 0.0,
            silent: true,
            vocab_size: 500,
        }
    }
}

impl Multirel {
    /// Create a new Multirel with the engine defaults
    pub fn new() -> Self {
        Multirel::default()
    }

    pub fn with_aggregation(mut self, aggregation: &[Aggregation]) -> Self {
        self.aggregation = aggregation.to_vec();
        self
    }

    pub fn with_loss_function(mut self, loss_function: LossFunction) -> Self {
        self.loss_function = Some(loss_function);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    pub fn with_num_subfeatures(mut self, num_subfeatures: usize) -> Self {
        self.num_subfeatures = num_subfeatures;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// The FastProp used to turn subfeatures into columns
    pub fn with_propositionalization(mut self, propositionalization: FastProp) -> Self {
        self.propositionalization = propositionalization;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_sampling_factor(mut self, sampling_factor: f64) -> Self {
        self.sampling_factor = sampling_factor;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_share_aggregations(mut self, share_aggregations: f64) -> Self {
        self.share_aggregations = share_aggregations;
        self
    }

    pub fn with_share_conditions(mut self, share_conditions: f64) -> Self {
        self.share_conditions = share_conditions;
        self
    }

    pub fn with_shrinkage(mut self, shrinkage: f64) -> Self {
        self.shrinkage = shrinkage;
        self
    }
}

impl FeatureLearner for Multirel {
    fn type_name(&self) -> &str {
        "Multirel"
    }

    fn loss_function(&self) -> Option<LossFunction> {
        self.loss_function
    }

    fn validate(&self) -> Result<(), PipelineError> {
        check_aggregations(&self.aggregation, MULTIREL_ALL, "Multirel")?;
        validate_non_negative(self.delta_t, "delta_t")?;
        validate_positive(self.grid_factor, "grid_factor")?;
        validate_non_negative(self.regularization, "regularization")?;
        validate_non_negative(self.sampling_factor, "sampling_factor")?;
        validate_range(self.share_aggregations, 0.0, 1.0, "share_aggregations")?;
        validate_range(self.share_conditions, 0.0, 1.0, "share_conditions")?;
        validate_range(self.shrinkage, 0.0, 1.0, "shrinkage")?;

        if self.num_features == 0 {
            return Err(PipelineError::InvalidArgument(
                "'num_features' must be at least 1".to_string(),
            ));
        }

        self.propositionalization.validate()
    }

    fn to_cmd(&self, fallback: LossFunction) -> Result<JsonValue, PipelineError> {
        self.validate()?;

        let mut learner = self.clone();
        let loss_function = *learner.loss_function.get_or_insert(fallback);

        let mut cmd = engine_cmd(&learner, self.type_name())?;
        cmd["propositionalization_"] = self.propositionalization.to_cmd(loss_function)?;

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastprop_defaults() {
        let cmd = FastProp::new().to_cmd(LossFunction::SquareLoss).unwrap();

        assert_eq!(cmd["type_"], "FastProp");
        assert_eq!(cmd["num_features_"], 200);
        assert_eq!(cmd["min_df_"], 30);
        assert_eq!(cmd["loss_function_"], "SquareLoss");
        assert_eq!(cmd["aggregation_"].as_array().unwrap().len(), 13);
    }

    #[test]
    fn test_fastprop_lags_go_together() {
        assert!(FastProp::new().with_lags(3600.0, 0).validate().is_err());
        assert!(FastProp::new().with_lags(0.0, 5).validate().is_err());
        assert!(FastProp::new().with_lags(3600.0, 5).validate().is_ok());
        assert!(FastProp::new().with_num_features(0).validate().is_err());
    }

    #[test]
    fn test_multirel_propagates_loss_function() {
        let multirel = Multirel::new().with_loss_function(LossFunction::CrossEntropyLoss);

        let cmd = multirel.to_cmd(LossFunction::SquareLoss).unwrap();

        assert_eq!(cmd["loss_function_"], "CrossEntropyLoss");
        assert_eq!(cmd["propositionalization_"]["type_"], "FastProp");
        assert_eq!(cmd["propositionalization_"]["loss_function_"], "CrossEntropyLoss");
        assert_eq!(cmd["seed_"], 5543);
    }

    #[test]
    fn test_multirel_rejects_fastprop_only_aggregations() {
        let multirel = Multirel::new().with_aggregation(&[Aggregation::Avg, Aggregation::Trend]);

        assert!(matches!(multirel.validate(), Err(PipelineError::InvalidArgument(_))));
        assert!(Multirel::new().with_shrinkage(1.5).validate().is_err());
    }
}

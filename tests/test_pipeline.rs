// Pipeline configuration tests
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;

use serde_json::json;

use getml_client::{
    data::{DataFrame, DataModel, JoinOptions, Placeholder, Role, Roles, Table},
    pipeline::{
        Aggregation, FastProp, FeatureLearner, LinearRegression, LossFunction, Mapping, Multirel, Pipeline,
        PipelineError, Predictor, Seasonal, XGBoostClassifier, XGBoostRegressor,
    },
};

fn data_model() -> DataModel {
    let population = Placeholder::new(
        "loans",
        Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::TimeStamp, &["date"])
            .with(Role::Target, &["default"]),
    );

    let mut dm = DataModel::new(population);

    let roles = Roles::new()
        .with(Role::JoinKey, &["account_id"])
        .with(Role::TimeStamp, &["date"]);
    let trans = dm.add(Placeholder::new("trans", roles.clone()));
    let orders = dm.add(Placeholder::new("order", roles.clone()));
    let meta = dm.add(Placeholder::new("meta", roles));

    dm.join(dm.population(), trans, JoinOptions::new().on("account_id").time_stamps("date"))
        .unwrap();
    dm.join(dm.population(), orders, JoinOptions::new().on("account_id")).unwrap();
    dm.join(trans, meta, JoinOptions::new().on("account_id")).unwrap();

    dm
}

#[test]
fn test_pipeline_command() {
    let pipe = Pipeline::new(data_model())
        .with_preprocessor(Seasonal::new())
        .with_feature_learner(FastProp::new())
        .with_predictor(XGBoostClassifier::new())
        .loss_function(LossFunction::CrossEntropyLoss)
        .with_tags(&["baseline"]);

    let cmd = pipe.to_cmd("abc123").unwrap();

    // Step 1: identity and settings
    assert_eq!(cmd["type_"], "Pipeline");
    assert_eq!(cmd["name_"], "abc123");
    assert_eq!(cmd["tags_"], json!(["baseline"]));
    assert_eq!(cmd["share_selected_features_"], 0.5);

    // Step 2: the learner inherits the pipeline's loss function
    assert_eq!(cmd["feature_learners_"][0]["type_"], "FastProp");
    assert_eq!(cmd["feature_learners_"][0]["loss_function_"], "CrossEntropyLoss");
    assert_eq!(cmd["predictors_"][0]["type_"], "XGBoostClassifier");
    assert_eq!(cmd["predictors_"][0]["objective_"], "binary:logistic");
    assert_eq!(cmd["preprocessors_"][0]["type_"], "Seasonal");

    // Step 3: peripheral placeholders are inferred, sorted by name
    let names: Vec<_> = cmd["peripheral_"]
        .as_array()
        .unwrap()
        .iter()
        .map(|ph| ph["name_"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["meta", "order", "trans"]);

    // Step 4: the data model is nested
    assert_eq!(cmd["data_model_"]["name_"], "loans");
    assert_eq!(cmd["data_model_"]["joined_tables_"].as_array().unwrap().len(), 2);
}

#[test]
fn test_loss_function_from_feature_learner() {
    let pipe = Pipeline::new(data_model())
        .with_feature_learner(Multirel::new().with_loss_function(LossFunction::CrossEntropyLoss))
        .with_feature_learner(FastProp::new());

    assert_eq!(pipe.effective_loss_function(), LossFunction::CrossEntropyLoss);

    let plain = Pipeline::new(data_model()).with_feature_learner(FastProp::new());
    assert_eq!(plain.effective_loss_function(), LossFunction::SquareLoss);
    assert!(!plain.is_classification().unwrap());
}

#[test]
fn test_mixing_classification_and_regression() {
    let mixed = Pipeline::new(data_model())
        .loss_function(LossFunction::SquareLoss)
        .with_feature_learner(FastProp::new())
        .with_predictor(XGBoostClassifier::new());

    let err = mixed.validate().unwrap_err();
    assert!(err.to_string().contains("mixing classification and regression"));

    let regression = Pipeline::new(data_model())
        .with_feature_learner(FastProp::new())
        .with_feature_selector(XGBoostRegressor::new())
        .with_predictor(LinearRegression::new());
    assert!(regression.validate().is_ok());
}

#[test]
fn test_hyperparameters_are_checked_locally() {
    // A lag needs both delta_t and max_lag
    assert!(FastProp::new().with_lags(3600.0, 0).validate().is_err());
    assert!(FastProp::new().with_lags(3600.0, 5).validate().is_ok());

    // Multirel does not know every aggregation
    let multirel = Multirel::new().with_aggregation(&[Aggregation::Trend]);
    assert!(matches!(multirel.validate(), Err(PipelineError::InvalidArgument(_))));

    // Objectives must fit the predictor
    let xgb = XGBoostClassifier::new().with_objective("reg:squarederror");
    assert!(xgb.validate().is_err());

    // Invalid settings surface through the pipeline
    let pipe = Pipeline::new(data_model()).with_preprocessor(Mapping::new().with_aggregation(&[]));
    assert!(pipe.validate().is_err());
    assert!(pipe.to_cmd("abc123").is_err());

    let pipe = Pipeline::new(data_model()).share_selected_features(1.5);
    assert!(pipe.validate().is_err());
}

#[test]
fn test_order_peripheral_tables() {
    let pipe = Pipeline::new(data_model());

    let mut tables = BTreeMap::new();
    for name in ["trans", "meta", "order"] {
        tables.insert(name.to_string(), Table::from(DataFrame::new(name, Roles::new()).unwrap()));
    }

    let ordered = pipe.order_peripheral(&tables).unwrap();
    let names: Vec<_> = ordered.iter().map(|t| t.name().to_string()).collect();
    assert_eq!(names, vec!["meta", "order", "trans"]);

    tables.remove("meta");
    assert!(pipe.order_peripheral(&tables).is_err());
}

#[test]
fn test_explicit_peripheral_overrides_inference() {
    let pipe = Pipeline::new(data_model()).with_peripheral(vec![Placeholder::new("trans", Roles::new())]);

    assert_eq!(pipe.peripheral_names().unwrap(), vec!["trans"]);
}

#[test]
fn test_remote_calls_need_a_fitted_pipeline() {
    let pipe = Pipeline::new(data_model());
    let session = getml_client::Session::new("127.0.0.1", 1);

    assert!(!pipe.is_fitted());
    assert!(matches!(pipe.features(&session), Err(PipelineError::NotFitted(_))));
    assert!(matches!(pipe.scores(), Err(PipelineError::NotFitted(_))));
}

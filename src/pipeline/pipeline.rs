// Pipeline: the configuration the engine fits, and the commands run against it
// Author: Gabriel Demetrios Lafis

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value as JsonValue};

use super::{
    strip_underscores, Columns, FeatureLearner, Features, LossFunction, PipelineError, Predictor,
    Preprocessor, Scores, SqlCode, SqlOptions, Tables,
};
use crate::comm::{handle_engine_exception, CommError, EngineSocket, FloatMatrix, Issues, Session, FOUND, SUCCESS};
use crate::data::{DataFrame, DataModel, Placeholder, PlaceholderGraph, Roles, Subset, Table};
use crate::utils::{validate_name, validate_range};

/// Length of the generated pipeline ids
pub const PIPELINE_ID_LENGTH: usize = 6;

/// Generate a fresh pipeline id
pub fn make_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PIPELINE_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// What a transform run should produce
#[derive(Debug, Clone, Default, PartialEq)]
struct TransformRequest {
    score: bool,
    predict: bool,
    df_name: String,
    table_name: String,
}

impl TransformRequest {
    /// Whether the result comes back as a float matrix
    fn returns_matrix(&self) -> bool {
        self.df_name.is_empty() && self.table_name.is_empty() && !self.score
    }
}

/// Feature learning and prediction on a relational data model
///
/// A pipeline is configured locally and only exists on the engine once it
/// has been fitted. Every remote operation other than `check` and `fit`
/// requires a fitted pipeline.
#[derive(Debug)]
pub struct Pipeline {
    id: Option<String>,
    data_model: DataModel,
    peripheral: Option<Vec<Placeholder>>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    feature_learners: Vec<Box<dyn FeatureLearner>>,
    feature_selectors: Vec<Box<dyn Predictor>>,
    predictors: Vec<Box<dyn Predictor>>,
    loss_function: Option<LossFunction>,
    tags: Vec<String>,
    include_categorical: bool,
    share_selected_features: f64,
    targets: Vec<String>,
    scores: JsonValue,
}

impl Pipeline {
    /// Create a new, unfitted pipeline
    pub fn new(data_model: DataModel) -> Self {
        Pipeline {
            id: None,
            data_model,
            peripheral: None,
            preprocessors: Vec::new(),
            feature_learners: Vec::new(),
            feature_selectors: Vec::new(),
            predictors: Vec::new(),
            loss_function: None,
            tags: Vec::new(),
            include_categorical: false,
            share_selected_features: 0.5,
            targets: Vec::new(),
            scores: JsonValue::Null,
        }
    }

    /// Override the peripheral placeholders inferred from the data model
    pub fn with_peripheral(mut self, peripheral: Vec<Placeholder>) -> Self {
        self.peripheral = Some(peripheral);
        self
    }

    /// Add a preprocessor
    pub fn with_preprocessor<P: Preprocessor + 'static>(mut self, preprocessor: P) -> Self {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Add a feature learner
    pub fn with_feature_learner<F: FeatureLearner + 'static>(mut self, feature_learner: F) -> Self {
        self.feature_learners.push(Box::new(feature_learner));
        self
    }

    /// Add a predictor used to select features
    pub fn with_feature_selector<P: Predictor + 'static>(mut self, feature_selector: P) -> Self {
        self.feature_selectors.push(Box::new(feature_selector));
        self
    }

    /// Add a predictor
    pub fn with_predictor<P: Predictor + 'static>(mut self, predictor: P) -> Self {
        self.predictors.push(Box::new(predictor));
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags.extend(tags.iter().map(|tag| tag.as_ref().to_string()));
        self
    }

    /// Pass categorical columns of the population table to the predictors
    pub fn include_categorical(mut self, include_categorical: bool) -> Self {
        self.include_categorical = include_categorical;
        self
    }

    /// Share of the features kept by the feature selectors
    pub fn share_selected_features(mut self, share: f64) -> Self {
        self.share_selected_features = share;
        self
    }

    /// Loss function for feature learners that set none themselves
    pub fn loss_function(mut self, loss_function: LossFunction) -> Self {
        self.loss_function = Some(loss_function);
        self
    }

    /// The engine id, once fitted
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_fitted(&self) -> bool {
        self.id.is_some()
    }

    pub fn data_model(&self) -> &DataModel {
        &self.data_model
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Targets the pipeline was fitted on
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Loss function in effect: the pipeline's own, else that of the first
    /// feature learner setting one, else `SquareLoss`
    pub fn effective_loss_function(&self) -> LossFunction {
        self.loss_function
            .or_else(|| self.feature_learners.iter().find_map(|fl| fl.loss_function()))
            .unwrap_or_default()
    }

    /// Peripheral placeholders: explicit ones, or one bare placeholder per
    /// distinct name joined into the population, sorted by name
    pub fn peripheral(&self) -> Result<Vec<Placeholder>, PipelineError> {
        if let Some(peripheral) = &self.peripheral {
            return Ok(peripheral.clone());
        }

        let graph = self.data_model.graph();
        let population = self.data_model.population();

        let names = graph
            .to_list(population)?
            .into_iter()
            .filter(|id| *id != population)
            .map(|id| graph.placeholder(id).map(|ph| ph.name().to_string()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(names.iter().map(|name| Placeholder::new(name, Roles::new())).collect())
    }

    /// Names of the peripheral placeholders, in the order peripheral tables are expected
    pub fn peripheral_names(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self.peripheral()?.iter().map(|ph| ph.name().to_string()).collect())
    }

    /// Order peripheral tables given by placeholder name
    pub fn order_peripheral(&self, tables: &BTreeMap<String, Table>) -> Result<Vec<Table>, PipelineError> {
        self.peripheral_names()?
            .into_iter()
            .map(|name| {
                tables.get(&name).cloned().ok_or_else(|| {
                    PipelineError::InvalidArgument(format!("No table passed for placeholder '{}'", name))
                })
            })
            .collect()
    }

    /// Whether the algorithms solve a classification problem; mixing
    /// classification and regression algorithms is an error
    pub fn check_classification_or_regression(&self) -> Result<bool, PipelineError> {
        let fallback = self.effective_loss_function();

        if self.feature_learners.is_empty() && self.feature_selectors.is_empty() && self.predictors.is_empty() {
            return Ok(fallback.is_classification());
        }

        let learner_is_classifier =
            |fl: &Box<dyn FeatureLearner>| fl.loss_function().unwrap_or(fallback).is_classification();

        let all_classifiers = self.feature_learners.iter().all(learner_is_classifier)
            && self.feature_selectors.iter().all(|p| p.is_classifier())
            && self.predictors.iter().all(|p| p.is_classifier());

        let all_regressors = self.feature_learners.iter().all(|fl| !learner_is_classifier(fl))
            && self.feature_selectors.iter().all(|p| !p.is_classifier())
            && self.predictors.iter().all(|p| !p.is_classifier());

        if all_classifiers {
            Ok(true)
        } else if all_regressors {
            Ok(false)
        } else {
            Err(PipelineError::InvalidArgument(
                "You are mixing classification and regression algorithms. Feature learners must consistently \
                 use classification loss functions (like CrossEntropyLoss) or regression loss functions \
                 (like SquareLoss), and feature selectors and predictors must consistently be classifiers \
                 (like XGBoostClassifier) or regressors (like LinearRegression)."
                    .to_string(),
            ))
        }
    }

    pub fn is_classification(&self) -> Result<bool, PipelineError> {
        self.check_classification_or_regression()
    }

    /// Check every component locally
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_range(self.share_selected_features, 0.0, 1.0, "share_selected_features")?;

        for tag in &self.tags {
            validate_name(tag, "tag")?;
        }

        for preprocessor in &self.preprocessors {
            preprocessor.validate()?;
        }

        for feature_learner in &self.feature_learners {
            feature_learner.validate()?;
        }

        for predictor in self.feature_selectors.iter().chain(&self.predictors) {
            predictor.validate()?;
        }

        self.check_classification_or_regression()?;

        Ok(())
    }

    /// The pipeline command under `id`
    pub fn to_cmd(&self, id: &str) -> Result<JsonValue, PipelineError> {
        let loss_function = self.effective_loss_function();

        let peripheral = self
            .peripheral()?
            .into_iter()
            .map(placeholder_cmd)
            .collect::<Result<Vec<_>, _>>()?;

        let preprocessors = self
            .preprocessors
            .iter()
            .map(|p| p.to_cmd())
            .collect::<Result<Vec<_>, _>>()?;

        let feature_learners = self
            .feature_learners
            .iter()
            .map(|fl| fl.to_cmd(loss_function))
            .collect::<Result<Vec<_>, _>>()?;

        let feature_selectors = self
            .feature_selectors
            .iter()
            .map(|p| p.to_cmd())
            .collect::<Result<Vec<_>, _>>()?;

        let predictors = self
            .predictors
            .iter()
            .map(|p| p.to_cmd())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({
            "type_": "Pipeline",
            "name_": id,
            "data_model_": self.data_model.to_cmd()?,
            "peripheral_": peripheral,
            "preprocessors_": preprocessors,
            "feature_learners_": feature_learners,
            "feature_selectors_": feature_selectors,
            "predictors_": predictors,
            "loss_function_": loss_function.as_str(),
            "tags_": self.tags,
            "include_categorical_": self.include_categorical,
            "share_selected_features_": self.share_selected_features,
        }))
    }

    fn require_id(&self) -> Result<&str, PipelineError> {
        self.id
            .as_deref()
            .ok_or_else(|| PipelineError::NotFitted("call fit() first".to_string()))
    }

    fn simple_cmd(type_: &str, id: &str) -> JsonValue {
        json!({ "type_": type_, "name_": id })
    }

    /// Send the configuration to the engine under a fresh id
    fn send(&self, session: &Session, additional_tags: &[String]) -> Result<String, PipelineError> {
        self.validate()?;

        let id = make_id();
        let mut cmd = self.to_cmd(&id)?;

        if let Some(JsonValue::Array(tags)) = cmd.get_mut("tags_") {
            tags.extend(additional_tags.iter().map(|tag| json!(tag)));
        }

        session.send(&cmd)?;

        Ok(id)
    }

    /// Commands for the data a pipeline runs on; stale views are reported first
    fn data_cmds(session: &Session, population: &Table, peripheral: &[Table]) -> Result<(JsonValue, JsonValue), PipelineError> {
        for table in std::iter::once(population).chain(peripheral) {
            table.check(session)?;
        }

        let peripheral = peripheral.iter().map(Table::to_cmd).collect::<Vec<_>>();
        Ok((population.to_cmd(), JsonValue::Array(peripheral)))
    }

    /// Check the data model against the data without fitting
    ///
    /// Returns the issues the engine found; an empty list means the check passed.
    pub fn check(&self, session: &Session, population: &Table, peripheral: &[Table]) -> Result<Issues, PipelineError> {
        let temp_id = self.send(session, &[])?;

        let result = Self::run_check(session, &temp_id, population, peripheral);
        let deleted = delete_pipeline(session, &temp_id, true);

        let issues = result?;
        deleted?;

        if issues.is_empty() {
            info!("Data model check: OK.");
        } else {
            warn!("The pipeline check generated {} issues.", issues.len());
        }

        Ok(issues)
    }

    fn run_check(session: &Session, id: &str, population: &Table, peripheral: &[Table]) -> Result<Issues, PipelineError> {
        let (population_df, peripheral_dfs) = Self::data_cmds(session, population, peripheral)?;

        let cmd = json!({
            "type_": "Pipeline.check",
            "name_": id,
            "population_df_": population_df,
            "peripheral_dfs_": peripheral_dfs,
        });

        let mut sock = session.send_and_expect(&cmd, FOUND)?;

        info!("Checking data model...");

        let msg = sock.log_loop()?;
        if msg != SUCCESS {
            return Ok(handle_engine_exception(msg)?);
        }

        Ok(sock.recv_issues()?)
    }

    /// Check the data, then fit the pipeline
    ///
    /// Issues found by the check are logged as warnings and do not stop the fit.
    /// Every fit creates a new pipeline on the engine; the previous id is replaced.
    pub fn fit(
        &mut self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        validation: Option<&Table>,
    ) -> Result<&mut Self, PipelineError> {
        let issues = self.check(session, population, peripheral)?;

        for issue in issues.iter() {
            warn!("{}", issue);
        }

        self.fit_unchecked(session, population, peripheral, validation)
    }

    /// Fit on a container subset, optionally validating on another one
    pub fn fit_subset(
        &mut self,
        session: &Session,
        subset: &Subset,
        validation: Option<&Subset>,
    ) -> Result<&mut Self, PipelineError> {
        let peripheral = self.order_peripheral(subset.peripheral())?;
        self.fit(session, subset.population(), &peripheral, validation.map(Subset::population))
    }

    /// Fit the pipeline without checking the data first
    pub fn fit_unchecked(
        &mut self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        validation: Option<&Table>,
    ) -> Result<&mut Self, PipelineError> {
        let (population_df, peripheral_dfs) = Self::data_cmds(session, population, peripheral)?;

        if let Some(validation) = validation {
            validation.check(session)?;
        }

        let id = self.send(session, &[])?;

        let mut cmd = json!({
            "type_": "Pipeline.fit",
            "name_": id,
            "population_df_": population_df,
            "peripheral_dfs_": peripheral_dfs,
        });

        if let Some(validation) = validation {
            cmd["validation_df_"] = validation.to_cmd();
        }

        let mut sock = session.send_and_expect(&cmd, FOUND)?;

        let msg = sock.log_loop()?;
        if !msg.contains("Trained") {
            return Err(CommError::Engine(msg).into());
        }

        info!("{}", msg);

        self.id = Some(id);
        self.save(session)?;
        self.refresh(session)
    }

    fn save(&self, session: &Session) -> Result<(), PipelineError> {
        let id = self.require_id()?;
        session.send(&Self::simple_cmd("Pipeline.save", id))?;
        Ok(())
    }

    fn run_transform(
        &self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        request: &TransformRequest,
    ) -> Result<(EngineSocket, Option<FloatMatrix>), PipelineError> {
        let id = self.require_id()?;
        self.validate()?;

        let (population_df, peripheral_dfs) = Self::data_cmds(session, population, peripheral)?;

        let outer = json!({ "type_": "Pipeline.transform", "name_": id, "http_request_": false });

        let mut sock = session.send_and_expect(&outer, FOUND)?;

        let inner = json!({
            "type_": "Pipeline.transform",
            "name_": id,
            "score_": request.score,
            "predict_": request.predict,
            "population_df_": population_df,
            "peripheral_dfs_": peripheral_dfs,
            "df_name_": request.df_name,
            "table_name_": request.table_name,
        });

        sock.send_json(&inner)?;

        let msg = sock.log_loop()?;
        if msg != SUCCESS {
            return Err(CommError::Engine(msg).into());
        }

        let matrix = if request.returns_matrix() {
            Some(sock.recv_float_matrix()?)
        } else {
            None
        };

        Ok((sock, matrix))
    }

    fn expect_matrix(result: Option<FloatMatrix>) -> Result<FloatMatrix, PipelineError> {
        result.ok_or_else(|| CommError::Protocol("The engine sent no float matrix".to_string()).into())
    }

    /// Generate the features as a float matrix
    pub fn transform(&self, session: &Session, population: &Table, peripheral: &[Table]) -> Result<FloatMatrix, PipelineError> {
        let (_, matrix) = self.run_transform(session, population, peripheral, &TransformRequest::default())?;
        Self::expect_matrix(matrix)
    }

    /// Generate the features into a new data frame on the engine
    pub fn transform_to_df(
        &self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        df_name: &str,
    ) -> Result<DataFrame, PipelineError> {
        validate_name(df_name, "df_name")?;

        let request = TransformRequest {
            df_name: df_name.to_string(),
            ..TransformRequest::default()
        };

        self.run_transform(session, population, peripheral, &request)?;

        let mut df = DataFrame::new(df_name, Roles::new())?;
        df.refresh(session)?;

        Ok(df)
    }

    /// Generate the features and write them to a table of the connected database
    pub fn transform_to_table(
        &self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        table_name: &str,
    ) -> Result<(), PipelineError> {
        validate_name(table_name, "table_name")?;

        let request = TransformRequest {
            table_name: table_name.to_string(),
            ..TransformRequest::default()
        };

        self.run_transform(session, population, peripheral, &request)?;

        Ok(())
    }

    /// Predict the targets
    pub fn predict(&self, session: &Session, population: &Table, peripheral: &[Table]) -> Result<FloatMatrix, PipelineError> {
        let request = TransformRequest {
            predict: true,
            ..TransformRequest::default()
        };

        let (_, matrix) = self.run_transform(session, population, peripheral, &request)?;
        Self::expect_matrix(matrix)
    }

    /// Predict the targets and write them to a table of the connected database
    pub fn predict_to_table(
        &self,
        session: &Session,
        population: &Table,
        peripheral: &[Table],
        table_name: &str,
    ) -> Result<(), PipelineError> {
        validate_name(table_name, "table_name")?;

        let request = TransformRequest {
            predict: true,
            table_name: table_name.to_string(),
            ..TransformRequest::default()
        };

        self.run_transform(session, population, peripheral, &request)?;

        Ok(())
    }

    /// Score the predictions against the targets in `population`
    pub fn score(&mut self, session: &Session, population: &Table, peripheral: &[Table]) -> Result<Scores, PipelineError> {
        let request = TransformRequest {
            score: true,
            predict: true,
            ..TransformRequest::default()
        };

        let (mut sock, _) = self.run_transform(session, population, peripheral, &request)?;

        sock.expect_success()?;
        let latest = sock.recv_json()?;
        drop(sock);

        debug!("Latest scores: {}", latest);

        self.refresh(session)?;
        self.save(session)?;

        self.scores()
    }

    /// Score on a container subset
    pub fn score_subset(&mut self, session: &Session, subset: &Subset) -> Result<Scores, PipelineError> {
        let peripheral = self.order_peripheral(subset.peripheral())?;
        self.score(session, subset.population(), &peripheral)
    }

    /// Re-read targets and scores from the engine
    pub fn refresh(&mut self, session: &Session) -> Result<&mut Self, PipelineError> {
        let id = self.require_id()?;

        let mut sock = session.send_and_get_socket(&Self::simple_cmd("Pipeline.refresh", id))?;
        let msg = sock.recv_string()?;

        if !msg.starts_with('{') {
            return Err(CommError::Engine(msg).into());
        }

        let obj: JsonValue = serde_json::from_str(&msg)?;

        self.targets = obj
            .get("targets")
            .and_then(JsonValue::as_array)
            .map(|targets| targets.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        self.scores = strip_underscores(obj.get("scores").unwrap_or(&JsonValue::Null));

        Ok(self)
    }

    /// Score history of the pipeline
    pub fn scores(&self) -> Result<Scores, PipelineError> {
        self.require_id()?;
        Scores::from_json(&self.scores, &self.targets, self.is_classification()?)
    }

    /// Whether the pipeline has been scored
    pub fn is_scored(&self) -> bool {
        self.scores.as_object().map(|obj| obj.len() > 1).unwrap_or(false)
    }

    /// Delete the pipeline from the engine
    pub fn delete(&mut self, session: &Session, mem_only: bool) -> Result<(), PipelineError> {
        let id = self.require_id()?;
        delete_pipeline(session, id, mem_only)?;
        self.id = None;
        Ok(())
    }

    /// Allow or revoke serving the pipeline through the engine's HTTP endpoint
    pub fn deploy(&self, session: &Session, deploy: bool) -> Result<(), PipelineError> {
        let id = self.require_id()?;
        self.validate()?;

        session.send(&json!({ "type_": "Pipeline.deploy", "name_": id, "deploy_": deploy }))?;

        self.save(session)
    }

    /// The learned features
    pub fn features(&self, session: &Session) -> Result<Features, PipelineError> {
        Features::load(session, self.require_id()?, &self.targets)
    }

    /// The input columns and their importances
    pub fn columns(&self, session: &Session) -> Result<Columns, PipelineError> {
        Columns::load(session, self.require_id()?, &self.targets)
    }

    /// The importances summed per table
    pub fn tables(&self, session: &Session) -> Result<Tables, PipelineError> {
        let columns = self.columns(session)?;
        Ok(Tables::from_columns(&columns, &self.targets))
    }

    /// The features transpiled to SQL
    pub fn to_sql(&self, session: &Session, options: &SqlOptions) -> Result<SqlCode, PipelineError> {
        SqlCode::load(session, self.require_id()?, options)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let population = self
            .data_model
            .placeholder(self.data_model.population())
            .map(|ph| ph.name().to_string())
            .unwrap_or_default();

        let names = |types: Vec<&str>| format!("[{}]", types.join(", "));

        writeln!(f, "Pipeline(data_model='{}',", population)?;
        writeln!(f, "         feature_learners={},", names(self.feature_learners.iter().map(|x| x.type_name()).collect()))?;
        writeln!(f, "         feature_selectors={},", names(self.feature_selectors.iter().map(|x| x.type_name()).collect()))?;
        writeln!(f, "         include_categorical={},", self.include_categorical)?;
        writeln!(f, "         loss_function={},", self.effective_loss_function())?;
        writeln!(f, "         peripheral={},", names(self.peripheral_names().unwrap_or_default().iter().map(String::as_str).collect()))?;
        writeln!(f, "         predictors={},", names(self.predictors.iter().map(|x| x.type_name()).collect()))?;
        writeln!(f, "         preprocessors={},", names(self.preprocessors.iter().map(|x| x.type_name()).collect()))?;
        writeln!(f, "         share_selected_features={},", self.share_selected_features)?;
        write!(f, "         tags={:?})", self.tags)?;

        if let Some(id) = &self.id {
            write!(f, "\n\nid: {}", id)?;
        }

        Ok(())
    }
}

fn placeholder_cmd(placeholder: Placeholder) -> Result<JsonValue, PipelineError> {
    let mut graph = PlaceholderGraph::new();
    let id = graph.add(placeholder);
    Ok(graph.to_cmd(id)?)
}

/// Delete the pipeline called `id` from the engine
pub fn delete_pipeline(session: &Session, id: &str, mem_only: bool) -> Result<(), PipelineError> {
    session.send(&json!({ "type_": "Pipeline.delete", "name_": id, "mem_only_": mem_only }))?;
    Ok(())
}

// Round trips against a scripted engine
// Author: Gabriel Demetrios Lafis

mod common;

use common::{float_matrix, reply, reply_twice, FakeEngine};

use getml_client::{
    comm::{CommError, Session},
    data::{Container, DataFrame, DataModel, Freshness, JoinOptions, Role, Roles, StarSchema, Table},
    pipeline::{FastProp, LossFunction, Pipeline, PipelineError, XGBoostClassifier},
    project,
};

fn session(engine: &FakeEngine) -> Session {
    Session::new("127.0.0.1", engine.port).with_monitor_port(engine.port)
}

fn loans() -> DataFrame {
    let roles = Roles::new()
        .with(Role::JoinKey, &["account_id"])
        .with(Role::Target, &["default"])
        .with(Role::Numerical, &["amount"]);

    DataFrame::new("loans", roles).unwrap()
}

fn trans() -> DataFrame {
    let roles = Roles::new()
        .with(Role::JoinKey, &["account_id"])
        .with(Role::Numerical, &["balance"]);

    DataFrame::new("trans", roles).unwrap()
}

fn pipeline() -> Pipeline {
    let mut data_model = DataModel::new(loans().to_placeholder(None));
    let trans = data_model.add(trans().to_placeholder(None));
    data_model
        .join(data_model.population(), trans, JoinOptions::new().on("account_id"))
        .unwrap();

    Pipeline::new(data_model)
        .loss_function(LossFunction::CrossEntropyLoss)
        .with_feature_learner(FastProp::new())
        .with_predictor(XGBoostClassifier::new())
}

#[test]
fn test_nrows_round_trip() {
    let engine = FakeEngine::start(vec![reply(&["Found!", "42"])]);
    let session = session(&engine);

    let nrows = loans().nrows(&session).unwrap();

    assert_eq!(nrows, 42);

    let commands = engine.finish();
    assert_eq!(commands[0]["type_"], "DataFrame.nrows");
    assert_eq!(commands[0]["name_"], "loans");
}

#[test]
fn test_engine_error_is_carried_verbatim() {
    let engine = FakeEngine::start(vec![reply(&["DataFrame 'loans' does not exist!"])]);
    let session = session(&engine);

    let err = loans().nrows(&session).unwrap_err();

    assert!(err.to_string().contains("does not exist"));
    assert!(!err.is_local());
    engine.finish();
}

#[test]
fn test_connection_error() {
    // Bind and drop a listener to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let session = Session::new("127.0.0.1", port);

    assert!(!session.is_alive());
    assert!(matches!(session.project_name(), Err(CommError::Connection(_))));
}

#[test]
fn test_fit_and_predict() {
    let refresh = r#"{"obj": {}, "scores": {"history_": []}, "targets": ["default"]}"#;

    let issues = r#"{"warnings_": []}"#;

    let engine = FakeEngine::start(vec![
        // Step 1: the data is checked with a temporary pipeline
        reply(&["Success!"]),
        reply(&["Found!", "log: Checking...", "Success!", issues]),
        reply(&["Success!"]),
        // Step 2: the pipeline itself
        reply(&["Success!"]),
        // Step 3: fitting, with progress lines
        reply(&["Found!", "log: Staging...", "log: Progress: 50%", "log: Progress: 100%", "Trained pipeline."]),
        // Step 4: save and refresh
        reply(&["Success!"]),
        reply(&[refresh]),
        // Step 5: predict
        reply_twice(&["Found!"], &["log: Predicting...", "Success!"], float_matrix(2, 1, &[0.25, 0.75])),
    ]);
    let session = session(&engine);

    let mut pipe = pipeline();
    let population = Table::from(loans());
    let peripheral = vec![Table::from(trans())];

    pipe.fit(&session, &population, &peripheral, None).unwrap();

    assert!(pipe.is_fitted());
    assert_eq!(pipe.targets(), &["default".to_string()]);

    let predictions = pipe.predict(&session, &population, &peripheral).unwrap();

    assert_eq!(predictions.shape(), (2, 1));
    assert_eq!(predictions.column(0), Some(vec![0.25, 0.75]));

    let commands = engine.finish();
    let id = pipe.id().unwrap();

    assert_eq!(commands[1]["type_"], "Pipeline.check");
    assert_eq!(commands[2]["type_"], "Pipeline.delete");
    assert_eq!(commands[2]["name_"], commands[0]["name_"]);
    assert_ne!(commands[0]["name_"], id);

    assert_eq!(commands[3]["type_"], "Pipeline");
    assert_eq!(commands[3]["name_"], id);
    assert_eq!(commands[3]["loss_function_"], "CrossEntropyLoss");
    assert_eq!(commands[3]["peripheral_"][0]["name_"], "trans");
    assert_eq!(commands[4]["type_"], "Pipeline.fit");
    assert_eq!(commands[4]["population_df_"]["name_"], "loans");
    assert_eq!(commands[5]["type_"], "Pipeline.save");
    assert_eq!(commands[6]["type_"], "Pipeline.refresh");
    assert_eq!(commands[7]["type_"], "Pipeline.transform");
    assert_eq!(commands[7]["http_request_"], false);
}

#[test]
fn test_failed_fit_leaves_pipeline_unfitted() {
    let engine = FakeEngine::start(vec![
        reply(&["Success!"]),
        reply(&["Found!", "log: Staging...", "Column 'account_id' has no join key role."]),
    ]);
    let session = session(&engine);

    let mut pipe = pipeline();
    let result = pipe.fit_unchecked(&session, &Table::from(loans()), &[Table::from(trans())], None);

    match result {
        Err(PipelineError::Comm(CommError::Engine(msg))) => assert!(msg.contains("join key")),
        other => panic!("expected an engine error, got {:?}", other),
    }

    assert!(!pipe.is_fitted());
    engine.finish();
}

#[test]
fn test_check_deletes_temporary_pipeline() {
    let issues = r#"{"warnings_": [{"message_": "Many NULL values", "label_": "trans.balance", "warning_type_": "WARNING"}]}"#;

    let engine = FakeEngine::start(vec![
        reply(&["Success!"]),
        reply(&["Found!", "log: Checking...", "Success!", issues]),
        reply(&["Success!"]),
    ]);
    let session = session(&engine);

    let issues = pipeline()
        .check(&session, &Table::from(loans()), &[Table::from(trans())])
        .unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues.of_type("WARNING").len(), 1);

    let commands = engine.finish();
    assert_eq!(commands[1]["type_"], "Pipeline.check");
    assert_eq!(commands[2]["type_"], "Pipeline.delete");
    assert_eq!(commands[2]["name_"], commands[0]["name_"]);
}

#[test]
fn test_set_project_returns_new_session() {
    let engine = FakeEngine::start(vec![
        reply(&["1.4.0"]),
        reply(&["log: Launching engine...", "Success!", "1709"]),
    ]);
    let session = session(&engine);

    let switched = project::set_project(&session, "loans").unwrap();

    assert_eq!(switched.port(), 1709);
    assert_eq!(switched.host(), "127.0.0.1");

    let commands = engine.finish();
    assert_eq!(commands[0]["type_"], "getversion");
    assert_eq!(commands[1]["type_"], "setproject");
    assert_eq!(commands[1]["body_"], "loans");
}

#[test]
fn test_list_projects_and_data_frames() {
    let engine = FakeEngine::start(vec![
        reply(&["Success!", r#"{"projects": ["loans", "churn"]}"#]),
        reply(&["Success!", r#"{"in_memory": ["loans"], "on_disk": ["loans", "trans"]}"#]),
        reply(&["Success!", r#"{"names": ["aBc123"]}"#]),
    ]);
    let session = session(&engine);

    assert_eq!(project::list_projects(&session).unwrap(), vec!["loans", "churn"]);

    let listing = project::list_data_frames(&session).unwrap();
    assert!(listing.exists_in_memory("loans"));
    assert_eq!(listing.not_loaded(), vec!["trans"]);

    assert_eq!(project::list_pipelines(&session).unwrap(), vec!["aBc123"]);

    let commands = engine.finish();
    assert_eq!(commands[0]["type_"], "listallprojects");
    assert_eq!(commands[1]["type_"], "list_data_frames");
    assert_eq!(commands[2]["type_"], "list_pipelines");
}

#[test]
fn test_view_is_checked_before_materializing() {
    let engine = FakeEngine::start(vec![
        // Step 1: the data frame changed after the view was built
        reply(&["Success!", "2026-01-01T10:00:00"]),
        // Step 2: the view is materialized anyway
        reply(&["Success!"]),
        reply(&["{}"]),
        reply(&["Success!", "2026-01-01T10:05:00"]),
    ]);
    let session = session(&engine);

    let view = loans().drop(&["amount"]).unwrap();
    let copy = view.to_df(&session, "copy").unwrap();

    assert_eq!(copy.name(), "copy");
    assert_eq!(copy.last_change_snapshot(), "2026-01-01T10:05:00");

    let commands = engine.finish();
    assert_eq!(commands[0]["type_"], "DataFrame.last_change");
    assert_eq!(commands[0]["name_"], "loans");
    assert_eq!(commands[1]["type_"], "DataFrame.from_view");
    assert_eq!(commands[1]["view_"]["dropped_"][0], "amount");
}

#[test]
fn test_stale_view_is_reported() {
    let engine = FakeEngine::start(vec![reply(&["Success!", "2026-01-01T10:00:00"])]);
    let session = session(&engine);

    let view = loans().drop(&["amount"]).unwrap();

    assert_eq!(view.check(&session).unwrap(), Freshness::Stale);
    engine.finish();
}

#[test]
fn test_pipeline_checks_views_before_sending() {
    let engine = FakeEngine::start(vec![
        reply(&["Success!", "2026-01-01T10:00:00"]),
        reply(&["Success!"]),
        reply(&["Found!", "Column 'account_id' has no join key role."]),
    ]);
    let session = session(&engine);

    let population = Table::from(loans().drop(&["amount"]).unwrap());
    let mut pipe = pipeline();
    let result = pipe.fit_unchecked(&session, &population, &[Table::from(trans())], None);
    assert!(result.is_err());

    let commands = engine.finish();
    assert_eq!(commands[0]["type_"], "DataFrame.last_change");
    assert_eq!(commands[1]["type_"], "Pipeline");
    assert_eq!(commands[2]["type_"], "Pipeline.fit");
    assert_eq!(commands[2]["population_df_"]["type_"], "View");
}

#[test]
fn test_fit_subset_orders_tables_by_placeholder() {
    // Step 1: a star schema whose peripheral names match the pipeline
    let mut star_schema = StarSchema::new(loans(), None);
    star_schema
        .join(trans(), None, JoinOptions::new().on("account_id"))
        .unwrap();
    star_schema.container_mut().add_subset("train", loans()).unwrap();

    let train = star_schema.subset("train").unwrap();
    let ordered = pipeline().order_peripheral(train.peripheral()).unwrap();
    assert_eq!(ordered[0].name(), "trans");

    // Step 2: a subset missing a peripheral table fails before any round trip
    let bare = Container::empty().with_subset("train", loans()).unwrap();
    let session = Session::new("127.0.0.1", 1);

    let err = pipeline().fit_subset(&session, &bare.subset("train").unwrap(), None).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidArgument(_)));
}

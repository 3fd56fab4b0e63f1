// Build a data model and print the command sent to the engine
// Author: Gabriel Demetrios Lafis

use getml_client::{
    data::{Column, ColumnExpr, DataFrame, DataModel, FloatOps, JoinOptions, NewColumn, Relationship, Role, Roles},
    pipeline::{FastProp, LossFunction, Pipeline, XGBoostClassifier},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Describe the tables locally; nothing is sent yet
    let loans = DataFrame::new(
        "loans",
        Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::TimeStamp, &["date_loan"])
            .with(Role::Target, &["default"])
            .with(Role::Numerical, &["amount", "duration"]),
    )?;

    let trans = DataFrame::new(
        "trans",
        Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::TimeStamp, &["date"])
            .with(Role::Numerical, &["balance"])
            .with(Role::Categorical, &["type"]),
    )?;

    let meta = DataFrame::new(
        "meta",
        Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::Categorical, &["district"]),
    )?;

    // A derived column in a view
    let log_amount = match loans.get_column("amount")? {
        Column::Float(amount) => amount.log(),
        other => return Err(format!("unexpected column {}", other).into()),
    };

    let population = loans.with_column(NewColumn::new(log_amount, "log_amount").role(Role::Numerical))?;
    println!("Derived column:\n{}\n", serde_json::to_string_pretty(&population.added().map(|a| a.col.to_cmd()))?);

    // The relational structure
    let mut dm = DataModel::new(population.to_placeholder(Some("population")));
    let trans_ph = dm.add(trans.to_placeholder(None));
    let meta_ph = dm.add(meta.to_placeholder(None));

    dm.join(
        dm.population(),
        trans_ph,
        JoinOptions::new()
            .on_pair("account_id", "account_id")
            .time_stamp_pair("date_loan", "date")
            .memory(90.0 * 86400.0),
    )?;
    dm.join(
        dm.population(),
        meta_ph,
        JoinOptions::new().on("account_id").relationship(Relationship::ManyToOne),
    )?;

    println!("Data model:\n{}\n", dm);

    let pipe = Pipeline::new(dm)
        .loss_function(LossFunction::CrossEntropyLoss)
        .with_feature_learner(FastProp::new().with_num_features(100))
        .with_predictor(XGBoostClassifier::new().with_n_estimators(50))
        .with_tags(&["demo"]);

    pipe.validate()?;

    println!("Pipeline command:\n{}", serde_json::to_string_pretty(&pipe.to_cmd("demo01")?)?);

    Ok(())
}

// Upload local CSV files, fit a pipeline and score it
// Author: Gabriel Demetrios Lafis
//
// Needs a running engine. Usage:
//   cargo run --example fit_pipeline -- population.csv peripheral.csv

use std::env;

use log::info;

use getml_client::{
    data::{random, CsvOptions, DataFrame, DataModel, FloatOps, JoinOptions, Role, Roles, Table},
    pipeline::{FastProp, LinearRegression, Pipeline},
    project,
    utils::{init_logging, Config},
};

fn main() -> anyhow::Result<()> {
    let config = Config::default();
    if let Err(err) = init_logging(config.log_level_filter()) {
        eprintln!("Error initializing logger: {}", err);
    }

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        anyhow::bail!("Usage: {} POPULATION_CSV PERIPHERAL_CSV", args[0]);
    }

    // Connect to a project
    let session = project::set_project(&config.session(), "demo")?;
    info!("Engine is listening on port {}", session.port());

    // Upload the data; roles the caller does not name are sniffed
    let options = CsvOptions::default();

    let population = DataFrame::from_csv_file(
        &session,
        "population",
        &args[1],
        &options,
        Some(Roles::new().with(Role::JoinKey, &["id"]).with(Role::Target, &["target"])),
    )?;

    let peripheral = DataFrame::from_csv_file(
        &session,
        "peripheral",
        &args[2],
        &options,
        Some(Roles::new().with(Role::JoinKey, &["id"])),
    )?;

    info!("Uploaded {} population rows", population.nrows(&session)?);

    // Fit on a random 80% split
    let split = random(42);
    let train = population.where_(&session, split.less(0.8))?;
    let test = population.where_(&session, split.greater_equal(0.8))?;

    let mut dm = DataModel::new(population.to_placeholder(None));
    let ph = dm.add(peripheral.to_placeholder(None));
    dm.join(dm.population(), ph, JoinOptions::new().on("id"))?;

    let mut pipe = Pipeline::new(dm)
        .with_feature_learner(FastProp::new())
        .with_predictor(LinearRegression::new());

    let peripheral = vec![Table::from(peripheral)];

    pipe.fit(&session, &Table::from(train), &peripheral, None)?;
    let scores = pipe.score(&session, &Table::from(test), &peripheral)?;

    println!("Pipeline {}", pipe);
    println!("RMSE: {:?}", scores.rmse());
    println!("R²:   {:?}", scores.rsquared());

    for feature in pipe.features(&session)?.sort_by_importance().iter().take(5) {
        println!("{:>8.4}  {}", feature.importance, feature.name);
    }

    Ok(())
}

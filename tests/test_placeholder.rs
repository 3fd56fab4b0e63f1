// Data model tests
// Author: Gabriel Demetrios Lafis

use serde_json::json;

use getml_client::data::{DataFrame, DataModel, JoinOptions, PlaceholderGraph, Relationship, Role, Roles};

fn population() -> DataFrame {
    let roles = Roles::new()
        .with(Role::JoinKey, &["customer_id", "store_id"])
        .with(Role::TimeStamp, &["date"])
        .with(Role::Target, &["churn"]);

    DataFrame::new("customers", roles).unwrap()
}

fn peripheral(name: &str) -> DataFrame {
    let roles = Roles::new()
        .with(Role::JoinKey, &["customer_id", "store_id"])
        .with(Role::TimeStamp, &["date"])
        .with(Role::Numerical, &["value"]);

    DataFrame::new(name, roles).unwrap()
}

#[test]
fn test_snowflake_model() {
    // Step 1: placeholders from data frames
    let mut dm = DataModel::new(population().to_placeholder(Some("population")));
    let orders = dm.add(peripheral("orders").to_placeholder(None));
    let items = dm.add(peripheral("items").to_placeholder(None));

    // Step 2: a two level join tree
    dm.join(
        dm.population(),
        orders,
        JoinOptions::new()
            .on("customer_id")
            .on("store_id")
            .time_stamps("date")
            .memory(30.0 * 86400.0)
            .horizon(86400.0),
    )
    .unwrap();
    dm.join(orders, items, JoinOptions::new().on("customer_id").relationship(Relationship::ManyToOne))
        .unwrap();

    // Step 3: the command nests the joins
    let cmd = dm.to_cmd().unwrap();
    assert_eq!(cmd["name_"], "population");
    assert_eq!(cmd["memory_"], json!([2592000.0]));
    assert_eq!(cmd["horizon_"], json!([86400.0]));
    assert!(cmd["join_keys_used_"][0]
        .as_str()
        .unwrap()
        .starts_with("$GETML_MULTIPLE_JOIN_KEYS_BEGIN"));

    let orders_cmd = &cmd["joined_tables_"][0];
    assert_eq!(orders_cmd["name_"], "orders");
    assert_eq!(orders_cmd["joined_tables_"][0]["name_"], "items");
    assert_eq!(orders_cmd["relationship_"], json!(["many-to-one"]));

    // Step 4: every placeholder knows its population
    assert_eq!(dm.population_of(items).unwrap(), dm.population());
    assert_eq!(dm.get_one("items").unwrap(), items);
    assert_eq!(dm.peripheral_names(), vec!["items", "orders"]);
}

#[test]
fn test_joins_are_checked_locally() {
    let mut dm = DataModel::new(population().to_placeholder(None));
    let orders = dm.add(peripheral("orders").to_placeholder(None));

    // Unknown join key
    assert!(dm.join(dm.population(), orders, JoinOptions::new().on("order_id")).is_err());

    // Lagged targets need a horizon
    assert!(dm
        .join(
            dm.population(),
            orders,
            JoinOptions::new().on("customer_id").time_stamps("date").lagged_targets(true),
        )
        .is_err());

    // A placeholder cannot be joined to itself
    assert!(dm.join(orders, orders, JoinOptions::new().on("customer_id")).is_err());

    // Nothing was recorded
    assert!(dm.to_cmd().unwrap()["joined_tables_"].as_array().unwrap().is_empty());
}

#[test]
fn test_unknown_placeholder() {
    let dm = DataModel::from_name("customers");

    assert!(dm.get("orders").is_err());
    assert_eq!(dm.get("population").unwrap(), vec![dm.population()]);
}

#[test]
fn test_cmd_rebuilds_the_same_tree() {
    let mut dm = DataModel::new(population().to_placeholder(None));
    let orders = dm.add(peripheral("orders").to_placeholder(None));
    dm.join(dm.population(), orders, JoinOptions::new().on_pair("customer_id", "store_id"))
        .unwrap();

    let cmd = dm.graph().to_cmd(dm.population()).unwrap();
    let (graph, root) = PlaceholderGraph::from_cmd(&cmd).unwrap();

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.to_cmd(root).unwrap(), cmd);
    assert_eq!(graph.children(root).unwrap().len(), 1);
}

// Data frame and view composition tests
// Author: Gabriel Demetrios Lafis

use getml_client::{
    comm::Session,
    data::{Column, ColumnExpr, DataError, DataFrame, FloatOps, NewColumn, Role, Roles, Table, View},
};

fn loans() -> DataFrame {
    let roles = Roles::new()
        .with(Role::Numerical, &["amount", "rate"])
        .with(Role::JoinKey, &["id"])
        .with(Role::Target, &["default"])
        .with(Role::Categorical, &["status"]);

    DataFrame::new("loans", roles).unwrap()
}

#[test]
fn test_duplicate_columns_fail_locally() {
    let roles = Roles::new()
        .with(Role::Numerical, &["amount"])
        .with(Role::Categorical, &["amount"]);

    let err = DataFrame::new("loans", roles).unwrap_err();

    assert!(err.is_local());
}

#[test]
fn test_views_of_views() {
    let df = loans();

    // Step 1: drop a column
    let dropped = df.drop(&["rate"]).unwrap();
    assert!(!dropped.colnames().contains(&"rate".to_string()));

    // Step 2: add a column computed from another one
    let amount = match dropped.get_column("amount").unwrap() {
        Column::Float(col) => col,
        other => panic!("expected a float column, got {}", other),
    };

    let added = dropped
        .with_column(NewColumn::new(amount.log(), "log_amount").role(Role::Numerical))
        .unwrap();

    assert!(added.roles().numerical.contains(&"log_amount".to_string()));
    assert_eq!(added.ncols(), dropped.ncols() + 1);

    // Step 3: the command nests the chain
    let cmd = added.to_cmd();
    assert_eq!(cmd["type_"], "View");
    assert_eq!(cmd["added_"]["name_"], "log_amount");
    assert_eq!(cmd["base_"]["type_"], "View");
    assert_eq!(cmd["base_"]["dropped_"][0], "rate");
    assert_eq!(cmd["base_"]["base_"]["name_"], "loans");

    // Step 4: the root is still the data frame
    let table = Table::from(added);
    assert_eq!(table.root().name(), "loans");
    assert_eq!(table.name(), "loans");
}

#[test]
fn test_dropping_unknown_column_fails_locally() {
    let err = loans().drop(&["nope"]).unwrap_err();

    assert!(matches!(err, DataError::Value(_)));
}

#[test]
fn test_dropping_in_steps_equals_dropping_at_once() {
    // Step 1: drop the same columns two ways
    let stepwise = loans().drop(&["rate"]).unwrap().drop(&["amount"]).unwrap();
    let at_once = loans().drop(&["rate", "amount"]).unwrap();

    // Step 2: both expose the same columns
    assert_eq!(stepwise.colnames(), at_once.colnames());

    // Step 3: dropped columns are gone from both
    for name in ["rate", "amount"] {
        assert!(matches!(stepwise.get_column(name), Err(DataError::Key(_))));
        assert!(matches!(at_once.get_column(name), Err(DataError::Key(_))));
    }
}

#[test]
fn test_where_with_mask_needs_no_round_trip() {
    let df = loans();
    let session = Session::new("127.0.0.1", 1);

    let large = match df.get_column("amount").unwrap() {
        Column::Float(col) => col.greater(1000.0),
        _ => unreachable!(),
    };

    let view = df.where_(&session, large).unwrap().named("large_loans");

    // Columns of the view are restricted to the selected rows
    let rate = view.get_column("rate").unwrap();
    let cmd = rate.to_cmd();
    assert_eq!(cmd["operator_"], "num_subselection");
    assert_eq!(cmd["operand2_"]["operator_"], "greater");

    // The view command carries the subselection with the last change
    let cmd = view.to_cmd();
    assert_eq!(cmd["name_"], "large_loans");
    assert_eq!(cmd["subselection_"]["operator_"], "greater");
    assert!(cmd["subselection_"].get("last_change_").is_some());
}

#[test]
fn test_select_columns_and_placeholder() {
    let view = View::new(loans()).select_columns(&["id", "amount", "default"]).unwrap();

    assert_eq!(view.ncols(), 3);

    let placeholder = view.to_placeholder(Some("population"));
    assert_eq!(placeholder.name(), "population");
    assert_eq!(placeholder.roles().join_key, vec!["id"]);
    assert!(placeholder.get("status").is_err());

    assert!(matches!(
        View::new(loans()).select_columns(&["missing"]),
        Err(DataError::Key(_))
    ));
}

#[test]
fn test_string_column_cast_to_numerical_role() {
    let df = loans();
    let status = df.get_column("status").unwrap();

    let view = df
        .with_column(NewColumn::new(status, "status_num").role(Role::Numerical))
        .unwrap();

    let added = view.added().unwrap();
    assert_eq!(added.col.to_cmd()["operator_"], "as_num");
    assert_eq!(added.role, Role::Numerical);
}

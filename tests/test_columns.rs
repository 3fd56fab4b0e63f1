// Column expression tests
// Author: Gabriel Demetrios Lafis

use serde_json::json;

use getml_client::data::{
    arange, rowid, Column, ColumnExpr, ColumnType, DataError, FloatColumn, FloatOps, Length, Role,
    SliceSpec, StringColumn, StringOps,
};

fn amount() -> FloatColumn {
    FloatColumn::new("amount", Role::Numerical, "loans")
}

fn status() -> StringColumn {
    StringColumn::new("status", Role::Categorical, "loans")
}

#[test]
fn test_nested_arithmetic() {
    // Build sqrt(amount * 2 + 1)
    let expr = ((&amount() * 2.0) + 1.0).sqrt();

    let cmd = expr.to_cmd();

    // Check the outer node
    assert_eq!(cmd["type_"], "FloatColumnView");
    assert_eq!(cmd["operator_"], "sqrt");
    assert!(cmd.get("operand2_").is_none());

    // Check the nested nodes
    let plus = &cmd["operand1_"];
    assert_eq!(plus["operator_"], "plus");
    assert_eq!(plus["operand2_"], json!({"operator_": "const", "value_": 1.0, "type_": "FloatColumnView"}));

    let times = &plus["operand1_"];
    assert_eq!(times["operator_"], "multiplies");
    assert_eq!(times["operand1_"]["name_"], "amount");
    assert_eq!(times["operand1_"]["df_name_"], "loans");
    assert_eq!(times["operand1_"]["role_"], "numerical");
}

#[test]
fn test_literal_on_the_left() {
    let expr = 1.0 - &amount();

    let cmd = expr.to_cmd();

    assert_eq!(cmd["operator_"], "minus");
    assert_eq!(cmd["operand1_"]["operator_"], "const");
    assert_eq!(cmd["operand2_"]["name_"], "amount");
}

#[test]
fn test_string_operators() {
    // Concatenation with a literal and a substring
    let expr = status().substr(0, 3).concat("-x");
    let cmd = expr.to_cmd();

    assert_eq!(cmd["type_"], "StringColumnView");
    assert_eq!(cmd["operator_"], "concat");
    assert_eq!(cmd["operand1_"]["operator_"], "substr");
    assert_eq!(cmd["operand1_"]["begin_"], 0);
    assert_eq!(cmd["operand1_"]["len_"], 3);

    // Comparisons produce boolean views
    let mask = status().equal_to("default");
    assert_eq!(mask.column_type(), ColumnType::BooleanColumnView);
    assert_eq!(mask.to_cmd()["operator_"], "str_equal_to");
}

#[test]
fn test_boolean_combination() {
    let large = amount().greater(1000.0);
    let open = status().equal_to("open");

    let both = &large & &open;
    let either = large | open;

    assert_eq!(both.to_cmd()["operator_"], "and");
    assert_eq!(either.to_cmd()["operator_"], "or");
    assert_eq!(either.to_cmd()["operand1_"]["operator_"], "greater");
}

#[test]
fn test_dynamic_type_errors() {
    let amount = Column::from(amount());
    let status = Column::from(status());

    // Comparing across families fails locally
    let err = amount.try_equal_to(&status).unwrap_err();
    assert!(matches!(err, DataError::Type(_)));
    assert!(err.is_local());

    // Casting first makes it legal
    let ok = amount.as_str().try_equal_to(&status).unwrap();
    assert_eq!(ok.to_cmd()["operator_"], "str_equal_to");

    // Boolean operators need boolean operands
    assert!(amount.try_and(&status).is_err());

    // Adding a string concatenates
    let concat = status.try_add(&amount).unwrap();
    assert_eq!(concat.column_type(), ColumnType::StringColumnView);
}

#[test]
fn test_join_key_hint() {
    let account = Column::from(StringColumn::new("account_id", Role::JoinKey, "loans"));

    let err = account.try_equal_to(1.0).unwrap_err();

    assert!(err.to_string().contains("join_keys are always StringColumn"));
}

#[test]
fn test_generators() {
    assert_eq!(rowid().to_cmd()["operator_"], "rowid");
    assert_eq!(arange(0.0, 5.0, 1.0).range_len(), Some(5));
}

#[test]
fn test_select_with_known_length() {
    let amount = Column::from(amount());

    // Last three rows of a column of ten
    let selected = amount
        .select_with_length(SliceSpec::new(Some(-3), None, None), Length::Finite(10))
        .unwrap();

    let cmd = selected.to_cmd();
    assert_eq!(cmd["operator_"], "num_subselection");
    assert_eq!(cmd["operand2_"]["start_"], 7.0);
    assert_eq!(cmd["operand2_"]["stop_"], 10.0);

    // Negative indices on a column of unknown length fail locally
    let err = amount.select_with_length(-1i64, Length::Unknown).unwrap_err();
    assert!(matches!(err, DataError::Index(_)));
}

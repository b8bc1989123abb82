//! Unit tests for values, merging, the expression parser and the cell grammar.
mod common;
use common::*;
use kagami::ast::{
    BinaryOp, Builtin, Expression, Literal, format_number, is_truthy, number, parse_expression,
    parse_handler, values_equal,
};
use kagami::compiler::cells::{compile_condition, compile_output};
use kagami::interpreter::merge::{merge, set_by_path};
use kagami::prelude::*;
use serde_json::{Map, Value, json};

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("test value should be an object")
}

// --- Values ---

#[test]
fn test_number_normalization() {
    assert_eq!(number(20.0), json!(20));
    assert_eq!(number(2.5), json!(2.5));
    assert_eq!(number(f64::NAN), Value::Null);
    assert_eq!(number(f64::INFINITY), Value::Null);
}

#[test]
fn test_format_number_matches_javascript() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(-0.5), "-0.5");
    assert_eq!(format_number(f64::NAN), "NaN");
    assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
}

#[test]
fn test_truthiness() {
    assert!(!is_truthy(&Value::Null));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!("")));
    assert!(is_truthy(&json!("0")));
    assert!(is_truthy(&json!([])));
    assert!(is_truthy(&json!({})));
}

#[test]
fn test_values_equal_ignores_number_representation() {
    assert!(values_equal(&json!(1), &json!(1.0)));
    assert!(values_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2.0]})));
    assert!(!values_equal(&json!(1), &json!("1")));
}

// --- Merge ---

#[test]
fn test_merge_into_itself_is_noop() {
    let original = object(json!({"a": 1, "b": {"c": [1, 2], "d": "x"}}));
    let mut target = original.clone();
    merge(&mut target, original.clone());
    assert_eq!(target, original);
}

#[test]
fn test_merge_empty_leaves_target_unchanged() {
    let original = object(json!({"a": 1, "nested": {"b": true}}));
    let mut target = original.clone();
    merge(&mut target, Map::new());
    assert_eq!(target, original);
}

#[test]
fn test_merge_nested_objects_recursively() {
    let mut target = object(json!({"shipping": {"base": 5, "zone": "A"}, "keep": 1}));
    merge(
        &mut target,
        object(json!({"shipping": {"base": 8, "fee": 2}})),
    );
    assert_eq!(
        Value::Object(target),
        json!({"shipping": {"base": 8, "zone": "A", "fee": 2}, "keep": 1})
    );
}

#[test]
fn test_merge_later_value_wins_for_non_objects() {
    let mut target = object(json!({"a": {"x": 1}, "b": [1, 2], "c": 1}));
    merge(&mut target, object(json!({"a": 5, "b": [3], "c": {"y": 2}})));
    assert_eq!(Value::Object(target), json!({"a": 5, "b": [3], "c": {"y": 2}}));
}

#[test]
fn test_set_by_path_creates_intermediate_objects() {
    let mut target = Map::new();
    set_by_path(&mut target, "a.b.c", json!(1));
    set_by_path(&mut target, "a.d", json!(2));
    assert_eq!(Value::Object(target), json!({"a": {"b": {"c": 1}, "d": 2}}));
}

#[test]
fn test_set_by_path_replaces_scalar_intermediate() {
    let mut target = object(json!({"a": 3}));
    set_by_path(&mut target, "a.b", json!(true));
    assert_eq!(Value::Object(target), json!({"a": {"b": true}}));
}

// --- Parser ---

#[test]
fn test_parse_precedence() {
    let expr = parse_expression("1 + 2 * 3").unwrap();
    match expr {
        Expression::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                *right,
                Expression::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            ));
        }
        other => panic!("expected a binary expression, got {:?}", other),
    }
}

#[test]
fn test_parse_negative_literal_folds() {
    assert_eq!(
        parse_expression("-5").unwrap(),
        Expression::Literal(Literal::Number(-5.0))
    );
}

#[test]
fn test_parse_implicit_callback_becomes_lambda() {
    let expr = parse_expression("filter(items, # > 1)").unwrap();
    let Expression::Call { function, args } = expr else {
        panic!("expected a helper call");
    };
    assert_eq!(function, Builtin::Filter);
    assert!(matches!(&args[1], Expression::Lambda { params, .. } if params == &["#"]));
}

#[test]
fn test_parse_method_sugar_maps_to_helper() {
    let expr = parse_expression("name.toUpperCase()").unwrap();
    assert!(matches!(
        expr,
        Expression::Call {
            function: Builtin::Upper,
            ..
        }
    ));
}

#[test]
fn test_parse_rejects_wrong_helper_arity() {
    let err = parse_expression("sum(a, b)").unwrap_err();
    assert!(err.message.contains("sum()"), "{}", err);
}

#[test]
fn test_parse_rejects_unknown_function() {
    assert!(parse_expression("eval(\"1\")").is_err());
    assert!(parse_expression("weight +").is_err());
}

#[test]
fn test_parse_rejects_dollar_outside_cells() {
    assert!(parse_expression("$ > 5").is_err());
}

#[test]
fn test_parse_handler_forms() {
    for source in [
        "export const handler = async (input) => { return { total: input.a + 1 }; };",
        "export default function (input) { const t = input.a + 1; return { total: t }; }",
        "(input) => ({ total: input.a + 1 })",
        "input => ({ total: input.a + 1 })",
    ] {
        let handler = parse_handler(source).unwrap_or_else(|e| panic!("{}: {}", source, e));
        assert_eq!(handler.params[0], "input", "{}", source);
    }
}

#[test]
fn test_parse_handler_rejects_statements() {
    let err = parse_handler("(input) => { for (;;) {} return input; }").unwrap_err();
    assert!(err.message.contains("Unsupported statement"), "{}", err);
}

#[test]
fn test_parse_error_positions_are_byte_offsets() {
    let err = parse_expression("weight + sum(a, b)").unwrap_err();
    assert_eq!(err.position, 9, "{}", err);

    let err = parse_expression("weight @ 2").unwrap_err();
    assert_eq!(err.position, 7, "{}", err);
    assert!(err.message.contains("Unexpected character"), "{}", err);
}

#[test]
fn test_lexer_separators_comments_and_optional_members() {
    assert_eq!(
        parse_expression("1_000 + .5").unwrap(),
        Expression::binary(
            BinaryOp::Add,
            Expression::Literal(Literal::Number(1000.0)),
            Expression::Literal(Literal::Number(0.5)),
        )
    );
    assert!(matches!(
        parse_expression("a ?.5 : 1").unwrap(),
        Expression::Conditional { .. }
    ));
    assert!(matches!(
        parse_expression("a?.b").unwrap(),
        Expression::FieldPath { .. }
    ));

    let handler = parse_handler("// total\n(input) => /* sum */ input.a").unwrap();
    assert_eq!(handler.params, vec!["input"]);
}

// --- Cell grammar ---

fn cell_matches(cell: Value, field: &str, record: Value) -> bool {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "table",
                "decisionTableNode",
                json!({
                    "inputs": [{ "id": "c", "field": field }],
                    "outputs": [{ "id": "o", "field": "hit" }],
                    "rules": [{ "c": cell, "o": "true" }],
                }),
            ),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "table"), edge("table", "out")],
    );
    plan.evaluate(&record).unwrap()["hit"] == json!(true)
}

#[test]
fn test_cell_empty_has_no_condition() {
    assert_eq!(compile_condition(&json!(""), Some("weight")).unwrap(), None);
    assert_eq!(compile_condition(&json!("  "), Some("weight")).unwrap(), None);
    assert_eq!(compile_condition(&Value::Null, Some("weight")).unwrap(), None);
}

#[test]
fn test_cell_range_is_inclusive() {
    assert!(cell_matches(json!("[5..10]"), "weight", json!({"weight": 5})));
    assert!(cell_matches(json!("[5..10]"), "weight", json!({"weight": 10})));
    assert!(!cell_matches(json!("[5..10]"), "weight", json!({"weight": 10.5})));
}

#[test]
fn test_cell_lists() {
    assert!(cell_matches(json!("\"US\", \"CA\""), "country", json!({"country": "CA"})));
    assert!(cell_matches(json!("'MX'"), "country", json!({"country": "MX"})));
    assert!(!cell_matches(json!("\"US\", \"CA\""), "country", json!({"country": "DE"})));
    assert!(cell_matches(json!("1_000, 2_000"), "qty", json!({"qty": 2000})));
}

#[test]
fn test_cell_operator_suffix_and_literals() {
    assert!(cell_matches(json!("< 5"), "weight", json!({"weight": 3})));
    assert!(!cell_matches(json!("< 5"), "weight", json!({"weight": 7})));
    assert!(cell_matches(json!(">= 5"), "weight", json!({"weight": 5})));
    assert!(cell_matches(json!(7), "weight", json!({"weight": 7})));
}

#[test]
fn test_cell_dollar_substitution() {
    assert!(cell_matches(json!("$ > 1 && $ < 3"), "weight", json!({"weight": 2})));
    assert!(cell_matches(json!("len($) == 2"), "tags", json!({"tags": ["a", "b"]})));
}

#[test]
fn test_cell_prefix_and_suffix_helpers() {
    assert!(cell_matches(json!("startsWith($, \"SKU-\")"), "sku", json!({"sku": "SKU-1"})));
    assert!(cell_matches(json!("endsWith($, \"-XL\")"), "sku", json!({"sku": "SKU-1-XL"})));
    assert!(!cell_matches(json!("startsWith($, \"SKU-\")"), "sku", json!({"sku": 5})));
}

#[test]
fn test_cell_nested_field() {
    assert!(cell_matches(
        json!("\"Berlin\""),
        "customer.address.city",
        json!({"customer": {"address": {"city": "Berlin"}}})
    ));
}

#[test]
fn test_cell_without_field_is_standalone_expression() {
    let condition = compile_condition(&json!("weight > 2"), None).unwrap();
    assert!(condition.is_some());
    assert!(cell_matches(json!("weight > 2"), "", json!({"weight": 3})));
}

#[test]
fn test_output_cells() {
    assert_eq!(compile_output(None).unwrap(), None);
    assert_eq!(compile_output(Some(&json!(""))).unwrap(), None);
    assert_eq!(
        compile_output(Some(&json!(12))).unwrap(),
        Some(Expression::Literal(Literal::Number(12.0)))
    );
    assert!(compile_output(Some(&json!("weight *"))).is_err());
}

// --- Errors ---

#[test]
fn test_error_display() {
    let failure = StepFailure {
        node_id: "calc".to_string(),
        error: EvaluationError::UnknownIdentifier("foo".to_string()),
        partial: json!({}),
    };
    assert_eq!(
        failure.to_string(),
        "Node 'calc' failed: Identifier 'foo' is not defined in the handler scope"
    );

    let error: BuildError = GraphStructureError::MissingInputNode.into();
    assert_eq!(error.to_string(), "The graph has no input node");
}

//! Tests for per-record evaluation, batch evaluation and traces.
mod common;
use common::*;
use kagami::prelude::*;
use kagami::trace::StepOutcome;
use serde_json::{Value, json};

// --- Node semantics ---

#[test]
fn test_decision_table_first_hit() {
    let plan = weight_table_plan();
    assert_eq!(plan.evaluate(&json!({"weight": 7})).unwrap(), json!({"base": 8}));
    assert_eq!(plan.evaluate(&json!({"weight": 3})).unwrap(), json!({"base": 5}));
    assert_eq!(plan.evaluate(&json!({"weight": 20})).unwrap(), json!({"base": 12}));
}

#[test]
fn test_decision_table_without_match_contributes_nothing() {
    let plan = weight_table_plan();
    assert_eq!(plan.evaluate(&json!({"weight": null})).unwrap(), json!({}));
    assert_eq!(plan.evaluate(&json!({})).unwrap(), json!({}));
}

#[test]
fn test_decision_table_stops_at_first_matching_row() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "table",
                "decisionTableNode",
                json!({
                    "inputs": [{ "id": "c", "field": "country" }],
                    "outputs": [{ "id": "r", "field": "rate.value" }],
                    "rules": [
                        { "c": "\"US\"", "r": "1" },
                        { "c": "", "r": "2" },
                    ],
                }),
            ),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "table"), edge("table", "out")],
    );
    assert_eq!(
        plan.evaluate(&json!({"country": "US"})).unwrap(),
        json!({"rate": {"value": 1}})
    );
    assert_eq!(
        plan.evaluate(&json!({"country": "FR"})).unwrap(),
        json!({"rate": {"value": 2}})
    );
}

#[test]
fn test_switch_guards_select_exactly_one_branch() {
    let plan = shipping_plan();
    assert_eq!(
        plan.evaluate(&json!({"origin_country": "US"})).unwrap(),
        json!({"fee": 5, "zone": "domestic"})
    );
    assert_eq!(
        plan.evaluate(&json!({"origin_country": "CN"})).unwrap(),
        json!({"fee": 25, "zone": "international"})
    );
}

#[test]
fn test_switch_never_runs_both_branches() {
    let plan = shipping_plan();
    for country in ["US", "CN", "DE", ""] {
        let (result, trace) = plan.evaluate_traced(&json!({"origin_country": country}));
        assert!(result.is_ok());
        let ran: Vec<&str> = trace
            .executed()
            .map(|step| step.node_id.as_str())
            .filter(|id| *id == "intl" || *id == "dom")
            .collect();
        assert_eq!(ran.len(), 1, "country {:?} ran {:?}", country, ran);
    }
}

#[test]
fn test_switch_without_matching_branch_skips_all_guarded_nodes() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "s",
                "switchNode",
                json!({ "statements": [{ "id": "big", "condition": "n > 10" }] }),
            ),
            expression_node("flag", &[("big", "true")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![
            edge("in", "s"),
            branch("s", "big", "flag"),
            edge("flag", "out"),
        ],
    );
    assert_eq!(plan.evaluate(&json!({"n": 50})).unwrap(), json!({"big": true}));
    assert_eq!(plan.evaluate(&json!({"n": 1})).unwrap(), json!({}));
}

#[test]
fn test_switch_branch_into_output_passes_context() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "s",
                "switchNode",
                json!({
                    "statements": [
                        { "id": "vip", "condition": "tier == \"gold\"" },
                        { "id": "other" },
                    ]
                }),
            ),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "s"), branch("s", "vip", "out")],
    );
    let gold = json!({"tier": "gold", "id": 7});
    assert_eq!(plan.evaluate(&gold).unwrap(), gold);
    assert_eq!(plan.evaluate(&json!({"tier": "basic"})).unwrap(), json!({}));
}

#[test]
fn test_identity_pass_through() {
    let plan = identity_plan();
    for record in [
        json!({}),
        json!({"a": 1}),
        json!({"nested": {"list": [1, 2, {"x": null}]}, "flag": false}),
    ] {
        assert_eq!(plan.evaluate(&record).unwrap(), record);
    }
}

#[test]
fn test_expression_arithmetic() {
    let plan = arithmetic_plan();
    assert_eq!(
        plan.evaluate(&json!({"weight": 2, "cost": 10})).unwrap(),
        json!({"total": 20})
    );
}

#[test]
fn test_expression_pass_through_keeps_context() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "calc",
                "expressionNode",
                json!({
                    "passThrough": true,
                    "expressions": [
                        { "key": "total", "value": "a + 1" },
                        { "key": "b", "value": "\"replaced\"" },
                    ],
                }),
            ),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "calc"), edge("calc", "out")],
    );
    assert_eq!(
        plan.evaluate(&json!({"a": 1, "b": 2})).unwrap(),
        json!({"a": 1, "b": "replaced", "total": 2})
    );
}

#[test]
fn test_downstream_nodes_see_upstream_results() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            expression_node("first", &[("x", "base * 2")]),
            expression_node("second", &[("y", "x + 1"), ("label", "input.name")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "first"), edge("first", "second"), edge("second", "out")],
    );
    assert_eq!(
        plan.evaluate(&json!({"base": 3, "name": "crate"})).unwrap(),
        json!({"y": 7, "label": "crate"})
    );
}

#[test]
fn test_expression_dotted_keys_build_nested_output() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            expression_node("calc", &[("shipping.base", "5"), ("shipping.fee", "base + 1")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "calc"), edge("calc", "out")],
    );
    assert_eq!(
        plan.evaluate(&json!({"base": 1})).unwrap(),
        json!({"shipping": {"base": 5, "fee": 2}})
    );
}

// --- Expression language ---

#[test]
fn test_operators() {
    let record = json!({"a": 0, "b": 5, "s": "", "x": 3, "items": [1, 2, 3], "name": "kagami"});
    let cases = [
        ("'a' + 1", json!("a1")),
        ("a && b", json!(0)),
        ("b && a", json!(0)),
        ("s || 'fallback'", json!("fallback")),
        ("missing ?? 3", json!(3)),
        ("a ?? 3", json!(0)),
        ("x > 1 ? 'big' : 'small'", json!("big")),
        ("x in [1, 3]", json!(true)),
        ("x not in [1, 3]", json!(false)),
        ("7 % 4", json!(3)),
        ("1 / 4", json!(0.25)),
        ("items[1]", json!(2)),
        ("items.length", json!(3)),
        ("name.length", json!(6)),
        ("!a", json!(true)),
        ("x == 3.0", json!(true)),
        ("missing", Value::Null),
        ("missing.deep.path", Value::Null),
    ];
    for (source, expected) in cases {
        assert_eq!(
            eval_expression(source, record.clone()).unwrap(),
            expected,
            "{}",
            source
        );
    }
}

#[test]
fn test_helpers() {
    let record = json!({
        "items": [1, 2, 3],
        "limit": 1,
        "tags": ["a", "b"],
        "name": "Kagami",
        "order": {"id": 1, "qty": 2},
    });
    let cases = [
        ("sum(map(items, # * 2))", json!(12)),
        ("count(items, # > 1)", json!(2)),
        ("filter(items, # > limit)", json!([2, 3])),
        ("reduce(items, acc + #, 0)", json!(6)),
        ("reduce(items, total + #, 10)", json!(16)),
        ("some(items, # == 2)", json!(true)),
        ("all(items, # > 1)", json!(false)),
        ("min(items)", json!(1)),
        ("max(items)", json!(3)),
        ("avg(items)", json!(2)),
        ("avg([])", Value::Null),
        ("len(tags)", json!(2)),
        ("keys(order)", json!(["id", "qty"])),
        ("round(2.5)", json!(3)),
        ("round(-2.5)", json!(-2)),
        ("floor(2.7) + ceil(2.1)", json!(5)),
        ("abs(-4)", json!(4)),
        ("upper(name)", json!("KAGAMI")),
        ("name.toLowerCase()", json!("kagami")),
        ("contains(tags, 'a')", json!(true)),
        ("tags.includes('z')", json!(false)),
        ("startsWith(name, 'Ka')", json!(true)),
        ("endsWith(missing, 'x')", json!(false)),
        ("items.map(i => i * 10)", json!([10, 20, 30])),
        ("items.filter((v, i) => i > 0)", json!([2, 3])),
    ];
    for (source, expected) in cases {
        assert_eq!(
            eval_expression(source, record.clone()).unwrap(),
            expected,
            "{}",
            source
        );
    }
}

#[test]
fn test_round_matches_math_round_at_the_edges() {
    let cases = [
        ("round(0.49999999999999994)", json!(0)),
        ("Math.round(-0.5)", json!(0)),
        ("round(-2.6)", json!(-3)),
        ("round(4503599627370497)", json!(4503599627370497i64)),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_expression(source, json!({})).unwrap(), expected, "{}", source);
    }
}

#[test]
fn test_callback_arity_mismatch() {
    let failure = eval_expression("filter(items, (a, b, c) => a)", json!({"items": [1]})).unwrap_err();
    assert_eq!(
        failure.error,
        EvaluationError::ArityMismatch {
            function: "filter".to_string(),
            expected: 3,
            found: 2,
        }
    );
}

#[test]
fn test_type_mismatch() {
    let failure = eval_expression("weight * 2", json!({"weight": "heavy"})).unwrap_err();
    assert!(matches!(
        failure.error,
        EvaluationError::TypeMismatch { ref operation, .. } if operation == "*"
    ));
}

// --- Function nodes ---

#[test]
fn test_function_handler() {
    let plan = function_plan(
        "export const handler = async (input) => {
            // Line items total
            const subtotal = input.items.map(i => i.price * i.qty).reduce((acc, x) => acc + x, 0);
            return { subtotal, discounted: subtotal > 100 };
        };",
    );
    let record = json!({"items": [{"price": 10, "qty": 2}, {"price": 50, "qty": 2}]});
    assert_eq!(
        plan.evaluate(&record).unwrap(),
        json!({"subtotal": 120, "discounted": true})
    );
}

#[test]
fn test_function_handler_spread_and_extra_params() {
    let plan = function_plan("(input, opts) => ({ ...input, mode: opts ?? 'none' })");
    assert_eq!(
        plan.evaluate(&json!({"a": 1})).unwrap(),
        json!({"a": 1, "mode": "none"})
    );
}

#[test]
fn test_function_non_object_result_contributes_nothing() {
    let plan = function_plan("(input) => input.a + 1");
    assert_eq!(plan.evaluate(&json!({"a": 1})).unwrap(), json!({}));
}

#[test]
fn test_function_unknown_identifier_fails() {
    let plan = function_plan("(input) => ({ v: foo })");
    let failure = plan.evaluate(&json!({})).unwrap_err();
    assert_eq!(failure.node_id, "fn");
    assert_eq!(
        failure.error,
        EvaluationError::UnknownIdentifier("foo".to_string())
    );
}

// --- Failures ---

#[test]
fn test_failure_carries_partial_output() {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            expression_node("ok", &[("x", "1")]),
            expression_node("bad", &[("y", "label * 2")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![
            edge("in", "ok"),
            edge("ok", "out"),
            edge("ok", "bad"),
            edge("bad", "out"),
        ],
    );
    let failure = plan.evaluate(&json!({"label": "abc"})).unwrap_err();
    assert_eq!(failure.node_id, "bad");
    assert_eq!(failure.partial, json!({"x": 1}));
    assert!(failure.to_string().starts_with("Node 'bad' failed"));
}

#[test]
fn test_non_object_record_is_rejected() {
    let plan = identity_plan();
    let failure = plan.evaluate(&json!([1, 2])).unwrap_err();
    assert_eq!(failure.node_id, "in");
    assert_eq!(
        failure.error,
        EvaluationError::NonObjectRecord("array".to_string())
    );
}

// --- Evaluator ---

#[test]
fn test_determinism() {
    let plan = shipping_plan();
    let record = json!({"origin_country": "JP", "weight": 4});
    let first = serde_json::to_string(&plan.evaluate(&record).unwrap()).unwrap();
    let second = serde_json::to_string(&plan.evaluate(&record).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parallel_batch_preserves_order() {
    let records: Vec<Value> = (0..200)
        .map(|i| {
            if i % 37 == 0 {
                json!({"weight": "broken", "cost": 1})
            } else {
                json!({"weight": i, "cost": 1})
            }
        })
        .collect();
    let sequential = Evaluator::new(arithmetic_plan()).eval_batch(&records);
    let parallel = Evaluator::new(arithmetic_plan())
        .with_parallelism(Parallelism::Parallel)
        .eval_batch(&records);

    assert_eq!(parallel.len(), records.len());
    assert_eq!(sequential, parallel);
    assert_eq!(parallel[5].as_ref().unwrap(), &json!({"total": 26}));
    assert!(parallel[37].is_err());
    assert!(parallel[38].is_ok());
}

// --- Traces ---

#[test]
fn test_trace_records_branches_and_skips() {
    let evaluator = Evaluator::new(shipping_plan());
    let (result, trace) = evaluator.eval_traced(&json!({"origin_country": "US"}));
    assert!(result.is_ok());

    let executed: Vec<&str> = trace.executed().map(|s| s.node_id.as_str()).collect();
    let skipped: Vec<&str> = trace.skipped().map(|s| s.node_id.as_str()).collect();
    assert_eq!(executed, vec!["route", "dom"]);
    assert_eq!(skipped, vec!["intl"]);
    assert!(matches!(
        &trace.steps[0].outcome,
        StepOutcome::Ran { branch: Some(branch), .. } if branch == "domestic"
    ));

    let text = TraceFormatter::format_trace(&trace);
    assert!(text.contains("took branch 'domestic'"), "{}", text);
    assert!(
        text.contains("skipped, requires switch 'route' to take branch 'international'"),
        "{}",
        text
    );
}

#[test]
fn test_trace_records_failure() {
    let plan = function_plan("(input) => ({ v: foo })");
    let (result, trace) = plan.evaluate_traced(&json!({}));
    assert!(result.is_err());
    assert!(matches!(trace.steps.last().map(|s| &s.outcome), Some(StepOutcome::Failed { .. })));
}

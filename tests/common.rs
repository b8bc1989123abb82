//! Common test utilities for building JDM documents and plans.
use kagami::prelude::*;
use serde_json::{Value, json};

#[allow(dead_code)]
pub fn node(id: &str, node_type: &str, content: Value) -> Value {
    json!({ "id": id, "type": node_type, "name": id, "content": content })
}

#[allow(dead_code)]
pub fn edge(source: &str, target: &str) -> Value {
    json!({ "id": format!("{}->{}", source, target), "sourceId": source, "targetId": target })
}

/// An edge leaving a switch through the statement `handle`.
#[allow(dead_code)]
pub fn branch(source: &str, handle: &str, target: &str) -> Value {
    json!({
        "id": format!("{}:{}->{}", source, handle, target),
        "sourceId": source,
        "targetId": target,
        "sourceHandle": handle,
    })
}

#[allow(dead_code)]
pub fn document(nodes: Vec<Value>, edges: Vec<Value>) -> JdmDocument {
    JdmDocument::from_value(json!({ "nodes": nodes, "edges": edges }))
        .expect("test document should deserialize")
}

#[allow(dead_code)]
pub fn compile(nodes: Vec<Value>, edges: Vec<Value>) -> ExecutionPlan {
    Compiler::builder(document(nodes, edges))
        .build()
        .compile()
        .expect("test graph should compile")
}

#[allow(dead_code)]
pub fn try_compile(
    nodes: Vec<Value>,
    edges: Vec<Value>,
) -> std::result::Result<ExecutionPlan, BuildError> {
    Compiler::builder(document(nodes, edges)).build().compile()
}

#[allow(dead_code)]
pub fn expression_node(id: &str, expressions: &[(&str, &str)]) -> Value {
    let expressions: Vec<Value> = expressions
        .iter()
        .enumerate()
        .map(|(i, (key, value))| json!({ "id": format!("e{}", i), "key": key, "value": value }))
        .collect();
    node(id, "expressionNode", json!({ "expressions": expressions }))
}

/// `input -> output`, nothing in between.
#[allow(dead_code)]
pub fn identity_plan() -> ExecutionPlan {
    compile(
        vec![
            node("in", "inputNode", Value::Null),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "out")],
    )
}

/// The weight bracket table: `< 5 -> 5`, `[5..10] -> 8`, `> 10 -> 12`.
#[allow(dead_code)]
pub fn weight_table(id: &str) -> Value {
    node(
        id,
        "decisionTableNode",
        json!({
            "hitPolicy": "first",
            "inputs": [{ "id": "w", "name": "Weight", "field": "weight" }],
            "outputs": [{ "id": "b", "name": "Base", "field": "base" }],
            "rules": [
                { "_id": "r1", "w": "< 5", "b": "5" },
                { "_id": "r2", "w": "[5..10]", "b": "8" },
                { "_id": "r3", "w": "> 10", "b": "12" },
            ],
        }),
    )
}

/// `input -> table -> output`.
#[allow(dead_code)]
pub fn weight_table_plan() -> ExecutionPlan {
    compile(
        vec![
            node("in", "inputNode", Value::Null),
            weight_table("table"),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "table"), edge("table", "out")],
    )
}

/// A shipping graph split by origin:
///
/// ```text
/// in -> route --international--> intl (fee = 25) -> out
///            \--domestic-------> dom  (fee = 5)  -> out
/// ```
#[allow(dead_code)]
pub fn shipping_plan() -> ExecutionPlan {
    compile(
        vec![
            node("in", "inputNode", Value::Null),
            node(
                "route",
                "switchNode",
                json!({
                    "statements": [
                        { "id": "international", "condition": "origin_country != \"US\"" },
                        { "id": "domestic", "condition": "" },
                    ]
                }),
            ),
            expression_node("intl", &[("fee", "25"), ("zone", "\"international\"")]),
            expression_node("dom", &[("fee", "5"), ("zone", "\"domestic\"")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![
            edge("in", "route"),
            branch("route", "international", "intl"),
            branch("route", "domestic", "dom"),
            edge("intl", "out"),
            edge("dom", "out"),
        ],
    )
}

/// `input -> expression(total = weight * 5 + cost) -> output`.
#[allow(dead_code)]
pub fn arithmetic_plan() -> ExecutionPlan {
    compile(
        vec![
            node("in", "inputNode", Value::Null),
            expression_node("calc", &[("total", "weight*5+cost")]),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "calc"), edge("calc", "out")],
    )
}

/// `input -> function(source) -> output`.
#[allow(dead_code)]
pub fn function_plan(source: &str) -> ExecutionPlan {
    compile(
        vec![
            node("in", "inputNode", Value::Null),
            node("fn", "functionNode", json!({ "source": source })),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "fn"), edge("fn", "out")],
    )
}

/// Compiles a single standalone expression into a one-node plan and evaluates it.
#[allow(dead_code)]
pub fn eval_expression(
    source: &str,
    record: Value,
) -> std::result::Result<Value, StepFailure> {
    let plan = compile(
        vec![
            node("in", "inputNode", Value::Null),
            expression_node("calc", &[("result", source)]),
            node("out", "outputNode", Value::Null),
        ],
        vec![edge("in", "calc"), edge("calc", "out")],
    );
    plan.evaluate(&record).map(|output| output["result"].clone())
}

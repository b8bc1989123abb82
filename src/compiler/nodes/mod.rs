//! Per-kind compilers. Each turns one node's content into a [`CompiledStep`].
use crate::ast::{Expression, Handler};
use crate::error::{BuildError, CellLocation, ParseError};
use crate::graph::{Graph, NodeContent, NodeIndex};
use serde::{Deserialize, Serialize};

mod decision_table;
mod expression;
mod function;
mod switch;

/// A node's behaviour, compiled once and executed per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledStep {
    Expression(ExpressionStep),
    DecisionTable(DecisionTableStep),
    Switch(SwitchStep),
    Function(FunctionStep),
}

impl CompiledStep {
    pub fn kind_name(&self) -> &'static str {
        match self {
            CompiledStep::Expression(_) => "expression",
            CompiledStep::DecisionTable(_) => "decision table",
            CompiledStep::Switch(_) => "switch",
            CompiledStep::Function(_) => "function",
        }
    }
}

/// Writes the value of `expression` at the dotted `path` of the step's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub path: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStep {
    pub assignments: Vec<Assignment>,
    pub pass_through: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTableStep {
    pub rules: Vec<TableRule>,
}

/// One row: every condition must be truthy for the outputs to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRule {
    pub conditions: Vec<Expression>,
    pub outputs: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStep {
    pub branches: Vec<SwitchBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchBranch {
    pub id: String,
    /// `None` is the unconditional default.
    pub condition: Option<Expression>,
    /// Whether an edge leaves through this branch straight into an Output node.
    pub feeds_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionStep {
    pub handler: Handler,
}

/// Compiles the node at `index`. Input and Output nodes have no step.
pub fn compile_node(graph: &Graph, index: NodeIndex) -> Result<Option<CompiledStep>, BuildError> {
    let node = graph.node(index);
    let step = match &node.content {
        NodeContent::Input | NodeContent::Output => return Ok(None),
        NodeContent::Expression(content) => expression::compile(&node.id, content)?,
        NodeContent::DecisionTable(content) => decision_table::compile(&node.id, content)?,
        NodeContent::Switch(content) => switch::compile(graph, index, content)?,
        NodeContent::Function(content) => function::compile(&node.id, content)?,
    };
    Ok(Some(step))
}

fn compile_error(node_id: &str, location: CellLocation) -> impl FnOnce(ParseError) -> BuildError {
    let node_id = node_id.to_string();
    move |source| BuildError::ExpressionCompile {
        node_id,
        location,
        source,
    }
}

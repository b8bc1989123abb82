//! The execution plan: compiled steps in schedule order, each with its guard.
use crate::compiler::guards::Guard;
use crate::compiler::nodes::CompiledStep;
use crate::graph::NodeIndex;
use serde::{Deserialize, Serialize};

pub mod artifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub node: NodeIndex,
    pub node_id: String,
    pub name: String,
    pub step: CompiledStep,
    pub guard: Guard,
    /// Whether the node has a direct edge into an Output node.
    pub feeds_output: bool,
}

/// An immutable, thread-safe plan for one graph. Build it once with
/// [`crate::compiler::Compiler`] and evaluate any number of records against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    entries: Vec<PlanEntry>,
    input: NodeIndex,
    node_ids: Vec<String>,
    input_feeds_output: bool,
    ambiguous_guards: Vec<String>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        entries: Vec<PlanEntry>,
        input: NodeIndex,
        node_ids: Vec<String>,
        input_feeds_output: bool,
        ambiguous_guards: Vec<String>,
    ) -> Self {
        Self {
            entries,
            input,
            node_ids,
            input_feeds_output,
            ambiguous_guards,
        }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn input(&self) -> NodeIndex {
        self.input
    }

    /// Node ids by [`NodeIndex`], for every node of the source graph.
    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    pub fn node_id(&self, node: NodeIndex) -> Option<&str> {
        self.node_ids.get(node).map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Whether the Input node feeds an Output node directly, so the raw record is part of
    /// every result.
    pub fn input_feeds_output(&self) -> bool {
        self.input_feeds_output
    }

    /// Ids of nodes reachable under more than one distinct guard.
    pub fn ambiguous_guards(&self) -> &[String] {
        &self.ambiguous_guards
    }
}

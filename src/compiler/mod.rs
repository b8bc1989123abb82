//! Turns a JDM document into an [`ExecutionPlan`].
//!
//! Construction runs in four phases: load and validate the graph, analyse guards,
//! schedule, and compile every scheduled node. Any failure makes the graph unbuildable.
use crate::error::BuildError;
use crate::graph::{Graph, JdmDocument, NodeKind};
use crate::plan::{ExecutionPlan, PlanEntry};
use ahash::AHashMap;
use tracing::debug;

pub mod cells;
pub mod guards;
pub mod nodes;
pub mod scheduler;

use guards::compute_guards;
use nodes::compile_node;
use scheduler::schedule;

pub struct Compiler {
    document: JdmDocument,
    type_map: AHashMap<String, NodeKind>,
    strict_guards: bool,
}

pub struct CompilerBuilder {
    document: JdmDocument,
    type_map: AHashMap<String, NodeKind>,
    strict_guards: bool,
}

impl CompilerBuilder {
    pub fn new(document: JdmDocument) -> Self {
        Self {
            document,
            type_map: AHashMap::new(),
            strict_guards: false,
        }
    }

    /// Treats nodes of raw type `user_type_name` as `kind`.
    pub fn with_type_mapping(mut self, user_type_name: &str, kind: NodeKind) -> Self {
        self.type_map.insert(user_type_name.to_string(), kind);
        self
    }

    /// Rejects graphs in which a node is reachable under conflicting guards.
    pub fn strict_guards(mut self, strict: bool) -> Self {
        self.strict_guards = strict;
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            document: self.document,
            type_map: self.type_map,
            strict_guards: self.strict_guards,
        }
    }
}

impl Compiler {
    pub fn builder(document: JdmDocument) -> CompilerBuilder {
        CompilerBuilder::new(document)
    }

    /// Parses and compiles a JSON document with default settings.
    pub fn from_json(json: &str) -> Result<ExecutionPlan, BuildError> {
        Self::builder(JdmDocument::from_json(json)?).build().compile()
    }

    pub fn compile(self) -> Result<ExecutionPlan, BuildError> {
        let graph = Graph::load(self.document, &self.type_map)?;
        debug!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            "graph loaded"
        );

        let guards = compute_guards(&graph)?;
        if let Some(&node) = guards.ambiguous().first() {
            if self.strict_guards {
                return Err(BuildError::AmbiguousGuard {
                    node_id: graph.node(node).id.clone(),
                });
            }
        }
        debug!(ambiguous = guards.ambiguous().len(), "guards computed");

        let schedule = schedule(&graph)?;
        debug!(
            steps = schedule.order.len(),
            sinks = schedule.sinks.len(),
            blocked = schedule.blocked.len(),
            "schedule built"
        );

        let mut entries = Vec::with_capacity(schedule.order.len());
        for &index in &schedule.order {
            // Scheduled nodes are reachable, so they always carry a guard.
            let Some(guard) = guards.get(index) else {
                continue;
            };
            let Some(step) = compile_node(&graph, index)? else {
                continue;
            };
            let node = graph.node(index);
            entries.push(PlanEntry {
                node: index,
                node_id: node.id.clone(),
                name: node.name.clone(),
                step,
                guard: guard.clone(),
                feeds_output: graph.feeds_output(index),
            });
        }
        debug!(entries = entries.len(), "nodes compiled");

        let node_ids = graph.nodes().iter().map(|node| node.id.clone()).collect();
        let ambiguous = guards
            .ambiguous()
            .iter()
            .map(|&node| graph.node(node).id.clone())
            .collect();
        Ok(ExecutionPlan::new(
            entries,
            graph.input(),
            node_ids,
            graph.feeds_output(graph.input()),
            ambiguous,
        ))
    }
}

//! Branch-reachability analysis: which switch choices must hold for a node to run.
use crate::error::{BuildError, GraphStructureError};
use crate::graph::{Graph, NodeContent, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Position of a statement within its switch node.
pub type BranchIndex = usize;

/// The `(switch, branch)` choices a node depends on. Empty means unconditional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard(Vec<(NodeIndex, BranchIndex)>);

impl Guard {
    pub fn new(conditions: Vec<(NodeIndex, BranchIndex)>) -> Self {
        Self(conditions)
    }

    pub fn conditions(&self) -> &[(NodeIndex, BranchIndex)] {
        &self.0
    }

    pub fn is_unconditional(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every required switch has recorded exactly the required branch.
    pub fn holds(&self, choices: &[Option<BranchIndex>]) -> bool {
        self.first_unmet(choices).is_none()
    }

    /// The first `(switch, branch)` requirement that the recorded choices do not satisfy.
    pub fn first_unmet(&self, choices: &[Option<BranchIndex>]) -> Option<(NodeIndex, BranchIndex)> {
        self.0
            .iter()
            .copied()
            .find(|&(switch, branch)| choices.get(switch).copied().flatten() != Some(branch))
    }

    fn extended(&self, switch: NodeIndex, branch: BranchIndex) -> Self {
        let mut conditions = Vec::with_capacity(self.0.len() + 1);
        conditions.extend_from_slice(&self.0);
        conditions.push((switch, branch));
        Self(conditions)
    }
}

/// Guards for every node of a graph. Nodes not reachable from Input have none.
#[derive(Debug, Clone)]
pub struct Guards {
    guards: Vec<Option<Guard>>,
    ambiguous: Vec<NodeIndex>,
}

impl Guards {
    pub fn get(&self, node: NodeIndex) -> Option<&Guard> {
        self.guards.get(node).and_then(Option::as_ref)
    }

    /// Nodes reached along paths that disagree about the required branches. Each keeps the
    /// guard of its first discovery.
    pub fn ambiguous(&self) -> &[NodeIndex] {
        &self.ambiguous
    }
}

/// Resolves the branch an edge leaves its switch through, if any.
fn branch_of(graph: &Graph, edge_index: usize) -> Result<Option<BranchIndex>, GraphStructureError> {
    let edge = &graph.edges()[edge_index];
    let (NodeContent::Switch(content), Some(handle)) =
        (&graph.node(edge.source).content, edge.source_handle.as_deref())
    else {
        return Ok(None);
    };
    content
        .statements
        .iter()
        .position(|statement| statement.id == handle)
        .map(Some)
        .ok_or_else(|| GraphStructureError::UnknownBranch {
            edge_id: edge.id.clone(),
            switch_id: graph.node(edge.source).id.clone(),
            handle: handle.to_string(),
        })
}

/// Stack-based depth-first walk from the Input node. A node takes the guard of the first
/// path that discovers it; later paths never overwrite it.
pub fn compute_guards(graph: &Graph) -> Result<Guards, BuildError> {
    let branches = (0..graph.edges().len())
        .map(|edge| branch_of(graph, edge))
        .collect::<Result<Vec<_>, _>>()?;

    let mut guards: Vec<Option<Guard>> = vec![None; graph.nodes().len()];
    let mut ambiguous = Vec::new();
    guards[graph.input()] = Some(Guard::default());
    let mut stack = vec![graph.input()];

    while let Some(node) = stack.pop() {
        let base = guards[node].clone().unwrap_or_default();
        for &edge_index in graph.outgoing_edges(node) {
            let edge = &graph.edges()[edge_index];
            let guard = match branches[edge_index] {
                Some(branch) => base.extended(node, branch),
                None => base.clone(),
            };
            match &guards[edge.target] {
                None => {
                    guards[edge.target] = Some(guard);
                    stack.push(edge.target);
                }
                Some(existing) if *existing != guard => {
                    if !ambiguous.contains(&edge.target) {
                        warn!(
                            node_id = %graph.node(edge.target).id,
                            "node is reachable under more than one guard; keeping the first"
                        );
                        ambiguous.push(edge.target);
                    }
                }
                Some(_) => {}
            }
        }
    }

    Ok(Guards { guards, ambiguous })
}

//! Execution order: Kahn's algorithm seeded with the Input node.
use crate::error::{BuildError, GraphStructureError};
use crate::graph::{Graph, NodeIndex};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Runnable nodes in execution order. Neither the Input node nor sinks appear here.
    pub order: Vec<NodeIndex>,
    /// Output nodes reached by the walk.
    pub sinks: Vec<NodeIndex>,
    /// Reachable nodes that never run because an edge from an unreachable node keeps
    /// their in-degree above zero.
    pub blocked: Vec<NodeIndex>,
}

pub fn schedule(graph: &Graph) -> Result<Schedule, BuildError> {
    let count = graph.nodes().len();
    let mut in_degree = vec![0usize; count];
    for edge in graph.edges() {
        in_degree[edge.target] += 1;
    }

    let mut schedule = Schedule::default();
    let mut visited = vec![false; count];
    let mut queue = VecDeque::from([graph.input()]);
    visited[graph.input()] = true;

    while let Some(node) = queue.pop_front() {
        for edge in graph.outgoing(node) {
            let next = edge.target;
            in_degree[next] = in_degree[next].saturating_sub(1);
            if in_degree[next] == 0 && !visited[next] {
                visited[next] = true;
                if graph.is_output(next) {
                    schedule.sinks.push(next);
                } else {
                    schedule.order.push(next);
                }
                queue.push_back(next);
            }
        }
    }

    let reachable = graph.reachable_from_input();
    let stuck: Vec<NodeIndex> = (0..count)
        .filter(|&node| reachable[node] && !visited[node])
        .collect();
    if stuck.is_empty() {
        return Ok(schedule);
    }

    // Drop the edges coming from unreachable nodes and drain what is left. Whatever
    // still cannot drain sits on a cycle.
    let mut live_degree = in_degree;
    for edge in graph.edges() {
        if !reachable[edge.source] {
            live_degree[edge.target] = live_degree[edge.target].saturating_sub(1);
        }
    }
    let mut drained = vec![false; count];
    let mut queue: VecDeque<NodeIndex> = stuck
        .iter()
        .copied()
        .filter(|&node| live_degree[node] == 0)
        .collect();
    while let Some(node) = queue.pop_front() {
        drained[node] = true;
        for edge in graph.outgoing(node) {
            let next = edge.target;
            if visited[next] || drained[next] {
                continue;
            }
            live_degree[next] = live_degree[next].saturating_sub(1);
            if live_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    let cycle: Vec<String> = stuck
        .iter()
        .filter(|&&node| !drained[node] && !graph.is_output(node))
        .map(|&node| graph.node(node).id.clone())
        .collect();
    if !cycle.is_empty() {
        return Err(GraphStructureError::Cycle { nodes: cycle }.into());
    }

    for &node in &stuck {
        warn!(
            node_id = %graph.node(node).id,
            "node is fed by an unreachable node and will never run"
        );
    }
    schedule.blocked = stuck;
    Ok(schedule)
}

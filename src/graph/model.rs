use super::definition::{JdmDocument, NodeContent, NodeKind};
use crate::error::{BuildError, GraphStructureError};
use ahash::AHashMap;

/// Position of a node in [`Graph::nodes`]. Stable for the lifetime of a graph and of
/// every plan built from it.
pub type NodeIndex = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub content: NodeContent,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub source_handle: Option<String>,
}

/// A validated decision graph with typed node content and outgoing adjacency.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: AHashMap<String, NodeIndex>,
    /// Edge indices leaving each node, in document order.
    outgoing: Vec<Vec<usize>>,
    input: NodeIndex,
}

impl Graph {
    /// Validates a raw document and converts it into a graph.
    ///
    /// `type_map` resolves raw type names that are not built in; it is consulted before
    /// the built-in names so that callers can also override those.
    pub fn load(
        document: JdmDocument,
        type_map: &AHashMap<String, NodeKind>,
    ) -> Result<Self, BuildError> {
        let mut nodes: Vec<Node> = Vec::with_capacity(document.nodes.len());
        let mut index = AHashMap::with_capacity(document.nodes.len());
        let mut input: Option<NodeIndex> = None;

        for raw in document.nodes {
            let kind = type_map
                .get(&raw.node_type)
                .copied()
                .or_else(|| NodeKind::from_type_name(&raw.node_type))
                .ok_or_else(|| BuildError::UnsupportedNode {
                    node_id: raw.id.clone(),
                    type_name: raw.node_type.clone(),
                })?;

            if index.contains_key(&raw.id) {
                return Err(GraphStructureError::DuplicateNode(raw.id).into());
            }
            let position = nodes.len();
            if kind == NodeKind::Input {
                if let Some(first) = input {
                    return Err(GraphStructureError::MultipleInputNodes {
                        first: nodes[first].id.clone(),
                        second: raw.id,
                    }
                    .into());
                }
                input = Some(position);
            }

            let content =
                NodeContent::parse(kind, raw.content).map_err(|e| BuildError::InvalidContent {
                    node_id: raw.id.clone(),
                    message: e.to_string(),
                })?;
            index.insert(raw.id.clone(), position);
            nodes.push(Node {
                name: raw.name.unwrap_or_else(|| raw.id.clone()),
                id: raw.id,
                content,
            });
        }

        let input = input.ok_or(GraphStructureError::MissingInputNode)?;

        let mut edges = Vec::with_capacity(document.edges.len());
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (position, raw) in document.edges.into_iter().enumerate() {
            let id = raw.id.unwrap_or_else(|| format!("edge-{}", position));
            let resolve = |node_id: &str| {
                index.get(node_id).copied().ok_or_else(|| {
                    GraphStructureError::DanglingEdge {
                        edge_id: id.clone(),
                        node_id: node_id.to_string(),
                    }
                })
            };
            let source = resolve(&raw.source_id)?;
            let target = resolve(&raw.target_id)?;
            outgoing[source].push(edges.len());
            edges.push(Edge {
                id,
                source,
                target,
                source_handle: raw.source_handle.filter(|handle| !handle.is_empty()),
            });
        }

        let graph = Self {
            nodes,
            edges,
            index,
            outgoing,
            input,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn input(&self) -> NodeIndex {
        self.input
    }

    /// Indices into [`Graph::edges`] of the edges leaving `node`, in document order.
    pub fn outgoing_edges(&self, node: NodeIndex) -> &[usize] {
        &self.outgoing[node]
    }

    pub fn outgoing(&self, node: NodeIndex) -> impl Iterator<Item = &Edge> {
        self.outgoing[node].iter().map(|&edge| &self.edges[edge])
    }

    pub fn is_output(&self, node: NodeIndex) -> bool {
        self.nodes[node].kind() == NodeKind::Output
    }

    /// True when `node` has a direct edge into an Output node.
    pub fn feeds_output(&self, node: NodeIndex) -> bool {
        self.outgoing(node).any(|edge| self.is_output(edge.target))
    }

    /// True when some edge leaves `node` through `handle` into an Output node.
    pub fn handle_feeds_output(&self, node: NodeIndex, handle: &str) -> bool {
        self.outgoing(node).any(|edge| {
            edge.source_handle.as_deref() == Some(handle) && self.is_output(edge.target)
        })
    }

    /// Marks every node reachable from the Input node.
    pub fn reachable_from_input(&self) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.input];
        seen[self.input] = true;
        while let Some(node) = stack.pop() {
            for edge in self.outgoing(node) {
                if !seen[edge.target] {
                    seen[edge.target] = true;
                    stack.push(edge.target);
                }
            }
        }
        seen
    }

    /// Iterative three-colour DFS over the whole graph, reachable or not.
    fn check_acyclic(&self) -> Result<(), GraphStructureError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        for root in 0..self.nodes.len() {
            if marks[root] != Mark::New {
                continue;
            }
            // (node, position in its outgoing list)
            let mut path: Vec<(NodeIndex, usize)> = vec![(root, 0)];
            marks[root] = Mark::Active;

            while let Some(frame) = path.last_mut() {
                let node = frame.0;
                let Some(&edge) = self.outgoing[node].get(frame.1) else {
                    marks[node] = Mark::Done;
                    path.pop();
                    continue;
                };
                frame.1 += 1;
                let target = self.edges[edge].target;
                match marks[target] {
                    Mark::New => {
                        marks[target] = Mark::Active;
                        path.push((target, 0));
                    }
                    Mark::Active => {
                        let start = path.iter().position(|&(n, _)| n == target).unwrap_or(0);
                        let nodes = path[start..]
                            .iter()
                            .map(|&(n, _)| self.nodes[n].id.clone())
                            .collect();
                        return Err(GraphStructureError::Cycle { nodes });
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }
}

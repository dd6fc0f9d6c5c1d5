use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::ops::Op;

/// Where an edge takes its value from: a designated external input of the
/// rule, or another node of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Input(u32),
    Node(u32),
}

/// A single incoming edge of a node.
///
/// An edge flagged `recurrent` does not participate in the topological
/// ordering; its value is the previous-cycle value of its source node,
/// threaded through an explicit state slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: Source,
    pub weight: f32,
    pub recurrent: bool,
}

/// One node of an evolved computation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Operation identifier drawn from the library namespace.
    pub op: String,
    pub edges: Vec<Edge>,
}

/// An evolved computation graph as handed over by the evolutionary
/// subsystem.
///
/// Nodes live in an arena addressed by index. The orderings exposed here are
/// contractual: generated parameter order and buffer layout depend on the
/// output list and on [`Graph::recurrent_edges`] staying stable for a given
/// graph instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Number of external inputs the compiled rule will take.
    pub input_count: u32,
    pub nodes: Vec<Node>,
    /// Designated output nodes, in parameter order.
    pub outputs: Vec<u32>,
}

/// Identifies one recurrent edge: the consuming node, the edge position
/// within that node, and the node whose previous-cycle value it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrentEdge {
    pub node: u32,
    pub edge: u32,
    pub source: u32,
}

/// Structural defects that make a graph uncompilable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownOperation { node: u32, identifier: String },
    InputIndexOutOfRange { node: u32, edge: u32, index: u32 },
    NodeIndexOutOfRange { node: u32, edge: u32, index: u32 },
    OutputOutOfRange { index: u32 },
    RecurrentFromInput { node: u32, edge: u32 },
    Cyclic { node: u32 },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::UnknownOperation { node, identifier } => {
                write!(f, "node {node} references unknown operation {identifier:?}")
            }
            GraphError::InputIndexOutOfRange { node, edge, index } => {
                write!(f, "node {node} edge {edge}: input index {index} out of range")
            }
            GraphError::NodeIndexOutOfRange { node, edge, index } => {
                write!(f, "node {node} edge {edge}: node index {index} out of range")
            }
            GraphError::OutputOutOfRange { index } => {
                write!(f, "output node index {index} out of range")
            }
            GraphError::RecurrentFromInput { node, edge } => {
                write!(f, "node {node} edge {edge}: recurrent edge from a graph input")
            }
            GraphError::Cyclic { node } => {
                write!(f, "non-recurrent cycle through node {node}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

impl Graph {
    /// Create a graph, validating it in full.
    pub fn new(input_count: u32, nodes: Vec<Node>, outputs: Vec<u32>) -> Result<Self, GraphError> {
        let graph = Self {
            input_count,
            nodes,
            outputs,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Check every structural invariant: operation identifiers within the
    /// library, edge and output indices in range, recurrence only from nodes,
    /// and acyclicity once recurrent edges are excluded.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (i, node) in self.nodes.iter().enumerate() {
            let node_idx = i as u32;
            if Op::from_identifier(&node.op).is_none() {
                return Err(GraphError::UnknownOperation {
                    node: node_idx,
                    identifier: node.op.clone(),
                });
            }
            for (e, edge) in node.edges.iter().enumerate() {
                let edge_idx = e as u32;
                match edge.source {
                    Source::Input(index) => {
                        if index >= self.input_count {
                            return Err(GraphError::InputIndexOutOfRange {
                                node: node_idx,
                                edge: edge_idx,
                                index,
                            });
                        }
                        if edge.recurrent {
                            return Err(GraphError::RecurrentFromInput {
                                node: node_idx,
                                edge: edge_idx,
                            });
                        }
                    }
                    Source::Node(index) => {
                        if index as usize >= self.nodes.len() {
                            return Err(GraphError::NodeIndexOutOfRange {
                                node: node_idx,
                                edge: edge_idx,
                                index,
                            });
                        }
                    }
                }
            }
        }
        for &output in &self.outputs {
            if output as usize >= self.nodes.len() {
                return Err(GraphError::OutputOutOfRange { index: output });
            }
        }
        self.evaluation_order().map(|_| ())
    }

    /// Resolve the operation of a node. The index must be in range.
    pub(crate) fn node_op(&self, index: u32) -> Option<Op> {
        Op::from_identifier(&self.nodes[index as usize].op)
    }

    /// The contractual ordered list of recurrent edges: nodes in index order,
    /// edges in declaration order within each node.
    pub fn recurrent_edges(&self) -> Vec<RecurrentEdge> {
        let mut recurrent = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for (e, edge) in node.edges.iter().enumerate() {
                if edge.recurrent {
                    if let Source::Node(source) = edge.source {
                        recurrent.push(RecurrentEdge {
                            node: i as u32,
                            edge: e as u32,
                            source,
                        });
                    }
                }
            }
        }
        recurrent
    }

    /// Topologically order the nodes over non-recurrent node-to-node edges,
    /// so every node appears after all of its same-cycle dependencies.
    pub fn evaluation_order(&self) -> Result<Vec<u32>, GraphError> {
        let mut dag = DiGraph::<(), ()>::new();
        let indices: Vec<NodeIndex> = (0..self.nodes.len()).map(|_| dag.add_node(())).collect();
        for (i, node) in self.nodes.iter().enumerate() {
            for edge in &node.edges {
                if edge.recurrent {
                    continue;
                }
                if let Source::Node(source) = edge.source {
                    dag.add_edge(indices[source as usize], indices[i], ());
                }
            }
        }
        let order = toposort(&dag, None).map_err(|cycle| GraphError::Cyclic {
            node: cycle.node_id().index() as u32,
        })?;
        Ok(order.into_iter().map(|n| n.index() as u32).collect())
    }
}

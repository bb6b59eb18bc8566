//! Generic attributed graph.

use rustc_hash::FxHashMap;

/// One graph node: an id and an opaque label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
}

/// A directed graph with labeled nodes, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<(usize, usize)>,
    index: FxHashMap<String, usize>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes in declaration order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by index.
    #[must_use]
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Edges as (source, target) node-index pairs, in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Index of a node by id.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, or update an existing node's label if the new label is
    /// non-empty (dot allows re-declaring a node to attach attributes).
    pub fn add_node(&mut self, id: &str, label: &str) -> usize {
        if let Some(&index) = self.index.get(id) {
            if !label.is_empty() {
                self.nodes[index].label = label.to_string();
            }
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            id: id.to_string(),
            label: label.to_string(),
        });
        self.index.insert(id.to_string(), index);
        index
    }

    /// Add a directed edge between existing nodes.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.edges.push((from, to));
    }
}

//! Reading graph
//!
//! Books and authors as nodes; `written_by` edges join a book to its author
//! and weighted `related` edges join similar books. The graph is built once
//! per job by [`build_graph`] and is read-only afterwards.

pub mod builder;
pub mod query;
pub mod render;

pub use builder::{build_graph, similarity};
pub use query::{rank_recommendations, Recommendation, Subgraph, SubgraphEdge, UNREAD_KEY_PREFIX};
pub use render::render_html;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Graph/URL key prefix for author nodes
pub const AUTHOR_KEY_PREFIX: &str = "author::";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("No book found for key '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Book,
    Author,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// `book::<id>` or `author::<name>`
    pub key: String,
    pub kind: NodeKind,
    /// Title for books, name for authors
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Catalogue suggestion outside the reading history
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unread: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    WrittenBy,
    Related,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub weight: f64,
}

/// Undirected book/author graph with a key index
#[derive(Debug, Default)]
pub struct ReadingGraph {
    graph: UnGraph<GraphNode, GraphEdge>,
    index: HashMap<String, NodeIndex>,
}

impl ReadingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node by its full key
    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        self.index.get(key).and_then(|idx| self.graph.node_weight(*idx))
    }

    /// Weight of the edge between two keys, in either direction
    pub fn edge_between(&self, a: &str, b: &str) -> Option<GraphEdge> {
        let (a, b) = (self.index.get(a)?, self.index.get(b)?);
        let edge = self.graph.find_edge(*a, *b)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Insert a node unless its key already exists
    fn ensure_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(idx) = self.index.get(&node.key) {
            return *idx;
        }
        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        idx
    }

    /// Add an edge, merging duplicates by maximum weight
    ///
    /// Self-edges are ignored.
    fn upsert_edge(&mut self, a: NodeIndex, b: NodeIndex, edge: GraphEdge) {
        if a == b {
            return;
        }
        let weight = round_weight(edge.weight);
        match self.graph.find_edge(a, b) {
            Some(existing) => {
                if let Some(current) = self.graph.edge_weight_mut(existing) {
                    current.weight = current.weight.max(weight);
                }
            }
            None => {
                self.graph.add_edge(a, b, GraphEdge { weight, ..edge });
            }
        }
    }
}

fn round_weight(weight: f64) -> f64 {
    (weight * 1000.0).round() / 1000.0
}

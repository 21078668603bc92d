//! Subgraph and recommendation queries

use super::{round_weight, similarity, EdgeKind, GraphError, GraphNode, NodeKind, ReadingGraph};
use crate::enrichment::CatalogueBook;
use crate::models::{BookRecord, BOOK_KEY_PREFIX};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: f64,
}

/// A book plus its direct neighbours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub root: String,
    /// Root first, then neighbours by key
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<SubgraphEdge>,
}

/// Key prefix for suggested books that are not in the reading history
pub const UNREAD_KEY_PREFIX: &str = "unread::";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub key: String,
    pub title: String,
    pub author: Option<String>,
    pub weight: f64,
    /// How the book was reached from the queried one
    pub via: EdgeKind,
    /// Suggested from a catalogue rather than the reading history
    #[serde(default)]
    pub unread: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Catalogue identifier, for unread suggestions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl Recommendation {
    /// A catalogue book scored by its similarity to `root`
    ///
    /// Books by the root's author count as reached through the author.
    pub fn unread(root: &BookRecord, candidate: &CatalogueBook) -> Self {
        let record = candidate.to_record();
        let via = if candidate.author == root.author {
            EdgeKind::WrittenBy
        } else {
            EdgeKind::Related
        };
        Self {
            key: format!("{UNREAD_KEY_PREFIX}{}", record.id),
            weight: round_weight(similarity(root, &record)),
            title: record.title,
            author: Some(record.author),
            via,
            unread: true,
            cover_url: record.cover_url,
            external_id: candidate.external_id.clone(),
        }
    }
}

/// Order by weight descending, then title, keeping the first `top_n`
pub fn rank_recommendations(recommendations: &mut Vec<Recommendation>, top_n: usize) {
    recommendations.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.title.cmp(&b.title)));
    recommendations.truncate(top_n);
}

impl Subgraph {
    /// Add unread suggestions as nodes linked to the root
    pub fn attach_unread(&mut self, suggestions: &[Recommendation]) {
        for rec in suggestions.iter().filter(|r| r.unread) {
            if self.nodes.iter().any(|n| n.key == rec.key) {
                continue;
            }
            self.nodes.push(GraphNode {
                key: rec.key.clone(),
                kind: NodeKind::Book,
                label: rec.title.clone(),
                author: rec.author.clone(),
                rating: None,
                unread: true,
            });
            self.edges.push(SubgraphEdge {
                source: self.root.clone(),
                target: rec.key.clone(),
                kind: rec.via,
                weight: rec.weight,
            });
        }
    }
}

impl ReadingGraph {
    /// Full node key of the book addressed by `key`
    pub fn book_key(&self, key: &str) -> Result<String, GraphError> {
        let idx = self.resolve_book(key)?;
        Ok(self.graph[idx].key.clone())
    }

    /// Resolve `book::<id>` or a bare id to a book node
    fn resolve_book(&self, key: &str) -> Result<NodeIndex, GraphError> {
        let full = if key.starts_with(BOOK_KEY_PREFIX) {
            key.to_string()
        } else {
            format!("{BOOK_KEY_PREFIX}{key}")
        };
        self.index
            .get(&full)
            .copied()
            .filter(|idx| self.graph[*idx].kind == NodeKind::Book)
            .ok_or_else(|| GraphError::NotFound(key.to_string()))
    }

    /// The queried book, its direct neighbours, and every edge among them
    pub fn subgraph(&self, key: &str) -> Result<Subgraph, GraphError> {
        let root = self.resolve_book(key)?;

        let mut members: BTreeSet<NodeIndex> = self.graph.neighbors(root).collect();
        members.insert(root);

        let mut nodes: Vec<GraphNode> = members
            .iter()
            .filter(|idx| **idx != root)
            .map(|idx| self.graph[*idx].clone())
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        nodes.insert(0, self.graph[root].clone());

        let mut edges: Vec<SubgraphEdge> = self
            .graph
            .edge_references()
            .filter(|e| members.contains(&e.source()) && members.contains(&e.target()))
            .map(|e| SubgraphEdge {
                source: self.graph[e.source()].key.clone(),
                target: self.graph[e.target()].key.clone(),
                kind: e.weight().kind,
                weight: e.weight().weight,
            })
            .collect();
        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

        Ok(Subgraph {
            root: self.graph[root].key.clone(),
            nodes,
            edges,
        })
    }

    /// Other books reachable through `related` edges or through the author
    ///
    /// Books reached both ways keep the higher weight. Ordered by weight
    /// descending, then title.
    pub fn recommend(&self, key: &str, top_n: usize) -> Result<Vec<Recommendation>, GraphError> {
        let root = self.resolve_book(key)?;
        let mut best: HashMap<NodeIndex, (f64, EdgeKind)> = HashMap::new();
        let mut offer = |idx: NodeIndex, weight: f64, via: EdgeKind| {
            if idx == root {
                return;
            }
            let entry = best.entry(idx).or_insert((weight, via));
            if weight > entry.0 {
                *entry = (weight, via);
            }
        };

        for edge in self.graph.edges(root) {
            let neighbour = other_end(&edge, root);
            match self.graph[neighbour].kind {
                NodeKind::Book => offer(neighbour, edge.weight().weight, EdgeKind::Related),
                NodeKind::Author => {
                    for other in self.graph.edges(neighbour) {
                        let book = other_end(&other, neighbour);
                        if self.graph[book].kind == NodeKind::Book {
                            offer(book, other.weight().weight, EdgeKind::WrittenBy);
                        }
                    }
                }
            }
        }

        let mut ranked: Vec<Recommendation> = best
            .into_iter()
            .map(|(idx, (weight, via))| {
                let node = &self.graph[idx];
                Recommendation {
                    key: node.key.clone(),
                    title: node.label.clone(),
                    author: node.author.clone(),
                    weight,
                    via,
                    unread: false,
                    cover_url: None,
                    external_id: None,
                }
            })
            .collect();
        rank_recommendations(&mut ranked, top_n);
        Ok(ranked)
    }
}

fn other_end<E: EdgeRef<NodeId = NodeIndex>>(edge: &E, from: NodeIndex) -> NodeIndex {
    if edge.source() == from {
        edge.target()
    } else {
        edge.source()
    }
}

//! Graph construction from enriched records

use super::{EdgeKind, GraphEdge, GraphNode, NodeKind, ReadingGraph, AUTHOR_KEY_PREFIX};
use crate::models::BookRecord;
use std::collections::HashSet;

/// Minimum similarity for a `related` edge between books by different authors
pub const RELATED_THRESHOLD: f64 = 0.3;

const AUTHOR_WEIGHT: f64 = 0.5;
const SUBJECT_WEIGHT: f64 = 0.3;
const RATING_WEIGHT: f64 = 0.1;
const ERA_WEIGHT: f64 = 0.1;
/// Publication years further apart than this contribute nothing
const ERA_SPAN_YEARS: f64 = 20.0;

/// `written_by` weight: 1.0 neutral, up to 1.2 for a five-star rating
pub fn written_by_weight(rating: Option<u8>) -> f64 {
    match rating {
        Some(r) => (1.0 + (f64::from(r) - 3.0) * 0.1).min(1.2),
        None => 1.0,
    }
}

/// Similarity between two books in `[0, 1]`
pub fn similarity(a: &BookRecord, b: &BookRecord) -> f64 {
    similarity_with_subjects(a, &subject_set(a), b, &subject_set(b))
}

/// [`similarity`] with each book's subject set already folded
fn similarity_with_subjects(
    a: &BookRecord,
    a_subjects: &HashSet<String>,
    b: &BookRecord,
    b_subjects: &HashSet<String>,
) -> f64 {
    let same_author = if a.author == b.author { 1.0 } else { 0.0 };
    let subjects = jaccard(a_subjects, b_subjects);

    let rating = match (a.rating, b.rating) {
        (Some(x), Some(y)) => 1.0 - f64::from(x.abs_diff(y)) / 4.0,
        _ => 0.0,
    };
    let era = match (a.pub_year, b.pub_year) {
        (Some(x), Some(y)) => (1.0 - f64::from(x.abs_diff(y)) / ERA_SPAN_YEARS).max(0.0),
        _ => 0.0,
    };

    AUTHOR_WEIGHT * same_author + SUBJECT_WEIGHT * subjects + RATING_WEIGHT * rating + ERA_WEIGHT * era
}

fn subject_set(book: &BookRecord) -> HashSet<String> {
    book.subjects.iter().map(|s| s.trim().to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Build the graph for one job
///
/// Node and edge insertion follows input order, so the same records always
/// produce the same graph.
pub fn build_graph(records: &[BookRecord]) -> ReadingGraph {
    let mut graph = ReadingGraph::new();
    let mut book_nodes = Vec::with_capacity(records.len());

    for book in records {
        let book_idx = graph.ensure_node(GraphNode {
            key: book.node_key(),
            kind: NodeKind::Book,
            label: book.title.clone(),
            author: Some(book.author.clone()),
            rating: book.rating,
            unread: false,
        });
        let author_idx = graph.ensure_node(GraphNode {
            key: format!("{AUTHOR_KEY_PREFIX}{}", book.author),
            kind: NodeKind::Author,
            label: book.author.clone(),
            author: None,
            rating: None,
            unread: false,
        });
        graph.upsert_edge(
            book_idx,
            author_idx,
            GraphEdge {
                kind: EdgeKind::WrittenBy,
                weight: written_by_weight(book.rating),
            },
        );
        book_nodes.push(book_idx);
    }

    let subjects: Vec<HashSet<String>> = records.iter().map(subject_set).collect();
    let mut related = 0usize;
    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            let (a, b) = (&records[i], &records[j]);
            let score = similarity_with_subjects(a, &subjects[i], b, &subjects[j]);
            if a.author == b.author || score >= RELATED_THRESHOLD {
                graph.upsert_edge(
                    book_nodes[i],
                    book_nodes[j],
                    GraphEdge {
                        kind: EdgeKind::Related,
                        weight: score,
                    },
                );
                related += 1;
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        related,
        "Reading graph built"
    );
    graph
}

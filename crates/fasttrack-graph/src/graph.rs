//! Core graph data structure.
//!
//! The TrackingGraph owns every node and edge and keeps id indexes for
//! fast lookups. It's the central data structure that everything else
//! works with: constructors and the tracker write to it, queries read it,
//! and persistence hands its document to disk and back.

use crate::edge::{Edge, EdgeKind};
use chrono::Utc;
use fasttrack_core::{Node, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// The persisted shape of the graph: `{ "nodes": [...], "edges": [...] }`.
///
/// Both arrays are required; a document missing either fails to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// The tracking graph.
///
/// Nodes and edges are kept in insertion order. Writes are upserts keyed by
/// id, so a replaced entity keeps its position. The store has no internal
/// locking; share it behind a lock when more than one task writes.
#[derive(Debug, Clone, Default)]
pub struct TrackingGraph {
    doc: GraphDocument,

    /// Maps node ids to positions in `doc.nodes`.
    node_index: HashMap<String, usize>,

    /// Maps edge ids to positions in `doc.edges`.
    edge_index: HashMap<String, usize>,
}

impl TrackingGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph from a loaded document.
    pub fn from_document(doc: GraphDocument) -> Self {
        let mut graph = Self::new();
        graph.set_graph(doc);
        graph
    }

    /// Returns the live collections.
    ///
    /// The view is read-only; all mutation goes through the store's methods
    /// so the indexes stay in sync.
    pub fn graph(&self) -> &GraphDocument {
        &self.doc
    }

    /// Replaces the entire content of the store.
    ///
    /// No validation is performed. If the document repeats an id, lookups
    /// resolve to the first occurrence.
    pub fn set_graph(&mut self, doc: GraphDocument) {
        self.doc = doc;
        self.rebuild_indexes();
        debug!(
            "Graph replaced: {} nodes, {} edges",
            self.doc.nodes.len(),
            self.doc.edges.len()
        );
    }

    /// Consumes the store and returns its document.
    pub fn into_document(self) -> GraphDocument {
        self.doc
    }

    /// Inserts a node, or replaces the node with the same id.
    ///
    /// `updated_at` is always set to now. `created_at` keeps the incoming
    /// value if there is one, otherwise the replaced node's value, otherwise
    /// now. Returns the stored node.
    pub fn add_node(&mut self, mut node: Node) -> &Node {
        let now = Utc::now();
        node.updated_at = Some(now);

        match self.node_index.get(&node.id).copied() {
            Some(pos) => {
                let existing = &mut self.doc.nodes[pos];
                if node.created_at.is_none() {
                    node.created_at = existing.created_at.or(Some(now));
                }
                debug!("Replacing node {}", node.id);
                *existing = node;
                &self.doc.nodes[pos]
            }
            None => {
                node.created_at.get_or_insert(now);
                let pos = self.doc.nodes.len();
                self.node_index.insert(node.id.clone(), pos);
                self.doc.nodes.push(node);
                &self.doc.nodes[pos]
            }
        }
    }

    /// Inserts an edge, or replaces the edge with the same id.
    ///
    /// Timestamps follow the same rules as [`TrackingGraph::add_node`].
    /// Neither end is required to exist.
    pub fn add_edge(&mut self, mut edge: Edge) -> &Edge {
        let now = Utc::now();
        edge.updated_at = Some(now);

        match self.edge_index.get(&edge.id).copied() {
            Some(pos) => {
                let existing = &mut self.doc.edges[pos];
                if edge.created_at.is_none() {
                    edge.created_at = existing.created_at.or(Some(now));
                }
                debug!("Replacing edge {}", edge.id);
                *existing = edge;
                &self.doc.edges[pos]
            }
            None => {
                edge.created_at.get_or_insert(now);
                let pos = self.doc.edges.len();
                self.edge_index.insert(edge.id.clone(), pos);
                self.doc.edges.push(edge);
                &self.doc.edges[pos]
            }
        }
    }

    /// Removes a node and every edge where it is the source or target.
    ///
    /// Does nothing if the id is absent.
    pub fn remove_node(&mut self, id: &str) {
        let nodes_before = self.doc.nodes.len();
        let edges_before = self.doc.edges.len();

        self.doc.nodes.retain(|node| node.id != id);
        self.doc.edges.retain(|edge| !edge.touches(id));

        let nodes_removed = nodes_before - self.doc.nodes.len();
        let edges_removed = edges_before - self.doc.edges.len();

        if nodes_removed + edges_removed > 0 {
            debug!(
                "Removed node {} ({} nodes, {} edges)",
                id, nodes_removed, edges_removed
            );
            self.rebuild_indexes();
        }
    }

    /// Removes a single edge. Does nothing if the id is absent.
    pub fn remove_edge(&mut self, id: &str) {
        let before = self.doc.edges.len();
        self.doc.edges.retain(|edge| edge.id != id);

        if self.doc.edges.len() != before {
            debug!("Removed edge {}", id);
            self.rebuild_edge_index();
        }
    }

    /// Gets a node by id.
    pub fn find_node_by_id(&self, id: &str) -> Option<&Node> {
        let pos = self.node_index.get(id)?;
        self.doc.nodes.get(*pos)
    }

    /// Gets an edge by id.
    pub fn find_edge_by_id(&self, id: &str) -> Option<&Edge> {
        let pos = self.edge_index.get(id)?;
        self.doc.edges.get(*pos)
    }

    /// Finds all nodes of a type, in insertion order.
    pub fn find_nodes_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.doc
            .nodes
            .iter()
            .filter(|node| node.node_type() == node_type)
            .collect()
    }

    /// Finds all edges of a kind, in insertion order.
    pub fn find_edges_by_type(&self, kind: EdgeKind) -> Vec<&Edge> {
        self.doc.edges.iter().filter(|edge| edge.kind == kind).collect()
    }

    /// Finds all edges leaving a node, in insertion order.
    pub fn find_edges_by_source(&self, source: &str) -> Vec<&Edge> {
        self.doc
            .edges
            .iter()
            .filter(|edge| edge.source == source)
            .collect()
    }

    /// Finds all edges entering a node, in insertion order.
    pub fn find_edges_by_target(&self, target: &str) -> Vec<&Edge> {
        self.doc
            .edges
            .iter()
            .filter(|edge| edge.target == target)
            .collect()
    }

    /// Finds the `File` node with the given project-relative path.
    pub fn find_file_by_path(&self, path: &str) -> Option<&Node> {
        self.doc
            .nodes
            .iter()
            .find(|node| node.as_file().is_some_and(|file| file.path == path))
    }

    /// Finds all `CodeBlock` nodes belonging to a file, in insertion order.
    pub fn find_code_blocks_in_file(&self, file_id: &str) -> Vec<&Node> {
        self.doc
            .nodes
            .iter()
            .filter(|node| {
                node.as_code_block()
                    .is_some_and(|block| block.file_id == file_id)
            })
            .collect()
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.doc.nodes.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.doc.edges.len()
    }

    /// Returns true if the graph holds no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.doc.nodes.is_empty() && self.doc.edges.is_empty()
    }

    /// Iterates over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.doc.nodes.iter()
    }

    /// Iterates over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.doc.edges.iter()
    }

    fn rebuild_indexes(&mut self) {
        self.node_index.clear();
        for (pos, node) in self.doc.nodes.iter().enumerate() {
            self.node_index.entry(node.id.clone()).or_insert(pos);
        }
        self.rebuild_edge_index();
    }

    fn rebuild_edge_index(&mut self) {
        self.edge_index.clear();
        for (pos, edge) in self.doc.edges.iter().enumerate() {
            self.edge_index.entry(edge.id.clone()).or_insert(pos);
        }
    }
}

impl From<GraphDocument> for TrackingGraph {
    fn from(doc: GraphDocument) -> Self {
        Self::from_document(doc)
    }
}

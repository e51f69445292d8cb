//! Typed constructors for graph entities.
//!
//! Each constructor fills in the variant's required fields, stamps the
//! timestamps, inserts the entity through the regular upsert path and
//! returns the stored copy. None of them check that referenced ids exist.

use crate::edge::{Edge, EdgeKind};
use crate::graph::TrackingGraph;
use chrono::Utc;
use fasttrack_core::{
    AiSuggestion, CodeBlock, Commit, Developer, Node, NodeKind, SourceFile, TestFile,
};

impl TrackingGraph {
    /// Creates a developer node.
    pub fn create_developer_node(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
    ) -> Node {
        let kind = NodeKind::Developer(Developer {
            name: name.into(),
            email,
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates an AI suggestion node timestamped now.
    pub fn create_ai_suggestion_node(
        &mut self,
        id: impl Into<String>,
        ai_tool: impl Into<String>,
    ) -> Node {
        let kind = NodeKind::AiSuggestion(AiSuggestion {
            ai_tool: ai_tool.into(),
            timestamp: Utc::now(),
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates a code block node, last modified now and not yet analyzed.
    pub fn create_code_block_node(
        &mut self,
        id: impl Into<String>,
        file_id: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Node {
        let kind = NodeKind::CodeBlock(CodeBlock {
            file_id: file_id.into(),
            start_line,
            end_line,
            content: content.into(),
            complexity: None,
            last_modified: Utc::now(),
            is_tested: None,
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates a file node.
    pub fn create_file_node(
        &mut self,
        id: impl Into<String>,
        path: impl Into<String>,
        language: impl Into<String>,
    ) -> Node {
        let kind = NodeKind::File(SourceFile {
            path: path.into(),
            language: language.into(),
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates a test node.
    ///
    /// `tested_code_block_ids` is recorded as given; coverage queries do not
    /// read it.
    pub fn create_test_node(
        &mut self,
        id: impl Into<String>,
        path: impl Into<String>,
        tested_code_block_ids: Vec<String>,
    ) -> Node {
        let kind = NodeKind::Test(TestFile {
            path: path.into(),
            tested_code_block_ids,
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates a commit node timestamped now.
    pub fn create_commit_node(
        &mut self,
        id: impl Into<String>,
        hash: impl Into<String>,
        message: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Node {
        let kind = NodeKind::Commit(Commit {
            hash: hash.into(),
            message: message.into(),
            timestamp: Utc::now(),
            author_id: author_id.into(),
        });
        self.insert_stamped(id.into(), kind)
    }

    /// Creates an edge between two node ids.
    pub fn create_edge(
        &mut self,
        id: impl Into<String>,
        kind: EdgeKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Edge {
        let now = Utc::now();
        let mut edge = Edge::new(id, kind, source, target);
        edge.created_at = Some(now);
        edge.updated_at = Some(now);
        self.add_edge(edge).clone()
    }

    fn insert_stamped(&mut self, id: String, kind: NodeKind) -> Node {
        let node = Node::new(id, kind).with_timestamps(Utc::now());
        self.add_node(node).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fasttrack_core::NodeType;

    #[test]
    fn test_constructors_insert_typed_nodes() {
        let mut graph = TrackingGraph::new();

        graph.create_developer_node("d1", "Ada", Some("ada@example.com".into()));
        graph.create_ai_suggestion_node("ai1", "Copilot");
        graph.create_file_node("f1", "/a.js", "javascript");
        let block = graph.create_code_block_node("c1", "f1", 1, 5, "function a(){}");
        graph.create_test_node("t1", "/a.test.js", vec!["c1".into()]);
        graph.create_commit_node("k1", "abc123", "init", "d1");

        assert_eq!(graph.node_count(), 6);
        for node_type in NodeType::ALL {
            assert_eq!(graph.find_nodes_by_type(node_type).len(), 1);
        }

        let code = block.as_code_block().unwrap();
        assert_eq!(code.file_id, "f1");
        assert_eq!(code.complexity, None);
        assert!(block.created_at.is_some());
        assert_eq!(graph.find_node_by_id("c1"), Some(&block));
    }

    #[test]
    fn test_code_block_does_not_require_file() {
        let mut graph = TrackingGraph::new();
        graph.create_code_block_node("c1", "missing-file", 0, 2, "x");
        assert!(graph.find_node_by_id("c1").is_some());
        assert!(graph.find_node_by_id("missing-file").is_none());
    }

    #[test]
    fn test_create_edge() {
        let mut graph = TrackingGraph::new();
        let edge = graph.create_edge("e1", EdgeKind::TestedBy, "c1", "t1");

        assert_eq!(edge.kind, EdgeKind::TestedBy);
        assert_eq!(graph.find_edges_by_source("c1"), vec![&edge]);
    }
}

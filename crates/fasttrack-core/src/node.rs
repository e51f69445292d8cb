//! Node types for the tracking graph.
//!
//! A node is a typed entity: a developer, an AI suggestion, a code block,
//! a source file, a test file or a commit. The variant set is closed; every
//! consumer matches on [`NodeKind`] so that adding a kind is caught at
//! compile time.
//!
//! Nodes serialize to flat JSON objects with a `type` discriminant and
//! camelCase field names, which is the shape of the persisted document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps are stored in UTC and serialized as RFC 3339 strings.
pub type Timestamp = DateTime<Utc>;

/// The discriminant of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Developer,
    #[serde(rename = "AI_Suggestion")]
    AiSuggestion,
    CodeBlock,
    File,
    Test,
    Commit,
}

impl NodeType {
    /// All node types, in declaration order.
    pub const ALL: [NodeType; 6] = [
        Self::Developer,
        Self::AiSuggestion,
        Self::CodeBlock,
        Self::File,
        Self::Test,
        Self::Commit,
    ];
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Developer => "Developer",
            Self::AiSuggestion => "AI_Suggestion",
            Self::CodeBlock => "CodeBlock",
            Self::File => "File",
            Self::Test => "Test",
            Self::Commit => "Commit",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

/// A developer who authors code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A suggestion emitted by an AI assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    /// Free-text tool name ("Copilot", "Cursor", ...).
    pub ai_tool: String,
    pub timestamp: Timestamp,
}

/// A contiguous span of source code.
///
/// Lines are 0-based and `end_line` is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Id of the owning `File` node. Not checked against the store.
    pub file_id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    /// Cyclomatic complexity, at least 1. `None` until analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    pub last_modified: Timestamp,
    /// Informational cache. Coverage queries look at `tested_by` edges only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_tested: Option<bool>,
}

impl CodeBlock {
    /// Number of lines covered by the block.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// A project source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Project-relative path.
    pub path: String,
    pub language: String,
}

/// A test file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFile {
    pub path: String,
    /// Declared coverage. Informational; `tested_by` edges are authoritative.
    #[serde(default)]
    pub tested_code_block_ids: Vec<String>,
}

/// A version-control commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub timestamp: Timestamp,
    /// Id of the authoring `Developer` node.
    pub author_id: String,
}

/// The payload of a node, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Developer(Developer),
    #[serde(rename = "AI_Suggestion")]
    AiSuggestion(AiSuggestion),
    CodeBlock(CodeBlock),
    File(SourceFile),
    Test(TestFile),
    Commit(Commit),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Developer(_) => NodeType::Developer,
            Self::AiSuggestion(_) => NodeType::AiSuggestion,
            Self::CodeBlock(_) => NodeType::CodeBlock,
            Self::File(_) => NodeType::File,
            Self::Test(_) => NodeType::Test,
            Self::Commit(_) => NodeType::Commit,
        }
    }
}

/// A node in the tracking graph.
///
/// `created_at` and `updated_at` are optional on input; the graph store
/// fills them in on insertion, so every stored node carries both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Globally unique, caller-supplied id.
    pub id: String,

    #[serde(flatten)]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Node {
    /// Creates a node with no timestamps set.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: None,
            updated_at: None,
        }
    }

    /// Builder-style method to set both timestamps.
    pub fn with_timestamps(mut self, at: Timestamp) -> Self {
        self.created_at = Some(at);
        self.updated_at = Some(at);
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn as_code_block(&self) -> Option<&CodeBlock> {
        match &self.kind {
            NodeKind::CodeBlock(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&SourceFile> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_test(&self) -> Option<&TestFile> {
        match &self.kind {
            NodeKind::Test(test) => Some(test),
            _ => None,
        }
    }

    pub fn as_ai_suggestion(&self) -> Option<&AiSuggestion> {
        match &self.kind {
            NodeKind::AiSuggestion(suggestion) => Some(suggestion),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_block_serializes_flat() {
        let at: Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();
        let node = Node::new(
            "c1",
            NodeKind::CodeBlock(CodeBlock {
                file_id: "f1".into(),
                start_line: 1,
                end_line: 5,
                content: "function a(){}".into(),
                complexity: Some(2),
                last_modified: at,
                is_tested: None,
            }),
        )
        .with_timestamps(at);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "CodeBlock");
        assert_eq!(value["fileId"], "f1");
        assert_eq!(value["startLine"], 1);
        assert_eq!(value["complexity"], 2);
        assert!(value.get("isTested").is_none());
        assert!(value["createdAt"].is_string());
    }

    #[test]
    fn test_parses_document_node() {
        let value = json!({
            "id": "ai-1",
            "type": "AI_Suggestion",
            "aiTool": "Copilot",
            "timestamp": "2024-03-01T12:00:00.000Z",
            "createdAt": "2024-03-01T12:00:00.000Z",
            "updatedAt": "2024-03-01T12:00:00.000Z"
        });

        let node: Node = serde_json::from_value(value).unwrap();
        assert_eq!(node.node_type(), NodeType::AiSuggestion);
        assert_eq!(node.as_ai_suggestion().unwrap().ai_tool, "Copilot");
        assert!(node.created_at.is_some());
    }

    #[test]
    fn test_missing_timestamps_are_none() {
        let value = json!({ "id": "f1", "type": "File", "path": "a.js", "language": "javascript" });
        let node: Node = serde_json::from_value(value).unwrap();
        assert!(node.created_at.is_none());
        assert!(node.updated_at.is_none());
        assert_eq!(node.as_file().unwrap().path, "a.js");
    }

    #[test]
    fn test_node_type_from_str() {
        assert_eq!("codeblock".parse::<NodeType>().unwrap(), NodeType::CodeBlock);
        assert_eq!("AI_Suggestion".parse::<NodeType>().unwrap(), NodeType::AiSuggestion);
        assert!("Widget".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_line_count_is_inclusive() {
        let block = CodeBlock {
            file_id: "f".into(),
            start_line: 3,
            end_line: 3,
            content: String::new(),
            complexity: None,
            last_modified: Utc::now(),
            is_tested: None,
        };
        assert_eq!(block.line_count(), 1);
    }
}

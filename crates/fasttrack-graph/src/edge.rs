//! Edge types for the tracking graph.
//!
//! Edges are directed relations between node ids. The store does not check
//! that either end exists; removing a node cleans up the edges touching it.

use fasttrack_core::Timestamp;
use serde::{Deserialize, Serialize};

/// The type of relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// AI suggestion produced a code block.
    Generated,

    /// Developer authored a code block.
    Authored,

    /// Developer or commit modified a code block.
    Modified,

    /// General association between two nodes.
    LinkedTo,

    /// Code block is covered by a test. Flows CodeBlock -> Test.
    TestedBy,

    /// Code block has not changed for a period.
    UnchangedFor,
}

impl EdgeKind {
    /// All edge kinds, in declaration order.
    pub const ALL: [EdgeKind; 6] = [
        Self::Generated,
        Self::Authored,
        Self::Modified,
        Self::LinkedTo,
        Self::TestedBy,
        Self::UnchangedFor,
    ];
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Generated => "generated",
            Self::Authored => "authored",
            Self::Modified => "modified",
            Self::LinkedTo => "linked_to",
            Self::TestedBy => "tested_by",
            Self::UnchangedFor => "unchanged_for",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| format!("unknown edge type: {}", s))
    }
}

/// A directed edge between two node ids.
///
/// Like nodes, timestamps are optional on input and always set once the
/// edge is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique edge id.
    pub id: String,

    /// The kind of relationship.
    #[serde(rename = "type")]
    pub kind: EdgeKind,

    /// Source node id.
    pub source: String,

    /// Target node id.
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Edge {
    /// Creates a new edge with no timestamps set.
    pub fn new(
        id: impl Into<String>,
        kind: EdgeKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            target: target.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns true if either end of the edge is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_wire_names() {
        let edge = Edge::new("e1", EdgeKind::TestedBy, "c1", "t1");
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["type"], "tested_by");
        assert_eq!(value["source"], "c1");
        assert!(value.get("createdAt").is_none());

        let parsed: Edge = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, edge);
    }

    #[test]
    fn test_edge_kind_from_str() {
        for kind in EdgeKind::ALL {
            assert_eq!(kind.to_string().parse::<EdgeKind>().unwrap(), kind);
        }
        assert!("calls".parse::<EdgeKind>().is_err());
    }
}

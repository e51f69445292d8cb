//! Read-only analytical queries over the tracking graph.
//!
//! Every query is a single or double pass over the node and edge lists,
//! using the id index for joins, so the cost is O(nodes + edges).

use crate::edge::EdgeKind;
use crate::graph::TrackingGraph;
use chrono::Utc;
use fasttrack_core::{Node, NodeType, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Milliseconds in a day, for calendar-agnostic staleness.
pub const MS_PER_DAY: u64 = 86_400_000;

/// Default number of files returned by the AI-density ranking.
pub const DEFAULT_DENSITY_LIMIT: usize = 10;

/// Number of AI-generated blocks attributed to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAiCount {
    pub file_id: String,
    pub count: usize,
}

/// Number of generated blocks attributed to one AI tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCount {
    pub ai_tool: String,
    pub count: usize,
}

/// Graph statistics for the info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub files: usize,
    pub code_blocks: usize,
    pub tests: usize,
}

/// Everything the dashboard overview shows, in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: GraphStats,
    pub ai_blocks: usize,
    pub untested_blocks: usize,
    pub stale_blocks: usize,
    pub complex_blocks: usize,
    pub stale_days: u32,
    pub complexity_threshold: u32,
    pub tools: Vec<ToolCount>,
    pub top_files: Vec<FileAiCount>,
}

impl TrackingGraph {
    /// Finds code blocks with no `tested_by` edge leaving them.
    ///
    /// Only edges count; the `is_tested` cache and the tests' declared
    /// block lists are ignored. Results are in insertion order.
    pub fn find_untested_code_blocks(&self) -> Vec<&Node> {
        let tested: HashSet<&str> = self
            .edges()
            .filter(|edge| edge.kind == EdgeKind::TestedBy)
            .map(|edge| edge.source.as_str())
            .collect();

        self.nodes()
            .filter(|node| node.as_code_block().is_some() && !tested.contains(node.id.as_str()))
            .collect()
    }

    /// Finds AI-generated code blocks unmodified for at least `days` days.
    pub fn find_stale_ai_generated_blocks(&self, days: u32) -> Vec<&Node> {
        self.find_stale_ai_generated_blocks_at(days, Utc::now())
    }

    /// Same as [`TrackingGraph::find_stale_ai_generated_blocks`] with an
    /// explicit "now".
    ///
    /// A block qualifies when a `generated` edge targets it and the elapsed
    /// time since `last_modified`, in whole days rounded up, is at least
    /// `days`.
    pub fn find_stale_ai_generated_blocks_at(&self, days: u32, now: Timestamp) -> Vec<&Node> {
        let generated = self.generated_targets();

        self.nodes()
            .filter(|node| {
                let Some(block) = node.as_code_block() else {
                    return false;
                };
                generated.contains(node.id.as_str())
                    && elapsed_days(block.last_modified, now) >= u64::from(days)
            })
            .collect()
    }

    /// Ranks files by number of AI-generated code blocks.
    ///
    /// Counts `generated` edges whose target is a code block, grouped by the
    /// block's file. Sorted by count descending; ties keep the order in
    /// which files were first encountered.
    pub fn find_files_with_most_ai_code(&self, limit: usize) -> Vec<FileAiCount> {
        let mut counts: Vec<FileAiCount> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for edge in self.edges().filter(|e| e.kind == EdgeKind::Generated) {
            let Some(block) = self
                .find_node_by_id(&edge.target)
                .and_then(Node::as_code_block)
            else {
                continue;
            };

            match positions.get(block.file_id.as_str()) {
                Some(&pos) => counts[pos].count += 1,
                None => {
                    positions.insert(block.file_id.as_str(), counts.len());
                    counts.push(FileAiCount {
                        file_id: block.file_id.clone(),
                        count: 1,
                    });
                }
            }
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(limit);
        counts
    }

    /// Finds code blocks whose complexity is at least `threshold`, most
    /// complex first. Unanalyzed blocks are skipped.
    pub fn find_complex_code_blocks(&self, threshold: u32) -> Vec<&Node> {
        let mut blocks: Vec<(&Node, u32)> = self
            .nodes()
            .filter_map(|node| {
                let complexity = node.as_code_block()?.complexity?;
                (complexity >= threshold).then_some((node, complexity))
            })
            .collect();

        blocks.sort_by(|a, b| b.1.cmp(&a.1));
        blocks.into_iter().map(|(node, _)| node).collect()
    }

    /// Counts `generated` edges per AI tool, most used first.
    pub fn ai_tool_breakdown(&self) -> Vec<ToolCount> {
        let mut counts: Vec<ToolCount> = Vec::new();

        for edge in self.edges().filter(|e| e.kind == EdgeKind::Generated) {
            let Some(suggestion) = self
                .find_node_by_id(&edge.source)
                .and_then(Node::as_ai_suggestion)
            else {
                continue;
            };

            match counts.iter_mut().find(|c| c.ai_tool == suggestion.ai_tool) {
                Some(entry) => entry.count += 1,
                None => counts.push(ToolCount {
                    ai_tool: suggestion.ai_tool.clone(),
                    count: 1,
                }),
            }
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    /// Returns graph statistics.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            files: 0,
            code_blocks: 0,
            tests: 0,
        };

        for node in self.nodes() {
            match node.node_type() {
                NodeType::File => stats.files += 1,
                NodeType::CodeBlock => stats.code_blocks += 1,
                NodeType::Test => stats.tests += 1,
                NodeType::Developer | NodeType::AiSuggestion | NodeType::Commit => {}
            }
        }

        stats
    }

    /// Builds the dashboard overview.
    pub fn summary(&self, stale_days: u32, complexity_threshold: u32) -> DashboardSummary {
        let ai_blocks = self
            .find_files_with_most_ai_code(usize::MAX)
            .iter()
            .map(|f| f.count)
            .sum();

        DashboardSummary {
            stats: self.stats(),
            ai_blocks,
            untested_blocks: self.find_untested_code_blocks().len(),
            stale_blocks: self.find_stale_ai_generated_blocks(stale_days).len(),
            complex_blocks: self.find_complex_code_blocks(complexity_threshold).len(),
            stale_days,
            complexity_threshold,
            tools: self.ai_tool_breakdown(),
            top_files: self.find_files_with_most_ai_code(DEFAULT_DENSITY_LIMIT),
        }
    }

    fn generated_targets(&self) -> HashSet<&str> {
        self.edges()
            .filter(|edge| edge.kind == EdgeKind::Generated)
            .map(|edge| edge.target.as_str())
            .collect()
    }
}

/// Whole days between two instants, rounded up. Direction is ignored.
fn elapsed_days(from: Timestamp, to: Timestamp) -> u64 {
    let ms = (to - from).num_milliseconds().unsigned_abs();
    ms.div_ceil(MS_PER_DAY)
}

//! Tracking workflows that touch several entities at once.
//!
//! These are the calls the scanner, watcher and CLI make: register a file,
//! tag a span as AI-generated, link a test to the blocks it covers. Each
//! workflow is a short sequence of upserts against a graph passed in by the
//! caller; the tracker itself holds no graph state.

use crate::edge::{Edge, EdgeKind};
use crate::graph::TrackingGraph;
use crate::settings::DeveloperSettings;
use chrono::Utc;
use fasttrack_core::{
    extract_span, AiSuggestion, Analyzer, CodeBlock, CoreError, Node, NodeKind, NodeType,
    TestFile,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Already-resolved ids and content for tagging one AI-generated block.
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub suggestion_id: String,
    pub code_block_id: String,
    pub developer_id: String,
    pub file_id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub ai_tool: String,
    pub complexity: Option<u32>,
}

/// The entities written by [`tag_code_block`].
#[derive(Debug, Clone)]
pub struct TagOutcome {
    pub suggestion: Node,
    pub code_block: Node,
    pub generated: Edge,
    pub authored: Edge,
}

/// A span of a file to tag, before ids are resolved.
#[derive(Debug, Clone)]
pub struct SpanTag {
    /// Project-relative path.
    pub path: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    /// Falls back to the analyzer's guess.
    pub ai_tool: Option<String>,
}

/// Result of linking a test file.
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    pub test_id: String,
    /// Code blocks that gained a `tested_by` edge.
    pub linked: Vec<String>,
    /// Code blocks whose link to this test was dropped because the test no
    /// longer mentions them.
    pub unlinked: Vec<String>,
}

/// Records the writes of a multi-step update.
///
/// Writes are applied immediately. If the unit is dropped without
/// [`UnitOfWork::commit`] (an early return or a panic mid-sequence), the
/// writes that did land are reported as a partial application.
struct UnitOfWork<'g> {
    graph: &'g mut TrackingGraph,
    label: &'static str,
    applied: Vec<String>,
    committed: bool,
}

impl<'g> UnitOfWork<'g> {
    fn new(graph: &'g mut TrackingGraph, label: &'static str) -> Self {
        Self {
            graph,
            label,
            applied: Vec::new(),
            committed: false,
        }
    }

    fn node(&mut self, node: Node) -> Node {
        let stored = self.graph.add_node(node).clone();
        self.applied.push(format!("node {}", stored.id));
        stored
    }

    fn edge(&mut self, edge: Edge) -> Edge {
        let stored = self.graph.add_edge(edge).clone();
        self.applied.push(format!("edge {}", stored.id));
        stored
    }

    fn commit(mut self) -> Vec<String> {
        self.committed = true;
        std::mem::take(&mut self.applied)
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.applied.is_empty() {
            warn!(
                "{} applied partially: {}",
                self.label,
                self.applied.join(", ")
            );
        }
    }
}

/// Tags a block as AI-generated: suggestion node, code block node, a
/// `generated` edge from the suggestion and an `authored` edge from the
/// developer.
///
/// Re-tagging the same block id with unchanged content keeps the block's
/// `last_modified` and `is_tested`, so rescans do not reset staleness. When
/// the content changed, `is_tested` is taken from the block's surviving
/// `tested_by` edges. An existing suggestion keeps its timestamp.
pub fn tag_code_block(graph: &mut TrackingGraph, request: TagRequest) -> TagOutcome {
    let now = Utc::now();

    let (last_modified, is_tested) = match graph
        .find_node_by_id(&request.code_block_id)
        .and_then(Node::as_code_block)
    {
        Some(existing) if existing.content == request.content => {
            (existing.last_modified, existing.is_tested)
        }
        Some(existing) => {
            let is_tested = if has_tested_by(graph, &request.code_block_id) {
                Some(true)
            } else {
                existing.is_tested.map(|_| false)
            };
            (now, is_tested)
        }
        None => (now, None),
    };

    let suggested_at = graph
        .find_node_by_id(&request.suggestion_id)
        .and_then(Node::as_ai_suggestion)
        .map_or(now, |existing| existing.timestamp);

    let suggestion = Node::new(
        request.suggestion_id.clone(),
        NodeKind::AiSuggestion(AiSuggestion {
            ai_tool: request.ai_tool,
            timestamp: suggested_at,
        }),
    );

    let block = Node::new(
        request.code_block_id.clone(),
        NodeKind::CodeBlock(CodeBlock {
            file_id: request.file_id,
            start_line: request.start_line,
            end_line: request.end_line,
            content: request.content,
            complexity: request.complexity,
            last_modified,
            is_tested,
        }),
    );

    let mut unit = UnitOfWork::new(graph, "tag code block");
    let suggestion = unit.node(suggestion);
    let code_block = unit.node(block);
    let generated = unit.edge(Edge::new(
        format!("generated-{}-{}", suggestion.id, code_block.id),
        EdgeKind::Generated,
        suggestion.id.clone(),
        code_block.id.clone(),
    ));
    let authored = unit.edge(Edge::new(
        format!("authored-{}-{}", request.developer_id, code_block.id),
        EdgeKind::Authored,
        request.developer_id,
        code_block.id.clone(),
    ));
    let steps = unit.commit();

    debug!("Tagged {} ({} writes)", code_block.id, steps.len());

    TagOutcome {
        suggestion,
        code_block,
        generated,
        authored,
    }
}

fn has_tested_by(graph: &TrackingGraph, block_id: &str) -> bool {
    graph
        .find_edges_by_source(block_id)
        .iter()
        .any(|e| e.kind == EdgeKind::TestedBy)
}

/// Short id derived from a key: `<prefix>-<8 hex>`. The same key always
/// gives the same id.
pub fn stable_id(prefix: &str, key: &str) -> String {
    let hash = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
        .simple()
        .to_string();
    format!("{}-{}", prefix, &hash[..8])
}

/// Runs the tracking workflows for one developer.
#[derive(Debug, Clone)]
pub struct Tracker {
    analyzer: Analyzer,
    developer: DeveloperSettings,
}

impl Tracker {
    /// Creates a tracker crediting `developer` with tagged blocks.
    pub fn new(developer: DeveloperSettings) -> Result<Self, CoreError> {
        Ok(Self::with_analyzer(Analyzer::new()?, developer))
    }

    pub fn with_analyzer(analyzer: Analyzer, developer: DeveloperSettings) -> Self {
        Self {
            analyzer,
            developer,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn developer_id(&self) -> &str {
        &self.developer.id
    }

    /// Creates the developer node if it is missing. Returns true if created.
    pub fn ensure_developer(&self, graph: &mut TrackingGraph) -> bool {
        if graph.find_node_by_id(&self.developer.id).is_some() {
            return false;
        }
        graph.create_developer_node(
            self.developer.id.clone(),
            self.developer.name.clone(),
            self.developer.email.clone(),
        );
        true
    }

    /// Returns the id of the file node for `path`, creating it if needed.
    pub fn register_file(&self, graph: &mut TrackingGraph, path: &str, language: &str) -> String {
        if let Some(existing) = graph.find_file_by_path(path) {
            return existing.id.clone();
        }

        let id = stable_id("file", path);
        graph.create_file_node(id.clone(), path, language);
        debug!("Registered file {} as {}", path, id);
        id
    }

    /// Tags a span of a file as AI-generated.
    ///
    /// Resolves the developer and file nodes, derives block and suggestion
    /// ids from the path and span, and scores complexity.
    pub fn tag_span(&self, graph: &mut TrackingGraph, span: SpanTag) -> TagOutcome {
        self.ensure_developer(graph);
        let file_id = self.register_file(graph, &span.path, &span.language);

        let key = format!("{}:{}-{}", span.path, span.start_line, span.end_line);
        let ai_tool = span
            .ai_tool
            .unwrap_or_else(|| self.analyzer.guess_ai_tool(&span.content).to_string());

        let request = TagRequest {
            suggestion_id: stable_id("ai", &key),
            code_block_id: stable_id("code", &key),
            developer_id: self.developer.id.clone(),
            file_id,
            start_line: span.start_line,
            end_line: span.end_line,
            complexity: Some(self.analyzer.calculate_complexity(&span.content)),
            content: span.content,
            ai_tool,
        };

        tag_code_block(graph, request)
    }

    /// Registers a test file and links it to the blocks of `source_file_id`
    /// it appears to exercise.
    ///
    /// A block is linked when one of its function names occurs as a whole
    /// word in the test. Existing links to blocks the test still mentions
    /// are left alone; links to blocks it no longer mentions are removed.
    pub fn register_test(
        &self,
        graph: &mut TrackingGraph,
        test_path: &str,
        test_content: &str,
        source_file_id: &str,
    ) -> Result<LinkOutcome, CoreError> {
        let test_id = stable_id("test", test_path);
        if graph.find_node_by_id(&test_id).is_none() {
            graph.create_test_node(test_id.clone(), test_path, Vec::new());
        }

        let blocks: Vec<Node> = graph
            .find_code_blocks_in_file(source_file_id)
            .into_iter()
            .cloned()
            .collect();

        let mut outcome = LinkOutcome {
            test_id: test_id.clone(),
            ..LinkOutcome::default()
        };

        for mut node in blocks {
            let NodeKind::CodeBlock(block) = &mut node.kind else {
                continue;
            };

            let mut covered = false;
            for name in self.analyzer.extract_function_names(&block.content) {
                if self.analyzer.test_covers_function(test_content, &name)? {
                    covered = true;
                    break;
                }
            }

            let existing = graph
                .find_edges_by_source(&node.id)
                .into_iter()
                .find(|e| e.kind == EdgeKind::TestedBy && e.target == test_id)
                .map(|e| e.id.clone());

            match (covered, existing) {
                (true, Some(_)) | (false, None) => continue,
                (false, Some(edge_id)) => {
                    graph.remove_edge(&edge_id);
                    outcome.unlinked.push(node.id.clone());
                    continue;
                }
                (true, None) => {}
            }

            graph.create_edge(
                format!("tested-{}-{}", node.id, test_id),
                EdgeKind::TestedBy,
                node.id.clone(),
                test_id.clone(),
            );
            block.is_tested = Some(true);
            outcome.linked.push(node.id.clone());
            graph.add_node(node);
        }

        for block_id in &outcome.unlinked {
            self.refresh_tested_cache(graph, block_id);
        }

        if !outcome.linked.is_empty() || !outcome.unlinked.is_empty() {
            self.record_declared_coverage(graph, &test_id, &outcome.linked, &outcome.unlinked);
            debug!(
                "Linked {} to {} blocks, unlinked {}",
                test_path,
                outcome.linked.len(),
                outcome.unlinked.len()
            );
        }

        Ok(outcome)
    }

    /// Removes a test node and its links, clearing the `is_tested` cache of
    /// blocks left without any test.
    pub fn remove_test(&self, graph: &mut TrackingGraph, test_id: &str) {
        let covered: Vec<String> = graph
            .find_edges_by_target(test_id)
            .into_iter()
            .filter(|e| e.kind == EdgeKind::TestedBy)
            .map(|e| e.source.clone())
            .collect();

        graph.remove_node(test_id);

        for block_id in covered {
            self.refresh_tested_cache(graph, &block_id);
        }
    }

    /// Marks a block untested once its last `tested_by` edge is gone.
    fn refresh_tested_cache(&self, graph: &mut TrackingGraph, block_id: &str) {
        if has_tested_by(graph, block_id) {
            return;
        }
        if let Some(mut node) = graph.find_node_by_id(block_id).cloned() {
            if let NodeKind::CodeBlock(block) = &mut node.kind {
                block.is_tested = Some(false);
                graph.add_node(node);
            }
        }
    }

    /// Removes a code block together with AI suggestions that generated
    /// nothing else.
    pub fn remove_code_block(&self, graph: &mut TrackingGraph, block_id: &str) {
        let suggestions: Vec<String> = graph
            .find_edges_by_target(block_id)
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Generated)
            .map(|e| e.source.clone())
            .collect();

        graph.remove_node(block_id);

        for id in suggestions {
            let orphaned = graph.find_edges_by_source(&id).is_empty()
                && graph
                    .find_node_by_id(&id)
                    .is_some_and(|n| n.node_type() == NodeType::AiSuggestion);
            if orphaned {
                graph.remove_node(&id);
            }
        }
    }

    /// Removes blocks of a file whose recorded content no longer matches
    /// the file's text at their span. Returns the number removed.
    pub fn prune_changed_blocks(
        &self,
        graph: &mut TrackingGraph,
        file_id: &str,
        current_source: &str,
    ) -> usize {
        let changed: Vec<String> = graph
            .find_code_blocks_in_file(file_id)
            .into_iter()
            .filter(|node| {
                node.as_code_block().is_some_and(|block| {
                    extract_span(current_source, block.start_line, block.end_line).as_deref()
                        != Some(block.content.as_str())
                })
            })
            .map(|node| node.id.clone())
            .collect();

        for id in &changed {
            self.remove_code_block(graph, id);
        }
        changed.len()
    }

    /// Removes a file node and all of its code blocks.
    pub fn remove_file(&self, graph: &mut TrackingGraph, file_id: &str) {
        let blocks: Vec<String> = graph
            .find_code_blocks_in_file(file_id)
            .into_iter()
            .map(|node| node.id.clone())
            .collect();

        for id in &blocks {
            self.remove_code_block(graph, id);
        }
        graph.remove_node(file_id);
    }

    fn record_declared_coverage(
        &self,
        graph: &mut TrackingGraph,
        test_id: &str,
        linked: &[String],
        unlinked: &[String],
    ) {
        let Some(mut node) = graph.find_node_by_id(test_id).cloned() else {
            return;
        };
        let NodeKind::Test(TestFile {
            tested_code_block_ids,
            ..
        }) = &mut node.kind
        else {
            return;
        };

        tested_code_block_ids.retain(|id| !unlinked.contains(id));
        for id in linked {
            if !tested_code_block_ids.contains(id) {
                tested_code_block_ids.push(id.clone());
            }
        }
        graph.add_node(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> Tracker {
        Tracker::new(DeveloperSettings::default()).unwrap()
    }

    fn span(path: &str, start: u32, end: u32, content: &str) -> SpanTag {
        SpanTag {
            path: path.into(),
            language: "javascript".into(),
            start_line: start,
            end_line: end,
            content: content.into(),
            ai_tool: None,
        }
    }

    #[test]
    fn test_stable_id() {
        assert_eq!(stable_id("file", "src/a.js"), stable_id("file", "src/a.js"));
        assert_ne!(stable_id("file", "src/a.js"), stable_id("file", "src/b.js"));
        assert_eq!(stable_id("file", "src/a.js").len(), "file-".len() + 8);
    }

    #[test]
    fn test_tag_code_block_writes_four_entities() {
        let mut graph = TrackingGraph::new();
        let outcome = tag_code_block(
            &mut graph,
            TagRequest {
                suggestion_id: "ai-1".into(),
                code_block_id: "code-1".into(),
                developer_id: "dev".into(),
                file_id: "f1".into(),
                start_line: 0,
                end_line: 2,
                content: "function a() {\n}".into(),
                ai_tool: "Cursor".into(),
                complexity: Some(1),
            },
        );

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(outcome.generated.id, "generated-ai-1-code-1");
        assert_eq!(outcome.authored.id, "authored-dev-code-1");
        assert_eq!(outcome.authored.source, "dev");
        assert_eq!(
            outcome.suggestion.as_ai_suggestion().unwrap().ai_tool,
            "Cursor"
        );
    }

    #[test]
    fn test_tag_span_registers_file_and_developer() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let outcome = t.tag_span(&mut graph, span("src/a.js", 0, 2, "function a() {\n  if (x) {}\n}"));

        let file = graph.find_file_by_path("src/a.js").unwrap();
        assert_eq!(outcome.code_block.as_code_block().unwrap().file_id, file.id);
        assert_eq!(outcome.code_block.as_code_block().unwrap().complexity, Some(2));
        assert!(graph.find_node_by_id("default-developer").is_some());
        assert_eq!(graph.find_files_with_most_ai_code(10)[0].count, 1);
        // developer + file + suggestion + block
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_retag_keeps_last_modified() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let first = t.tag_span(&mut graph, span("a.js", 0, 2, "function a() {\n}"));
        let second = t.tag_span(&mut graph, span("a.js", 0, 2, "function a() {\n}"));

        assert_eq!(first.code_block.id, second.code_block.id);
        assert_eq!(
            first.code_block.as_code_block().unwrap().last_modified,
            second.code_block.as_code_block().unwrap().last_modified
        );
        assert_eq!(graph.find_nodes_by_type(NodeType::CodeBlock).len(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_register_file_reuses_existing_path() {
        let mut graph = TrackingGraph::new();
        graph.create_file_node("custom", "src/a.js", "javascript");

        let id = tracker().register_file(&mut graph, "src/a.js", "javascript");
        assert_eq!(id, "custom");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_register_test_links_matching_blocks() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let a = t.tag_span(&mut graph, span("src/math.js", 0, 2, "function add(a, b) {\n  return a + b;\n}"));
        let b = t.tag_span(&mut graph, span("src/math.js", 4, 6, "function sub(a, b) {\n  return a - b;\n}"));
        let file_id = a.code_block.as_code_block().unwrap().file_id.clone();

        let test = "test('adds', () => expect(add(1, 2)).toBe(3));";
        let outcome = t
            .register_test(&mut graph, "test/math.test.js", test, &file_id)
            .unwrap();

        assert_eq!(outcome.linked, vec![a.code_block.id.clone()]);
        let untested: Vec<_> = graph
            .find_untested_code_blocks()
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(untested, vec![b.code_block.id.clone()]);

        let block = graph.find_node_by_id(&a.code_block.id).unwrap();
        assert_eq!(block.as_code_block().unwrap().is_tested, Some(true));

        let test_node = graph.find_node_by_id(&outcome.test_id).unwrap();
        assert_eq!(
            test_node.as_test().unwrap().tested_code_block_ids,
            vec![a.code_block.id.clone()]
        );

        // Linking again adds nothing.
        let again = t
            .register_test(&mut graph, "test/math.test.js", test, &file_id)
            .unwrap();
        assert!(again.linked.is_empty());
        assert_eq!(graph.find_edges_by_type(EdgeKind::TestedBy).len(), 1);
    }

    #[test]
    fn test_remove_test_clears_cache() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let a = t.tag_span(&mut graph, span("a.js", 0, 2, "function add() {\n}"));
        let file_id = a.code_block.as_code_block().unwrap().file_id.clone();
        let link = t.register_test(&mut graph, "a.test.js", "add()", &file_id).unwrap();

        t.remove_test(&mut graph, &link.test_id);

        assert!(graph.find_node_by_id(&link.test_id).is_none());
        let block = graph.find_node_by_id(&a.code_block.id).unwrap();
        assert_eq!(block.as_code_block().unwrap().is_tested, Some(false));
        assert_eq!(graph.find_untested_code_blocks().len(), 1);
    }

    #[test]
    fn test_register_test_drops_links_no_longer_mentioned() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let a = t.tag_span(&mut graph, span("src/math.js", 0, 2, "function add(a, b) {\n  return a + b;\n}"));
        let b = t.tag_span(&mut graph, span("src/math.js", 4, 6, "function sub(a, b) {\n  return a - b;\n}"));
        let file_id = a.code_block.as_code_block().unwrap().file_id.clone();

        let both = "expect(add(1, 2)).toBe(3); expect(sub(2, 1)).toBe(1);";
        t.register_test(&mut graph, "math.test.js", both, &file_id)
            .unwrap();
        assert!(graph.find_untested_code_blocks().is_empty());

        let only_add = "expect(add(1, 2)).toBe(3);";
        let outcome = t
            .register_test(&mut graph, "math.test.js", only_add, &file_id)
            .unwrap();

        assert!(outcome.linked.is_empty());
        assert_eq!(outcome.unlinked, vec![b.code_block.id.clone()]);
        let untested: Vec<_> = graph
            .find_untested_code_blocks()
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(untested, vec![b.code_block.id.clone()]);

        let sub = graph.find_node_by_id(&b.code_block.id).unwrap();
        assert_eq!(sub.as_code_block().unwrap().is_tested, Some(false));
        let add = graph.find_node_by_id(&a.code_block.id).unwrap();
        assert_eq!(add.as_code_block().unwrap().is_tested, Some(true));

        let test_node = graph.find_node_by_id(&outcome.test_id).unwrap();
        assert_eq!(
            test_node.as_test().unwrap().tested_code_block_ids,
            vec![a.code_block.id.clone()]
        );
    }

    #[test]
    fn test_retag_changed_content_keeps_tested_cache() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let a = t.tag_span(&mut graph, span("a.js", 0, 2, "function add() {\n}"));
        let file_id = a.code_block.as_code_block().unwrap().file_id.clone();
        t.register_test(&mut graph, "a.test.js", "add()", &file_id)
            .unwrap();

        let retagged = t.tag_span(&mut graph, span("a.js", 0, 2, "function add() {\n  return 1;\n}"));

        assert_eq!(retagged.code_block.id, a.code_block.id);
        assert_eq!(retagged.code_block.as_code_block().unwrap().is_tested, Some(true));
        assert!(graph.find_untested_code_blocks().is_empty());
    }

    #[test]
    fn test_prune_changed_blocks() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let source = "function a() {\n  return 1;\n}\nfunction b() {\n  return 2;\n}";
        let kept = t.tag_span(&mut graph, span("a.js", 0, 2, "function a() {\n  return 1;\n}"));
        let changed = t.tag_span(&mut graph, span("a.js", 3, 5, "function b() {\n  return 3;\n}"));
        let file_id = kept.code_block.as_code_block().unwrap().file_id.clone();

        let removed = t.prune_changed_blocks(&mut graph, &file_id, source);

        assert_eq!(removed, 1);
        assert!(graph.find_node_by_id(&kept.code_block.id).is_some());
        assert!(graph.find_node_by_id(&changed.code_block.id).is_none());
        assert!(graph.find_node_by_id(&changed.suggestion.id).is_none());
        assert!(graph.find_node_by_id(&kept.suggestion.id).is_some());
    }

    #[test]
    fn test_remove_file_drops_blocks() {
        let mut graph = TrackingGraph::new();
        let t = tracker();
        let a = t.tag_span(&mut graph, span("a.js", 0, 2, "function a() {\n}"));
        let file_id = a.code_block.as_code_block().unwrap().file_id.clone();

        t.remove_file(&mut graph, &file_id);

        // Only the developer remains.
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }
}

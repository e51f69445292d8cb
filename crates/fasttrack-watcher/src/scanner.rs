//! Whole-project and single-file analysis.
//!
//! Source files are run through the AI-block detector and every detected
//! span is tagged. Test files are matched to sources by name and linked to
//! the blocks whose functions they mention. Paths stored in the graph are
//! relative to the project root with `/` separators.

use crate::error::{Result, WatchError};
use fasttrack_core::{
    extract_span, is_source_file, is_test_file, is_test_for, language_for_path, NodeKind,
    NodeType,
};
use fasttrack_graph::{stable_id, Settings, SpanTag, Tracker, TrackingGraph};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Totals for a full scan.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub files_scanned: usize,
    pub blocks_tagged: usize,
    pub blocks_pruned: usize,
    pub tests_linked: usize,
    /// File and Test nodes dropped because their file is gone.
    pub files_removed: usize,
    /// One `path: message` entry per file that could not be analyzed.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// What analyzing one file changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub blocks_tagged: usize,
    pub blocks_pruned: usize,
    pub tests_linked: usize,
}

/// Analyzes files of one project into a tracking graph.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    tracker: Tracker,
    ignore: Vec<String>,
    insertion_threshold: usize,
}

impl Scanner {
    /// Creates a scanner for the project at `root` using its settings.
    pub fn new(root: impl AsRef<Path>, settings: &Settings) -> Result<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| WatchError::io(root, e))?;

        Ok(Self {
            root,
            tracker: Tracker::new(settings.developer.clone())?,
            ignore: settings.scan.ignore.clone(),
            insertion_threshold: settings.scan.insertion_threshold,
        })
    }

    /// The canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Returns true if any directory on the path is in the ignore list.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|c| match c {
            Component::Normal(name) => self.ignore.iter().any(|i| name == i.as_str()),
            _ => false,
        })
    }

    /// Returns true if the path is a source file the scanner would analyze.
    pub fn is_tracked(&self, path: &Path) -> bool {
        is_source_file(path) && !self.is_ignored(path)
    }

    /// Project-relative form of `path`, or `None` if it is outside the root.
    ///
    /// Relative paths are taken to be relative to the root already.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let relative = absolute.strip_prefix(&self.root).ok()?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Scans every tracked file under the root.
    ///
    /// Files the graph still holds but which no longer exist are dropped
    /// first. Sources are analyzed before tests so that tests can be linked
    /// in the same pass. A file that fails is recorded in
    /// [`ScanResult::errors`] and the scan moves on.
    pub fn scan(&self, graph: &mut TrackingGraph) -> ScanResult {
        let start = Instant::now();
        let mut result = ScanResult::default();

        self.tracker.ensure_developer(graph);
        result.files_removed = self.remove_deleted(graph);

        let (tests, sources): (Vec<_>, Vec<_>) = self
            .collect_files(&mut result.errors)
            .into_iter()
            .partition(|(_, rel)| is_test_file(Path::new(rel)));

        info!(
            "Scanning {} source files and {} test files in {}",
            sources.len(),
            tests.len(),
            self.root.display()
        );

        for (path, rel) in &sources {
            match self.analyze_source(graph, path, rel, false) {
                Ok(report) => {
                    result.files_scanned += 1;
                    result.blocks_tagged += report.blocks_tagged;
                    result.blocks_pruned += report.blocks_pruned;
                }
                Err(e) => {
                    warn!("Failed to analyze {}: {}", rel, e);
                    result.errors.push(format!("{}: {}", rel, e));
                }
            }
        }

        for (path, rel) in &tests {
            match self.link_test(graph, path, rel) {
                Ok(linked) => {
                    result.files_scanned += 1;
                    result.tests_linked += linked;
                }
                Err(e) => {
                    warn!("Failed to link {}: {}", rel, e);
                    result.errors.push(format!("{}: {}", rel, e));
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scan complete: {} files, {} blocks tagged, {} tests linked, {} removed in {}ms",
            result.files_scanned,
            result.blocks_tagged,
            result.tests_linked,
            result.files_removed,
            result.duration_ms
        );
        result
    }

    /// Re-analyzes a single file that was created or changed.
    pub fn analyze_file(&self, graph: &mut TrackingGraph, path: &Path) -> Result<FileReport> {
        let rel = self
            .relative_path(path)
            .ok_or_else(|| WatchError::OutsideRoot(path.to_path_buf()))?;
        let absolute = self.root.join(&rel);

        self.tracker.ensure_developer(graph);

        if is_test_file(Path::new(&rel)) {
            let tests_linked = self.link_test(graph, &absolute, &rel)?;
            return Ok(FileReport {
                tests_linked,
                ..FileReport::default()
            });
        }

        self.analyze_source(graph, &absolute, &rel, true)
    }

    /// Drops whatever the graph holds for a deleted file. Returns true if
    /// anything was removed.
    pub fn remove_path(&self, graph: &mut TrackingGraph, path: &Path) -> bool {
        let Some(rel) = self.relative_path(path) else {
            return false;
        };

        if let Some(file_id) = graph.find_file_by_path(&rel).map(|n| n.id.clone()) {
            self.tracker.remove_file(graph, &file_id);
            debug!("Removed file {}", rel);
            return true;
        }

        let test_id = graph
            .find_nodes_by_type(NodeType::Test)
            .into_iter()
            .find(|n| n.as_test().is_some_and(|t| t.path == rel))
            .map(|n| n.id.clone());

        match test_id {
            Some(id) => {
                self.tracker.remove_test(graph, &id);
                debug!("Removed test {}", rel);
                true
            }
            None => false,
        }
    }

    /// Drops File and Test nodes whose path is no longer a file under the
    /// root. Returns the number of paths removed.
    fn remove_deleted(&self, graph: &mut TrackingGraph) -> usize {
        let missing: Vec<String> = graph
            .nodes()
            .filter_map(|n| match &n.kind {
                NodeKind::File(file) => Some(file.path.clone()),
                NodeKind::Test(test) => Some(test.path.clone()),
                _ => None,
            })
            .filter(|rel| !self.root.join(rel).is_file())
            .collect();

        let mut removed = 0;
        for rel in missing {
            if self.remove_path(graph, Path::new(&rel)) {
                info!("Dropped deleted file {}", rel);
                removed += 1;
            }
        }
        removed
    }

    fn collect_files(&self, errors: &mut Vec<String>) -> Vec<(PathBuf, String)> {
        let ignored = self.ignore.clone();
        let walker = WalkBuilder::new(&self.root)
            .require_git(false)
            .filter_entry(move |entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !ignored.iter().any(|i| i == name))
                    .unwrap_or(true)
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };

            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if !is_file || !is_source_file(entry.path()) {
                continue;
            }

            if let Some(rel) = self.relative_path(entry.path()) {
                files.push((entry.into_path(), rel));
            }
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        files
    }

    fn analyze_source(
        &self,
        graph: &mut TrackingGraph,
        path: &Path,
        rel: &str,
        link_known_tests: bool,
    ) -> Result<FileReport> {
        let content = self.tracker.analyzer().read_source(path)?;
        let language = language_for_path(path).unwrap_or("plaintext");
        let file_id = self.tracker.register_file(graph, rel, language);

        let mut report = FileReport {
            blocks_pruned: self.tracker.prune_changed_blocks(graph, &file_id, &content),
            ..FileReport::default()
        };

        for block in self.tracker.analyzer().detect_ai_blocks(&content) {
            // Detection drops blank lines; tag the span as it is in the file.
            let Some(span) = extract_span(&content, block.start_line, block.end_line) else {
                continue;
            };
            if span.trim().len() < self.insertion_threshold {
                continue;
            }

            self.tracker.tag_span(
                graph,
                SpanTag {
                    path: rel.to_string(),
                    language: language.to_string(),
                    start_line: block.start_line,
                    end_line: block.end_line,
                    content: span,
                    ai_tool: None,
                },
            );
            report.blocks_tagged += 1;
        }

        if link_known_tests {
            let tests: Vec<String> = graph
                .find_nodes_by_type(NodeType::Test)
                .into_iter()
                .filter_map(|n| n.as_test())
                .map(|t| t.path.clone())
                .filter(|test| is_test_for(Path::new(rel), Path::new(test)))
                .collect();

            for test in tests {
                let test_path = self.root.join(&test);
                let test_content = match self.tracker.analyzer().read_source(&test_path) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!("Cannot read test {}: {}", test, e);
                        continue;
                    }
                };
                let outcome =
                    self.tracker
                        .register_test(graph, &test, &test_content, &file_id)?;
                report.tests_linked += outcome.linked.len();
            }
        }

        debug!(
            "Analyzed {}: {} tagged, {} pruned",
            rel, report.blocks_tagged, report.blocks_pruned
        );
        Ok(report)
    }

    fn link_test(&self, graph: &mut TrackingGraph, path: &Path, rel: &str) -> Result<usize> {
        let content = self.tracker.analyzer().read_source(path)?;

        let sources: Vec<String> = graph
            .find_nodes_by_type(NodeType::File)
            .into_iter()
            .filter(|n| {
                n.as_file()
                    .is_some_and(|f| is_test_for(Path::new(&f.path), Path::new(rel)))
            })
            .map(|n| n.id.clone())
            .collect();

        if sources.is_empty() {
            let test_id = stable_id("test", rel);
            if graph.find_node_by_id(&test_id).is_none() {
                graph.create_test_node(test_id, rel, Vec::new());
            }
            debug!("No source file matches test {}", rel);
            return Ok(0);
        }

        let mut linked = 0;
        for file_id in sources {
            linked += self
                .tracker
                .register_test(graph, rel, &content, &file_id)?
                .linked
                .len();
        }
        Ok(linked)
    }
}

/// Scans the project at `root` into `graph`.
pub fn scan_project(
    root: impl AsRef<Path>,
    graph: &mut TrackingGraph,
    settings: &Settings,
) -> Result<ScanResult> {
    Ok(Scanner::new(root, settings)?.scan(graph))
}

/// Analyzes one file of the project at `root` into `graph`.
pub fn analyze_file(
    root: impl AsRef<Path>,
    path: &Path,
    graph: &mut TrackingGraph,
    settings: &Settings,
) -> Result<FileReport> {
    Scanner::new(root, settings)?.analyze_file(graph, path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fasttrack_graph::EdgeKind;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const AI_SOURCE: &str = "\
const total = (items) => {
  // sum all values
  // skip empty entries
  // values are numbers
  return items.reduce((acc, x) => acc + x, 0);
}
";

    pub(crate) const TOTAL_TEST: &str = "test('sums', () => expect(total([1, 2])).toBe(3));\n";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/total.js", AI_SOURCE);
        write(dir.path(), "src/total.test.js", TOTAL_TEST);
        write(dir.path(), "node_modules/dep/index.js", AI_SOURCE);
        write(dir.path(), "README.md", "# demo\n");
        dir
    }

    #[test]
    fn test_scan_tags_and_links() {
        let dir = project();
        let mut graph = TrackingGraph::new();

        let result = scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.files_scanned, 2);
        assert_eq!(result.blocks_tagged, 1);
        assert_eq!(result.tests_linked, 1);

        assert!(graph.find_file_by_path("src/total.js").is_some());
        assert!(graph.find_file_by_path("node_modules/dep/index.js").is_none());
        assert_eq!(graph.find_nodes_by_type(NodeType::CodeBlock).len(), 1);
        assert!(graph.find_untested_code_blocks().is_empty());
    }

    #[test]
    fn test_scan_respects_gitignore() {
        let dir = project();
        write(dir.path(), ".gitignore", "build/\n");
        write(dir.path(), "build/out.js", AI_SOURCE);
        let mut graph = TrackingGraph::new();

        scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();

        assert!(graph.find_file_by_path("build/out.js").is_none());
    }

    #[test]
    fn test_rescan_is_stable() {
        let dir = project();
        let mut graph = TrackingGraph::new();
        scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();
        let before = graph.graph().clone();

        let result = scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();

        assert_eq!(result.tests_linked, 0);
        assert_eq!(result.files_removed, 0);
        assert_eq!(graph.node_count(), before.nodes.len());
        assert_eq!(graph.edge_count(), before.edges.len());
    }

    #[test]
    fn test_analyze_file_prunes_edited_blocks() {
        let dir = project();
        let settings = Settings::default();
        let scanner = Scanner::new(dir.path(), &settings).unwrap();
        let mut graph = TrackingGraph::new();
        scanner.scan(&mut graph);

        write(dir.path(), "src/total.js", "export const answer = 42;\n");
        let report = scanner
            .analyze_file(&mut graph, Path::new("src/total.js"))
            .unwrap();

        assert_eq!(report.blocks_pruned, 1);
        assert_eq!(report.blocks_tagged, 0);
        assert!(graph.find_nodes_by_type(NodeType::CodeBlock).is_empty());
        assert!(graph.find_nodes_by_type(NodeType::AiSuggestion).is_empty());
    }

    #[test]
    fn test_analyze_file_unlinks_edited_tests() {
        let dir = project();
        let settings = Settings::default();
        let scanner = Scanner::new(dir.path(), &settings).unwrap();
        let mut graph = TrackingGraph::new();
        scanner.scan(&mut graph);
        assert!(graph.find_untested_code_blocks().is_empty());

        write(dir.path(), "src/total.test.js", "test('noop', () => expect(1).toBe(1));\n");
        scanner
            .analyze_file(&mut graph, Path::new("src/total.test.js"))
            .unwrap();

        assert_eq!(graph.find_untested_code_blocks().len(), 1);
        assert!(graph.find_edges_by_type(EdgeKind::TestedBy).is_empty());
    }

    #[test]
    fn test_rescan_drops_deleted_files() {
        let dir = project();
        let mut graph = TrackingGraph::new();
        scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();

        fs::remove_file(dir.path().join("src/total.js")).unwrap();
        fs::remove_file(dir.path().join("src/total.test.js")).unwrap();
        let result = scan_project(dir.path(), &mut graph, &Settings::default()).unwrap();

        assert_eq!(result.files_removed, 2);
        assert_eq!(result.files_scanned, 0);
        assert!(graph.find_nodes_by_type(NodeType::File).is_empty());
        assert!(graph.find_nodes_by_type(NodeType::Test).is_empty());
        assert!(graph.find_nodes_by_type(NodeType::CodeBlock).is_empty());
        assert!(graph.find_untested_code_blocks().is_empty());
    }

    #[test]
    fn test_analyze_source_links_known_tests() {
        let dir = project();
        let settings = Settings::default();
        let scanner = Scanner::new(dir.path(), &settings).unwrap();
        let mut graph = TrackingGraph::new();

        // Test first: no source yet, so only the test node is recorded.
        let first = scanner
            .analyze_file(&mut graph, Path::new("src/total.test.js"))
            .unwrap();
        assert_eq!(first.tests_linked, 0);

        let report = scanner
            .analyze_file(&mut graph, Path::new("src/total.js"))
            .unwrap();
        assert_eq!(report.blocks_tagged, 1);
        assert_eq!(report.tests_linked, 1);
    }

    #[test]
    fn test_remove_path() {
        let dir = project();
        let settings = Settings::default();
        let scanner = Scanner::new(dir.path(), &settings).unwrap();
        let mut graph = TrackingGraph::new();
        scanner.scan(&mut graph);

        assert!(scanner.remove_path(&mut graph, &scanner.root().join("src/total.test.js")));
        assert_eq!(graph.find_untested_code_blocks().len(), 1);

        assert!(scanner.remove_path(&mut graph, &scanner.root().join("src/total.js")));
        assert!(graph.find_nodes_by_type(NodeType::CodeBlock).is_empty());
        assert!(!scanner.remove_path(&mut graph, &scanner.root().join("src/nope.js")));
    }

    #[test]
    fn test_relative_path() {
        let dir = project();
        let scanner = Scanner::new(dir.path(), &Settings::default()).unwrap();

        assert_eq!(
            scanner.relative_path(&scanner.root().join("src/total.js")),
            Some("src/total.js".to_string())
        );
        assert_eq!(
            scanner.relative_path(Path::new("src/total.js")),
            Some("src/total.js".to_string())
        );
        assert_eq!(scanner.relative_path(Path::new("/elsewhere/a.js")), None);
        assert!(scanner.is_ignored(&scanner.root().join("node_modules/x.js")));
    }
}

//! Debounced file watching.
//!
//! Changes under the project root are collected by `notify-debouncer-mini`
//! and handled one batch at a time: changed files are re-analyzed, deleted
//! ones are dropped from the graph, then the graph is saved and an update
//! is broadcast to subscribers.

use crate::error::Result;
use crate::scanner::Scanner;
use chrono::Utc;
use fasttrack_core::{language_for_path, Timestamp};
use fasttrack_graph::{ProjectStore, Settings, TrackingGraph};
use notify_debouncer_mini::notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// A graph shared between the watcher and the dashboard server.
pub type SharedGraph = Arc<RwLock<TrackingGraph>>;

/// Configuration for [`ProjectWatcher`].
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Project root to watch.
    pub root: PathBuf,
    /// Quiet period before a batch of events is handled.
    pub debounce_ms: u64,
    /// Extensions to react to, matched case-insensitively. Empty means every
    /// supported language.
    pub extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            debounce_ms: 500,
            extensions: Vec::new(),
        }
    }
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

/// Broadcast after each handled batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchUpdate {
    pub changed_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub node_count: usize,
    pub edge_count: usize,
    pub timestamp: Timestamp,
}

/// Keeps a project's tracking graph in sync with its files.
pub struct ProjectWatcher {
    config: WatchConfig,
    scanner: Scanner,
    store: ProjectStore,
    graph: SharedGraph,
    updates: broadcast::Sender<WatchUpdate>,
}

impl ProjectWatcher {
    /// Creates a watcher over `graph`, reading settings from the project.
    pub fn new(config: WatchConfig, graph: SharedGraph) -> Result<Self> {
        let store = ProjectStore::new(&config.root);
        let settings = store.load_settings();
        Self::with_settings(config, graph, &settings)
    }

    pub fn with_settings(
        config: WatchConfig,
        graph: SharedGraph,
        settings: &Settings,
    ) -> Result<Self> {
        let scanner = Scanner::new(&config.root, settings)?;
        let store = ProjectStore::new(scanner.root());
        let (updates, _) = broadcast::channel(64);

        Ok(Self {
            config,
            scanner,
            store,
            graph,
            updates,
        })
    }

    pub fn graph(&self) -> SharedGraph {
        self.graph.clone()
    }

    /// Receives an update after every saved batch.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchUpdate> {
        self.updates.subscribe()
    }

    /// The update channel, for consumers that subscribe later.
    pub fn sender(&self) -> broadcast::Sender<WatchUpdate> {
        self.updates.clone()
    }

    /// Returns true if a change to `path` should be handled.
    pub fn should_process(&self, path: &Path) -> bool {
        if !self.scanner.is_tracked(path) {
            return false;
        }
        if self.config.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Applies one batch of changed paths and saves the graph.
    ///
    /// Paths that no longer exist are removed from the graph; the rest are
    /// re-analyzed. A file that fails to analyze is logged and skipped.
    pub async fn apply_batch(&self, paths: &[PathBuf]) -> Result<WatchUpdate> {
        let mut changed_files = Vec::new();
        let mut removed_files = Vec::new();

        let mut graph = self.graph.write().await;

        for path in paths {
            let Some(rel) = self.scanner.relative_path(path) else {
                continue;
            };

            if !path.exists() {
                if self.scanner.remove_path(&mut graph, path) {
                    info!("File removed: {}", rel);
                    removed_files.push(rel);
                }
                continue;
            }

            match self.scanner.analyze_file(&mut graph, path) {
                Ok(report) => {
                    debug!(
                        "Re-analyzed {} ({}): {} tagged, {} pruned, {} linked",
                        rel,
                        language_for_path(path).unwrap_or("unknown"),
                        report.blocks_tagged,
                        report.blocks_pruned,
                        report.tests_linked
                    );
                    changed_files.push(rel);
                }
                Err(e) => warn!("Failed to analyze {}: {}", rel, e),
            }
        }

        self.store.save_graph(graph.graph())?;

        let update = WatchUpdate {
            changed_files,
            removed_files,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            timestamp: Utc::now(),
        };
        drop(graph);

        self.store.log_activity(&format!(
            "Watch batch: {} changed, {} removed",
            update.changed_files.len(),
            update.removed_files.len()
        ));

        // No subscribers is fine.
        let _ = self.updates.send(update.clone());
        Ok(update)
    }

    /// Watches the project until the event stream closes.
    pub async fn run(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<DebounceEventResult>(64);

        let mut debouncer = new_debouncer(
            Duration::from_millis(self.config.debounce_ms),
            move |res: DebounceEventResult| {
                let _ = tx.blocking_send(res);
            },
        )?;
        debouncer
            .watcher()
            .watch(self.scanner.root(), RecursiveMode::Recursive)?;

        info!("Watching {}", self.scanner.root().display());
        info!("Debounce: {}ms", self.config.debounce_ms);

        while let Some(res) = rx.recv().await {
            let events = match res {
                Ok(events) => events,
                Err(e) => {
                    warn!("Watch error: {:?}", e);
                    continue;
                }
            };

            let mut paths: Vec<PathBuf> = events
                .into_iter()
                .map(|event| event.path)
                .filter(|path| self.should_process(path))
                .collect();
            paths.sort();
            paths.dedup();

            if paths.is_empty() {
                continue;
            }

            match self.apply_batch(&paths).await {
                Ok(update) => info!(
                    "Graph updated: {} changed, {} removed ({} nodes, {} edges)",
                    update.changed_files.len(),
                    update.removed_files.len(),
                    update.node_count,
                    update.edge_count
                ),
                Err(e) => error!("Failed to apply changes: {}", e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tests::{AI_SOURCE, TOTAL_TEST};
    use fasttrack_core::NodeType;
    use std::fs;

    fn watcher(root: &Path) -> ProjectWatcher {
        let graph = Arc::new(RwLock::new(TrackingGraph::new()));
        ProjectWatcher::new(WatchConfig::new(root), graph).unwrap()
    }

    #[test]
    fn test_should_process() {
        let dir = tempfile::tempdir().unwrap();
        let w = watcher(dir.path());
        let root = w.scanner.root().to_path_buf();

        assert!(w.should_process(&root.join("src/a.ts")));
        assert!(!w.should_process(&root.join("README.md")));
        assert!(!w.should_process(&root.join("node_modules/x/a.js")));
        assert!(!w.should_process(&root.join(".fasttrack/graph.json")));
    }

    #[test]
    fn test_should_process_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        let graph = Arc::new(RwLock::new(TrackingGraph::new()));
        let config = WatchConfig {
            extensions: vec!["ts".into()],
            ..WatchConfig::new(dir.path())
        };
        let w = ProjectWatcher::new(config, graph).unwrap();
        let root = w.scanner.root().to_path_buf();

        assert!(w.should_process(&root.join("a.ts")));
        assert!(w.should_process(&root.join("A.TS")));
        assert!(!w.should_process(&root.join("a.js")));
    }

    #[tokio::test]
    async fn test_apply_batch_updates_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let w = watcher(dir.path());
        let root = w.scanner.root().to_path_buf();
        let mut rx = w.subscribe();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/total.js"), AI_SOURCE).unwrap();
        fs::write(root.join("src/total.test.js"), TOTAL_TEST).unwrap();

        let update = w
            .apply_batch(&[root.join("src/total.js"), root.join("src/total.test.js")])
            .await
            .unwrap();

        assert_eq!(update.changed_files, vec!["src/total.js", "src/total.test.js"]);
        assert_eq!(rx.recv().await.unwrap().node_count, update.node_count);
        {
            let graph = w.graph.read().await;
            assert_eq!(graph.find_nodes_by_type(NodeType::CodeBlock).len(), 1);
            assert!(graph.find_untested_code_blocks().is_empty());
        }

        let (saved, outcome) = ProjectStore::new(&root).load_graph();
        assert!(outcome.is_loaded());
        assert_eq!(saved.nodes.len(), update.node_count);
    }

    #[tokio::test]
    async fn test_apply_batch_removes_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let w = watcher(dir.path());
        let root = w.scanner.root().to_path_buf();
        let path = root.join("total.js");

        fs::write(&path, AI_SOURCE).unwrap();
        w.apply_batch(&[path.clone()]).await.unwrap();

        fs::remove_file(&path).unwrap();
        let update = w.apply_batch(&[path]).await.unwrap();

        assert_eq!(update.removed_files, vec!["total.js"]);
        let graph = w.graph.read().await;
        assert!(graph.find_file_by_path("total.js").is_none());
        assert!(graph.find_nodes_by_type(NodeType::CodeBlock).is_empty());
    }
}

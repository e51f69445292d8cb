//! On-disk persistence under `<project>/.fasttrack/`.
//!
//! The graph is one pretty-printed JSON document, rewritten in full on every
//! save. Loading never fails: a missing or unreadable document yields an
//! empty graph, and [`LoadOutcome`] tells the caller which case happened.

use crate::graph::{GraphDocument, TrackingGraph};
use crate::settings::Settings;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Directory holding all FastTrack state inside a project.
pub const FASTTRACK_DIR: &str = ".fasttrack";

const GRAPH_FILE: &str = "graph.json";
const SETTINGS_FILE: &str = "settings.json";
const ACTIVITY_LOG: &str = "activity.log";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How a graph load went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was read and parsed.
    Loaded,
    /// No document exists yet.
    Missing,
    /// The document could not be read or parsed; an empty graph was used.
    Recovered(String),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// File-system store for one project.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    dir: PathBuf,
}

impl ProjectStore {
    /// Creates a store for the project at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dir = root.join(FASTTRACK_DIR);
        Self { root, dir }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.fasttrack` directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn graph_path(&self) -> PathBuf {
        self.dir.join(GRAPH_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn activity_log_path(&self) -> PathBuf {
        self.dir.join(ACTIVITY_LOG)
    }

    /// Returns true if the `.fasttrack` directory exists.
    pub fn is_initialized(&self) -> bool {
        self.dir.is_dir()
    }

    /// Creates the directory, an empty graph and default settings, leaving
    /// existing files alone.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        if !self.graph_path().exists() {
            self.save_graph(&GraphDocument::default())?;
        }

        if !self.settings_path().exists() {
            self.save_settings(&Settings::default())?;
        }

        info!("Initialized FastTrack store in {}", self.dir.display());
        Ok(())
    }

    /// Loads the graph document, falling back to an empty one.
    pub fn load_graph(&self) -> (GraphDocument, LoadOutcome) {
        let path = self.graph_path();

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No graph at {}", path.display());
                return (GraphDocument::default(), LoadOutcome::Missing);
            }
            Err(e) => {
                warn!("Error loading graph from {}: {}", path.display(), e);
                return (GraphDocument::default(), LoadOutcome::Recovered(e.to_string()));
            }
        };

        match serde_json::from_str::<GraphDocument>(&text) {
            Ok(doc) => {
                debug!(
                    "Loaded graph: {} nodes, {} edges",
                    doc.nodes.len(),
                    doc.edges.len()
                );
                (doc, LoadOutcome::Loaded)
            }
            Err(e) => {
                warn!("Error parsing graph at {}: {}", path.display(), e);
                (GraphDocument::default(), LoadOutcome::Recovered(e.to_string()))
            }
        }
    }

    /// Loads the graph straight into a store.
    pub fn load_tracking_graph(&self) -> (TrackingGraph, LoadOutcome) {
        let (doc, outcome) = self.load_graph();
        (TrackingGraph::from_document(doc), outcome)
    }

    /// Writes the whole graph document.
    pub fn save_graph(&self, doc: &GraphDocument) -> Result<(), StoreError> {
        self.write_json(&self.graph_path(), doc)?;
        debug!(
            "Saved graph: {} nodes, {} edges",
            doc.nodes.len(),
            doc.edges.len()
        );
        Ok(())
    }

    /// Loads settings, falling back to defaults if missing or malformed.
    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Settings::default(),
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Error parsing settings at {}: {}", path.display(), e);
            Settings::default()
        })
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.write_json(&self.settings_path(), settings)
    }

    /// Appends a timestamped line to the activity log. Failures are logged
    /// and otherwise ignored.
    pub fn log_activity(&self, activity: &str) {
        let path = self.activity_log_path();
        let line = format!("[{}] {}\n", Utc::now().to_rfc3339(), activity);

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!("Error logging activity to {}: {}", path.display(), e);
        }
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).map_err(|e| StoreError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeKind;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_creates_files() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());

        assert!(!store.is_initialized());
        store.initialize().unwrap();

        assert!(store.is_initialized());
        assert!(store.graph_path().exists());
        assert_eq!(store.load_settings(), Settings::default());

        let (doc, outcome) = store.load_graph();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn test_save_load_graph() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());

        let mut graph = TrackingGraph::new();
        graph.create_file_node("f1", "/a.js", "javascript");
        graph.create_code_block_node("c1", "f1", 1, 5, "function a(){}");
        graph.create_edge("e1", EdgeKind::TestedBy, "c1", "t1");

        store.save_graph(graph.graph()).unwrap();

        let (loaded, outcome) = store.load_graph();
        assert!(outcome.is_loaded());
        assert_eq!(&loaded, graph.graph());
    }

    #[test]
    fn test_missing_graph_is_empty() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());

        let (graph, outcome) = store.load_tracking_graph();
        assert_eq!(outcome, LoadOutcome::Missing);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_corrupt_graph_recovers_empty() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.initialize().unwrap();
        fs::write(store.graph_path(), "{ not json").unwrap();

        let (doc, outcome) = store.load_graph();
        assert!(matches!(outcome, LoadOutcome::Recovered(_)));
        assert!(doc.nodes.is_empty() && doc.edges.is_empty());
    }

    #[test]
    fn test_graph_missing_edges_recovers_empty() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.initialize().unwrap();
        fs::write(store.graph_path(), r#"{ "nodes": [] }"#).unwrap();

        let (_, outcome) = store.load_graph();
        assert!(!outcome.is_loaded());
    }

    #[test]
    fn test_malformed_settings_use_defaults() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.initialize().unwrap();
        fs::write(store.settings_path(), "[]").unwrap();

        assert_eq!(store.load_settings(), Settings::default());
    }

    #[test]
    fn test_log_activity_appends() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.initialize().unwrap();

        store.log_activity("scanned");
        store.log_activity("tagged");

        let log = fs::read_to_string(store.activity_log_path()).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().last().unwrap().ends_with("tagged"));
    }
}

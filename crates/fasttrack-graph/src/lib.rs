//! FastTrack Graph - the AI-code tracking graph
//!
//! This crate owns the in-memory graph of developers, AI suggestions, code
//! blocks, files, tests and commits, the queries the dashboard runs over
//! it, and the JSON files that persist it inside a project.
//!
//! # Architecture
//!
//! [`TrackingGraph`] keeps nodes and edges in insertion order with id
//! indexes for upserts. Queries live on the graph itself; multi-entity
//! workflows (tagging a block, linking a test) live on [`Tracker`].
//! [`ProjectStore`] reads and writes `.fasttrack/`.
//!
//! # Example
//!
//! ```no_run
//! use fasttrack_graph::{ProjectStore, Tracker, SpanTag};
//!
//! let store = ProjectStore::new(".");
//! let settings = store.load_settings();
//! let (mut graph, _) = store.load_tracking_graph();
//!
//! let tracker = Tracker::new(settings.developer).unwrap();
//! tracker.tag_span(&mut graph, SpanTag {
//!     path: "src/app.js".into(),
//!     language: "javascript".into(),
//!     start_line: 10,
//!     end_line: 24,
//!     content: "function handler(req) {\n  // ...\n}".into(),
//!     ai_tool: None,
//! });
//!
//! store.save_graph(graph.graph()).unwrap();
//! ```

mod builder;
mod edge;
mod graph;
mod query;
mod settings;
mod store;
mod tracker;

pub use edge::{Edge, EdgeKind};
pub use graph::{GraphDocument, TrackingGraph};
pub use query::{
    DashboardSummary, FileAiCount, GraphStats, ToolCount, DEFAULT_DENSITY_LIMIT, MS_PER_DAY,
};
pub use settings::{
    ComplexitySettings, DeveloperSettings, ScanSettings, Settings, StaleCodeSettings,
};
pub use store::{LoadOutcome, ProjectStore, StoreError, FASTTRACK_DIR};
pub use tracker::{stable_id, tag_code_block, LinkOutcome, SpanTag, TagOutcome, TagRequest, Tracker};

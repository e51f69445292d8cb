//! FastTrack Core - Entity model and heuristic analysis
//!
//! This crate defines the node types of the FastTrack tracking graph and
//! the text heuristics used to feed it: complexity estimation, function
//! name extraction, AI-block detection and test-file recognition.
//!
//! # Example
//!
//! ```no_run
//! use fasttrack_core::Analyzer;
//!
//! let analyzer = Analyzer::new().unwrap();
//! let complexity = analyzer.calculate_complexity("if (a) { b(); }");
//! assert_eq!(complexity, 2);
//! ```

pub mod analyzer;
pub mod error;
pub mod language;
pub mod node;

pub use analyzer::{extract_span, Analyzer, DetectedBlock, DEFAULT_AI_TOOL};
pub use error::{CoreError, Result};
pub use language::{
    is_source_file, is_test_file, is_test_for, language_for_path, test_file_candidates,
};
pub use node::{
    AiSuggestion, CodeBlock, Commit, Developer, Node, NodeKind, NodeType, SourceFile, TestFile,
    Timestamp,
};

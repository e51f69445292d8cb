//! FastTrack Server - dashboard API over WebSocket
//!
//! This crate serves the tracking graph to the dashboard using JSON-RPC
//! 2.0 over WebSocket. All methods are read-only: the graph is written by
//! the scanner and watcher, and the server shares it through a
//! [`SharedGraph`].
//!
//! When a watcher is attached with [`FastTrackServer::with_updates`], each
//! saved batch is pushed to clients as a `graph.updated` notification.

mod handlers;
mod protocol;
mod server;

pub use fasttrack_watcher::SharedGraph;
pub use handlers::ServerState;
pub use protocol::{Notification, Request, Response, RpcError};
pub use server::{process_message, FastTrackServer, ServerConfig, ServerError, GRAPH_UPDATED};

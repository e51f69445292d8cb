//! WebSocket server implementation.
//!
//! Handles client connections, routes requests to handlers and forwards
//! watcher updates to every connected client as notifications.

use crate::handlers::{
    handle_density, handle_edges_by_source, handle_edges_by_target, handle_edges_by_type,
    handle_graph_get, handle_info, handle_node_get, handle_nodes_by_type, handle_stale,
    handle_summary, handle_untested, ServerState,
};
use crate::protocol::{Notification, Request, Response};
use fasttrack_graph::{Settings, TrackingGraph};
use fasttrack_watcher::{SharedGraph, WatchUpdate};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Method name of the notification sent after the watcher updates the graph.
pub const GRAPH_UPDATED: &str = "graph.updated";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Default window for `stale`.
    pub stale_days: u32,
    /// Default cut-off for complex blocks in `dashboard.summary`.
    pub complexity_threshold: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ServerConfig {
    /// Server defaults taken from project settings, bound to
    /// `127.0.0.1:7432`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7432)),
            stale_days: settings.stale_code.days,
            complexity_threshold: settings.complexity.threshold,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }
}

/// The FastTrack dashboard server.
pub struct FastTrackServer {
    config: ServerConfig,
    state: ServerState,
    updates: Option<broadcast::Sender<WatchUpdate>>,
}

impl FastTrackServer {
    /// Creates a new server with the given graph.
    pub fn new(graph: TrackingGraph, config: ServerConfig) -> Self {
        Self::with_shared(Arc::new(RwLock::new(graph)), config)
    }

    /// Creates a server over a graph shared with a watcher.
    pub fn with_shared(graph: SharedGraph, config: ServerConfig) -> Self {
        let state = ServerState {
            graph,
            stale_days: config.stale_days,
            complexity_threshold: config.complexity_threshold,
        };

        Self {
            config,
            state,
            updates: None,
        }
    }

    /// Forwards updates from `updates` to connected clients.
    pub fn with_updates(mut self, updates: broadcast::Sender<WatchUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Returns a handle to the shared graph.
    pub fn graph(&self) -> SharedGraph {
        self.state.graph.clone()
    }

    pub fn addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("FastTrack server listening on ws://{}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let state = self.state.clone();
                    let updates = self.updates.as_ref().map(|tx| tx.subscribe());
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state, updates).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: ServerState,
    mut updates: Option<broadcast::Receiver<WatchUpdate>>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    info!("WebSocket connection established with {}", addr);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("Message error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                };

                if msg.is_close() {
                    debug!("Client {} disconnected", addr);
                    break;
                }

                if msg.is_ping() {
                    write.send(Message::Pong(msg.into_data())).await?;
                    continue;
                }

                if msg.is_text() {
                    let text = msg.to_text().unwrap_or("");
                    let response = process_message(text, &state).await;
                    let json = serde_json::to_string(&response)?;
                    write.send(Message::Text(json)).await?;
                }
            }

            update = next_update(&mut updates) => {
                match update {
                    Ok(update) => {
                        let notification = Notification::new(GRAPH_UPDATED, update)?;
                        let json = serde_json::to_string(&notification)?;
                        write.send(Message::Text(json)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} updates", addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        updates = None;
                    }
                }
            }
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

/// Waits for the next update, or forever if there is no update stream.
async fn next_update(
    updates: &mut Option<broadcast::Receiver<WatchUpdate>>,
) -> Result<WatchUpdate, broadcast::error::RecvError> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Processes a JSON-RPC message and returns a response.
pub async fn process_message(text: &str, state: &ServerState) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Processing method: {}", method);

    match method {
        "graph.info" => handle_info(state, id).await,

        "graph.get" => handle_graph_get(state, id).await,

        "node.get" => match request.params() {
            Ok(params) => handle_node_get(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "nodes.byType" => match request.params() {
            Ok(params) => handle_nodes_by_type(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "edges.bySource" => match request.params() {
            Ok(params) => handle_edges_by_source(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "edges.byTarget" => match request.params() {
            Ok(params) => handle_edges_by_target(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "edges.byType" => match request.params() {
            Ok(params) => handle_edges_by_type(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "untested" => handle_untested(state, id).await,

        "stale" => match request.params() {
            Ok(params) => handle_stale(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "density" => match request.params() {
            Ok(params) => handle_density(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "dashboard.summary" => match request.params() {
            Ok(params) => handle_summary(state, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        _ => Response::method_not_found(id, method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ServerState {
        let mut graph = TrackingGraph::new();
        graph.create_file_node("f1", "src/a.js", "javascript");
        graph.create_code_block_node("c1", "f1", 0, 3, "function a() {}");
        ServerState::new(Arc::new(RwLock::new(graph)), &Settings::default())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:7432");
        assert_eq!(config.stale_days, 30);
        assert_eq!(config.with_port(9000).addr.port(), 9000);
    }

    #[tokio::test]
    async fn test_process_message_routes() {
        let state = state();
        let response = process_message(
            r#"{"jsonrpc":"2.0","id":1,"method":"edges.bySource","params":{"id":"c1"}}"#,
            &state,
        )
        .await;
        assert_eq!(response.result.unwrap()["total"], 0);

        let response =
            process_message(r#"{"jsonrpc":"2.0","id":2,"method":"graph.get"}"#, &state).await;
        let doc = response.result.unwrap();
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 2);
        assert!(doc["edges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_message_errors() {
        let state = state();

        let parse = process_message("{ nope", &state).await;
        assert_eq!(parse.error.unwrap().code, -32700);

        let unknown = process_message(r#"{"id":1,"method":"impact"}"#, &state).await;
        assert_eq!(unknown.error.unwrap().code, -32601);

        let invalid = process_message(
            r#"{"id":1,"method":"nodes.byType","params":{"type":"Widget"}}"#,
            &state,
        )
        .await;
        assert_eq!(invalid.error.unwrap().code, -32602);

        let missing = process_message(r#"{"id":1,"method":"node.get"}"#, &state).await;
        assert_eq!(missing.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_untested_without_params() {
        let state = state();
        let response = process_message(r#"{"id":"x","method":"untested"}"#, &state).await;
        assert_eq!(response.id, Some("x".into()));
        assert_eq!(response.result.unwrap()["total"], 1);
    }
}

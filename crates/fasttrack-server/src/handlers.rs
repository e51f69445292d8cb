//! Request handlers for the dashboard methods.
//!
//! Each handler implements one method. All of them only read the graph.

use crate::protocol::{
    DensityParams, EdgesByNodeParams, EdgesByTypeParams, NodeGetParams, NodesByTypeParams,
    Response, StaleParams, SummaryParams,
};
use fasttrack_graph::{Settings, DEFAULT_DENSITY_LIMIT};
use fasttrack_watcher::SharedGraph;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// What every handler can see.
#[derive(Clone)]
pub struct ServerState {
    pub graph: SharedGraph,
    /// Used when `stale` or `dashboard.summary` get no `days`.
    pub stale_days: u32,
    /// Used when `dashboard.summary` gets no `threshold`.
    pub complexity_threshold: u32,
}

impl ServerState {
    pub fn new(graph: SharedGraph, settings: &Settings) -> Self {
        Self {
            graph,
            stale_days: settings.stale_code.days,
            complexity_threshold: settings.complexity.threshold,
        }
    }
}

/// Handles the graph.info method.
pub async fn handle_info(state: &ServerState, id: Option<Value>) -> Response {
    let g = state.graph.read().await;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct InfoResult {
        node_count: usize,
        edge_count: usize,
        files: usize,
        code_blocks: usize,
        tests: usize,
        version: &'static str,
    }

    let stats = g.stats();
    Response::success(
        id,
        InfoResult {
            node_count: stats.node_count,
            edge_count: stats.edge_count,
            files: stats.files,
            code_blocks: stats.code_blocks,
            tests: stats.tests,
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Handles the graph.get method: the whole document.
pub async fn handle_graph_get(state: &ServerState, id: Option<Value>) -> Response {
    let g = state.graph.read().await;
    Response::success(id, g.graph())
}

/// Handles the node.get method.
pub async fn handle_node_get(
    state: &ServerState,
    id: Option<Value>,
    params: NodeGetParams,
) -> Response {
    let g = state.graph.read().await;

    match g.find_node_by_id(&params.id) {
        Some(node) => Response::success(
            id,
            serde_json::json!({
                "node": node,
                "edges": {
                    "outgoing": g.find_edges_by_source(&node.id),
                    "incoming": g.find_edges_by_target(&node.id),
                }
            }),
        ),
        None => Response::node_not_found(id, &params.id),
    }
}

/// Handles the nodes.byType method.
pub async fn handle_nodes_by_type(
    state: &ServerState,
    id: Option<Value>,
    params: NodesByTypeParams,
) -> Response {
    let g = state.graph.read().await;
    let nodes = g.find_nodes_by_type(params.node_type);

    Response::success(
        id,
        serde_json::json!({
            "type": params.node_type,
            "total": nodes.len(),
            "nodes": nodes,
        }),
    )
}

/// Handles the edges.bySource method.
pub async fn handle_edges_by_source(
    state: &ServerState,
    id: Option<Value>,
    params: EdgesByNodeParams,
) -> Response {
    let g = state.graph.read().await;
    let edges = g.find_edges_by_source(&params.id);
    Response::success(id, serde_json::json!({ "total": edges.len(), "edges": edges }))
}

/// Handles the edges.byTarget method.
pub async fn handle_edges_by_target(
    state: &ServerState,
    id: Option<Value>,
    params: EdgesByNodeParams,
) -> Response {
    let g = state.graph.read().await;
    let edges = g.find_edges_by_target(&params.id);
    Response::success(id, serde_json::json!({ "total": edges.len(), "edges": edges }))
}

/// Handles the edges.byType method.
pub async fn handle_edges_by_type(
    state: &ServerState,
    id: Option<Value>,
    params: EdgesByTypeParams,
) -> Response {
    let g = state.graph.read().await;
    let edges = g.find_edges_by_type(params.kind);
    Response::success(id, serde_json::json!({ "total": edges.len(), "edges": edges }))
}

/// Handles the untested method.
pub async fn handle_untested(state: &ServerState, id: Option<Value>) -> Response {
    let start = Instant::now();
    let g = state.graph.read().await;
    let blocks = g.find_untested_code_blocks();

    Response::success(
        id,
        serde_json::json!({
            "total": blocks.len(),
            "blocks": blocks,
            "queryTime": start.elapsed().as_millis() as u64,
        }),
    )
}

/// Handles the stale method.
pub async fn handle_stale(state: &ServerState, id: Option<Value>, params: StaleParams) -> Response {
    let start = Instant::now();
    let days = params.days.unwrap_or(state.stale_days);
    let g = state.graph.read().await;

    debug!("Stale query: {} days", days);
    let blocks = g.find_stale_ai_generated_blocks(days);

    Response::success(
        id,
        serde_json::json!({
            "days": days,
            "total": blocks.len(),
            "blocks": blocks,
            "queryTime": start.elapsed().as_millis() as u64,
        }),
    )
}

/// Handles the density method: files ranked by AI-generated blocks.
pub async fn handle_density(
    state: &ServerState,
    id: Option<Value>,
    params: DensityParams,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_DENSITY_LIMIT);
    let g = state.graph.read().await;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct FileDensity {
        file_id: String,
        path: Option<String>,
        count: usize,
    }

    let files: Vec<FileDensity> = g
        .find_files_with_most_ai_code(limit)
        .into_iter()
        .map(|entry| FileDensity {
            path: g
                .find_node_by_id(&entry.file_id)
                .and_then(|n| n.as_file())
                .map(|f| f.path.clone()),
            file_id: entry.file_id,
            count: entry.count,
        })
        .collect();

    Response::success(id, serde_json::json!({ "limit": limit, "files": files }))
}

/// Handles the dashboard.summary method.
pub async fn handle_summary(
    state: &ServerState,
    id: Option<Value>,
    params: SummaryParams,
) -> Response {
    let days = params.days.unwrap_or(state.stale_days);
    let threshold = params.threshold.unwrap_or(state.complexity_threshold);
    let g = state.graph.read().await;

    Response::success(id, g.summary(days, threshold))
}

//! JSON-RPC 2.0 message types and method parameters.

use fasttrack_core::NodeType;
use fasttrack_graph::EdgeKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const NODE_NOT_FOUND: i32 = -32001;

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Decodes the params into `T`. Absent params decode as `{}`.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.params {
            Value::Null => serde_json::from_value(Value::Object(Default::default())),
            params => T::deserialize(params),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// An outgoing response: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(result),
                error: None,
            },
            Err(e) => Self::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, message)
    }

    pub fn node_not_found(id: Option<Value>, node_id: &str) -> Self {
        Self::error(id, NODE_NOT_FOUND, format!("Node not found: {}", node_id))
    }
}

/// A server-initiated message with no id.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl Notification {
    pub fn new(method: &'static str, params: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0",
            method,
            params: serde_json::to_value(params)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NodeGetParams {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct NodesByTypeParams {
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// Params for `edges.bySource` and `edges.byTarget`.
#[derive(Debug, Deserialize)]
pub struct EdgesByNodeParams {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct EdgesByTypeParams {
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Default, Deserialize)]
pub struct StaleParams {
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DensityParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryParams {
    pub days: Option<u32>,
    pub threshold: Option<u32>,
}

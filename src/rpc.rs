//! JSON-RPC 2.0 over HTTP POST: envelope validation and method dispatch.
//!
//! Dispatched calls always answer HTTP 200 with the outcome inside the
//! JSON-RPC body; only transport-level failures (unparseable JSON, wrong
//! content type) use HTTP 400.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::state::AppState;
use crate::store::QueryStore;
use crate::types::{QueryResult, RpcResponse};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const QUERY_FAILED: i64 = -32000;

pub async fn rpc_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_json_content_type(&headers) {
        let reply = RpcResponse::failure(
            Value::Null,
            INVALID_REQUEST,
            "Content-Type must be application/json",
            None,
        );
        return (StatusCode::BAD_REQUEST, Json(reply)).into_response();
    }

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            let reply = RpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error", None);
            return (StatusCode::BAD_REQUEST, Json(reply)).into_response();
        }
    };

    match parsed {
        // Batch: dispatch each element in order, answer with the response
        // array. An empty batch is itself an invalid request.
        Value::Array(batch) => {
            if batch.is_empty() {
                let reply =
                    RpcResponse::failure(Value::Null, INVALID_REQUEST, "Invalid Request", None);
                return Json(reply).into_response();
            }
            let mut replies = Vec::with_capacity(batch.len());
            for request in batch {
                replies.push(dispatch(&state, request).await);
            }
            Json(replies).into_response()
        }
        single => Json(dispatch(&state, single).await).into_response(),
    }
}

/// Validates the envelope and routes to the method table. The request id is
/// echoed back unchanged whenever it is well-formed.
async fn dispatch(state: &AppState, request: Value) -> RpcResponse {
    let invalid = |id| RpcResponse::failure(id, INVALID_REQUEST, "Invalid Request", None);

    let Some(obj) = request.as_object() else {
        return invalid(Value::Null);
    };

    let id = obj.get("id").cloned().unwrap_or(Value::Null);
    if !(id.is_number() || id.is_string()) {
        return invalid(Value::Null);
    }

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return invalid(id);
    }
    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return invalid(id);
    };
    let params = obj.get("params");

    debug!(method, "rpc call");
    match method {
        "query" => {
            let Some(sql) = params
                .and_then(|p| p.get("sql"))
                .and_then(Value::as_str)
                .map(str::to_owned)
            else {
                return RpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    "Invalid params: 'sql' parameter is required",
                    None,
                );
            };
            match run_query(state, sql).await {
                Ok(result) => match serde_json::to_value(&result) {
                    Ok(value) => RpcResponse::success(id, value),
                    Err(e) => RpcResponse::failure(
                        id,
                        QUERY_FAILED,
                        "Query execution failed",
                        Some(json!(e.to_string())),
                    ),
                },
                Err(message) => RpcResponse::failure(
                    id,
                    QUERY_FAILED,
                    "Query execution failed",
                    Some(json!(message)),
                ),
            }
        }
        "version" => RpcResponse::success(id, json!(env!("CARGO_PKG_VERSION"))),
        _ => RpcResponse::failure(id, METHOD_NOT_FOUND, "Method not found", None),
    }
}

/// Runs the statement on the blocking pool, bounded by the configured
/// timeout. The timeout abandons the waiting side only; the statement itself
/// runs to completion on its worker and keeps the store serialized.
async fn run_query(state: &AppState, sql: String) -> Result<QueryResult, String> {
    let store: QueryStore = state.store.clone();
    let task = tokio::task::spawn_blocking(move || store.execute(&sql));
    match tokio::time::timeout(state.query_timeout, task).await {
        Ok(Ok(result)) => result.map_err(|e| e.to_string()),
        Ok(Err(join_err)) => Err(format!("query task failed: {join_err}")),
        Err(_) => Err(format!(
            "query timed out after {}s",
            state.query_timeout.as_secs()
        )),
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false)
}

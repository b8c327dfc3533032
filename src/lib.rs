//! Single-port gateway: `POST /rpc` answers JSON-RPC queries against an
//! embedded DuckDB file, everything else is reverse-proxied to a remote UI
//! origin. A background task samples host CPU/memory into the same file.

pub mod config;
pub mod proxy;
pub mod rpc;
pub mod sampler;
pub mod state;
pub mod store;
pub mod types;

use axum::routing::post;
use axum::Router;

use state::AppState;

/// The single routing rule: exact `POST /rpc` goes to the RPC handler; any
/// other method on `/rpc`, and every other path, falls through to the proxy.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc::rpc_handler).fallback(proxy::proxy_handler))
        .fallback(proxy::proxy_handler)
        .with_state(state)
}

//! Shared gateway state handed to every axum handler.

use std::time::Duration;

use crate::store::QueryStore;

#[derive(Clone)]
pub struct AppState {
    /// Serialized access point for the DuckDB file.
    pub store: QueryStore,
    /// Reused upstream client for the proxy leg.
    pub client: reqwest::Client,
    /// Upstream UI origin, no trailing slash.
    pub ui_remote_url: String,
    /// Bound on a single RPC query execution.
    pub query_timeout: Duration,
}

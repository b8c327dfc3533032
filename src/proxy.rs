//! Transparent reverse proxy to the externally hosted UI origin.
//!
//! Everything the RPC route does not claim lands here. The request body and
//! the upstream response body are both streamed, never buffered whole.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::state::AppState;

// Hop-by-hop headers must not be forwarded; content-length is re-framed by
// hyper around the restreamed body. content-encoding is kept: the upstream
// client does no decompression, so bodies pass through byte-for-byte.
const STRIPPED_RESPONSE_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

pub async fn proxy_handler(State(state): State<AppState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", state.ui_remote_url, path_and_query);
    debug!(method = %parts.method, %target, "proxying request");

    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let upstream = state
        .client
        .request(parts.method, &target)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            warn!("proxy error for {target}: {e}");
            let status = if e.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            return (status, format!("Proxy error: {e}")).into_response();
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    let out_headers = response.headers_mut();
    for (name, value) in upstream_headers.iter() {
        if STRIPPED_RESPONSE_HEADERS.contains(name) || name.as_str() == "keep-alive" {
            continue;
        }
        out_headers.append(name.clone(), value.clone());
    }
    response
}

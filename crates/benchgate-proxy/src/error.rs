use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// Failure talking to an upstream. Always surfaces as `502 Bad Gateway`.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream body failed: {0}")]
    UpstreamBody(#[from] hyper::Error),

    #[error("bmc request failed: {0}")]
    Bmc(#[from] reqwest::Error),

    #[error("request body: {0}")]
    RequestBody(#[from] axum::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        warn!(error = %self, "proxy failure");
        (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
    }
}

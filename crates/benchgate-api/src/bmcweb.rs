//! Catch-all relay to the BMC web UI of the caller's bench.
//!
//! Anything outside `/ci` and `/user` lands here. Sessions without a live
//! lease, or whose BMC is not answering, are sent back to the homepage.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use benchgate_proxy::{BMC_PROBE_TIMEOUT, tcp_probe};

use crate::{AppState, session};

pub async fn handle(State(state): State<AppState>, req: Request) -> Response {
    if req.uri().path().trim_start_matches('/').split('/').next() == Some("favicon.ico") {
        return StatusCode::OK.into_response();
    }

    let Some(lease) = session::osfci_cookie(req.headers()).and_then(|c| state.allocator.resolve(&c))
    else {
        debug!(path = req.uri().path(), "bmc request without a lease");
        return back_home(state.settings.home_domain.as_deref());
    };

    let bmc = lease.bench.bmc_endpoint();
    if !tcp_probe(&bmc, BMC_PROBE_TIMEOUT).await {
        debug!(bmc = %bmc, "bmc not answering");
        return back_home(state.settings.home_domain.as_deref());
    }

    match state.bmc.forward(req, &bmc).await {
        Ok(response) => response,
        Err(e) => {
            warn!(bmc = %bmc, error = %e, "bmc relay failed");
            back_home(state.settings.home_domain.as_deref())
        }
    }
}

/// `302` to the public homepage, or an empty `200` when no domain is set.
fn back_home(home_domain: Option<&str>) -> Response {
    match home_domain {
        Some(domain) => (StatusCode::FOUND, [(LOCATION, format!("https://{domain}/ci"))]).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_home_redirects_only_with_a_domain() {
        let response = back_home(Some("osfci.tech"));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "https://osfci.tech/ci");

        assert_eq!(back_home(None).status(), StatusCode::OK);
    }
}

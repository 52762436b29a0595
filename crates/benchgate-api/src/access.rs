//! Signature gate shared by `/ci` build verbs and `/user`.

use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::AppState;

pub const DENIED_BODY: &str = "Access denied";

/// `Ok(())` if the request may run `command` for `login`, otherwise the
/// denial response to send back.
pub async fn check(state: &AppState, parts: &Parts, login: &str, command: &str) -> Result<(), Response> {
    match state
        .verifier
        .verify(&parts.method, &parts.headers, parts.uri.path(), login, command)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(login, command, reason = %e, "access denied");
            Err(denied(state.settings.forbid_on_denial))
        }
    }
}

pub fn denied(forbid: bool) -> Response {
    let status = if forbid {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    };
    (status, DENIED_BODY).into_response()
}

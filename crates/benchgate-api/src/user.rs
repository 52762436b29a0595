//! Signed proxy to the credential service at `/user/<login>/<command>/...`.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};

use benchgate_proxy::Target;

use crate::{AppState, access};

pub async fn handle(State(state): State<AppState>, req: Request) -> Response {
    let (login, command) = login_and_command(req.uri().path());
    let (parts, body) = req.into_parts();
    if let Err(denial) = access::check(&state, &parts, &login, &command).await {
        return denial;
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let target = Target::new(&state.settings.credentials, path_and_query);
    match state
        .forwarder
        .forward(Request::from_parts(parts, body), &target)
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// `(login, command)` from `/user/<login>/<command>`; both empty when the
/// path is shorter.
fn login_and_command(path: &str) -> (String, String) {
    let mut segments = path.trim_start_matches('/').split('/').skip(1);
    match (segments.next(), segments.next()) {
        (Some(login), Some(command)) => (login.to_string(), command.to_string()),
        _ => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_login_and_command() {
        assert_eq!(
            login_and_command("/user/alice/getToken"),
            ("alice".to_string(), "getToken".to_string())
        );
        assert_eq!(
            login_and_command("/user/alice/files/a.bin"),
            ("alice".to_string(), "files".to_string())
        );
        assert_eq!(login_and_command("/user/alice"), (String::new(), String::new()));
    }
}

//! `/ci` request dispatcher.
//!
//! Resolves the session, parses the [`Route`] and runs it. Verbs that act on
//! a bench are dropped with an empty `200` when the session holds no lease.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::HOST;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

use benchgate_core::Command;
use benchgate_lease::ActiveLease;
use benchgate_proxy::{BMC_PROBE_TIMEOUT, Target, tcp_probe};

use crate::route::{ConsoleKind, Firmware, PassthroughKind, Route};
use crate::{AppState, access, assets, session};

/// Largest auxiliary token accepted by `gitToken`.
const MAX_TOKEN_BODY: usize = 64 * 1024;

pub async fn handle(State(state): State<AppState>, req: Request) -> Response {
    let route = Route::parse(req.uri().path());
    let cookie = session::osfci_cookie(req.headers());
    let lease = cookie.as_deref().and_then(|c| state.allocator.resolve(c));
    debug!(?route, leased = lease.is_some(), "dispatch");

    match route {
        Route::Home => {
            let host = req
                .headers()
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();
            assets::homepage(&state.settings.static_assets_dir, host).await
        }
        Route::ServerModels => Json(state.allocator.active_products()).into_response(),
        Route::GetServer { product } => {
            let token = cookie.unwrap_or_default();
            match state.allocator.acquire(&product, &token) {
                Some(grant) => Json(grant.to_response()).into_response(),
                None => empty(),
            }
        }
        Route::StopServer { bench } => {
            state
                .allocator
                .release(&bench, cookie.as_deref().unwrap_or_default());
            empty()
        }
        Route::OsInstallers { file: None } => {
            match state.forwarder.get(&state.settings.storage, "/distros/").await {
                Ok(body) => body.into_response(),
                Err(e) => e.into_response(),
            }
        }
        Route::Asset { class, tail } => {
            assets::serve(&state.settings.static_assets_dir, class, &tail).await
        }
        Route::Unknown => empty(),
        route => match lease {
            Some(lease) => leased(&state, route, lease, req).await,
            None => {
                debug!(?route, "no active lease, dropped");
                empty()
            }
        },
    }
}

/// Routes that act on the caller's bench.
async fn leased(state: &AppState, route: Route, lease: ActiveLease, req: Request) -> Response {
    let bench = &lease.bench;
    let consoles = &state.settings.consoles;
    let query = req.uri().query().map(|q| format!("?{q}")).unwrap_or_default();

    match route {
        Route::OsInstallers { file: Some(file) } => {
            state
                .notifier
                .notify(bench.control_command(format!("/getosinstallers/{file}")));
            empty()
        }
        Route::BmcUp => {
            let up = tcp_probe(&bench.bmc_endpoint(), BMC_PROBE_TIMEOUT).await;
            Json(if up { "1" } else { "0" }).into_response()
        }
        Route::Console { kind, segment } => {
            let target = match kind {
                ConsoleKind::Host => console_target(&bench.control, &consoles.host_console, &segment),
                ConsoleKind::Bios => console_target(&bench.control, &consoles.bios_console, &segment),
                ConsoleKind::Bmc => console_target(&bench.control, &consoles.bmc_console, &segment),
                ConsoleKind::OsLoader => {
                    console_target(&bench.control, &consoles.os_loader_console, &segment)
                }
                ConsoleKind::BiosBuild => console_target(
                    &format!("{}:{}", bench.compile_ip, consoles.bios_build_console_port),
                    "",
                    &segment,
                ),
                ConsoleKind::BmcBuild => console_target(
                    &format!("{}:{}", bench.compile_ip, consoles.bmc_build_console_port),
                    "",
                    &segment,
                ),
            };
            proxy(state, req, target.with_query(&query)).await
        }
        Route::Passthrough { kind, tail } => {
            let authority = match kind {
                PassthroughKind::IsRunning => &bench.compile,
                PassthroughKind::IsEmulatorsPool | PassthroughKind::ResetEmulator => &bench.control,
            };
            proxy(state, req, Target::new(authority, format!("{tail}{query}"))).await
        }
        Route::Power(verb) => {
            let commands = verb
                .control_paths()
                .iter()
                .map(|path| bench.control_command(*path))
                .collect();
            state.notifier.notify_all(commands);
            empty()
        }
        Route::FirmwareUpload { firmware, login } => {
            let verb = match firmware {
                Firmware::Bios => "biosfirmware",
                Firmware::Bmc => "bmcfirmware",
            };
            let target = Target::new(&bench.control, format!("/{verb}/{login}{query}"));
            proxy(state, req, target).await
        }
        Route::GitToken { login } => {
            let (parts, body) = req.into_parts();
            if let Err(denial) = access::check(state, &parts, &login, "gitToken").await {
                return denial;
            }
            let token = match axum::body::to_bytes(body, MAX_TOKEN_BODY).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(error = %e, "unreadable token body");
                    return StatusCode::BAD_REQUEST.into_response();
                }
            };
            if state
                .allocator
                .set_aux_token(&lease, String::from_utf8_lossy(&token).into_owned())
            {
                info!(bench = %bench.name, login = %login, "build token stored");
            }
            empty()
        }
        Route::Build { firmware, login, tail } => {
            let command = match firmware {
                Firmware::Bios => "buildbiosfirmware",
                Firmware::Bmc => "buildbmcfirmware",
            };
            let (parts, body) = req.into_parts();
            if let Err(denial) = access::check(state, &parts, &login, command).await {
                return denial;
            }
            let target = Target::new(&bench.compile, format!("{tail}/{}{query}", lease.aux_token));
            proxy(state, Request::from_parts(parts, body), target).await
        }
        Route::LoadBuilt { firmware, login } => {
            let path = match firmware {
                Firmware::Bios => format!("/loadfromstoragesmbios/{login}"),
                Firmware::Bmc => format!("/loadfromstoragebmc/{login}"),
            };
            state.notifier.notify(Command::new(bench.control.clone(), path));
            empty()
        }
        Route::Home
        | Route::ServerModels
        | Route::GetServer { .. }
        | Route::StopServer { .. }
        | Route::OsInstallers { file: None }
        | Route::Asset { .. }
        | Route::Unknown => empty(),
    }
}

struct ConsoleTarget {
    authority: String,
    path: String,
}

impl ConsoleTarget {
    fn with_query(self, query: &str) -> Target {
        Target::new(self.authority, format!("{}{query}", self.path))
    }
}

/// `<authority><base>/<segment>`.
fn console_target(authority: &str, base: &str, segment: &str) -> ConsoleTarget {
    ConsoleTarget {
        authority: authority.to_string(),
        path: format!("{base}/{segment}"),
    }
}

async fn proxy(state: &AppState, req: Request, target: Target) -> Response {
    match state.forwarder.forward(req, &target).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn empty() -> Response {
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_paths() {
        let target = console_target("10.0.0.10:8080", "/smbiosconsole", "ws").with_query("?arg=1");
        assert_eq!(target, Target::new("10.0.0.10:8080", "/smbiosconsole/ws?arg=1"));

        let target = console_target("10.0.0.20:7681", "", "").with_query("");
        assert_eq!(target, Target::new("10.0.0.20:7681", "/"));
    }
}

//! benchgate-api: the gateway's HTTP surface.
//!
//! # Routes
//!
//! | Path | Handler |
//! |---|---|
//! | `/ci`, `/ci/...` | [`dispatch`]: lease verbs, consoles, build relay, static assets |
//! | `/user/<login>/<command>/...` | [`user`]: signed proxy to the credential service |
//! | anything else | [`bmcweb`]: relay to the BMC of the caller's leased bench |

pub mod access;
pub mod assets;
pub mod bmcweb;
pub mod dispatch;
pub mod route;
pub mod session;
pub mod user;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::any;
use tower_http::trace::TraceLayer;

use benchgate_auth::{HttpSecretLookup, Verifier};
use benchgate_core::config::ConsolesConfig;
use benchgate_core::{Clock, GatewayConfig, Notifier, SystemClock};
use benchgate_lease::Allocator;
use benchgate_proxy::{BmcForwarder, Forwarder, HttpNotifier};

/// Config values the handlers read on every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home_domain: Option<String>,
    pub static_assets_dir: PathBuf,
    /// Credential service, `host:port`.
    pub credentials: String,
    /// Artifact store, `host:port`.
    pub storage: String,
    pub consoles: ConsolesConfig,
    pub forbid_on_denial: bool,
}

impl Settings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            home_domain: config.home_domain().map(str::to_string),
            static_assets_dir: config.server.static_assets_dir.clone(),
            credentials: config.services.credentials.clone(),
            storage: config.services.storage.clone(),
            consoles: config.consoles.clone(),
            forbid_on_denial: config.auth.forbid_on_denial,
        }
    }
}

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub allocator: Arc<Allocator>,
    pub verifier: Arc<Verifier>,
    pub forwarder: Forwarder,
    pub bmc: BmcForwarder,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Production wiring: wall clock and HTTP notifier.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let timeout = std::time::Duration::from_millis(config.notify.timeout_ms);
        let notifier = HttpNotifier::new(timeout).context("building notify client")?;
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(notifier))
    }

    /// Wire the gateway around an injected clock and notifier.
    pub fn with_parts(
        config: &GatewayConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let allocator = Allocator::new(
            config.product_catalog(),
            config.bench_specs(),
            config.lease_ttl(),
            clock,
            notifier.clone(),
        );
        let secrets = HttpSecretLookup::new(config.services.credentials.clone())
            .context("building credential lookup client")?;
        let bmc = BmcForwarder::new().context("building bmc client")?;

        Ok(Self {
            allocator: Arc::new(allocator),
            verifier: Arc::new(Verifier::new(secrets)),
            forwarder: Forwarder::new(),
            bmc,
            notifier,
            settings: Arc::new(Settings::from_config(config)),
        })
    }
}

/// Build the complete gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ci", any(dispatch::handle))
        .route("/ci/", any(dispatch::handle))
        .route("/ci/{*rest}", any(dispatch::handle))
        .route("/user/{*rest}", any(user::handle))
        .fallback(bmcweb::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

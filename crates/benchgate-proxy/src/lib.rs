//! benchgate-proxy: everything the gateway sends downstream.
//!
//! - [`Forwarder`]: plain-HTTP reverse proxy to bench, compile and service
//!   hosts, including HTTP/1.1 upgrade relay for websocket consoles.
//! - [`BmcForwarder`]: HTTPS relay to bench BMCs (self-signed certificates).
//! - [`tcp_probe`]: connect-only liveness check.
//! - [`HttpNotifier`]: fire-and-forget `GET` commands.

pub mod bmc;
pub mod error;
pub mod forward;
pub mod notifier;
pub mod probe;

pub use bmc::BmcForwarder;
pub use error::ProxyError;
pub use forward::{Forwarder, Target};
pub use notifier::HttpNotifier;
pub use probe::{BMC_PROBE_TIMEOUT, tcp_probe};

//! benchgate-core: shared types for the bench lease gateway.
//!
//! Holds the `benchgate.toml` configuration model, the bench and product
//! domain types, the injectable [`Clock`], and the [`Notifier`] contract used
//! for fire-and-forget downstream commands.

pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use error::{ConfigError, ConfigResult};
pub use notify::{Notifier, NullNotifier, RecordingNotifier};
pub use types::*;

//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating `benchgate.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate bench name: {0}")]
    DuplicateBench(String),

    #[error("duplicate product name: {0}")]
    DuplicateProduct(String),

    #[error("bench {bench} references unknown product {product}")]
    UnknownProduct { bench: String, product: String },

    #[error("lease_ttl_secs must be greater than zero")]
    InvalidLeaseTtl,
}

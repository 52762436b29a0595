//! benchgate.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BenchSpec, Product};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub consoles: ConsolesConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub products: Vec<ProductConfig>,
    #[serde(default)]
    pub benches: Vec<BenchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Public domain used for "back to the homepage" redirects.
    pub home_domain: Option<String>,
    pub static_assets_dir: PathBuf,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Credential / user-info service, `host:port`.
    pub credentials: String,
    /// Artifact store, `host:port`.
    pub storage: String,
    /// Port of the build service on every compile companion.
    pub compile_port: u16,
}

/// Terminal sub-endpoints exposed by the bench and compile machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolesConfig {
    pub host_console: String,
    pub bios_console: String,
    pub bmc_console: String,
    pub os_loader_console: String,
    pub bios_build_console_port: u16,
    pub bmc_build_console_port: u16,
}

impl Default for ConsolesConfig {
    fn default() -> Self {
        Self {
            host_console: "/console".to_string(),
            bios_console: "/smbiosconsole".to_string(),
            bmc_console: "/bmcconsole".to_string(),
            os_loader_console: "/osloaderconsole".to_string(),
            bios_build_console_port: 7681,
            bmc_build_console_port: 7682,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Answer failed signature checks with 403 instead of 200.
    pub forbid_on_denial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub brand: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub name: String,
    pub control_ip: String,
    pub control_port: u16,
    pub compile_ip: String,
    pub bmc_ip: String,
    pub product: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_lease_ttl_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject pools the gateway could not route correctly.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.lease_ttl_secs == 0 {
            return Err(ConfigError::InvalidLeaseTtl);
        }

        let mut products = HashSet::new();
        for product in &self.products {
            if !products.insert(product.name.as_str()) {
                return Err(ConfigError::DuplicateProduct(product.name.clone()));
            }
        }

        let mut benches = HashSet::new();
        for bench in &self.benches {
            if !benches.insert(bench.name.as_str()) {
                return Err(ConfigError::DuplicateBench(bench.name.clone()));
            }
            if !products.contains(bench.product.as_str()) {
                return Err(ConfigError::UnknownProduct {
                    bench: bench.name.clone(),
                    product: bench.product.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.server.lease_ttl_secs)
    }

    /// Configured home domain, treating an empty string as unset.
    pub fn home_domain(&self) -> Option<&str> {
        self.server
            .home_domain
            .as_deref()
            .filter(|domain| !domain.is_empty())
    }

    /// The product catalog, in file order.
    pub fn product_catalog(&self) -> Vec<Product> {
        self.products
            .iter()
            .map(|p| Product {
                name: p.name.clone(),
                brand: p.brand.clone(),
                active: p.active,
            })
            .collect()
    }

    /// The bench pool, in file order.
    pub fn bench_specs(&self) -> Vec<BenchSpec> {
        self.benches
            .iter()
            .map(|b| BenchSpec {
                name: b.name.clone(),
                control: format!("{}:{}", b.control_ip, b.control_port),
                compile_ip: b.compile_ip.clone(),
                compile: format!("{}:{}", b.compile_ip, self.services.compile_port),
                bmc_ip: b.bmc_ip.clone(),
                product: b.product.clone(),
            })
            .collect()
    }
}

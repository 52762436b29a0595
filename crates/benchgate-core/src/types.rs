//! Domain types for the bench pool.
//!
//! A [`Product`] names a class of hardware; a [`BenchSpec`] is the static
//! description of one physical rig (its endpoints and product). Lease state
//! lives in `benchgate-lease`, not here.

use serde::{Deserialize, Serialize, Serializer};

/// TLS port of every bench BMC.
pub const BMC_HTTPS_PORT: u16 = 443;

/// A bench hardware class, e.g. a server generation.
///
/// Serialized with the field names existing clients expect
/// (`Product`, `Brand`, `Active` as `0`/`1`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    #[serde(rename = "Product")]
    pub name: String,
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Active", serialize_with = "flag_as_int")]
    pub active: bool,
}

fn flag_as_int<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

/// Static description of one test bench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchSpec {
    pub name: String,
    /// Control endpoint, `ip:port`.
    pub control: String,
    /// Compile companion host (no port).
    pub compile_ip: String,
    /// Compile companion service endpoint, `ip:port`.
    pub compile: String,
    /// BMC management address (no port).
    pub bmc_ip: String,
    /// Name of the [`Product`] this bench belongs to.
    pub product: String,
}

impl BenchSpec {
    /// `ip:443` of the BMC web interface.
    pub fn bmc_endpoint(&self) -> String {
        format!("{}:{}", self.bmc_ip, BMC_HTTPS_PORT)
    }

    /// A command for the bench's control endpoint.
    pub fn control_command(&self, path: impl Into<String>) -> Command {
        Command::new(self.control.clone(), path)
    }

    /// Cut power to the bench.
    pub fn power_off(&self) -> Command {
        self.control_command("/poweroff")
    }

    /// Wipe build state on the compile companion.
    pub fn clean_up(&self) -> Command {
        Command::new(self.compile.clone(), "/cleanUp")
    }
}

/// A fire-and-forget `GET` against a downstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    /// `ip:port` of the receiver.
    pub endpoint: String,
    /// Absolute path, starting with `/`.
    pub path: String,
}

impl Command {
    pub fn new(endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            path: path.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.endpoint, self.path)
    }
}

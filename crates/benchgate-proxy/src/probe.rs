use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

/// Budget for the BMC liveness check.
pub const BMC_PROBE_TIMEOUT: Duration = Duration::from_millis(220);

/// `true` if a TCP connection to `address` completes within `timeout`.
/// The connection is dropped immediately.
pub async fn tcp_probe(address: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(error = %e, address, "tcp probe refused");
            false
        }
        Err(_) => {
            debug!(address, "tcp probe timed out");
            false
        }
    }
}

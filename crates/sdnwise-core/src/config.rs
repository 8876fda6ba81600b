//! Controller configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::{NODE_TIMEOUT_MS, SDNWISE_PORT};

/// Configuration for a controller deployment.
///
/// The core itself only needs the liveness timeout; the listen address,
/// network filter and sweep cadence are consumed by the host layer that
/// wires the controller to a socket.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Address the host layer binds for sensor traffic
    pub listen_addr: SocketAddr,

    /// If set, ignore packets from other network ids
    pub net_id: Option<u8>,

    /// Silence threshold after which a node is flagged inactive
    pub node_timeout: Duration,

    /// Cadence of the background stale-node sweep
    pub sweep_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], SDNWISE_PORT)),
            net_id: None,
            node_timeout: Duration::from_millis(NODE_TIMEOUT_MS),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.listen_addr.port(), SDNWISE_PORT);
        assert_eq!(config.node_timeout, Duration::from_secs(30));
        assert!(config.net_id.is_none());
    }
}

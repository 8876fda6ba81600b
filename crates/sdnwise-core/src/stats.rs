//! Per-node packet and battery statistics.

use dashmap::DashMap;
use serde::Serialize;

/// Counters for one observed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Last packet sighting, epoch milliseconds
    pub last_seen: u64,
    /// Battery level from the most recent STATS report
    pub battery_level: u8,
    /// Packets the node reports having sent
    pub packets_sent: u16,
    /// Packets the controller has received from the node
    pub packets_received: u32,
}

impl NodeStats {
    fn new(now_ms: u64) -> Self {
        Self {
            last_seen: now_ms,
            battery_level: 100,
            packets_sent: 0,
            packets_received: 0,
        }
    }
}

/// Statistics registry, one record per observed node.
pub struct StatsRegistry {
    stats: DashMap<u16, NodeStats>,
}

impl StatsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }

    /// Account one inbound packet from a node.
    pub fn record_packet(&self, node_id: u16, now_ms: u64) {
        let mut entry = self
            .stats
            .entry(node_id)
            .or_insert_with(|| NodeStats::new(now_ms));
        entry.last_seen = now_ms;
        entry.packets_received += 1;
    }

    /// Apply a STATS report: battery level and the node's own counters.
    pub fn apply_report(&self, node_id: u16, battery: u8, sent: u16, received: u32, now_ms: u64) {
        let mut entry = self
            .stats
            .entry(node_id)
            .or_insert_with(|| NodeStats::new(now_ms));
        entry.battery_level = battery;
        entry.packets_sent = sent;
        entry.packets_received = received;

        tracing::debug!(
            "Node 0x{:04X} stats: battery={}%, sent={}, recv={}",
            node_id,
            battery,
            sent,
            received
        );
    }

    /// Stats record for a node, if it has ever been observed.
    pub fn node_stats(&self, node_id: u16) -> Option<NodeStats> {
        self.stats.get(&node_id).map(|entry| *entry)
    }

    /// Ids of all nodes with a stats record.
    pub fn observed_nodes(&self) -> Vec<u16> {
        self.stats.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Topology tracking for the wireless sensor network.
//!
//! Maintains the node registry (liveness, type, battery) and the directed
//! link graph reported by TOPOLOGY packets. Nodes are created lazily on
//! first sighting and never evicted; a background sweep flags nodes silent
//! for longer than the liveness window (default
//! [`crate::NODE_TIMEOUT_MS`]) as inactive. The unbounded
//! registry is an accepted trade-off: WSN deployments are small and node
//! ids are a 16-bit space.
//!
//! Links are directed and idempotent. Each direction must be reported by
//! its own endpoint; nothing here infers bidirectionality.

use crate::NODE_TIMEOUT_MS;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;

/// Role of a node in the sensor network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// Gateway bridging the WSN to the controller-reachable network
    BorderRouter,
    /// Ordinary sensing node
    Sensor,
}

impl From<u8> for NodeType {
    fn from(raw: u8) -> Self {
        if raw == 0 {
            Self::BorderRouter
        } else {
            Self::Sensor
        }
    }
}

/// A sensor or border-router node as the controller sees it.
///
/// Serialized field names match the topology export consumed by the
/// REST facade (`id`, `type`, `active`, `battery`, `lastSeen`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WiseNode {
    /// Node address
    #[serde(rename = "id")]
    pub node_id: u16,
    /// Role reported via CONFIG packets
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Whether the node is within the liveness window
    pub active: bool,
    /// Battery level, 0-100 percent as reported
    #[serde(rename = "battery")]
    pub battery_level: u8,
    /// Last packet sighting, epoch milliseconds
    #[serde(rename = "lastSeen")]
    pub last_seen: u64,
}

impl WiseNode {
    fn new(node_id: u16, now_ms: u64) -> Self {
        Self {
            node_id,
            node_type: NodeType::Sensor,
            active: true,
            battery_level: 100,
            last_seen: now_ms,
        }
    }
}

/// A directed link between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Reporting node
    pub source: u16,
    /// Neighbor the reporting node hears
    pub target: u16,
}

/// Exported view of the network for REST/CLI consumers
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    /// All known nodes, active or not
    pub nodes: Vec<WiseNode>,
    /// All reported directed links
    pub links: Vec<Link>,
}

/// Node registry and link graph.
///
/// All timestamps are explicit epoch-millisecond parameters; the tracker
/// never reads a clock, so the sweep task and tests own time.
pub struct TopologyTracker {
    nodes: DashMap<u16, WiseNode>,
    links: DashMap<u16, HashSet<u16>>,
    timeout_ms: u64,
}

impl TopologyTracker {
    /// Create an empty tracker with the default liveness window.
    pub fn new() -> Self {
        Self::with_timeout(NODE_TIMEOUT_MS)
    }

    /// Create an empty tracker with a custom liveness window.
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            nodes: DashMap::new(),
            links: DashMap::new(),
            timeout_ms,
        }
    }

    /// Create-or-touch a node: refresh `last_seen` and flag it active.
    pub fn touch_node(&self, node_id: u16, now_ms: u64) {
        let mut node = self
            .nodes
            .entry(node_id)
            .or_insert_with(|| WiseNode::new(node_id, now_ms));
        node.last_seen = now_ms;
        node.active = true;

        tracing::debug!("Node 0x{:04X} seen at {}", node_id, now_ms);
    }

    /// Apply a CONFIG payload: `[nodeType, batteryLevel, ..]`.
    ///
    /// Payloads shorter than two bytes are ignored.
    pub fn apply_node_config(&self, node_id: u16, config: &[u8], now_ms: u64) {
        if config.len() < 2 {
            return;
        }

        let mut node = self
            .nodes
            .entry(node_id)
            .or_insert_with(|| WiseNode::new(node_id, now_ms));
        node.node_type = NodeType::from(config[0]);
        node.battery_level = config[1];

        tracing::debug!(
            "Node 0x{:04X} config: type={:?}, battery={}%",
            node_id,
            node.node_type,
            node.battery_level
        );
    }

    /// Insert a directed link; repeated insertion is a no-op.
    pub fn add_link(&self, src_node: u16, dst_node: u16) {
        if self.links.entry(src_node).or_default().insert(dst_node) {
            tracing::debug!("Added link 0x{:04X} -> 0x{:04X}", src_node, dst_node);
        }
    }

    /// Nodes seen within the liveness window.
    pub fn active_nodes(&self, now_ms: u64) -> Vec<WiseNode> {
        self.nodes
            .iter()
            .filter(|entry| now_ms.saturating_sub(entry.last_seen) < self.timeout_ms)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Flag nodes past the liveness window as inactive.
    ///
    /// Entries are never removed from the registry, only flagged.
    pub fn sweep_stale(&self, now_ms: u64) {
        for mut entry in self.nodes.iter_mut() {
            if entry.active && now_ms.saturating_sub(entry.last_seen) >= self.timeout_ms {
                entry.active = false;
                tracing::info!("Node 0x{:04X} marked inactive", entry.node_id);
            }
        }
    }

    /// Look up a single node.
    pub fn node(&self, node_id: u16) -> Option<WiseNode> {
        self.nodes.get(&node_id).map(|entry| entry.value().clone())
    }

    /// All known nodes regardless of liveness.
    pub fn all_nodes(&self) -> Vec<WiseNode> {
        self.nodes.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Directed neighbors reported by a node.
    pub fn neighbors(&self, node_id: u16) -> HashSet<u16> {
        self.links
            .get(&node_id)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    /// Number of known nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes within the liveness window.
    pub fn active_node_count(&self, now_ms: u64) -> usize {
        self.active_nodes(now_ms).len()
    }

    /// Exported snapshot of nodes and links.
    pub fn snapshot(&self) -> TopologySnapshot {
        let mut links = Vec::new();
        for entry in self.links.iter() {
            for &target in entry.value() {
                links.push(Link {
                    source: *entry.key(),
                    target,
                });
            }
        }

        TopologySnapshot {
            nodes: self.all_nodes(),
            links,
        }
    }
}

impl Default for TopologyTracker {
    fn default() -> Self {
        Self::new()
    }
}

//! Controller dispatch: the packet-interpretation state machine.
//!
//! # Packet Flow
//!
//! ```text
//! host layer → handle_raw → decode → handle_packet → per-type handler
//!                                         │
//!                                         └→ topology liveness + stats
//!                                            (every packet, every type)
//! ```
//!
//! Handling is synchronous and allocation-light; the controller performs
//! no I/O. A DATA packet that matches a flow rule comes back as a
//! [`ForwardInstruction`] for the host layer to transmit. Everything else
//! is absorbed into shared state. Any parse or policy failure is confined
//! to its own packet; concurrent handlers only meet at the per-key
//! DashMap guards underneath.

use crate::config::ControllerConfig;
use crate::flow::{FlowRule, FlowTable, InstallStatus};
use crate::packet::{PacketType, WisePacket};
use crate::policy::{PolicyAction, PolicyGate};
use crate::stats::{NodeStats, StatsRegistry};
use crate::topology::{TopologySnapshot, TopologyTracker, WiseNode};
use std::collections::{HashMap, HashSet};

/// What the host layer should do with an emitted packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardInstruction {
    /// Node the packet should be relayed toward
    pub next_hop: u16,
    /// Re-encoded packet bytes (ttl decremented, nxh rewritten)
    pub data: Vec<u8>,
}

/// Outcome of handling one inbound datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketVerdict {
    /// Relay the enclosed bytes toward the next hop
    Forward(ForwardInstruction),
    /// Absorbed into controller state, nothing to transmit
    Handled,
    /// Malformed, unknown, or policy-denied; silently dropped
    Dropped,
}

/// The SDN-WISE protocol controller.
///
/// Owns one flow table, one topology tracker, one policy gate and one
/// stats registry for the lifetime of the process. All methods take
/// `&self`; share the controller across handlers with an `Arc`.
pub struct Controller {
    flows: FlowTable,
    topology: TopologyTracker,
    policy: PolicyGate,
    stats: StatsRegistry,
}

impl Controller {
    /// Build a controller from explicitly constructed components.
    pub fn new(flows: FlowTable, topology: TopologyTracker, policy: PolicyGate) -> Self {
        Self {
            flows,
            topology,
            policy,
            stats: StatsRegistry::new(),
        }
    }

    /// Build a controller with empty default components.
    pub fn with_defaults() -> Self {
        Self::new(FlowTable::new(), TopologyTracker::new(), PolicyGate::new())
    }

    /// Build a controller from a deployment configuration.
    ///
    /// The core consumes the liveness window; the remaining fields are for
    /// the host layer that wires the controller to a socket.
    pub fn with_config(config: &ControllerConfig) -> Self {
        let timeout_ms = config.node_timeout.as_millis() as u64;
        Self::new(
            FlowTable::new(),
            TopologyTracker::with_timeout(timeout_ms),
            PolicyGate::new(),
        )
    }

    /// Decode and handle one raw datagram.
    ///
    /// Decode failures are logged and dropped here; they never propagate
    /// past the codec boundary.
    pub fn handle_raw(&self, data: &[u8], now_ms: u64) -> PacketVerdict {
        match WisePacket::decode(data) {
            Ok(packet) => self.handle_packet(&packet, now_ms),
            Err(e) => {
                tracing::debug!("Dropping malformed packet ({} bytes): {}", data.len(), e);
                PacketVerdict::Dropped
            }
        }
    }

    /// Handle one decoded packet.
    pub fn handle_packet(&self, packet: &WisePacket, now_ms: u64) -> PacketVerdict {
        tracing::debug!("Processing {}", packet);

        // Liveness and receive accounting happen for every packet,
        // whatever its type turns out to be.
        self.topology.touch_node(packet.src, now_ms);
        self.stats.record_packet(packet.src, now_ms);

        match packet.packet_type() {
            Ok(PacketType::Data) => self.handle_data(packet),
            Ok(PacketType::Config) => {
                tracing::info!("Config packet from node 0x{:04X}", packet.src);
                self.topology
                    .apply_node_config(packet.src, &packet.payload, now_ms);
                PacketVerdict::Handled
            }
            Ok(PacketType::FlowRule) => {
                tracing::info!("Flow rule ACK from node 0x{:04X}", packet.src);
                self.flows.mark_flows_installed(packet.src);
                PacketVerdict::Handled
            }
            Ok(PacketType::Topology) => {
                self.handle_topology(packet);
                PacketVerdict::Handled
            }
            Ok(PacketType::Stats) => {
                self.handle_stats(packet, now_ms);
                PacketVerdict::Handled
            }
            Err(e) => {
                tracing::warn!("Dropping packet from node 0x{:04X}: {}", packet.src, e);
                PacketVerdict::Dropped
            }
        }
    }

    fn handle_data(&self, packet: &WisePacket) -> PacketVerdict {
        tracing::debug!(
            "Data packet from node 0x{:04X}: {} bytes",
            packet.src,
            packet.payload.len()
        );

        // Fail closed: no consent, no forwarding, no NACK.
        if !self.policy.check_policy(packet.src, PolicyAction::Forward) {
            return PacketVerdict::Dropped;
        }

        match self.flows.matching_flow(packet.src, packet.dst) {
            Some(rule) => self.forward_packet(packet, rule.next_hop),
            None => {
                tracing::debug!("No flow rule, processing at controller");
                self.process_at_controller(packet);
                PacketVerdict::Handled
            }
        }
    }

    fn forward_packet(&self, packet: &WisePacket, next_hop: u16) -> PacketVerdict {
        if packet.ttl == 0 {
            tracing::debug!("TTL exhausted for packet from node 0x{:04X}", packet.src);
            return PacketVerdict::Dropped;
        }

        let mut forwarded = packet.clone();
        forwarded.ttl -= 1;
        forwarded.nxh = next_hop;

        match forwarded.encode() {
            Ok(data) => {
                tracing::debug!("Forwarding packet to 0x{:04X}", next_hop);
                PacketVerdict::Forward(ForwardInstruction { next_hop, data })
            }
            Err(e) => {
                tracing::warn!("Failed to encode forwarded packet: {}", e);
                PacketVerdict::Dropped
            }
        }
    }

    /// Controller-level processing for data with no matching flow.
    ///
    /// Extension point: analytics, storage or alerting would hang off
    /// here. The core only records the receipt.
    fn process_at_controller(&self, packet: &WisePacket) {
        tracing::info!(
            "Processing sensor data at controller from node 0x{:04X}",
            packet.src
        );
    }

    fn handle_topology(&self, packet: &WisePacket) {
        tracing::debug!("Topology update from node 0x{:04X}", packet.src);

        let payload = &packet.payload;
        if payload.len() < 2 {
            return;
        }

        let neighbor_count = payload[0] as usize;
        for i in 0..neighbor_count {
            let offset = 1 + i * 2;
            // Stop early if the payload undershoots the declared count.
            if offset + 2 > payload.len() {
                break;
            }
            let neighbor_id = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
            self.topology.add_link(packet.src, neighbor_id);
        }
    }

    fn handle_stats(&self, packet: &WisePacket, now_ms: u64) {
        tracing::debug!("Stats packet from node 0x{:04X}", packet.src);

        let payload = &packet.payload;
        if payload.len() < 4 {
            return;
        }

        let battery = payload[0];
        let sent = u16::from_be_bytes([payload[1], payload[2]]);
        let received = payload[3] as u32;
        self.stats
            .apply_report(packet.src, battery, sent, received, now_ms);
    }

    // ---- Query/command surface for the REST facade or CLI ----

    /// Install a flow rule; returns the derived flow id.
    pub fn install_flow(&self, rule: FlowRule) -> String {
        self.flows.install_flow(rule)
    }

    /// Rules currently installed on a node.
    pub fn flows(&self, node_id: u16) -> Vec<FlowRule> {
        self.flows.flows(node_id)
    }

    /// Delete one flow by derived id.
    pub fn delete_flow(&self, node_id: u16, flow_id: &str) -> bool {
        self.flows.delete_flow(node_id, flow_id)
    }

    /// Delete every flow installed on a node.
    pub fn delete_all_flows(&self, node_id: u16) {
        self.flows.delete_all_flows(node_id)
    }

    /// Snapshot of every node's flow table.
    pub fn all_flow_tables(&self) -> HashMap<u16, Vec<FlowRule>> {
        self.flows.all_tables()
    }

    /// Installation status for a flow id.
    pub fn flow_status(&self, flow_id: &str) -> InstallStatus {
        self.flows.flow_status(flow_id)
    }

    /// Total rule count across all nodes.
    pub fn total_flow_count(&self) -> usize {
        self.flows.total_flow_count()
    }

    /// Nodes holding at least one rule.
    pub fn nodes_with_flows(&self) -> HashSet<u16> {
        self.flows.nodes_with_flows()
    }

    /// Exported topology snapshot.
    pub fn topology(&self) -> TopologySnapshot {
        self.topology.snapshot()
    }

    /// Nodes inside the liveness window.
    pub fn active_nodes(&self, now_ms: u64) -> Vec<WiseNode> {
        self.topology.active_nodes(now_ms)
    }

    /// Flag stale nodes inactive; called by the background sweep.
    pub fn sweep_stale(&self, now_ms: u64) {
        self.topology.sweep_stale(now_ms)
    }

    /// Stats record for a node.
    pub fn node_stats(&self, node_id: u16) -> Option<NodeStats> {
        self.stats.node_stats(node_id)
    }

    /// Record or revoke patient consent for a node.
    pub fn set_patient_consent(&self, node_id: u16, has_consent: bool) {
        self.policy.set_patient_consent(node_id, has_consent)
    }

    /// Consent status for a node.
    pub fn patient_consent(&self, node_id: u16) -> bool {
        self.policy.patient_consent(node_id)
    }

    /// Evaluate the consent policy for an action.
    pub fn check_policy(&self, node_id: u16, action: PolicyAction) -> bool {
        self.policy.check_policy(node_id, action)
    }

    /// Bind a device identity string to a node.
    pub fn register_device(&self, node_id: u16, identity: impl Into<String>) {
        self.policy.register_device(node_id, identity)
    }

    /// Registered identity for a node.
    pub fn device_identity(&self, node_id: u16) -> Option<String> {
        self.policy.device_identity(node_id)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! Per-node flow tables for the wireless sensor network.
//!
//! Each sensor node owns an ordered list of forwarding rules. Rules are
//! matched first-hit-wins in insertion order, and every rule carries an
//! installation status tracked under a derived flow id.
//!
//! # Thread Safety
//!
//! Uses DashMap internally; a node's rule list is only ever mutated inside
//! its entry guard, so concurrent handlers for different nodes never
//! contend and handlers for the same node serialize per key.

use crate::error::ControllerError;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Forwarding actions a rule can apply at a sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum FlowAction {
    /// Discard the packet
    Drop = 0,
    /// Forward toward the rule's next hop
    Forward = 1,
    /// Rewrite packet fields before forwarding
    Modify = 2,
    /// Aggregate with buffered readings before forwarding
    Aggregate = 3,
}

impl TryFrom<u8> for FlowAction {
    type Error = ControllerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Drop),
            1 => Ok(Self::Forward),
            2 => Ok(Self::Modify),
            3 => Ok(Self::Aggregate),
            other => Err(ControllerError::InvalidAction(other)),
        }
    }
}

/// A forwarding rule installed in a sensor node's flow table.
///
/// Identity is the 5-tuple (node, src, dst, action, next hop); the install
/// timestamp is bookkeeping and excluded from equality.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRule {
    /// Node whose table holds this rule
    pub node_id: u16,
    /// Source address match key
    pub src_addr: u16,
    /// Destination address match key
    pub dst_addr: u16,
    /// Action to apply on match
    pub action: FlowAction,
    /// Next hop address for forwarding actions
    pub next_hop: u16,
    /// Installation time, epoch milliseconds
    pub installed_at: u64,
}

impl FlowRule {
    /// Create a rule stamped with the given installation time.
    pub fn new(
        node_id: u16,
        src_addr: u16,
        dst_addr: u16,
        action: FlowAction,
        next_hop: u16,
        installed_at: u64,
    ) -> Self {
        Self {
            node_id,
            src_addr,
            dst_addr,
            action,
            next_hop,
            installed_at,
        }
    }

    /// Deterministic flow identifier derived from the identity 5-tuple.
    pub fn flow_id(&self) -> String {
        format!(
            "flow-{:04X}-{:04X}-{:04X}-{}-{:04X}",
            self.node_id, self.src_addr, self.dst_addr, self.action as u8, self.next_hop
        )
    }
}

impl PartialEq for FlowRule {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
            && self.src_addr == other.src_addr
            && self.dst_addr == other.dst_addr
            && self.action == other.action
            && self.next_hop == other.next_hop
    }
}

impl Eq for FlowRule {}

impl std::fmt::Display for FlowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FlowRule{{node=0x{:04X}, src=0x{:04X}, dst=0x{:04X}, action={:?}, nxh=0x{:04X}}}",
            self.node_id, self.src_addr, self.dst_addr, self.action, self.next_hop
        )
    }
}

/// Installation status of a flow rule on its sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstallStatus {
    /// Sent to the node, no acknowledgment yet
    Pending,
    /// Acknowledged by the node
    Installed,
    /// Installation reported failed
    Failed,
    /// No status on record
    Unknown,
}

/// Flow table engine: node id → ordered rule list, flow id → status.
pub struct FlowTable {
    /// Rule lists keyed by owning node; insertion order preserved
    tables: DashMap<u16, Vec<FlowRule>>,

    /// Installation status keyed by derived flow id
    install_status: DashMap<String, InstallStatus>,
}

impl FlowTable {
    /// Create an empty flow table engine.
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            install_status: DashMap::new(),
        }
    }

    /// Install a rule into its node's table and return the derived flow id.
    ///
    /// Appends unconditionally: duplicate rules are not suppressed, they
    /// share one status entry under the common id.
    pub fn install_flow(&self, rule: FlowRule) -> String {
        let flow_id = rule.flow_id();
        tracing::info!("Installing {} on node 0x{:04X}", rule, rule.node_id);

        self.tables.entry(rule.node_id).or_default().push(rule);
        self.install_status
            .insert(flow_id.clone(), InstallStatus::Pending);

        tracing::debug!("Flow {} added, status PENDING", flow_id);
        flow_id
    }

    /// Get a copy of a node's rule list, in installation order.
    pub fn flows(&self, node_id: u16) -> Vec<FlowRule> {
        self.tables
            .get(&node_id)
            .map(|rules| rules.value().clone())
            .unwrap_or_default()
    }

    /// First rule in `table_node`'s list matching the destination.
    ///
    /// The match compares the rule's own `src_addr` field against the
    /// table-owning node id, which by convention are equal. This mirrors
    /// the deployed controller's lookup exactly; it is not keyed on the
    /// packet's actual source address field.
    pub fn matching_flow(&self, table_node: u16, dst_node: u16) -> Option<FlowRule> {
        self.tables.get(&table_node).and_then(|rules| {
            rules
                .iter()
                .find(|rule| rule.src_addr == table_node && rule.dst_addr == dst_node)
                .cloned()
        })
    }

    /// Delete the rule with the given derived id from a node's table.
    ///
    /// Returns whether anything was removed. The status entry is purged
    /// along with the rule.
    pub fn delete_flow(&self, node_id: u16, flow_id: &str) -> bool {
        let removed = match self.tables.get_mut(&node_id) {
            Some(mut rules) => {
                let before = rules.len();
                rules.retain(|rule| rule.flow_id() != flow_id);
                rules.len() < before
            }
            None => false,
        };

        if removed {
            tracing::info!("Flow {} deleted from node 0x{:04X}", flow_id, node_id);
            self.install_status.remove(flow_id);
        }

        removed
    }

    /// Clear a node's entire rule list and all associated status entries.
    pub fn delete_all_flows(&self, node_id: u16) {
        if let Some((_, rules)) = self.tables.remove(&node_id) {
            tracing::info!("Deleted {} flows from node 0x{:04X}", rules.len(), node_id);
            for rule in &rules {
                self.install_status.remove(&rule.flow_id());
            }
        }
    }

    /// Mark every rule currently in a node's table as installed.
    ///
    /// The sensor acknowledgment carries no rule identity, so the ack is
    /// table-wide rather than per rule: anything installed since the last
    /// ack flips to INSTALLED too. Known protocol limitation, kept as-is.
    pub fn mark_flows_installed(&self, node_id: u16) {
        if let Some(rules) = self.tables.get(&node_id) {
            for rule in rules.iter() {
                let flow_id = rule.flow_id();
                self.install_status
                    .insert(flow_id.clone(), InstallStatus::Installed);
                tracing::debug!("Flow {} marked INSTALLED", flow_id);
            }
        }
    }

    /// Installation status for a flow id, `Unknown` if not on record.
    pub fn flow_status(&self, flow_id: &str) -> InstallStatus {
        self.install_status
            .get(flow_id)
            .map(|status| *status)
            .unwrap_or(InstallStatus::Unknown)
    }

    /// Snapshot copy of every node's rule list.
    pub fn all_tables(&self) -> HashMap<u16, Vec<FlowRule>> {
        self.tables
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Total rule count across all nodes.
    pub fn total_flow_count(&self) -> usize {
        self.tables.iter().map(|entry| entry.value().len()).sum()
    }

    /// Ids of nodes that currently hold at least one rule.
    pub fn nodes_with_flows(&self) -> HashSet<u16> {
        self.tables.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for FlowTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_rule(node: u16, dst: u16, nxh: u16) -> FlowRule {
        FlowRule::new(node, node, dst, FlowAction::Forward, nxh, 1_000)
    }

    #[test]
    fn test_action_from_byte() {
        assert_eq!(FlowAction::try_from(1).unwrap(), FlowAction::Forward);
        assert_eq!(FlowAction::try_from(3).unwrap(), FlowAction::Aggregate);
        assert!(matches!(
            FlowAction::try_from(7),
            Err(ControllerError::InvalidAction(7))
        ));
    }

    #[test]
    fn test_install_and_match() {
        let table = FlowTable::new();
        let flow_id = table.install_flow(forward_rule(2, 1, 1));

        assert_eq!(table.flow_status(&flow_id), InstallStatus::Pending);

        let hit = table.matching_flow(2, 1).unwrap();
        assert_eq!(hit.next_hop, 1);
        assert!(table.matching_flow(2, 99).is_none());
        assert!(table.matching_flow(7, 1).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let table = FlowTable::new();
        table.install_flow(forward_rule(2, 1, 10));
        table.install_flow(forward_rule(2, 1, 20));

        assert_eq!(table.matching_flow(2, 1).unwrap().next_hop, 10);
        assert_eq!(table.flows(2).len(), 2);
    }

    #[test]
    fn test_match_keyed_on_rule_src_addr() {
        let table = FlowTable::new();
        // Rule stored under node 2 but with a mismatched src_addr never matches.
        table.install_flow(FlowRule::new(2, 9, 1, FlowAction::Forward, 1, 0));
        assert!(table.matching_flow(2, 1).is_none());
    }

    #[test]
    fn test_delete_flow_is_surgical() {
        let table = FlowTable::new();
        let keep = table.install_flow(forward_rule(2, 1, 1));
        let gone = table.install_flow(forward_rule(2, 3, 4));

        assert!(table.delete_flow(2, &gone));
        assert!(!table.delete_flow(2, &gone));

        assert_eq!(table.flows(2).len(), 1);
        assert_eq!(table.flow_status(&keep), InstallStatus::Pending);
        assert_eq!(table.flow_status(&gone), InstallStatus::Unknown);
    }

    #[test]
    fn test_delete_all_flows() {
        let table = FlowTable::new();
        let a = table.install_flow(forward_rule(2, 1, 1));
        let b = table.install_flow(forward_rule(2, 3, 4));
        let other = table.install_flow(forward_rule(5, 6, 7));

        table.delete_all_flows(2);

        assert!(table.flows(2).is_empty());
        assert_eq!(table.flow_status(&a), InstallStatus::Unknown);
        assert_eq!(table.flow_status(&b), InstallStatus::Unknown);
        assert_eq!(table.flow_status(&other), InstallStatus::Pending);
        assert_eq!(table.total_flow_count(), 1);
    }

    #[test]
    fn test_mark_installed_is_table_wide() {
        let table = FlowTable::new();
        let early = table.install_flow(forward_rule(2, 1, 1));
        table.mark_flows_installed(2);
        assert_eq!(table.flow_status(&early), InstallStatus::Installed);

        // A rule installed after the first ack is still covered by the next.
        let late = table.install_flow(forward_rule(2, 3, 4));
        assert_eq!(table.flow_status(&late), InstallStatus::Pending);
        table.mark_flows_installed(2);
        assert_eq!(table.flow_status(&late), InstallStatus::Installed);
    }

    #[test]
    fn test_flow_id_covers_identity_tuple() {
        let a = forward_rule(2, 1, 1);
        let mut b = a.clone();
        b.next_hop = 9;
        assert_ne!(a.flow_id(), b.flow_id());
        assert_ne!(a, b);

        let mut c = a.clone();
        c.installed_at = 5_000;
        assert_eq!(a, c);
        assert_eq!(a.flow_id(), c.flow_id());
    }

    #[test]
    fn test_snapshot_queries() {
        let table = FlowTable::new();
        table.install_flow(forward_rule(2, 1, 1));
        table.install_flow(forward_rule(5, 6, 7));

        assert_eq!(table.total_flow_count(), 2);
        assert_eq!(table.nodes_with_flows(), HashSet::from([2, 5]));

        let snapshot = table.all_tables();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&2].len(), 1);

        // Snapshot is a copy, not a live view.
        table.install_flow(forward_rule(2, 8, 9));
        assert_eq!(snapshot[&2].len(), 1);
    }
}

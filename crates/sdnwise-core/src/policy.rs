//! Consent and device-identity bookkeeping.
//!
//! Sensor readings in this network are patient data, so data access and
//! forwarding are gated on explicit per-node consent. The gate fails
//! closed: absent consent means deny, and a denial is logged for audit but
//! never signalled back to the sender.

use dashmap::DashMap;

/// Actions subject to policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Read sensor data held by the controller
    AccessData,
    /// Forward a data packet through the network
    Forward,
    /// Push configuration to a node
    Configure,
}

/// Consent and identity state, keyed by node id.
pub struct PolicyGate {
    /// Consent flags; a node with no entry has not consented
    consent: DashMap<u16, bool>,

    /// Registered device identity strings
    identity: DashMap<u16, String>,
}

impl PolicyGate {
    /// Create a gate with no consent on record (deny-all).
    pub fn new() -> Self {
        Self {
            consent: DashMap::new(),
            identity: DashMap::new(),
        }
    }

    /// Record or revoke consent for a node.
    pub fn set_patient_consent(&self, node_id: u16, has_consent: bool) {
        self.consent.insert(node_id, has_consent);
        tracing::info!("Consent for node 0x{:04X} set to {}", node_id, has_consent);
    }

    /// Consent status for a node; absent means deny.
    pub fn patient_consent(&self, node_id: u16) -> bool {
        self.consent.get(&node_id).map(|c| *c).unwrap_or(false)
    }

    /// Evaluate whether a node may perform an action.
    ///
    /// `AccessData` and `Forward` require consent; any other action is
    /// unconditionally allowed. A denial is a silent drop on the data
    /// path, recorded here for the audit trail.
    pub fn check_policy(&self, node_id: u16, action: PolicyAction) -> bool {
        match action {
            PolicyAction::AccessData | PolicyAction::Forward => {
                let consent = self.patient_consent(node_id);
                if !consent {
                    tracing::warn!(
                        "POLICY VIOLATION: node 0x{:04X} attempted {:?} without patient consent",
                        node_id,
                        action
                    );
                }
                consent
            }
            _ => true,
        }
    }

    /// Bind an identity string to a node, replacing any prior binding.
    pub fn register_device(&self, node_id: u16, identity: impl Into<String>) {
        let identity = identity.into();
        tracing::info!("Registered device 0x{:04X} -> {}", node_id, identity);
        self.identity.insert(node_id, identity);
    }

    /// Registered identity for a node, if any.
    pub fn device_identity(&self, node_id: u16) -> Option<String> {
        self.identity.get(&node_id).map(|id| id.value().clone())
    }
}

impl Default for PolicyGate {
    fn default() -> Self {
        Self::new()
    }
}

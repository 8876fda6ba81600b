//! # SDN-WISE Core
//!
//! Control-plane protocol engine for an SDN-WISE wireless sensor network.
//!
//! This crate provides:
//! - Packet encoding and decoding (fixed 11-byte big-endian header)
//! - Per-node flow tables with install-status bookkeeping
//! - Topology tracking with a 30-second liveness window
//! - A consent-based policy gate for data access and forwarding
//! - The controller dispatch loop tying the pieces together
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Controller                                │
//! │   (decodes packets, dispatches by type, owns per-node state)    │
//! ├──────────────┬──────────────────┬───────────────┬───────────────┤
//! │  FlowTable   │ TopologyTracker  │  PolicyGate   │ StatsRegistry │
//! ├──────────────┴──────────────────┴───────────────┴───────────────┤
//! │                        WisePacket                                │
//! │          (wire codec: 11-byte header + payload)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core is purely synchronous and performs no I/O. The host layer
//! feeds it raw datagrams and carries out the forwarding instructions
//! it emits; see the `sdnwise-cli` crate for the UDP wiring.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod packet;
pub mod policy;
pub mod stats;
pub mod topology;

pub use config::ControllerConfig;
pub use controller::{Controller, ForwardInstruction, PacketVerdict};
pub use error::{ControllerError, PacketError};
pub use flow::{FlowAction, FlowRule, FlowTable, InstallStatus};
pub use packet::{PacketType, WisePacket};
pub use policy::{PolicyAction, PolicyGate};
pub use stats::{NodeStats, StatsRegistry};
pub use topology::{Link, NodeType, TopologySnapshot, TopologyTracker, WiseNode};

/// Fixed packet header size in bytes
pub const HEADER_SIZE: usize = 11;

/// Largest payload whose total length still fits the one-byte `len` field
pub const MAX_PAYLOAD: usize = u8::MAX as usize - HEADER_SIZE;

/// Liveness window: a node silent for this long is no longer active
pub const NODE_TIMEOUT_MS: u64 = 30_000;

/// UDP port sensor traffic arrives on, by SDN-WISE convention
pub const SDNWISE_PORT: u16 = 9999;

// SPDX-License-Identifier: Apache-2.0

//! In-process packet envelope for inter-node transfer.
//!
//! Packets are never serialized to bytes; `size` only counts against the
//! sending node's egress bandwidth. Addresses stay wire strings
//! (`MalcolmNode:<name>`, or the literal `CentralLoadBalancer` for packets
//! originated by the central balancer) so that malformed and unknown
//! destinations remain representable; the router logs and drops them
//! instead of failing the run.

use crate::heartbeat::Heartbeat;
use crate::task::Task;

/// Address prefix of node endpoints.
pub const NODE_ADDR_PREFIX: &str = "MalcolmNode:";

/// Source address used by the central load balancer.
pub const BALANCER_ADDR: &str = "CentralLoadBalancer";

/// Builds the wire address of a node.
#[must_use]
pub fn node_addr(name: &str) -> String {
    format!("{NODE_ADDR_PREFIX}{name}")
}

/// Parses a node wire address, returning the node name.
#[must_use]
pub fn parse_node_addr(addr: &str) -> Option<&str> {
    addr.strip_prefix(NODE_ADDR_PREFIX)
}

/// What a packet carries.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketPayload {
    /// A task being handed to another node.
    Task(Box<Task>),
    /// A node status snapshot.
    Heartbeat(Heartbeat),
}

/// Envelope for inter-node transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The carried payload.
    pub payload: PacketPayload,
    /// Wire size in bytes, charged against egress bandwidth.
    pub size: u64,
    /// Source address.
    pub src: String,
    /// Destination address.
    pub dest: String,
}

impl Packet {
    /// Wraps a task in a packet addressed to `dest`.
    #[must_use]
    pub fn for_task(task: Task, src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            size: task.payload,
            payload: PacketPayload::Task(Box::new(task)),
            src: src.into(),
            dest: dest.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_addresses_round_trip() {
        let addr = node_addr("alpha");
        assert_eq!(addr, "MalcolmNode:alpha");
        assert_eq!(parse_node_addr(&addr), Some("alpha"));
        assert_eq!(parse_node_addr("CentralLoadBalancer"), None);
        assert_eq!(parse_node_addr("malcolmnode:alpha"), None);
    }

    #[test]
    fn task_packets_charge_the_payload_size() {
        let task = Task::new("t", 1.0, 0.0, 512);
        let packet = Packet::for_task(task, BALANCER_ADDR, node_addr("alpha"));
        assert_eq!(packet.size, 512);
        assert_eq!(packet.src, BALANCER_ADDR);
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Round-robin distribution of newly generated tasks across the cluster.

use crate::packet::{BALANCER_ADDR, Packet, node_addr};
use crate::task::Task;
use malcolm_sim_config::NodeName;

/// Central load balancer handing fresh tasks to nodes in round-robin order.
///
/// The cursor persists across invocations, so over any window of consecutive
/// tasks the per-node dispatch counts differ by at most one.
#[derive(Debug, Default)]
pub struct CentralLoadBalancer {
    cursor: usize,
}

impl CentralLoadBalancer {
    /// Creates a balancer with the cursor at the first node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps each task in a packet addressed to the next node in rotation.
    pub fn distribute(&mut self, node_names: &[NodeName], tasks: Vec<Task>) -> Vec<Packet> {
        if node_names.is_empty() {
            return Vec::new();
        }
        tasks
            .into_iter()
            .map(|task| {
                let dest = &node_names[self.cursor % node_names.len()];
                self.cursor = (self.cursor + 1) % node_names.len();
                Packet::for_task(task, BALANCER_ADDR, node_addr(dest))
            })
            .collect()
    }
}

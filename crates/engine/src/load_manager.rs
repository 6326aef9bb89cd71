// SPDX-License-Identifier: Apache-2.0

//! Per-tick accept/forward split of a node's inbound tasks.

use crate::packet::{Packet, node_addr};
use crate::task::Task;
use malcolm_sim_config::NodeName;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

/// Splits a node's inbound tasks between local execution and forwarding.
///
/// The split parameters form the node's current strategy in the distributed
/// load-balancing game; they are adjusted every tick by the policy
/// optimizer. Defaults are `accept = 1, forward = 0` and persist until the
/// first peer heartbeat arrives.
#[derive(Debug)]
pub struct LoadManager {
    accept: f64,
    forward: f64,
    /// Wire address stamped on forwarded packets.
    src: String,
    possible_destinations: Vec<NodeName>,
    rng: StdRng,
}

impl LoadManager {
    /// Creates a load manager for the node `name`, seeding the forward
    /// destination choice from `seed`.
    #[must_use]
    pub fn new(name: &str, seed: u64) -> Self {
        Self {
            accept: 1.0,
            forward: 0.0,
            src: node_addr(name),
            possible_destinations: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current accepted fraction, in `[0, 1]`.
    #[must_use]
    pub fn accept(&self) -> f64 {
        self.accept
    }

    /// Current forwarded fraction, in `[0, 1]`.
    #[must_use]
    pub fn forward(&self) -> f64 {
        self.forward
    }

    /// Replaces the split parameters; both must already be clamped to
    /// `[0, 1]` by the caller.
    pub fn set_split(&mut self, accept: f64, forward: f64) {
        self.accept = accept;
        self.forward = forward;
    }

    /// Replaces the set of peers eligible to receive forwarded tasks.
    pub fn set_destinations(&mut self, destinations: Vec<NodeName>) {
        self.possible_destinations = destinations;
    }

    /// Peers eligible to receive forwarded tasks.
    #[must_use]
    pub fn destinations(&self) -> &[NodeName] {
        &self.possible_destinations
    }

    /// Splits `incoming` into locally accepted tasks and forwarded packets.
    ///
    /// The split is deterministic: with `n` inbound tasks the first
    /// `⌊n · accept⌋` are accepted and the rest are forwarded, each wrapped
    /// into a task packet whose destination is drawn uniformly (and
    /// independently per task) from the known peers.
    pub fn step(&mut self, _time_slice: f64, incoming: Vec<Task>) -> (Vec<Task>, Vec<Packet>) {
        let total = incoming.len();
        let num_accept = (total as f64 * self.accept) as usize;
        if num_accept >= total || self.possible_destinations.is_empty() {
            return (incoming, Vec::new());
        }

        let mut accepted = incoming;
        let forwarded = accepted.split_off(num_accept);
        let packets = forwarded
            .into_iter()
            .map(|task| {
                let dest = self
                    .possible_destinations
                    .choose(&mut self.rng)
                    .map(|name| node_addr(name))
                    .unwrap_or_default();
                tracing::debug!(src = %self.src, %dest, task = %task.name, "forwarding task");
                Packet::for_task(task, self.src.clone(), dest)
            })
            .collect();
        (accepted, packets)
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Per-tick adjustment of a node's accept/forward split from peer
//! heartbeats.

use crate::heartbeat::Heartbeat;
use crate::load_manager::LoadManager;
use malcolm_sim_config::NodeName;
use std::collections::BTreeMap;

/// Tracks peer heartbeats and nudges the load manager so that
/// queue-time-normalized loads converge across the cluster.
///
/// Stateless apart from the owning node's name; the load manager it mutates
/// is borrowed per tick, and the heartbeat map is a read-only snapshot taken
/// by the node.
#[derive(Debug)]
pub struct PolicyOptimizer {
    node: String,
}

impl PolicyOptimizer {
    /// Creates the optimizer for the node `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { node: name.into() }
    }

    /// Reward as the negative of the load imbalance: how far the node's own
    /// load sits above the cluster mean (own load included, as one sample).
    fn utility(own_load: f64, all_loads: &[f64]) -> f64 {
        let mean = all_loads.iter().sum::<f64>() / all_loads.len() as f64;
        -(own_load - mean)
    }

    /// Adjusts `load_manager` from the most recent peer heartbeats.
    ///
    /// A no-op until the first heartbeat arrives, leaving the
    /// accept-everything default in place. Otherwise the accept and forward
    /// fractions move one step toward (or away from) forwarding depending on
    /// whether this node is loaded above or below the cluster mean, each
    /// clamped to `[0, 1]` independently.
    pub fn step(
        &self,
        time_slice: f64,
        cpu_queue_len: usize,
        expected_performance: f64,
        heartbeats: &BTreeMap<NodeName, Heartbeat>,
        load_manager: &mut LoadManager,
    ) {
        if time_slice <= 0.0 || heartbeats.is_empty() {
            tracing::trace!(node = %self.node, "no heartbeats; policy unchanged");
            return;
        }

        // A fully utilized scheduler reports zero expected performance;
        // floor the divisor so the load stays finite.
        let own_load = cpu_queue_len as f64 / expected_performance.max(f64::EPSILON);
        let mut loads = vec![own_load];
        loads.extend(
            heartbeats
                .values()
                .map(|hb| hb.queue_size as f64 / hb.expected_performance.max(f64::EPSILON)),
        );
        load_manager.set_destinations(heartbeats.keys().cloned().collect());

        let reward = Self::utility(own_load, &loads);
        let peers = heartbeats.len();
        let step = round2(1.0 / ((1 + peers) as f64).powi(2));
        let (accept, forward) = (load_manager.accept(), load_manager.forward());
        tracing::debug!(node = %self.node, own_load, reward, step, "policy step");

        if reward < 0.0 {
            load_manager.set_split((accept - step).max(0.0), (forward + step).min(1.0));
        } else if reward > 0.0 {
            load_manager.set_split((accept + step).min(1.0), (forward - step).max(0.0));
        }
    }
}

/// Rounds to two decimal places.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

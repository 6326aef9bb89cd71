// SPDX-License-Identifier: Apache-2.0

//! A Malcolm node: scheduler, load manager, policy optimizer and network
//! shaper behind a thread-safe inbox.
//!
//! The node's state is split along the concurrency boundary of the
//! simulation: the inbox and the heartbeat map are written by the router
//! (any thread) and are therefore thread-safe, while everything the tick
//! touches exclusively (scheduler, load manager, transmit queue) lives
//! behind a single mutex taken only by the owning worker. The two barriers
//! of the asynchronous driver guarantee routing and ticking never overlap.

use crate::error::Error;
use crate::heartbeat::Heartbeat;
use crate::load_manager::LoadManager;
use crate::network::Network;
use crate::packet::{Packet, PacketPayload, node_addr, parse_node_addr};
use crate::policy::PolicyOptimizer;
use crate::scheduler::Scheduler;
use crate::task::Task;
use malcolm_sim_channel::SharedQueue;
use malcolm_sim_config::{NodeConfig, NodeName};
use malcolm_sim_telemetry::NodeSample;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// State owned exclusively by the node's tick; never touched by the router.
#[derive(Debug)]
struct TickState {
    scheduler: Scheduler,
    load_manager: LoadManager,
    policy: PolicyOptimizer,
    network: Network,
    /// Transmit queue; packets throttled last tick stay at its front.
    tx_queue: Vec<Packet>,
    avg_latency: f64,
}

/// A node of the Malcolm cluster.
#[derive(Debug)]
pub struct MalcolmNode {
    name: NodeName,
    /// Wire address of this node (`MalcolmNode:<name>`).
    src: String,
    /// Names of every node in the cluster, fixed at construction.
    registry: Vec<NodeName>,
    /// Tasks delivered by the router, pending the next tick.
    inbox: SharedQueue<Task>,
    /// Last heartbeat seen from each peer.
    heartbeats: Mutex<BTreeMap<NodeName, Heartbeat>>,
    tick: Mutex<TickState>,
    /// Metrics snapshot published at the end of every tick.
    sample: Mutex<NodeSample>,
}

impl MalcolmNode {
    /// Builds a node from its configuration.
    ///
    /// `registry` is the full, final list of cluster node names; `seed`
    /// drives the load manager's forward destination choice.
    #[must_use]
    pub fn new(config: &NodeConfig, registry: Vec<NodeName>, seed: u64) -> Self {
        let scheduler = Scheduler::new(
            format!("{}.Scheduler", config.name),
            config.core_count.get() as usize,
            config.core_perf,
            config.io_count.get() as usize,
            config.io_perf,
            config.overhead,
        );
        Self {
            src: node_addr(&config.name),
            name: config.name.clone(),
            registry,
            inbox: SharedQueue::new(),
            heartbeats: Mutex::new(BTreeMap::new()),
            tick: Mutex::new(TickState {
                scheduler,
                load_manager: LoadManager::new(&config.name, seed),
                policy: PolicyOptimizer::new(config.name.clone()),
                network: Network::new(config.bandwidth.get()),
                tx_queue: Vec::new(),
                avg_latency: 0.0,
            }),
            sample: Mutex::new(NodeSample::default()),
        }
    }

    /// The node's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's wire address.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.src
    }

    /// Number of tasks waiting in the inbox.
    #[must_use]
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    /// The metrics snapshot published at the end of the last tick.
    #[must_use]
    pub fn sample(&self) -> NodeSample {
        *self.sample.lock()
    }

    /// Receives routed packets into this node. Thread-safe.
    ///
    /// Heartbeats from sources that are malformed or not in the registry are
    /// logged and dropped; task payloads are appended to the inbox.
    pub fn recv_packets(&self, packets: Vec<Packet>) {
        let mut new_tasks: Vec<Task> = Vec::new();
        for packet in packets {
            match packet.payload {
                PacketPayload::Heartbeat(heartbeat) => match parse_node_addr(&packet.src) {
                    Some(source) if self.registry.iter().any(|n| n.as_str() == source) => {
                        let _ = self
                            .heartbeats
                            .lock()
                            .insert(source.to_owned(), heartbeat);
                    }
                    _ => {
                        tracing::error!(
                            node = %self.name,
                            src = %packet.src,
                            "received heartbeat from unknown source"
                        );
                    }
                },
                PacketPayload::Task(task) => new_tasks.push(*task),
            }
        }
        if !new_tasks.is_empty() {
            self.inbox.extend(new_tasks);
        }
    }

    /// Simulates one tick starting at `curr_time`, returning the packets
    /// that clear the egress shaper. Not thread-safe; only the owning
    /// worker calls this, once per tick.
    pub fn sim_time_slice(&self, time_slice: f64, curr_time: f64) -> Result<Vec<Packet>, Error> {
        let heartbeats = self.heartbeats.lock().clone();
        let mut tick = self.tick.lock();
        let tick = &mut *tick;

        // Policy first: it reads the utilizations published by the previous
        // tick and retunes the accept/forward split.
        let (cpu_depth, _) = tick.scheduler.queue_depths();
        tick.policy.step(
            time_slice,
            cpu_depth,
            tick.scheduler.expected_performance(),
            &heartbeats,
            &mut tick.load_manager,
        );

        // Split the inbox snapshot; the inbox itself is drained atomically.
        let incoming = self.inbox.drain();
        let (accepted, forwarded) = tick.load_manager.step(time_slice, incoming);

        // Execute.
        tick.scheduler.add_tasks(accepted);
        let mut completed = tick.scheduler.sim_time_slice(time_slice)?;

        // Completions are observed at the end of the tick.
        let end_time = curr_time + time_slice;
        for task in &mut completed {
            task.latency = Some(end_time - task.gen_time);
        }
        tick.avg_latency = if completed.is_empty() {
            0.0
        } else {
            completed
                .iter()
                .filter_map(|t| t.latency)
                .sum::<f64>()
                / completed.len() as f64
        };

        // Outbox: last tick's throttled remainder first, then one heartbeat
        // per peer, then the forwarded tasks.
        let mut outgoing = std::mem::take(&mut tick.tx_queue);
        let heartbeat = Heartbeat {
            expected_performance: tick.scheduler.expected_performance(),
            queue_size: {
                let (cpu, io) = tick.scheduler.queue_depths();
                cpu + io
            },
        };
        for peer in &self.registry {
            if *peer != self.name {
                outgoing.push(heartbeat.into_packet(self.src.clone(), node_addr(peer)));
            }
        }
        outgoing.extend(forwarded);
        let (sent, throttled) = tick.network.shape(time_slice, outgoing);
        tick.tx_queue = throttled;

        let (cpu_queue_depth, io_queue_depth) = tick.scheduler.queue_depths();
        *self.sample.lock() = NodeSample {
            cpu_utilization: tick.scheduler.utilization(),
            io_utilization: tick.scheduler.io_utilization(),
            cpu_queue_depth,
            io_queue_depth,
            completed: completed.len(),
            avg_latency: tick.avg_latency,
        };
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HEARTBEAT_SIZE;
    use malcolm_sim_config::IecInt;
    use pretty_assertions::assert_eq;

    fn node_config(name: &str) -> NodeConfig {
        NodeConfig {
            name: name.to_owned(),
            core_count: IecInt::new(1),
            core_perf: 1.0,
            io_count: IecInt::new(1),
            io_perf: 1.0,
            overhead: 0.0,
            bandwidth: IecInt::new(1 << 30),
        }
    }

    fn registry() -> Vec<NodeName> {
        vec!["a".to_owned(), "b".to_owned()]
    }

    fn task_packet(name: &str, dest: &str) -> Packet {
        let mut task = Task::new(name, 3.0, 2.0, 128);
        task.gen_time = 0.0;
        Packet::for_task(task, crate::packet::BALANCER_ADDR, node_addr(dest))
    }

    #[test]
    fn tasks_land_in_the_inbox() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        node.recv_packets(vec![task_packet("t0", "a"), task_packet("t1", "a")]);
        assert_eq!(node.inbox_len(), 2);
    }

    #[test]
    fn heartbeats_from_known_peers_are_stored() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        let hb = Heartbeat {
            expected_performance: 0.5,
            queue_size: 4,
        };
        node.recv_packets(vec![hb.into_packet(node_addr("b"), node_addr("a"))]);
        assert_eq!(node.heartbeats.lock().get("b"), Some(&hb));
    }

    #[test]
    fn heartbeats_from_unknown_sources_are_dropped() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        let hb = Heartbeat {
            expected_performance: 0.5,
            queue_size: 4,
        };
        node.recv_packets(vec![
            hb.into_packet(node_addr("ghost"), node_addr("a")),
            hb.into_packet("not-an-address", node_addr("a")),
        ]);
        assert!(node.heartbeats.lock().is_empty());
    }

    #[test]
    fn single_task_completes_at_five_ms_with_matching_latency() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        node.recv_packets(vec![task_packet("only", "a")]);

        let mut completion_time = None;
        for tick in 0..6 {
            let t = tick as f64;
            let _ = node.sim_time_slice(1.0, t).expect("tick");
            let sample = node.sample();
            if sample.completed > 0 {
                assert!(completion_time.is_none());
                completion_time = Some(t + 1.0);
                assert_eq!(sample.avg_latency, t + 1.0);
            }
        }
        assert_eq!(completion_time, Some(5.0));
    }

    #[test]
    fn every_tick_emits_one_heartbeat_per_peer() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        let sent = node.sim_time_slice(1.0, 0.0).expect("tick");
        // Registry holds one peer besides ourselves.
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dest, node_addr("b"));
        assert_eq!(sent[0].size, HEARTBEAT_SIZE);
        assert!(matches!(sent[0].payload, PacketPayload::Heartbeat(_)));
    }

    #[test]
    fn throttled_packets_lead_the_next_tick() {
        // Budget of exactly one heartbeat per tick.
        let mut config = node_config("a");
        config.bandwidth = IecInt::new(HEARTBEAT_SIZE * 8 * 1000);
        let node = MalcolmNode::new(
            &config,
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            0,
        );

        let first = node.sim_time_slice(1.0, 0.0).expect("tick");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].dest, node_addr("b"));

        // The throttled heartbeat to `c` goes out before this tick's fresh
        // heartbeats.
        let second = node.sim_time_slice(1.0, 1.0).expect("tick");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].dest, node_addr("c"));
    }

    #[test]
    fn idle_node_publishes_zeroed_sample() {
        let node = MalcolmNode::new(&node_config("a"), registry(), 0);
        let _ = node.sim_time_slice(1.0, 0.0).expect("tick");
        let sample = node.sample();
        assert_eq!(sample.cpu_utilization, 0.0);
        assert_eq!(sample.io_utilization, 0.0);
        assert_eq!(sample.completed, 0);
        assert_eq!(sample.cpu_queue_depth, 0);
        assert_eq!(sample.io_queue_depth, 0);
    }
}

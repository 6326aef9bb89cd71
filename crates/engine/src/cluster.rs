// SPDX-License-Identifier: Apache-2.0

//! The cluster: node registry, packet router, central balancer and task
//! generator, owned by one explicit value.
//!
//! The registry is fully populated during (single-threaded) construction
//! and read-only afterwards, so node workers and the router can share it
//! freely during a run.

use crate::balancer::CentralLoadBalancer;
use crate::error::Error;
use crate::node::MalcolmNode;
use crate::packet::{Packet, parse_node_addr};
use crate::taskgen::TaskGenerator;
use malcolm_sim_config::{ClusterConfig, NodeName};
use malcolm_sim_telemetry::NodeSample;
use std::collections::HashMap;
use std::sync::Arc;

/// A fully constructed Malcolm cluster, ready to simulate.
pub struct Cluster {
    pub(crate) nodes: Vec<Arc<MalcolmNode>>,
    pub(crate) names: Vec<NodeName>,
    by_name: HashMap<NodeName, usize>,
    pub(crate) balancer: CentralLoadBalancer,
    pub(crate) task_gen: TaskGenerator,
}

impl Cluster {
    /// Builds every node of the cluster from a validated configuration.
    ///
    /// Validation rejects duplicate node names before any node is built, so
    /// the registry insertions below cannot collide.
    pub fn new(config: &ClusterConfig) -> Result<Self, Error> {
        config.validate()?;

        let names: Vec<NodeName> = config.malcolm_nodes.iter().map(|n| n.name.clone()).collect();
        let mut by_name = HashMap::new();
        let mut nodes = Vec::with_capacity(config.malcolm_nodes.len());
        for (index, node_config) in config.malcolm_nodes.iter().enumerate() {
            let _ = by_name.insert(node_config.name.clone(), index);
            // Distinct seed per node so forward destinations decorrelate.
            let seed = config.seed.wrapping_add(1 + index as u64);
            nodes.push(Arc::new(MalcolmNode::new(node_config, names.clone(), seed)));
        }

        Ok(Self {
            nodes,
            names,
            by_name,
            balancer: CentralLoadBalancer::new(),
            task_gen: TaskGenerator::new(&config.tasks, config.seed)?,
        })
    }

    /// Node names in registry (configuration) order.
    #[must_use]
    pub fn names(&self) -> &[NodeName] {
        &self.names
    }

    /// The nodes in registry order.
    #[must_use]
    pub fn nodes(&self) -> &[Arc<MalcolmNode>] {
        &self.nodes
    }

    /// Looks a node up by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Arc<MalcolmNode>> {
        self.by_name.get(name).map(|&i| &self.nodes[i])
    }

    /// Every node's latest metrics snapshot, in registry order.
    #[must_use]
    pub fn samples(&self) -> Vec<NodeSample> {
        self.nodes.iter().map(|n| n.sample()).collect()
    }

    /// Buckets `packets` by destination and delivers them.
    ///
    /// Malformed destinations and destinations naming no registered node
    /// are logged and dropped; routing itself never fails.
    pub fn route_packets(&self, packets: Vec<Packet>) {
        let mut buckets: HashMap<usize, Vec<Packet>> = HashMap::new();
        for packet in packets {
            let Some(dest) = parse_node_addr(&packet.dest) else {
                tracing::error!(
                    dest = %packet.dest,
                    "invalid packet destination: should start with 'MalcolmNode:'"
                );
                continue;
            };
            let Some(&index) = self.by_name.get(dest) else {
                tracing::error!(
                    dest = %packet.dest,
                    "invalid packet destination: node does not exist"
                );
                continue;
            };
            buckets.entry(index).or_default().push(packet);
        }
        for (index, bucket) in buckets {
            self.nodes[index].recv_packets(bucket);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::packet::{BALANCER_ADDR, Packet, node_addr};
    use crate::task::Task;
    use malcolm_sim_config::{IecInt, NodeConfig, SamplerConfig, WorkloadConfig};
    use pretty_assertions::assert_eq;

    pub(crate) fn test_config(names: &[&str]) -> ClusterConfig {
        ClusterConfig {
            malcolm_nodes: names
                .iter()
                .map(|name| NodeConfig {
                    name: (*name).to_owned(),
                    core_count: IecInt::new(1),
                    core_perf: 1.0,
                    io_count: IecInt::new(1),
                    io_perf: 1.0,
                    overhead: 0.0,
                    bandwidth: IecInt::new(1 << 30),
                })
                .collect(),
            tasks: WorkloadConfig {
                rate: SamplerConfig::Const { value: 0.001 },
                runtime: SamplerConfig::Const { value: 3.0 },
                io_time: SamplerConfig::Const { value: 2.0 },
                payload: SamplerConfig::Const { value: 128.0 },
            },
            seed: 0,
        }
    }

    fn task_packet(name: &str, dest: &str) -> Packet {
        Packet::for_task(Task::new(name, 1.0, 0.0, 8), BALANCER_ADDR, dest.to_owned())
    }

    #[test]
    fn construction_registers_every_node() {
        let cluster = Cluster::new(&test_config(&["a", "b", "c"])).expect("cluster");
        assert_eq!(cluster.names(), &["a", "b", "c"]);
        assert!(cluster.node("b").is_some());
        assert!(cluster.node("ghost").is_none());
    }

    #[test]
    fn invalid_config_fails_construction() {
        let mut config = test_config(&["a", "a"]);
        assert!(matches!(
            Cluster::new(&config),
            Err(Error::Config(_))
        ));
        config.malcolm_nodes.clear();
        assert!(Cluster::new(&config).is_err());
    }

    #[test]
    fn routing_delivers_to_the_named_node() {
        let cluster = Cluster::new(&test_config(&["a", "b"])).expect("cluster");
        cluster.route_packets(vec![
            task_packet("t0", &node_addr("a")),
            task_packet("t1", &node_addr("b")),
            task_packet("t2", &node_addr("b")),
        ]);
        let a = cluster.node("a").expect("node a");
        let b = cluster.node("b").expect("node b");
        assert_eq!(a.inbox_len(), 1);
        assert_eq!(b.inbox_len(), 2);
    }

    #[test]
    fn malformed_and_unknown_destinations_are_dropped() {
        let cluster = Cluster::new(&test_config(&["a"])).expect("cluster");
        cluster.route_packets(vec![
            task_packet("t0", "nonsense"),
            task_packet("t1", &node_addr("ghost")),
            task_packet("t2", &node_addr("a")),
        ]);
        assert_eq!(cluster.node("a").expect("node a").inbox_len(), 1);
    }
}

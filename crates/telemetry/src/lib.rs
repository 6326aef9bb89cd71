// SPDX-License-Identifier: Apache-2.0

//! Metric collection for the Malcolm simulator.
//!
//! Every tick, the driver snapshots each node's scheduler and latency
//! counters into a [`NodeSample`] and feeds the whole row to a
//! [`MetricsRecorder`]. The recorder keeps one time series per
//! (metric, node) pair; at the end of a run the series are emitted as one
//! artifact per metric with one column per node, the layout a plotting
//! collaborator consumes.

use serde::Serialize;

pub mod export;

pub use export::Error;

/// The metrics sampled for every node on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// CPU pool utilization, in `[0, 1]`.
    CpuUtilization,
    /// IO pool utilization, in `[0, 1]`.
    IoUtilization,
    /// Depth of the CPU queue at the end of the tick.
    CpuQueueDepth,
    /// Depth of the IO queue at the end of the tick.
    IoQueueDepth,
    /// Number of tasks completed during the tick.
    Completed,
    /// Mean end-to-end latency of the tasks completed during the tick.
    AverageLatency,
}

impl MetricKind {
    /// All metric kinds, in emission order.
    pub const ALL: [MetricKind; 6] = [
        MetricKind::CpuUtilization,
        MetricKind::IoUtilization,
        MetricKind::CpuQueueDepth,
        MetricKind::IoQueueDepth,
        MetricKind::Completed,
        MetricKind::AverageLatency,
    ];

    /// Stable key used to name the emitted artifact (`<key>.csv`).
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            MetricKind::CpuUtilization => "cpu_util",
            MetricKind::IoUtilization => "io_util",
            MetricKind::CpuQueueDepth => "cpu_queue",
            MetricKind::IoQueueDepth => "io_queue",
            MetricKind::Completed => "completed",
            MetricKind::AverageLatency => "avg_latency",
        }
    }

    /// Human-readable metric title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            MetricKind::CpuUtilization => "CPU Util",
            MetricKind::IoUtilization => "IO Util",
            MetricKind::CpuQueueDepth => "CPU Queue",
            MetricKind::IoQueueDepth => "IO Queue",
            MetricKind::Completed => "Completed",
            MetricKind::AverageLatency => "Average Latency",
        }
    }
}

/// One node's metric snapshot for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NodeSample {
    /// CPU pool utilization, in `[0, 1]`.
    pub cpu_utilization: f64,
    /// IO pool utilization, in `[0, 1]`.
    pub io_utilization: f64,
    /// Depth of the CPU queue at the end of the tick.
    pub cpu_queue_depth: usize,
    /// Depth of the IO queue at the end of the tick.
    pub io_queue_depth: usize,
    /// Number of tasks completed during the tick.
    pub completed: usize,
    /// Mean latency of the tick's completions, in milliseconds.
    pub avg_latency: f64,
}

impl NodeSample {
    fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::CpuUtilization => self.cpu_utilization,
            MetricKind::IoUtilization => self.io_utilization,
            MetricKind::CpuQueueDepth => self.cpu_queue_depth as f64,
            MetricKind::IoQueueDepth => self.io_queue_depth as f64,
            MetricKind::Completed => self.completed as f64,
            MetricKind::AverageLatency => self.avg_latency,
        }
    }
}

/// Accumulates per-tick, per-node samples over a whole run.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    node_names: Vec<String>,
    times: Vec<f64>,
    /// Row-major: `rows[tick][node]`.
    rows: Vec<Vec<NodeSample>>,
}

impl MetricsRecorder {
    /// Creates a recorder for the given node column order.
    #[must_use]
    pub fn new(node_names: Vec<String>) -> Self {
        Self {
            node_names,
            times: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Node names, in column order.
    #[must_use]
    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }

    /// Number of recorded ticks.
    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.times.len()
    }

    /// Records one tick's samples; `samples` must follow the node column
    /// order the recorder was created with.
    pub fn record(&mut self, time_ms: f64, samples: Vec<NodeSample>) {
        debug_assert_eq!(samples.len(), self.node_names.len());
        self.times.push(time_ms);
        self.rows.push(samples);
    }

    /// The time series of one metric for one node column.
    #[must_use]
    pub fn series(&self, kind: MetricKind, node: usize) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .zip(&self.rows)
            .map(|(t, row)| (*t, row[node].get(kind)))
            .collect()
    }

    /// The recorded tick start times.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// One metric's values at `tick`, in node column order.
    #[must_use]
    pub fn row(&self, kind: MetricKind, tick: usize) -> Vec<f64> {
        self.rows[tick].iter().map(|s| s.get(kind)).collect()
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Simulation drivers: the single-threaded tick loop and the
//! barrier-coordinated thread-per-node variant.
//!
//! Both drivers follow the same per-tick data flow: generate tasks, spread
//! them through the central balancer, step every node, route the packets the
//! nodes produced, snapshot metrics. In the asynchronous variant the main
//! thread is the exclusive router: workers park their shaped output in
//! per-node outboxes, and all inter-node deliveries happen between the two
//! barrier crossings, so no worker ever writes another worker's state.

use crate::cluster::Cluster;
use crate::error::Error;
use crate::packet::Packet;
use malcolm_sim_channel::{TickBarrier, TickEvent, WaitError};
use malcolm_sim_telemetry::MetricsRecorder;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// How a run steps its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    /// One thread runs every component per tick.
    Sync,
    /// One long-lived worker thread per node, stepped in lock-step.
    Async,
}

/// Number of ticks an inclusive `0, Δ, …, sim_time` loop performs.
fn tick_count(time_slice: f64, sim_time: f64) -> Result<u64, Error> {
    if !time_slice.is_finite() || time_slice <= 0.0 {
        return Err(Error::InvalidTiming {
            field: "time_slice",
            value: time_slice,
        });
    }
    if !sim_time.is_finite() || sim_time < 0.0 {
        return Err(Error::InvalidTiming {
            field: "sim_time",
            value: sim_time,
        });
    }
    Ok((sim_time / time_slice).floor() as u64 + 1)
}

impl Cluster {
    /// Runs the simulation with the selected driver.
    pub fn run(
        &mut self,
        mode: DriverMode,
        time_slice: f64,
        sim_time: f64,
        recorder: &mut MetricsRecorder,
    ) -> Result<(), Error> {
        match mode {
            DriverMode::Sync => self.run_sync(time_slice, sim_time, recorder),
            DriverMode::Async => self.run_async(time_slice, sim_time, recorder),
        }
    }

    /// Single-threaded tick loop. Fully reproducible under a fixed seed.
    pub fn run_sync(
        &mut self,
        time_slice: f64,
        sim_time: f64,
        recorder: &mut MetricsRecorder,
    ) -> Result<(), Error> {
        let ticks = tick_count(time_slice, sim_time)?;
        tracing::info!(ticks, time_slice, "running simulation in single-threaded mode");

        for tick in 0..ticks {
            let curr_time = tick as f64 * time_slice;
            let new_tasks = self.task_gen.generate(time_slice, curr_time);
            let fresh = self.balancer.distribute(&self.names, new_tasks);
            self.route_packets(fresh);

            let mut outgoing: Vec<Packet> = Vec::new();
            for node in &self.nodes {
                outgoing.extend(node.sim_time_slice(time_slice, curr_time)?);
            }
            self.route_packets(outgoing);
            recorder.record(curr_time, self.samples());
        }
        tracing::info!("simulation completed");
        Ok(())
    }

    /// Thread-per-node driver.
    ///
    /// Per tick the main thread: routes freshly generated tasks, sets the
    /// start event, waits on the barrier (workers finish their slice),
    /// clears the event, routes every worker's outbox and snapshots
    /// metrics, then waits on the barrier again to release the next tick.
    pub fn run_async(
        &mut self,
        time_slice: f64,
        sim_time: f64,
        recorder: &mut MetricsRecorder,
    ) -> Result<(), Error> {
        let ticks = tick_count(time_slice, sim_time)?;
        let start_tick = Arc::new(TickEvent::new());
        let barrier = Arc::new(TickBarrier::new(self.nodes().len() + 1));
        tracing::info!(
            ticks,
            workers = self.nodes().len(),
            "running simulation with one thread per node"
        );

        let outboxes: Vec<Arc<Mutex<Vec<Packet>>>> = self
            .nodes()
            .iter()
            .map(|_| Arc::new(Mutex::new(Vec::new())))
            .collect();

        let mut workers = Vec::with_capacity(self.nodes().len());
        for (node, outbox) in self.nodes().iter().cloned().zip(outboxes.iter().cloned()) {
            let start_tick = start_tick.clone();
            let barrier = barrier.clone();
            let thread_name = format!("malcolm-node-{}", node.name());
            let start_tick_for_thread = start_tick.clone();
            let barrier_for_thread = barrier.clone();
            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || -> Result<(), Error> {
                    let start_tick = start_tick_for_thread;
                    let barrier = barrier_for_thread;
                    let result = (|| {
                        for tick in 0..ticks {
                            let curr_time = tick as f64 * time_slice;
                            start_tick.wait()?;
                            let sent = node.sim_time_slice(time_slice, curr_time)?;
                            *outbox.lock() = sent;
                            barrier.wait()?;
                            // Main routes and snapshots between the barriers.
                            barrier.wait()?;
                        }
                        Ok(())
                    })();
                    if result.is_err() {
                        // Release everyone else immediately.
                        barrier.poison();
                        start_tick.poison();
                    }
                    result
                });
            let handle = match spawned {
                Ok(handle) => handle,
                Err(source) => {
                    // Already-running workers must not sit out the ceiling.
                    barrier.poison();
                    start_tick.poison();
                    return Err(Error::ThreadSpawn {
                        thread_name,
                        source,
                    });
                }
            };
            workers.push((thread_name, handle));
        }

        let main_result = (|| -> Result<(), Error> {
            for tick in 0..ticks {
                let curr_time = tick as f64 * time_slice;
                let new_tasks = self.task_gen.generate(time_slice, curr_time);
                let fresh = self.balancer.distribute(&self.names, new_tasks);
                // Workers are parked on the start event; inboxes are safe to
                // fill.
                self.route_packets(fresh);

                start_tick.set();
                barrier.wait()?;
                start_tick.clear();

                let mut outgoing: Vec<Packet> = Vec::new();
                for outbox in &outboxes {
                    outgoing.append(&mut outbox.lock());
                }
                self.route_packets(outgoing);
                recorder.record(curr_time, self.samples());

                barrier.wait()?;
            }
            Ok(())
        })();
        if main_result.is_err() {
            barrier.poison();
            start_tick.poison();
        }

        // Join every worker and surface the most informative failure: a
        // worker's own error beats the secondary aborts it caused.
        let is_secondary =
            |err: &Error| matches!(err, Error::Deadlock(WaitError::Aborted { .. }));
        let mut worker_error: Option<Error> = None;
        for (thread_name, handle) in workers {
            let failure = match handle.join() {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(panic) => Error::WorkerPanic {
                    thread_name,
                    panic_message: format!("{panic:?}"),
                },
            };
            let keep_current = worker_error
                .as_ref()
                .is_some_and(|current| !is_secondary(current) || is_secondary(&failure));
            if !keep_current {
                worker_error = Some(failure);
            }
        }

        match (main_result, worker_error) {
            (Err(Error::Deadlock(WaitError::Aborted { .. })), Some(worker_err)) => Err(worker_err),
            (Err(main_err), _) => Err(main_err),
            (Ok(()), Some(worker_err)) => Err(worker_err),
            (Ok(()), None) => {
                tracing::info!("simulation completed");
                Ok(())
            }
        }
    }
}

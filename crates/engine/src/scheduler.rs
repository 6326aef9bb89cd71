// SPDX-License-Identifier: Apache-2.0

//! Intra-node scheduler: an event-driven multi-server queue with distinct
//! CPU and IO execution pools.
//!
//! Within one tick the scheduler repeatedly dispatches idle units, finds the
//! next completion event among the busy ones, and advances every busy unit
//! by that delta, until the slice is exhausted or everything is idle. Ties
//! are broken by scan order (the earlier unit wins). When a per-dispatch
//! overhead is configured, a task entering a core is preceded by a synthetic
//! CPU-only spin of that duration, atomically replaced by the task itself on
//! the same core once the spin completes.

use crate::error::Error;
use crate::task::Task;
use malcolm_sim_channel::SharedQueue;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a core is currently running.
#[derive(Debug)]
enum CoreJob {
    /// A task executing its CPU phase.
    Direct(Task),
    /// The synthetic scheduling-overhead spin that precedes `main`.
    Overhead { spin: Task, main: Box<Task> },
}

impl CoreJob {
    fn cpu_remaining(&self) -> f64 {
        match self {
            CoreJob::Direct(task) => task.cpu_remaining(),
            CoreJob::Overhead { spin, .. } => spin.cpu_remaining(),
        }
    }

    fn sim_cpu(&mut self, delta_t: f64) -> bool {
        match self {
            CoreJob::Direct(task) => task.sim_cpu(delta_t),
            CoreJob::Overhead { spin, .. } => spin.sim_cpu(delta_t),
        }
    }

    fn name(&self) -> &str {
        match self {
            CoreJob::Direct(task) => &task.name,
            CoreJob::Overhead { spin, .. } => &spin.name,
        }
    }
}

#[derive(Debug, Default)]
struct CoreUnit {
    job: Option<CoreJob>,
    busy_time: f64,
}

#[derive(Debug, Default)]
struct IoUnit {
    task: Option<Task>,
    busy_time: f64,
}

/// Utilization figures published for thread-safe reads, stored as f64 bits.
#[derive(Debug, Default)]
struct PublishedUtilization {
    cpu: AtomicU64,
    io: AtomicU64,
}

impl PublishedUtilization {
    fn store(&self, cpu: f64, io: f64) {
        self.cpu.store(cpu.to_bits(), Ordering::Release);
        self.io.store(io.to_bits(), Ordering::Release);
    }

    fn load(&self) -> (f64, f64) {
        (
            f64::from_bits(self.cpu.load(Ordering::Acquire)),
            f64::from_bits(self.io.load(Ordering::Acquire)),
        )
    }
}

/// Intra-node scheduler of a Malcolm node.
#[derive(Debug)]
pub struct Scheduler {
    name: String,
    core_count: usize,
    core_perf: f64,
    io_count: usize,
    io_perf: f64,
    overhead: f64,
    /// Tasks pending CPU execution. Producers: the owning node via its load
    /// manager; consumer: the scheduler itself.
    cpu_queue: SharedQueue<Task>,
    /// Tasks pending IO execution; only touched from the owning worker.
    io_queue: VecDeque<Task>,
    cores: Vec<CoreUnit>,
    ios: Vec<IoUnit>,
    published: PublishedUtilization,
    completed_last_tick: usize,
}

impl Scheduler {
    /// Creates a scheduler with the given execution-unit geometry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        core_count: usize,
        core_perf: f64,
        io_count: usize,
        io_perf: f64,
        overhead: f64,
    ) -> Self {
        Self {
            name: name.into(),
            core_count,
            core_perf,
            io_count,
            io_perf,
            overhead,
            cpu_queue: SharedQueue::new(),
            io_queue: VecDeque::new(),
            cores: (0..core_count).map(|_| CoreUnit::default()).collect(),
            ios: (0..io_count).map(|_| IoUnit::default()).collect(),
            published: PublishedUtilization::default(),
            completed_last_tick: 0,
        }
    }

    /// Appends tasks to the CPU queue. Thread-safe.
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = Task>) {
        self.cpu_queue.extend(tasks);
    }

    /// Lengths of the CPU and IO queues.
    #[must_use]
    pub fn queue_depths(&self) -> (usize, usize) {
        (self.cpu_queue.len(), self.io_queue.len())
    }

    /// CPU pool utilization published after the last tick, in `[0, 1]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.published.load().0
    }

    /// IO pool utilization published after the last tick, in `[0, 1]`.
    #[must_use]
    pub fn io_utilization(&self) -> f64 {
        self.published.load().1
    }

    /// Number of tasks completed during the last tick.
    #[must_use]
    pub fn completed_last_tick(&self) -> usize {
        self.completed_last_tick
    }

    /// Minimum of the remaining CPU and IO capacity fractions, each scaled
    /// by the pool's performance multiplier. Thread-safe read of the last
    /// published utilizations.
    #[must_use]
    pub fn expected_performance(&self) -> f64 {
        let (cpu, io) = self.published.load();
        ((1.0 - cpu) * self.core_perf).min((1.0 - io) * self.io_perf)
    }

    /// Simulates execution for `time_slice` milliseconds.
    ///
    /// Returns the tasks that completed during this call, in completion
    /// order. Not thread-safe; exactly one caller (the owning node) invokes
    /// this per tick.
    pub fn sim_time_slice(&mut self, time_slice: f64) -> Result<Vec<Task>, Error> {
        let mut completed: Vec<Task> = Vec::new();
        let mut curr_time = 0.0;
        let mut prev_delta: Option<f64> = None;
        for core in &mut self.cores {
            core.busy_time = 0.0;
        }
        for io in &mut self.ios {
            io.busy_time = 0.0;
        }
        tracing::debug!(scheduler = %self.name, time_slice, "simulating time slice");

        // Event loop within the slice; each iteration is a single event.
        while curr_time < time_slice {
            let mut delta: Option<f64> = None;

            // Assign new tasks to idle cores, then find the nearest CPU event.
            for (i, core) in self.cores.iter_mut().enumerate() {
                if core.job.is_none() {
                    if let Some(task) = self.cpu_queue.pop_front() {
                        tracing::trace!(scheduler = %self.name, task = %task.name, core = i, "dispatch");
                        core.job = Some(wrap_with_overhead(task, self.overhead));
                    }
                }
                if let Some(job) = &core.job {
                    let remaining = job.cpu_remaining();
                    delta = Some(delta.map_or(remaining, |d: f64| d.min(remaining)));
                }
            }

            // Assign new tasks to idle IO units (no overhead for IO), then
            // fold in the nearest IO event.
            for (i, io) in self.ios.iter_mut().enumerate() {
                if io.task.is_none() {
                    if let Some(task) = self.io_queue.pop_front() {
                        tracing::trace!(scheduler = %self.name, task = %task.name, io = i, "io dispatch");
                        io.task = Some(task);
                    }
                }
                if let Some(task) = &io.task {
                    let remaining = task.io_remaining();
                    delta = Some(delta.map_or(remaining, |d: f64| d.min(remaining)));
                }
            }

            // All units idle: nothing more can happen within this slice.
            let Some(raw_delta) = delta else { break };
            let delta = raw_delta.min(time_slice - curr_time);
            if prev_delta == Some(0.0) && delta == 0.0 {
                tracing::error!(scheduler = %self.name, state = %self.state_str(), "infinite loop");
                return Err(Error::SchedulerStall {
                    scheduler: self.name.clone(),
                    state: self.state_str(),
                });
            }

            // Advance every busy core by delta.
            for core in &mut self.cores {
                let Some(job) = core.job.as_mut() else {
                    continue;
                };
                core.busy_time += delta;
                if !job.sim_cpu(delta) {
                    continue;
                }
                match core.job.take() {
                    Some(CoreJob::Overhead { main, .. }) => {
                        // The spin is done; the wrapped task takes over the
                        // same core and runs starting next iteration.
                        core.job = Some(CoreJob::Direct(*main));
                    }
                    Some(CoreJob::Direct(task)) => {
                        if task.io_time > 0.0 {
                            self.io_queue.push_back(task);
                        } else {
                            completed.push(task);
                        }
                    }
                    None => {}
                }
            }

            // Advance every busy IO unit by delta.
            for io in &mut self.ios {
                let Some(task) = io.task.as_mut() else {
                    continue;
                };
                io.busy_time += delta;
                if task.sim_io(delta) {
                    if let Some(done) = io.task.take() {
                        completed.push(done);
                    }
                }
            }

            curr_time += delta;
            prev_delta = Some(delta);
        }

        let cpu_busy: f64 = self.cores.iter().map(|c| c.busy_time).sum();
        let io_busy: f64 = self.ios.iter().map(|io| io.busy_time).sum();
        self.published.store(
            cpu_busy / (self.core_count as f64 * time_slice),
            io_busy / (self.io_count as f64 * time_slice),
        );
        self.completed_last_tick = completed.len();
        if !completed.is_empty() {
            tracing::debug!(
                scheduler = %self.name,
                completed = completed.len(),
                "time slice complete"
            );
        }
        Ok(completed)
    }

    /// Details about the current occupancy of each core and IO unit.
    #[must_use]
    pub fn state_str(&self) -> String {
        let mut out = format!("Scheduler:{}\n", self.name);
        for (i, core) in self.cores.iter().enumerate() {
            match &core.job {
                Some(job) => {
                    let _ = writeln!(out, "    Core {i}: Task '{}'", job.name());
                }
                None => {
                    let _ = writeln!(out, "    Core {i}: IDLE");
                }
            }
        }
        let mut idle_run = 0usize;
        for (i, io) in self.ios.iter().enumerate() {
            match &io.task {
                Some(task) => {
                    if idle_run > 0 {
                        let _ = writeln!(out, "    ... {idle_run} idle IO unit(s)");
                        idle_run = 0;
                    }
                    let _ = writeln!(
                        out,
                        "    IO {i}: Task '{}' {}/{}",
                        task.name, task.io_progress, task.io_time
                    );
                }
                None => idle_run += 1,
            }
        }
        if idle_run > 0 {
            let _ = writeln!(out, "    ... {idle_run} idle IO unit(s)");
        }
        out
    }
}

/// Precedes `task` with a synthetic CPU-only spin when an overhead is
/// configured.
fn wrap_with_overhead(task: Task, overhead: f64) -> CoreJob {
    if overhead > 0.0 {
        let spin = Task::new(format!("overhead.{}", task.name), overhead, 0.0, 0);
        CoreJob::Overhead {
            spin,
            main: Box::new(task),
        }
    } else {
        CoreJob::Direct(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn empty_tick_is_idempotent() {
        let mut scheduler = Scheduler::new("t", 2, 1.0, 2, 1.0, 0.0);
        let completed = scheduler.sim_time_slice(1.0).expect("empty tick");
        assert!(completed.is_empty());
        assert_eq!(scheduler.queue_depths(), (0, 0));
        assert_eq!(scheduler.utilization(), 0.0);
        assert_eq!(scheduler.io_utilization(), 0.0);
        assert_eq!(scheduler.completed_last_tick(), 0);
    }

    #[test]
    fn single_task_completes_after_runtime_plus_io_time() {
        // One dedicated core and IO unit: a (3, 2) task takes exactly 5 ms.
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
        scheduler.add_tasks([Task::new("only", 3.0, 2.0, 128)]);

        let mut completion_tick = None;
        for tick in 1..=6 {
            let completed = scheduler.sim_time_slice(1.0).expect("tick");
            if !completed.is_empty() {
                assert!(completion_tick.is_none());
                completion_tick = Some(tick);
            }
        }
        assert_eq!(completion_tick, Some(5));
    }

    #[test]
    fn completion_time_is_independent_of_slice_partitioning() {
        for slice in [0.5, 1.0, 2.5, 5.0] {
            let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
            scheduler.add_tasks([Task::new("only", 3.0, 2.0, 128)]);
            let mut elapsed = 0.0;
            let mut completion_time = None;
            while completion_time.is_none() && elapsed < 20.0 {
                let completed = scheduler.sim_time_slice(slice).expect("tick");
                elapsed += slice;
                if !completed.is_empty() {
                    completion_time = Some(elapsed);
                }
            }
            assert_eq!(completion_time, Some(5.0), "slice {slice}");
        }
    }

    #[test]
    fn overhead_delays_completion_by_its_duration() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 1.0);
        scheduler.add_tasks([Task::new("only", 3.0, 2.0, 128)]);

        let mut completion_tick = None;
        for tick in 1..=8 {
            let completed = scheduler.sim_time_slice(1.0).expect("tick");
            if !completed.is_empty() {
                completion_tick = Some(tick);
            }
        }
        assert_eq!(completion_tick, Some(6));
    }

    #[test]
    fn overhead_spin_is_replaced_by_its_task_on_the_same_core() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 2.0);
        scheduler.add_tasks([Task::new("a", 1.0, 0.0, 0), Task::new("b", 1.0, 0.0, 0)]);

        // a: spin [0,2) + run [2,3); b: spin [3,5) + run [5,6).
        let mut completions = Vec::new();
        for tick in 1..=6 {
            for task in scheduler.sim_time_slice(1.0).expect("tick") {
                completions.push((tick, task.name));
            }
        }
        assert_eq!(
            completions,
            vec![(3, "a".to_owned()), (6, "b".to_owned())]
        );
    }

    #[test]
    fn multi_event_scenario_completes_in_scan_order() {
        // Two cores, plenty of IO capacity, no overhead; the canonical
        // six-task workload.
        let mut scheduler = Scheduler::new("t", 2, 1.0, 32, 1.0, 0.0);
        scheduler.add_tasks([
            Task::new("#0", 1.0, 0.0, 128),
            Task::new("#1", 2.0, 0.0, 128),
            Task::new("#2", 1.0, 0.0, 128),
            Task::new("#3", 8.0, 2.0, 128),
            Task::new("#4", 1.0, 2.0, 128),
            Task::new("#5", 1.0, 2.0, 128),
        ]);

        let mut completions = Vec::new();
        for tick in 1..=25 {
            for task in scheduler.sim_time_slice(1.0).expect("tick") {
                completions.push((tick, task.name));
            }
        }
        assert_eq!(
            completions,
            vec![
                (1, "#0".to_owned()),
                (2, "#2".to_owned()),
                (2, "#1".to_owned()),
                (5, "#4".to_owned()),
                (6, "#5".to_owned()),
                (12, "#3".to_owned()),
            ]
        );
        assert_eq!(scheduler.queue_depths(), (0, 0));
    }

    #[test]
    fn consecutive_zero_delta_steps_are_a_fatal_stall() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
        scheduler.add_tasks([
            Task::new("zero-a", 0.0, 0.0, 0),
            Task::new("zero-b", 0.0, 0.0, 0),
        ]);
        let err = scheduler
            .sim_time_slice(1.0)
            .expect_err("back-to-back zero-delta dispatches must stall");
        match err {
            Error::SchedulerStall { scheduler, state } => {
                assert!(scheduler.contains('t'));
                assert!(state.contains("Core 0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn io_only_task_does_not_trip_the_stall_guard() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
        scheduler.add_tasks([Task::new("io-only", 0.0, 2.0, 64)]);

        let mut completed = Vec::new();
        for _ in 0..4 {
            completed.extend(scheduler.sim_time_slice(1.0).expect("no stall"));
        }
        assert_eq!(names(&completed), vec!["io-only"]);
    }

    #[test]
    fn utilization_stays_within_bounds() {
        let mut scheduler = Scheduler::new("t", 2, 1.0, 2, 1.0, 0.0);
        scheduler.add_tasks((0..10).map(|i| Task::new(format!("#{i}"), 3.0, 1.0, 8)));
        for _ in 0..30 {
            let _ = scheduler.sim_time_slice(1.0).expect("tick");
            let cpu = scheduler.utilization();
            let io = scheduler.io_utilization();
            assert!((0.0..=1.0).contains(&cpu), "cpu {cpu}");
            assert!((0.0..=1.0).contains(&io), "io {io}");
        }
    }

    #[test]
    fn saturated_pool_publishes_full_utilization() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
        scheduler.add_tasks([Task::new("big", 100.0, 0.0, 8)]);
        let _ = scheduler.sim_time_slice(1.0).expect("tick");
        assert_eq!(scheduler.utilization(), 1.0);
        assert_eq!(scheduler.expected_performance(), 0.0);
    }

    #[test]
    fn expected_performance_scales_with_pool_perf() {
        let scheduler = Scheduler::new("t", 4, 2.0, 4, 0.5, 0.0);
        // Nothing has run: both pools fully available.
        assert_eq!(scheduler.expected_performance(), 0.5);
    }

    #[test]
    fn partial_tick_work_leaves_pool_partially_utilized() {
        let mut scheduler = Scheduler::new("t", 1, 1.0, 1, 1.0, 0.0);
        scheduler.add_tasks([Task::new("short", 0.5, 0.0, 8)]);
        let completed = scheduler.sim_time_slice(1.0).expect("tick");
        assert_eq!(names(&completed), vec!["short"]);
        assert_eq!(scheduler.utilization(), 0.5);
    }

    #[test]
    fn completions_never_exceed_available_work() {
        let mut scheduler = Scheduler::new("t", 2, 1.0, 2, 1.0, 0.0);
        scheduler.add_tasks((0..5).map(|i| Task::new(format!("#{i}"), 1.0, 1.0, 8)));
        for _ in 0..20 {
            let (cpu_depth, io_depth) = scheduler.queue_depths();
            let bound = cpu_depth + io_depth + 4; // queues plus busy units
            let completed = scheduler.sim_time_slice(1.0).expect("tick");
            assert!(completed.len() <= bound);
        }
    }
}

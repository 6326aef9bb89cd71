// SPDX-License-Identifier: Apache-2.0

//! The two-phase work unit executed by a Malcolm node.

/// A task to be executed in a Malcolm cluster.
///
/// A task runs in two phases: a CPU phase of `runtime` milliseconds followed
/// by an IO phase of `io_time` milliseconds. Progress through each phase is
/// tracked separately and only ever advanced by the scheduler currently
/// holding the task on an execution unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Stable task name, unique per generator.
    pub name: String,
    /// Total CPU runtime in milliseconds.
    pub runtime: f64,
    /// Total IO time in milliseconds.
    pub io_time: f64,
    /// Payload size in bytes; counts against egress bandwidth when the task
    /// is forwarded.
    pub payload: u64,
    /// Executed CPU runtime so far, in `[0, runtime]`.
    pub progress: f64,
    /// Executed IO time so far, in `[0, io_time]`.
    pub io_progress: f64,
    /// Simulation time at which the task was generated.
    pub gen_time: f64,
    /// End-to-end latency, stamped when completion is recorded.
    pub latency: Option<f64>,
}

impl Task {
    /// Creates a fresh task with no progress.
    #[must_use]
    pub fn new(name: impl Into<String>, runtime: f64, io_time: f64, payload: u64) -> Self {
        Self {
            name: name.into(),
            runtime,
            io_time,
            payload,
            progress: 0.0,
            io_progress: 0.0,
            gen_time: 0.0,
            latency: None,
        }
    }

    /// Remaining CPU runtime in milliseconds.
    #[must_use]
    pub fn cpu_remaining(&self) -> f64 {
        self.runtime - self.progress
    }

    /// Remaining IO time in milliseconds.
    #[must_use]
    pub fn io_remaining(&self) -> f64 {
        self.io_time - self.io_progress
    }

    /// Returns `true` if the CPU phase is complete.
    #[must_use]
    pub fn is_cpu_done(&self) -> bool {
        self.progress >= self.runtime
    }

    /// Returns `true` if the IO phase is complete.
    #[must_use]
    pub fn is_io_done(&self) -> bool {
        self.io_progress >= self.io_time
    }

    /// Returns `true` if both phases are complete.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_cpu_done() && self.is_io_done()
    }

    /// Simulates `delta_t` milliseconds of CPU time.
    ///
    /// Returns `true` iff this call completes the CPU phase; progress is
    /// clamped to `runtime` on completion.
    pub fn sim_cpu(&mut self, delta_t: f64) -> bool {
        if delta_t < self.cpu_remaining() {
            self.progress += delta_t;
            false
        } else {
            self.progress = self.runtime;
            true
        }
    }

    /// Simulates `delta_t` milliseconds of IO time.
    ///
    /// Returns `true` iff this call completes the IO phase; progress is
    /// clamped to `io_time` on completion.
    pub fn sim_io(&mut self, delta_t: f64) -> bool {
        if delta_t < self.io_remaining() {
            self.io_progress += delta_t;
            false
        } else {
            self.io_progress = self.io_time;
            true
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task '{}': CPU={}/{}; IO={}/{}; Payload={}",
            self.name, self.progress, self.runtime, self.io_progress, self.io_time, self.payload
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cpu_phase_completes_and_clamps() {
        let mut task = Task::new("t", 3.0, 2.0, 64);
        assert!(!task.sim_cpu(1.0));
        assert_eq!(task.cpu_remaining(), 2.0);
        assert!(!task.sim_cpu(1.5));
        // Overshooting clamps progress to the total runtime.
        assert!(task.sim_cpu(10.0));
        assert_eq!(task.progress, 3.0);
        assert!(task.is_cpu_done());
        assert!(!task.is_done());
    }

    #[test]
    fn io_phase_completes_and_clamps() {
        let mut task = Task::new("t", 0.0, 2.0, 64);
        assert!(task.sim_cpu(0.0));
        assert!(!task.sim_io(1.0));
        assert!(task.sim_io(1.0));
        assert_eq!(task.io_progress, 2.0);
        assert!(task.is_done());
    }

    #[test]
    fn exact_boundary_counts_as_completion() {
        let mut task = Task::new("t", 2.0, 0.0, 64);
        assert!(!task.sim_cpu(1.0));
        assert!(task.sim_cpu(1.0));
        assert!(task.is_done());
    }

    #[test]
    fn zero_length_phases_complete_immediately() {
        let mut task = Task::new("t", 0.0, 0.0, 64);
        assert!(task.sim_cpu(0.0));
        assert!(task.sim_io(0.0));
        assert!(task.is_done());
    }

    #[test]
    fn display_shows_progress_and_payload() {
        let mut task = Task::new("t", 3.0, 2.0, 64);
        let _ = task.sim_cpu(1.5);
        assert_eq!(task.to_string(), "Task 't': CPU=1.5/3; IO=0/2; Payload=64");
    }

    #[test]
    fn progress_stays_within_bounds() {
        let mut task = Task::new("t", 5.0, 3.0, 64);
        for _ in 0..20 {
            let _ = task.sim_cpu(0.7);
            assert!(task.progress >= 0.0 && task.progress <= task.runtime);
        }
        for _ in 0..20 {
            let _ = task.sim_io(0.7);
            assert!(task.io_progress >= 0.0 && task.io_progress <= task.io_time);
        }
    }
}

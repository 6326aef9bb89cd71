// SPDX-License-Identifier: Apache-2.0

//! Errors for the simulation engine.
//!
//! Only packet-layer problems are recoverable (they are logged and dropped
//! at the router); everything below is structural or temporal and fatal to
//! the run. No partial progress is committed once a fatal error is raised
//! mid-tick.

use malcolm_sim_channel::WaitError;
use miette::Diagnostic;

/// Errors that can occur while building or running a cluster simulation.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The configuration failed validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] malcolm_sim_config::Error),

    /// A workload sampler could not be instantiated.
    #[error("Invalid sampler for `{sampler}`: {details}")]
    #[diagnostic(code(malcolm_sim::invalid_sampler))]
    InvalidSampler {
        /// The workload sampler that failed.
        sampler: &'static str,
        /// Description from the distribution constructor.
        details: String,
    },

    /// A run was started with a non-positive time slice or a negative
    /// duration.
    #[error("Invalid run timing: {field} = {value}")]
    #[diagnostic(code(malcolm_sim::invalid_timing))]
    InvalidTiming {
        /// The offending parameter.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The scheduler detected two consecutive zero-delta event steps.
    #[error("Scheduler `{scheduler}` caught in infinite loop; state:\n{state}")]
    #[diagnostic(code(malcolm_sim::scheduler_stall))]
    SchedulerStall {
        /// The scheduler that stalled.
        scheduler: String,
        /// Dump of every execution unit at the time of the stall.
        state: String,
    },

    /// A blocking wait expired or was aborted: the lock-step choreography is
    /// wedged.
    #[error("Simulation dead-lock: {0}")]
    #[diagnostic(code(malcolm_sim::deadlock))]
    Deadlock(#[from] WaitError),

    /// Failed to spawn a node worker thread.
    #[error("Failed to spawn thread `{thread_name}`: {source}")]
    #[diagnostic(code(malcolm_sim::thread_spawn))]
    ThreadSpawn {
        /// Name of the thread we attempted to spawn.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A node worker thread panicked.
    #[error("Worker thread `{thread_name}` panicked: {panic_message}")]
    #[diagnostic(code(malcolm_sim::worker_panic))]
    WorkerPanic {
        /// Name of the worker that panicked.
        thread_name: String,
        /// Panic message.
        panic_message: String,
    },
}

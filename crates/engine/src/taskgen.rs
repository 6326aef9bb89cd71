// SPDX-License-Identifier: Apache-2.0

//! Per-tick task creation from the configured arrival and service-time
//! distributions.

use crate::error::Error;
use crate::task::Task;
use malcolm_sim_config::{SamplerConfig, WorkloadConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// A runtime sampler instantiated from a [`SamplerConfig`].
///
/// Draws are clamped at zero: a negative runtime, IO time or payload would
/// break the task progress invariants.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Emits a fixed value on every draw.
    Const(f64),
    /// Draws from a normal distribution.
    Gaussian(Normal<f64>),
}

impl Sampler {
    /// Instantiates the sampler described by `config`.
    pub fn from_config(sampler: &'static str, config: &SamplerConfig) -> Result<Self, Error> {
        match *config {
            SamplerConfig::Const { value } => Ok(Sampler::Const(value)),
            SamplerConfig::Gaussian { center, scale } => Normal::new(center, scale)
                .map(Sampler::Gaussian)
                .map_err(|e| Error::InvalidSampler {
                    sampler,
                    details: e.to_string(),
                }),
        }
    }

    /// Draws a single value.
    pub fn draw(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Const(value) => *value,
            Sampler::Gaussian(normal) => normal.sample(rng).max(0.0),
        }
    }

    /// Draws `n` values; the constant sampler fills the vector with its
    /// fixed value.
    pub fn draw_many(&self, n: usize, rng: &mut StdRng) -> Vec<f64> {
        match self {
            Sampler::Const(value) => vec![*value; n],
            Sampler::Gaussian(normal) => {
                (0..n).map(|_| normal.sample(rng).max(0.0)).collect()
            }
        }
    }
}

/// Generates the cluster's workload, one batch per tick.
#[derive(Debug)]
pub struct TaskGenerator {
    next_id: u64,
    rate: Sampler,
    runtime: Sampler,
    io_time: Sampler,
    payload: Sampler,
    rng: StdRng,
}

impl TaskGenerator {
    /// Builds a generator from the workload configuration, seeding its
    /// random source from `seed`.
    pub fn new(workload: &WorkloadConfig, seed: u64) -> Result<Self, Error> {
        Ok(Self {
            next_id: 0,
            rate: Sampler::from_config("rate", &workload.rate)?,
            runtime: Sampler::from_config("runtime", &workload.runtime)?,
            io_time: Sampler::from_config("io_time", &workload.io_time)?,
            payload: Sampler::from_config("payload", &workload.payload)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Number of tasks a draw of `rate` yields for one tick.
    ///
    /// The rate is tasks per millisecond; the count scales with
    /// `time_slice · 1000`.
    fn batch_size(rate: f64, time_slice: f64) -> usize {
        (rate * time_slice * 1000.0) as usize
    }

    /// Generates all tasks for a tick starting at `curr_time`.
    ///
    /// Task names increase monotonically across the whole run and every
    /// task is stamped with its generation time.
    pub fn generate(&mut self, time_slice: f64, curr_time: f64) -> Vec<Task> {
        let rate = self.rate.draw(&mut self.rng);
        let count = Self::batch_size(rate, time_slice);
        let runtimes = self.runtime.draw_many(count, &mut self.rng);
        let io_times = self.io_time.draw_many(count, &mut self.rng);
        let payloads = self.payload.draw_many(count, &mut self.rng);

        let mut tasks = Vec::with_capacity(count);
        for ((runtime, io_time), payload) in runtimes.into_iter().zip(io_times).zip(payloads) {
            let mut task = Task::new(
                format!("#{}", self.next_id),
                runtime,
                io_time,
                payload.round() as u64,
            );
            task.gen_time = curr_time;
            self.next_id += 1;
            tasks.push(task);
        }
        if !tasks.is_empty() {
            tracing::debug!(count = tasks.len(), curr_time, "generated tasks");
        }
        tasks
    }
}

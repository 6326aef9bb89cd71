// SPDX-License-Identifier: Apache-2.0

//! Thread-safe queue and lock-step synchronization primitives.
//!
//! Every blocking wait in this crate carries a uniform 20-second ceiling.
//! Node workers cooperate only at a per-tick start event and a shared
//! barrier, so a wait that outlives the ceiling can only mean the lock-step
//! choreography is wedged; the expiry is surfaced as a typed dead-lock error
//! and is always fatal to the simulation run.

use std::time::Duration;

pub mod error;
pub mod queue;
pub mod sync;

pub use error::WaitError;
pub use queue::SharedQueue;
pub use sync::{TickBarrier, TickEvent};

/// Ceiling applied to every blocking wait before it is declared a dead-lock.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(20);

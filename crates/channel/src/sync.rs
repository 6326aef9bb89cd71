// SPDX-License-Identifier: Apache-2.0

//! Tick start event and tick barrier for the multi-threaded driver.
//!
//! One simulated tick is framed by three rendezvous points: the driver sets
//! the start event to release every node worker, then the whole group meets
//! at the barrier twice (once after the workers finish their slice, once
//! after the driver has routed the packets they produced). Both primitives
//! support poisoning so a participant that fails mid-tick releases everyone
//! else immediately instead of letting them run into the dead-lock ceiling.

use crate::WAIT_TIMEOUT;
use crate::error::WaitError;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A manually set/cleared event releasing workers into a tick.
pub struct TickEvent {
    state: Mutex<EventState>,
    cond: Condvar,
    timeout: Duration,
}

struct EventState {
    set: bool,
    poisoned: bool,
}

impl Default for TickEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl TickEvent {
    /// Creates a cleared event with the crate-wide dead-lock ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(WAIT_TIMEOUT)
    }

    /// Creates a cleared event with a custom wait ceiling.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(EventState {
                set: false,
                poisoned: false,
            }),
            cond: Condvar::new(),
            timeout,
        }
    }

    /// Sets the event, releasing every waiter.
    pub fn set(&self) {
        let mut state = self.state.lock();
        state.set = true;
        self.cond.notify_all();
    }

    /// Clears the event; subsequent waits block until the next `set`.
    pub fn clear(&self) {
        self.state.lock().set = false;
    }

    /// Poisons the event, failing every current and future wait.
    pub fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.cond.notify_all();
    }

    /// Blocks until the event is set.
    pub fn wait(&self) -> Result<(), WaitError> {
        let mut state = self.state.lock();
        loop {
            if state.poisoned {
                return Err(WaitError::Aborted {
                    primitive: "TickEvent",
                });
            }
            if state.set {
                return Ok(());
            }
            if self.cond.wait_for(&mut state, self.timeout).timed_out() {
                return Err(WaitError::Timeout {
                    primitive: "TickEvent",
                    timeout: self.timeout,
                });
            }
        }
    }
}

/// A reusable barrier for `parties` participants (node workers plus the
/// driver thread).
pub struct TickBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
    parties: usize,
    timeout: Duration,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

impl TickBarrier {
    /// Creates a barrier for `parties` participants with the crate-wide
    /// dead-lock ceiling.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        Self::with_timeout(parties, WAIT_TIMEOUT)
    }

    /// Creates a barrier for `parties` participants with a custom ceiling.
    #[must_use]
    pub fn with_timeout(parties: usize, timeout: Duration) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                poisoned: false,
            }),
            cond: Condvar::new(),
            parties,
            timeout,
        }
    }

    /// Number of participants the barrier waits for.
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Poisons the barrier, failing every current and future wait.
    pub fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.cond.notify_all();
    }

    /// Blocks until all participants have arrived.
    pub fn wait(&self) -> Result<(), WaitError> {
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(WaitError::Aborted {
                primitive: "TickBarrier",
            });
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cond.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation {
            if state.poisoned {
                return Err(WaitError::Aborted {
                    primitive: "TickBarrier",
                });
            }
            if self.cond.wait_for(&mut state, self.timeout).timed_out() {
                return Err(WaitError::Timeout {
                    primitive: "TickBarrier",
                    timeout: self.timeout,
                });
            }
        }
        Ok(())
    }
}

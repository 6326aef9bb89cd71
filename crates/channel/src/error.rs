// SPDX-License-Identifier: Apache-2.0

//! Errors for blocking waits.
//!
//! Important note: these errors cross thread boundaries when a node worker
//! reports back to the driver, so they must stay `Send + Sync`.

use std::time::Duration;

/// Errors that can occur while blocked on a queue condition, the tick start
/// event, or the tick barrier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The wait outlived the dead-lock ceiling.
    #[error("Dead-lock detected: timed out after {timeout:?} waiting on {primitive}")]
    Timeout {
        /// Human-readable name of the primitive that was waited on.
        primitive: &'static str,
        /// The ceiling that expired.
        timeout: Duration,
    },

    /// The primitive was poisoned by a participant that failed mid-tick.
    #[error("Wait on {primitive} aborted: a participant failed")]
    Aborted {
        /// Human-readable name of the primitive that was waited on.
        primitive: &'static str,
    },
}

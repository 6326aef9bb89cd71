// SPDX-License-Identifier: Apache-2.0

//! Node status snapshot broadcast to every peer once per tick.

use crate::packet::{Packet, PacketPayload};

/// Fixed wire size of a heartbeat packet, in bytes.
pub const HEARTBEAT_SIZE: u64 = 256;

/// A Malcolm node status snapshot.
///
/// Peers combine `queue_size` and `expected_performance` into a
/// queue-time-normalized load estimate when adjusting their accept/forward
/// policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heartbeat {
    /// Minimum of the remaining CPU and IO capacity fractions, each scaled
    /// by the pool's performance multiplier.
    pub expected_performance: f64,
    /// Sum of the CPU and IO queue lengths.
    pub queue_size: usize,
}

impl Heartbeat {
    /// Wraps this heartbeat in a network packet.
    #[must_use]
    pub fn into_packet(self, src: impl Into<String>, dest: impl Into<String>) -> Packet {
        Packet {
            payload: PacketPayload::Heartbeat(self),
            size: HEARTBEAT_SIZE,
            src: src.into(),
            dest: dest.into(),
        }
    }
}

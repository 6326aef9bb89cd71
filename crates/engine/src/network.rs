// SPDX-License-Identifier: Apache-2.0

//! Per-tick egress bandwidth shaper.

use crate::packet::Packet;

/// Throttles a node's outgoing packets to its configured egress bandwidth.
#[derive(Debug)]
pub struct Network {
    /// Egress bandwidth in bits per second.
    bandwidth: u64,
    /// Bits offered for transmission during the last tick.
    utilization: u64,
}

impl Network {
    /// Creates a shaper for an interface of `bandwidth` bits per second.
    #[must_use]
    pub fn new(bandwidth: u64) -> Self {
        Self {
            bandwidth,
            utilization: 0,
        }
    }

    /// Byte budget available during a tick of `time_slice` milliseconds.
    #[must_use]
    pub fn byte_budget(&self, time_slice: f64) -> u64 {
        ((self.bandwidth as f64 / 8.0) * (time_slice / 1000.0)) as u64
    }

    /// Shapes `packets` into `(sent, throttled)` for one tick.
    ///
    /// Packets are considered in offered order; one is admitted iff the
    /// running admitted byte total plus its size stays within the tick's
    /// byte budget, otherwise it is deferred. The throttled list preserves
    /// the offered order and belongs at the front of the next tick's
    /// transmit queue.
    pub fn shape(&mut self, time_slice: f64, packets: Vec<Packet>) -> (Vec<Packet>, Vec<Packet>) {
        let limit = self.byte_budget(time_slice);
        self.utilization = 8 * packets.iter().map(|p| p.size).sum::<u64>();

        let mut sent = Vec::new();
        let mut throttled = Vec::new();
        let mut admitted: u64 = 0;
        for packet in packets {
            if admitted + packet.size <= limit {
                admitted += packet.size;
                sent.push(packet);
            } else {
                throttled.push(packet);
            }
        }
        (sent, throttled)
    }

    /// Unutilized bandwidth of the interface in bits per second, based on
    /// the bits offered during the last tick.
    #[must_use]
    pub fn availability(&self) -> i64 {
        self.bandwidth as i64 - self.utilization as i64
    }
}

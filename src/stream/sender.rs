use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use super::packet::{Packet, PacketFlags};

// Sender configuration
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SenderConfig {
    /// Payload bytes per packet.
    pub chunk_size: usize,
    /// Frame rate hint for the convenience runner.
    pub fps: f64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self { chunk_size: 1800, fps: 10.0 }
    }
}

// Packet sink
//------------------------------------------------------------------------------

/// Receives emitted packets from [`Sender::run`]. Returning `false` from
/// `on_packet` stops the run cooperatively.
pub trait PacketSink {
    fn on_packet(&mut self, packet: &Packet) -> bool;

    /// Fired once when the transfer and the retransmit queue are exhausted.
    fn on_complete(&mut self) {}
}

impl<F: FnMut(&Packet) -> bool> PacketSink for F {
    fn on_packet(&mut self, packet: &Packet) -> bool {
        self(packet)
    }
}

// Sender
//------------------------------------------------------------------------------

/// Partitions a payload into framed packets and hands them out one tick at a
/// time, retransmissions first.
pub struct Sender {
    packets: Vec<Packet>,
    index: usize,
    retransmit: VecDeque<u16>,
    config: SenderConfig,
}

impl Sender {
    pub fn new(payload: &[u8], config: SenderConfig) -> Self {
        debug_assert!(config.chunk_size > 0, "Chunk size must be positive");

        let total = payload.len().div_ceil(config.chunk_size);
        let packets = payload
            .chunks(config.chunk_size)
            .enumerate()
            .map(|(i, chunk)| {
                let mut flags = PacketFlags::NONE;
                if i == 0 {
                    flags |= PacketFlags::FIRST;
                }
                if i + 1 == total {
                    flags |= PacketFlags::LAST;
                }
                Packet::new(
                    i as u16,
                    total as u16,
                    PacketFlags::new(flags),
                    Bytes::copy_from_slice(chunk),
                )
            })
            .collect();

        Self { packets, index: 0, retransmit: VecDeque::new(), config }
    }

    /// Number of packets in the transfer.
    pub fn total(&self) -> u16 {
        self.packets.len() as u16
    }

    /// Next packet to display: the retransmit queue drains before the
    /// monotonic index advances. `None` once both are exhausted.
    pub fn next(&mut self) -> Option<Packet> {
        while let Some(seq) = self.retransmit.pop_front() {
            if let Some(packet) = self.packets.get(seq as usize) {
                trace!(seq, "retransmitting");
                return Some(packet.clone());
            }
        }
        let packet = self.packets.get(self.index)?.clone();
        self.index += 1;
        Some(packet)
    }

    /// Queues sequences for retransmission, duplicates allowed. Unknown
    /// sequences are dropped when popped.
    pub fn request_retransmit(&mut self, seqs: &[u16]) {
        self.retransmit.extend(seqs);
    }

    /// Rewinds to the first packet and clears the retransmit queue.
    pub fn reset(&mut self) {
        self.index = 0;
        self.retransmit.clear();
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.packets.len() && self.retransmit.is_empty()
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.fps.max(0.001))
    }

    /// Convenience runner: emits packets at the configured frame rate until
    /// exhaustion, sleeping between frames. The core stays caller-driven
    /// through [`Sender::next`]; this loop is just the scheduled flavor.
    pub fn run<S: PacketSink>(&mut self, sink: &mut S) {
        let interval = self.frame_interval();
        while let Some(packet) = self.next() {
            if !sink.on_packet(&packet) {
                return;
            }
            if !self.is_exhausted() {
                std::thread::sleep(interval);
            }
        }
        sink.on_complete();
    }
}

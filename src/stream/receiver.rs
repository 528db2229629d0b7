use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use tracing::{debug, trace};

use super::packet::Packet;
use crate::common::error::Error;

// Receipt
//------------------------------------------------------------------------------

/// Outcome of feeding one frame to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// Data packet stored (or already present; duplicates are idempotent).
    Accepted { seq: u16 },
    /// Well-formed but not payload: control packets, or a total that
    /// contradicts the established one.
    Ignored { seq: u16 },
    /// Frame rejected outright.
    Rejected { reason: RejectReason, seq: Option<u16> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidMagic,
    Malformed,
    Checksum,
}

/// Snapshot handed to the progress callback after every newly stored packet.
#[derive(Debug, Clone)]
pub struct Progress {
    pub received: usize,
    pub total: u16,
    pub missing: Vec<u16>,
}

type ProgressFn = Box<dyn FnMut(&Progress)>;
type CompleteFn = Box<dyn FnMut(&[u8])>;

// Receiver
//------------------------------------------------------------------------------

/// Reassembles a packet stream fed one frame at a time. Each `on_frame`
/// call is a complete transaction; state lives until `reset`.
#[derive(Default)]
pub struct Receiver {
    packets: BTreeMap<u16, Bytes>,
    total: Option<u16>,
    checksum_errors: BTreeSet<u16>,
    completed: bool,
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress callback, fired after each newly stored packet and always
    /// before the completion callback.
    pub fn on_progress(&mut self, f: impl FnMut(&Progress) + 'static) -> &mut Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Completion callback with the reassembled payload; fires at most once
    /// per session.
    pub fn on_complete(&mut self, f: impl FnMut(&[u8]) + 'static) -> &mut Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Parses one captured frame and folds it into the session.
    pub fn on_frame(&mut self, frame: &[u8]) -> Receipt {
        let packet = match Packet::decode(frame) {
            Ok(p) => p,
            Err(Error::InvalidMagic(_)) => {
                return Receipt::Rejected { reason: RejectReason::InvalidMagic, seq: None }
            }
            Err(Error::ChecksumMismatch { seq, .. }) => {
                debug!(seq, "checksum mismatch");
                if !self.packets.contains_key(&seq) {
                    self.checksum_errors.insert(seq);
                }
                return Receipt::Rejected { reason: RejectReason::Checksum, seq: Some(seq) };
            }
            Err(_) => return Receipt::Rejected { reason: RejectReason::Malformed, seq: None },
        };

        if !packet.flags.is_data() {
            trace!(seq = packet.seq, "ignoring control packet");
            return Receipt::Ignored { seq: packet.seq };
        }

        // The first good packet pins the transfer length
        let total = *self.total.get_or_insert(packet.total);
        if packet.total != total || packet.seq >= total {
            return Receipt::Ignored { seq: packet.seq };
        }

        let seq = packet.seq;
        if self.packets.contains_key(&seq) {
            return Receipt::Accepted { seq };
        }

        self.checksum_errors.remove(&seq);
        self.packets.insert(seq, packet.payload);
        trace!(seq, received = self.packets.len(), total, "packet stored");

        if let Some(f) = self.on_progress.as_mut() {
            let progress = Progress {
                received: self.packets.len(),
                total,
                missing: missing_of(&self.packets, total),
            };
            f(&progress);
        }

        if self.packets.len() == total as usize && !self.completed {
            self.completed = true;
            debug!(total, "transfer complete");
            if let Some(f) = self.on_complete.as_mut() {
                let payload = assemble(&self.packets);
                f(&payload);
            }
        }

        Receipt::Accepted { seq }
    }

    pub fn received(&self) -> usize {
        self.packets.len()
    }

    pub fn total(&self) -> Option<u16> {
        self.total
    }

    /// Sequences recorded as checksum failures and still outstanding.
    pub fn checksum_errors(&self) -> Vec<u16> {
        self.checksum_errors.iter().copied().collect()
    }

    /// Every sequence in [0, total) not yet received.
    pub fn missing_sequences(&self) -> Vec<u16> {
        match self.total {
            Some(total) => missing_of(&self.packets, total),
            None => Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(t) if self.packets.len() == t as usize)
    }

    /// Payload concatenated in ascending sequence order, once complete.
    pub fn payload(&self) -> Option<Vec<u8>> {
        self.is_complete().then(|| assemble(&self.packets))
    }

    /// Drops all session state; callbacks stay installed.
    pub fn reset(&mut self) {
        self.packets.clear();
        self.total = None;
        self.checksum_errors.clear();
        self.completed = false;
    }
}

fn missing_of(packets: &BTreeMap<u16, Bytes>, total: u16) -> Vec<u16> {
    (0..total).filter(|seq| !packets.contains_key(seq)).collect()
}

fn assemble(packets: &BTreeMap<u16, Bytes>) -> Vec<u8> {
    let len = packets.values().map(Bytes::len).sum();
    let mut payload = Vec::with_capacity(len);
    for chunk in packets.values() {
        payload.extend_from_slice(chunk);
    }
    payload
}

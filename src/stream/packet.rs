use bytes::{BufMut, Bytes, BytesMut};

use crate::common::error::{Error, Result};

// Wire constants
//------------------------------------------------------------------------------

/// Leading bytes of every packet.
pub const PACKET_MAGIC: &[u8; 2] = b"QS";

/// magic (2) + seq (2) + total (2) + flags (1) + crc16 (2)
pub const HEADER_SIZE: usize = 9;

// Packet flags
//------------------------------------------------------------------------------

/// Single-byte flag set carried in every packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// No flags set
    pub const NONE: u8 = 0b0000_0000;

    /// First packet of a transfer
    pub const FIRST: u8 = 0b0000_0001;

    /// Last packet of a transfer
    pub const LAST: u8 = 0b0000_0010;

    /// Control packet requesting retransmission
    pub const RETRANSMIT: u8 = 0b0000_0100;

    /// Control packet acknowledging receipt
    pub const ACK: u8 = 0b0000_1000;

    pub const fn new(flags: u8) -> Self {
        Self(flags)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    pub const fn is_first(&self) -> bool {
        (self.0 & Self::FIRST) != 0
    }

    pub const fn is_last(&self) -> bool {
        (self.0 & Self::LAST) != 0
    }

    pub const fn is_retransmit(&self) -> bool {
        (self.0 & Self::RETRANSMIT) != 0
    }

    pub const fn is_ack(&self) -> bool {
        (self.0 & Self::ACK) != 0
    }

    /// Whether the packet carries transfer payload rather than control
    /// signaling.
    pub const fn is_data(&self) -> bool {
        !self.is_retransmit() && !self.is_ack()
    }
}

// CRC-16/CCITT-FALSE
//------------------------------------------------------------------------------

/// Polynomial 0x1021, initial 0xFFFF, no reflection, no final XOR.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

// Packet
//------------------------------------------------------------------------------

/// One wire packet: `magic | seq | total | flags | crc16 | payload`, all
/// multi-byte integers big-endian, CRC over the payload only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: u16,
    pub total: u16,
    pub flags: PacketFlags,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(seq: u16, total: u16, flags: PacketFlags, payload: Bytes) -> Self {
        Self { seq, total, flags, payload }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_slice(PACKET_MAGIC);
        buf.put_u16(self.seq);
        buf.put_u16(self.total);
        buf.put_u8(self.flags.as_u8());
        buf.put_u16(crc16(&self.payload));
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(Error::MalformedFrame("frame shorter than packet header"));
        }
        if &frame[..2] != PACKET_MAGIC {
            return Err(Error::InvalidMagic([frame[0], frame[1]]));
        }

        let seq = u16::from_be_bytes([frame[2], frame[3]]);
        let total = u16::from_be_bytes([frame[4], frame[5]]);
        let flags = PacketFlags::new(frame[6]);
        let stored_crc = u16::from_be_bytes([frame[7], frame[8]]);
        let payload = &frame[HEADER_SIZE..];

        let actual = crc16(payload);
        if actual != stored_crc {
            return Err(Error::ChecksumMismatch { seq, expected: stored_crc, actual });
        }

        Ok(Self { seq, total, flags, payload: Bytes::copy_from_slice(payload) })
    }
}

// Retransmit signaling
//------------------------------------------------------------------------------

/// A NACK is a packet of its own: zero seq and total, the RETRANSMIT flag,
/// and a payload of comma-joined decimal sequence numbers.
pub fn create_nack(seqs: &[u16]) -> Packet {
    let list = seqs.iter().map(u16::to_string).collect::<Vec<_>>().join(",");
    Packet::new(0, 0, PacketFlags::new(PacketFlags::RETRANSMIT), Bytes::from(list))
}

/// Parses the sequence list out of a NACK packet. The payload is decoded as
/// UTF-8 at this boundary; anything else is a malformed frame.
pub fn parse_nack(packet: &Packet) -> Result<Vec<u16>> {
    if !packet.flags.is_retransmit() {
        return Err(Error::MalformedFrame("not a retransmit packet"));
    }
    let text = std::str::from_utf8(&packet.payload)
        .map_err(|_| Error::MalformedFrame("NACK payload is not UTF-8"))?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|s| s.trim().parse::<u16>().map_err(|_| Error::MalformedFrame("bad NACK number")))
        .collect()
}

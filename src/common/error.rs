use thiserror::Error;

use super::metadata::ECLevel;

// Error
//------------------------------------------------------------------------------

/// Errors surfaced by the encoder, decoder and stream layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Encoder was handed an empty payload
    #[error("empty data")]
    EmptyData,

    /// Payload does not fit any version up to 40 at the requested EC level
    #[error("payload of {len} bytes exceeds version 40 capacity at EC level {ec_level:?}")]
    PayloadTooLarge { len: usize, ec_level: ECLevel },

    /// Decoder hit a segment mode it does not implement
    #[error("unsupported segment mode {mode:#06b}")]
    Unsupported { mode: u8 },

    /// Decoder could not make sense of the captured frame
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// Stream packet payload failed its CRC check
    #[error("checksum mismatch on packet {seq}: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { seq: u16, expected: u16, actual: u16 },

    /// Stream frame does not start with the packet magic
    #[error("invalid packet magic: {0:?}")]
    InvalidMagic([u8; 2]),
}

pub type Result<T> = std::result::Result<T, Error>;

//! # qrstream
//!
//! A self-contained toolkit for moving byte payloads across an air gap of
//! pixels: encode payloads into ISO/IEC 18004 QR symbols, decode symbols
//! back out of raw image buffers, and stream payloads too large for one
//! symbol as a packetized sequence of codes.
//!
//! ## Modules
//!
//! - [`builder`]: QR encoding — capacity selection, Reed-Solomon EC, block
//!   interleaving, mask selection by penalty scoring, module placement
//! - [`reader`]: QR decoding — adaptive binarization, finder localization,
//!   grid sampling, format extraction, bit-stream decoding
//! - [`stream`]: the packet protocol — framing, CRC-16, sequencing,
//!   retransmits, reassembly
//!
//! ## Quick start
//!
//! ```
//! use qrstream::{ECLevel, QRBuilder, QRReader};
//!
//! let qr = QRBuilder::new(b"HELLO WORLD").ec_level(ECLevel::M).build().unwrap();
//! let (pixels, w, h) = qr.to_rgba(4);
//! assert_eq!(QRReader::decode(&pixels, w, h).unwrap(), b"HELLO WORLD");
//! ```

pub mod builder;
mod common;
pub mod reader;
pub mod stream;

pub use builder::{QRBuilder, Qr};
pub use common::bitstream::BitStream;
pub use common::ec;
pub use common::error::{Error, Result};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Version};
pub use reader::QRReader;

/// Encodes `data` into a symbol at the smallest version that fits it.
pub fn encode(data: &[u8], ec_level: ECLevel) -> Result<Qr> {
    QRBuilder::new(data).ec_level(ec_level).build()
}

/// Decodes the symbol in an RGBA8 buffer; `None` on any failure.
pub fn decode(pixels: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    QRReader::decode(pixels, width, height)
}

use tracing::debug;

use super::bitstream::BitStream;
use super::error::{Error, Result};
use super::metadata::{ECLevel, Version};

// Segment modes
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    Byte = 0b0100,
}

pub(crate) const TERMINATOR_BITS: usize = 4;

pub(crate) const PADDING_CODEWORDS: [u8; 2] = [0xEC, 0x11];

static ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

// Encoder
//------------------------------------------------------------------------------

/// Encodes `data` as a single byte-mode segment at the smallest version that
/// fits it, padded out to the exact data-codeword capacity.
pub fn encode(data: &[u8], ec_level: ECLevel) -> Result<(BitStream, Version)> {
    let version = find_smallest_version(data.len(), ec_level)?;
    debug!(version = *version, len = data.len(), "selected version");
    Ok((encode_with_version(data, ec_level, version)?, version))
}

pub fn encode_with_version(
    data: &[u8],
    ec_level: ECLevel,
    version: Version,
) -> Result<BitStream> {
    if data.is_empty() {
        return Err(Error::EmptyData);
    }
    if required_bits(data.len(), version) > version.data_bit_capacity(ec_level) {
        return Err(Error::PayloadTooLarge { len: data.len(), ec_level });
    }

    let capacity = version.data_bit_capacity(ec_level);
    let mut bs = BitStream::new(capacity);

    bs.push_bits(Mode::Byte as u8, 4);
    let count_bits = version.char_count_bits(Mode::Byte);
    bs.push_bits(data.len() as u16, count_bits);
    for &b in data {
        bs.push_bits(b, 8);
    }

    push_terminator(&mut bs);
    pad_remaining_capacity(&mut bs);
    Ok(bs)
}

/// Bits a byte-mode payload occupies at this version, terminator included.
fn required_bits(len: usize, version: Version) -> usize {
    4 + version.char_count_bits(Mode::Byte) + 8 * len + TERMINATOR_BITS
}

fn find_smallest_version(len: usize, ec_level: ECLevel) -> Result<Version> {
    for v in 1..=40 {
        let version = Version::new(v);
        if required_bits(len, version) <= version.data_bit_capacity(ec_level) {
            return Ok(version);
        }
    }
    Err(Error::PayloadTooLarge { len, ec_level })
}

// Up to four zero bits, truncated if capacity is reached.
fn push_terminator(out: &mut BitStream) {
    let remaining = out.capacity() - out.len();
    out.push_bits(0u8, remaining.min(TERMINATOR_BITS));
}

fn pad_remaining_capacity(out: &mut BitStream) {
    let offset = out.len() & 7;
    if offset > 0 {
        out.push_bits(0u8, 8 - offset);
    }

    let remaining_codewords = (out.capacity() - out.len()) >> 3;
    PADDING_CODEWORDS.iter().copied().cycle().take(remaining_codewords).for_each(|pc| {
        out.push_bits(pc, 8);
    });
}

// Decoder
//------------------------------------------------------------------------------

/// Parses mode segments out of a rectified data-codeword stream until the
/// terminator or exhaustion. Rejects any mode outside
/// numeric/alphanumeric/byte.
pub fn decode(encoded: &mut BitStream, version: Version) -> Result<Vec<u8>> {
    let mut res = Vec::with_capacity(encoded.len() >> 3);
    loop {
        let mode = match encoded.take_bits(4) {
            // Truncated terminators are legal near the end of the stream
            Some(0b0000) | None => break,
            Some(m) => m as u8,
        };
        let mode = match mode {
            0b0001 => Mode::Numeric,
            0b0010 => Mode::Alphanumeric,
            0b0100 => Mode::Byte,
            _ => return Err(Error::Unsupported { mode }),
        };
        let count_bits = version.char_count_bits(mode);
        let char_count = encoded
            .take_bits(count_bits)
            .ok_or(Error::MalformedFrame("truncated segment header"))? as usize;
        match mode {
            Mode::Numeric => take_numeric_data(encoded, char_count, &mut res)?,
            Mode::Alphanumeric => take_alphanumeric_data(encoded, char_count, &mut res)?,
            Mode::Byte => take_byte_data(encoded, char_count, &mut res)?,
        }
    }
    Ok(res)
}

fn take_numeric_data(inp: &mut BitStream, mut char_count: usize, out: &mut Vec<u8>) -> Result<()> {
    while char_count > 0 {
        let digits = char_count.min(3);
        let bit_len = match digits {
            3 => 10,
            2 => 7,
            _ => 4,
        };
        let chunk = inp.take_bits(bit_len).ok_or(Error::MalformedFrame("truncated numeric"))?;
        let mut rev = [0u8; 3];
        let mut value = chunk;
        for slot in rev.iter_mut().take(digits) {
            *slot = b'0' + (value % 10) as u8;
            value /= 10;
        }
        if value != 0 {
            return Err(Error::MalformedFrame("numeric group out of range"));
        }
        out.extend(rev[..digits].iter().rev());
        char_count -= digits;
    }
    Ok(())
}

fn take_alphanumeric_data(
    inp: &mut BitStream,
    mut char_count: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    while char_count > 0 {
        let chars = char_count.min(2);
        let bit_len = if chars == 2 { 11 } else { 6 };
        let chunk = inp
            .take_bits(bit_len)
            .ok_or(Error::MalformedFrame("truncated alphanumeric"))? as usize;
        if chars == 2 {
            let (hi, lo) = (chunk / 45, chunk % 45);
            if hi >= 45 {
                return Err(Error::MalformedFrame("alphanumeric pair out of range"));
            }
            out.push(ALPHANUMERIC_CHARSET[hi]);
            out.push(ALPHANUMERIC_CHARSET[lo]);
        } else {
            if chunk >= 45 {
                return Err(Error::MalformedFrame("alphanumeric char out of range"));
            }
            out.push(ALPHANUMERIC_CHARSET[chunk]);
        }
        char_count -= chars;
    }
    Ok(())
}

fn take_byte_data(inp: &mut BitStream, char_count: usize, out: &mut Vec<u8>) -> Result<()> {
    for _ in 0..char_count {
        let byte = inp.take_bits(8).ok_or(Error::MalformedFrame("truncated byte data"))?;
        out.push(byte as u8);
    }
    Ok(())
}

#[cfg(test)]
mod codec_tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_byte_mode_header() {
        let data = "HELLO WORLD".as_bytes();
        let bs = encode_with_version(data, ECLevel::M, Version::new(1)).unwrap();
        // 0100 | 0000 1011 | 0100 1000 ('H') ...
        assert_eq!(&bs.data()[..3], &[0b0100_0000, 0b1011_0100, 0b1000_0100]);
    }

    #[test]
    fn test_padding_codewords() {
        let bs = encode_with_version(b"ab", ECLevel::L, Version::new(1)).unwrap();
        // 19 data codewords: 4 + 8 + 16 bits of segment, 4 terminator bits,
        // then alternating padding
        assert_eq!(bs.len(), 19 * 8);
        assert_eq!(&bs.data()[4..8], &[0xEC, 0x11, 0xEC, 0x11]);
    }

    #[test]
    fn test_terminator_truncated_at_capacity() {
        // 17 bytes exactly fills version 1-L: 4 + 8 + 136 = 148 of 152 bits,
        // leaving the full terminator; 18 bytes must not fit.
        let full = encode_with_version(&[0xAB; 17], ECLevel::L, Version::new(1)).unwrap();
        assert_eq!(full.len(), 152);
        assert!(encode_with_version(&[0xAB; 18], ECLevel::L, Version::new(1)).is_err());
    }

    #[test_case(1, ECLevel::L, Version::new(1))]
    #[test_case(17, ECLevel::L, Version::new(1))]
    #[test_case(18, ECLevel::L, Version::new(2))]
    #[test_case(100, ECLevel::L, Version::new(5))]
    #[test_case(100, ECLevel::H, Version::new(10))]
    #[test_case(2953, ECLevel::L, Version::new(40))]
    fn test_find_smallest_version(len: usize, ecl: ECLevel, expected: Version) {
        assert_eq!(find_smallest_version(len, ecl).unwrap(), expected);
    }

    #[test]
    fn test_find_smallest_version_overflow() {
        assert_eq!(
            find_smallest_version(2954, ECLevel::L),
            Err(Error::PayloadTooLarge { len: 2954, ec_level: ECLevel::L })
        );
    }

    #[test]
    fn test_decode_byte_roundtrip() {
        let data = b"stream me through a camera";
        let ver = Version::new(2);
        let mut bs = encode_with_version(data, ECLevel::L, ver).unwrap();
        assert_eq!(decode(&mut bs, ver).unwrap(), data);
    }

    #[test]
    fn test_decode_numeric() {
        let ver = Version::new(1);
        let mut bs = BitStream::new(64);
        bs.push_bits(Mode::Numeric as u8, 4);
        bs.push_bits(8u16, 10);
        // "01234567" in groups of 3-3-2
        bs.push_bits(0b0000001100u16, 10);
        bs.push_bits(0b0101011001u16, 10);
        bs.push_bits(0b1000011u8, 7);
        bs.push_bits(0u8, 4);
        assert_eq!(decode(&mut bs, ver).unwrap(), b"01234567");
    }

    #[test]
    fn test_decode_alphanumeric() {
        let ver = Version::new(1);
        let mut bs = BitStream::new(64);
        bs.push_bits(Mode::Alphanumeric as u8, 4);
        bs.push_bits(5u16, 9);
        // "AC-42" in pairs of 11 bits and a 6-bit tail
        bs.push_bits(0b00111001110u16, 11);
        bs.push_bits(0b11100111001u16, 11);
        bs.push_bits(0b000010u8, 6);
        bs.push_bits(0u8, 4);
        assert_eq!(decode(&mut bs, ver).unwrap(), b"AC-42");
    }

    #[test]
    fn test_decode_mixed_segments() {
        let ver = Version::new(1);
        let mut bs = BitStream::new(128);
        bs.push_bits(Mode::Byte as u8, 4);
        bs.push_bits(2u16, 8);
        bs.push_bits(b'o', 8);
        bs.push_bits(b'k', 8);
        bs.push_bits(Mode::Numeric as u8, 4);
        bs.push_bits(2u16, 10);
        bs.push_bits(42u8, 7);
        bs.push_bits(0u8, 4);
        assert_eq!(decode(&mut bs, ver).unwrap(), b"ok42");
    }

    #[test]
    fn test_decode_rejects_unknown_mode() {
        let ver = Version::new(1);
        let mut bs = BitStream::new(16);
        // Kanji mode
        bs.push_bits(0b1000u8, 4);
        assert_eq!(decode(&mut bs, ver), Err(Error::Unsupported { mode: 0b1000 }));
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let ver = Version::new(1);
        let mut bs = BitStream::new(64);
        bs.push_bits(Mode::Byte as u8, 4);
        bs.push_bits(1u16, 8);
        bs.push_bits(b'x', 8);
        bs.push_bits(0u8, 4);
        // Padding after the terminator must not be interpreted
        bs.push_bits(0xECu8, 8);
        bs.push_bits(0x11u8, 8);
        assert_eq!(decode(&mut bs, ver).unwrap(), b"x");
    }
}

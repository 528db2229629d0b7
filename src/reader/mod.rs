mod binarize;
mod finder;
mod geometry;
mod sample;

use image::GrayImage;
use tracing::debug;

use binarize::BinaryImage;
use finder::{locate_finders, order_finders};
use geometry::Point;
use sample::SampledGrid;

use crate::common::{
    bitstream::BitStream,
    codec,
    error::{Error, Result},
    metadata::Version,
};

// QR reader
//------------------------------------------------------------------------------

/// Decodes QR symbols out of raw image buffers.
///
/// Every entry point recovers from malformed input by returning `None`;
/// nothing here panics on garbage frames.
pub struct QRReader;

impl QRReader {
    /// Decodes the symbol in an RGBA8 interleaved buffer, top-left origin,
    /// `4 * width * height` bytes.
    pub fn decode(pixels: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
        let img = BinaryImage::from_rgba(pixels, width, height)?;
        Self::detect(&img).ok()
    }

    /// Decodes the symbol in a grayscale image.
    pub fn decode_image(img: &GrayImage) -> Option<Vec<u8>> {
        let img = BinaryImage::from_gray(img);
        Self::detect(&img).ok()
    }

    /// Decodes a module matrix directly, skipping image processing. The
    /// matrix must be square with a valid symbol width.
    pub fn decode_modules(modules: &[Vec<bool>]) -> Option<Vec<u8>> {
        let version = Version::from_width(modules.len())?;
        if modules.iter().any(|row| row.len() != modules.len()) {
            return None;
        }
        let grid = SampledGrid::from_modules(modules, version);
        Self::decode_grid(&grid, version).ok()
    }

    fn detect(img: &BinaryImage) -> Result<Vec<u8>> {
        let finders = locate_finders(img);
        debug!(count = finders.len(), "located finder candidates");
        if finders.len() < 3 {
            return Err(Error::MalformedFrame("fewer than three finder patterns"));
        }

        let ([tl, tr, bl], module_size) =
            order_finders(finders).ok_or(Error::MalformedFrame("degenerate finder geometry"))?;

        // Estimated modules between finder centers, plus the 7 outside them
        let est_width = (tl.dist(&tr) / module_size).round() as i64 + 7;
        let est_version = ((est_width - 17 + 2) / 4).clamp(1, 40) as usize;
        debug!(est_width, est_version, "estimated geometry");

        let mut err = Error::MalformedFrame("no version candidate decoded");
        for v in version_candidates(est_version) {
            match Self::decode_at(img, &tl, &tr, &bl, v) {
                Ok(payload) => return Ok(payload),
                Err(e) => err = e,
            }
        }
        Err(err)
    }

    // Samples at the candidate version; for version 7 and up the recovered
    // version-info bits override the finder-distance estimate.
    fn decode_at(
        img: &BinaryImage,
        tl: &Point,
        tr: &Point,
        bl: &Point,
        version: Version,
    ) -> Result<Vec<u8>> {
        let grid = SampledGrid::sample(img, tl, tr, bl, version);
        if *version >= 7 {
            let actual = grid.read_version_info()?;
            if actual != version {
                debug!(estimated = *version, actual = *actual, "version info overrides estimate");
                let resampled = SampledGrid::sample(img, tl, tr, bl, actual);
                return Self::decode_grid(&resampled, actual);
            }
        }
        Self::decode_grid(&grid, version)
    }

    fn decode_grid(grid: &SampledGrid, version: Version) -> Result<Vec<u8>> {
        let (ec_level, mask) = grid.read_format_info()?;
        debug!(version = *version, ec_level = ?ec_level, mask = *mask, "reading symbol");

        let codewords = grid.extract_codewords(mask);
        let data = Self::deinterleave(
            &codewords,
            version.data_codewords_per_block(ec_level),
            version.ecc_per_block(ec_level),
        );

        codec::decode(&mut BitStream::from_bytes(&data), version)
    }

    // Undoes the block interleaving and returns the data codewords in
    // original order. EC codewords are parsed out but dropped; this path
    // reads clean symbols and performs no correction.
    fn deinterleave(
        codewords: &[u8],
        block_info: (usize, usize, usize, usize),
        ec_len: usize,
    ) -> Vec<u8> {
        let (b1s, b1c, b2s, b2c) = block_info;
        let total_blocks = b1c + b2c;
        let split = b1s * total_blocks;
        let data_size = b1s * b1c + b2s * b2c;
        debug_assert!(
            codewords.len() == data_size + total_blocks * ec_len,
            "Codeword stream doesn't match block structure"
        );

        let mut blocks = vec![Vec::with_capacity(b2s.max(b1s)); total_blocks];
        codewords[..split]
            .chunks(total_blocks)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, &v)| blocks[i].push(v)));
        if b2c > 0 {
            codewords[split..data_size]
                .chunks(b2c)
                .for_each(|ch| ch.iter().enumerate().for_each(|(i, &v)| blocks[b1c + i].push(v)));
        }

        blocks.into_iter().flatten().collect()
    }
}

// The finder-distance estimate can be off by a couple of modules on noisy
// captures, which lands within one version either side.
fn version_candidates(est: usize) -> impl Iterator<Item = Version> {
    [Some(est), est.checked_sub(1).filter(|&v| v >= 1), Some(est + 1).filter(|&v| v <= 40)]
        .into_iter()
        .flatten()
        .map(Version::new)
}

use super::binarize::BinaryImage;
use super::geometry::Point;
use crate::builder::{Module, Qr};
use crate::common::{
    bitstream::BitStream,
    error::{Error, Result},
    iter::EncRegionIter,
    mask::{mask_bit, MaskPattern},
    metadata::{
        parse_format_index, ECLevel, Version, FORMAT_INFOS, FORMAT_INFO_COORDS_MAIN,
        FORMAT_INFO_COORDS_SIDE, VERSION_INFOS, VERSION_INFO_COORDS_BL, VERSION_INFO_COORDS_TR,
    },
};

// Sampled grid
//------------------------------------------------------------------------------

/// Module matrix lifted out of a binarized frame, or fed in directly as a
/// bit matrix.
pub(crate) struct SampledGrid {
    version: Version,
    width: usize,
    bits: Vec<bool>,
}

impl SampledGrid {
    /// Samples every module through the affine frame spanned by the three
    /// finder centers. The finder centers sit at module (3.5, 3.5) from
    /// their corners, so the module origin is TL - 3.5*dR - 3.5*dD.
    pub fn sample(img: &BinaryImage, tl: &Point, tr: &Point, bl: &Point, version: Version) -> Self {
        let width = version.width();
        let span = (width - 7) as f64;
        let dr = ((tr.x - tl.x) / span, (tr.y - tl.y) / span);
        let dd = ((bl.x - tl.x) / span, (bl.y - tl.y) / span);
        let origin = (tl.x - 3.5 * (dr.0 + dd.0), tl.y - 3.5 * (dr.1 + dd.1));

        let mut bits = vec![false; width * width];
        for r in 0..width {
            for c in 0..width {
                let x = origin.0 + (c as f64 + 0.5) * dr.0 + (r as f64 + 0.5) * dd.0;
                let y = origin.1 + (c as f64 + 0.5) * dr.1 + (r as f64 + 0.5) * dd.1;
                bits[r * width + c] = img.dark(x.round() as i32, y.round() as i32);
            }
        }
        Self { version, width, bits }
    }

    /// Wraps an already-materialized module matrix.
    pub fn from_modules(modules: &[Vec<bool>], version: Version) -> Self {
        let width = version.width();
        debug_assert!(modules.len() == width, "Matrix height doesn't match version");
        let mut bits = Vec::with_capacity(width * width);
        for row in modules {
            debug_assert!(row.len() == width, "Matrix width doesn't match version");
            bits.extend_from_slice(row);
        }
        Self { version, width, bits }
    }

    /// Module at `(r, c)`; negative indices wrap to the far edge.
    pub fn get(&self, r: i16, c: i16) -> bool {
        let w = self.width as i16;
        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        self.bits[(r * w + c) as usize]
    }

    fn read_number(&self, coords: &[(i16, i16)]) -> u32 {
        coords.iter().fold(0, |acc, &(r, c)| (acc << 1) | self.get(r, c) as u32)
    }
}

// Format extraction
//------------------------------------------------------------------------------

const FORMAT_ERROR_CAPACITY: u32 = 3;
const VERSION_ERROR_CAPACITY: u32 = 3;

impl SampledGrid {
    /// Reads both format copies and rectifies against the 32 canonical
    /// format words, keeping whichever copy lands closer. The BCH(15, 5)
    /// distance bound allows up to three bit errors.
    pub fn read_format_info(&self) -> Result<(ECLevel, MaskPattern)> {
        let main = self.read_number(&FORMAT_INFO_COORDS_MAIN) as u16;
        let side = self.read_number(&FORMAT_INFO_COORDS_SIDE) as u16;

        [main, side]
            .iter()
            .filter_map(|&raw| rectify_format(raw))
            .min_by_key(|&(dist, _)| dist)
            .map(|(_, index)| {
                let (ec_level, mask) = parse_format_index(index);
                (ec_level, MaskPattern::new(mask))
            })
            .ok_or(Error::MalformedFrame("no plausible format info"))
    }

    /// Recovers the version from the two 18-bit version-info blocks, for
    /// symbols version 7 and up.
    pub fn read_version_info(&self) -> Result<Version> {
        debug_assert!(*self.version >= 7, "Version info only exists for versions 7 and above");
        let bl = self.read_number(&VERSION_INFO_COORDS_BL);
        let tr = self.read_number(&VERSION_INFO_COORDS_TR);

        [bl, tr]
            .iter()
            .filter_map(|&raw| rectify_version(raw))
            .min_by_key(|&(dist, _)| dist)
            .map(|(_, version)| version)
            .ok_or(Error::MalformedFrame("no plausible version info"))
    }
}

fn rectify_format(raw: u16) -> Option<(u32, usize)> {
    let (index, dist) = FORMAT_INFOS
        .iter()
        .enumerate()
        .map(|(i, &word)| (i, (raw ^ word).count_ones()))
        .min_by_key(|&(_, dist)| dist)?;
    (dist <= FORMAT_ERROR_CAPACITY).then_some((dist, index))
}

fn rectify_version(raw: u32) -> Option<(u32, Version)> {
    let (v, dist) = VERSION_INFOS
        .iter()
        .enumerate()
        .map(|(i, &word)| (i + 7, (raw ^ word).count_ones()))
        .min_by_key(|&(_, dist)| dist)?;
    (dist <= VERSION_ERROR_CAPACITY).then_some((dist, Version::new(v)))
}

// Payload extraction
//------------------------------------------------------------------------------

impl SampledGrid {
    /// Demasks and reads the interleaved codeword stream through the same
    /// zigzag walk and reservation map the writer used.
    pub fn extract_codewords(&self, mask: MaskPattern) -> Vec<u8> {
        let reservation = Qr::function_map(self.version);
        let total_bits = self.version.total_codewords() * 8;

        let mut bs = BitStream::new(total_bits);
        for (r, c) in EncRegionIter::new(self.version) {
            if bs.len() == total_bits {
                break;
            }
            if matches!(reservation.get(r, c), Module::Empty) {
                bs.push(self.get(r, c) ^ mask_bit(mask, r, c));
            }
        }
        bs.data().to_vec()
    }
}

mod qr;

pub use qr::Qr;
pub(crate) use qr::Module;

use std::ops::Deref;

use tracing::debug;

use crate::common::{
    codec::{encode, encode_with_version},
    ec::rs_encode,
    error::{Error, Result},
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
};

// QR builder
//------------------------------------------------------------------------------

/// Builds a QR symbol from a byte payload.
///
/// ```
/// use qrstream::{ECLevel, QRBuilder};
///
/// let qr = QRBuilder::new(b"HELLO WORLD").ec_level(ECLevel::M).build().unwrap();
/// assert_eq!(*qr.version(), 1);
/// ```
pub struct QRBuilder<'a> {
    data: &'a [u8],
    version: Option<Version>,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, version: None, ec_level: ECLevel::M, mask: None }
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = data;
        self
    }

    /// Pins the version instead of selecting the smallest that fits.
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    /// Pins the mask pattern instead of selecting by penalty score.
    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn build(&self) -> Result<Qr> {
        if self.data.is_empty() {
            return Err(Error::EmptyData);
        }

        let (encoded, version) = match self.version {
            Some(v) => (encode_with_version(self.data, self.ec_level, v)?, v),
            None => encode(self.data, self.ec_level)?,
        };

        debug!(version = *version, ec_level = ?self.ec_level, "constructing payload");
        let payload = Self::interleaved_payload(encoded.data(), version, self.ec_level);

        let mut qr = Qr::new(version, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&payload);

        let mask = match self.mask {
            Some(m) => {
                qr.mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };
        debug!(mask = *mask, dark = qr.count_dark_modules(), "symbol finished");

        Ok(qr)
    }

    // Splits the data codewords into blocks, computes EC per block and
    // interleaves both halves into the placement order.
    fn interleaved_payload(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<u8> {
        let data_blocks = Self::blockify(data, version, ec_level);

        let ec_len = version.ecc_per_block(ec_level);
        let ec_blocks = data_blocks.iter().map(|b| rs_encode(b, ec_len)).collect::<Vec<_>>();

        let mut payload = Vec::with_capacity(version.total_codewords());
        payload.extend(Self::interleave(&data_blocks));
        payload.extend(Self::interleave(&ec_blocks));
        payload
    }

    pub(crate) fn blockify<'b>(
        data: &'b [u8],
        version: Version,
        ec_level: ECLevel,
    ) -> Vec<&'b [u8]> {
        let (block1_size, block1_count, block2_size, block2_count) =
            version.data_codewords_per_block(ec_level);

        let total_block1_size = block1_size * block1_count;
        let total_size = total_block1_size + block2_size * block2_count;

        debug_assert!(
            total_size == data.len(),
            "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
            data.len(),
            total_size
        );

        let mut blocks = Vec::with_capacity(block1_count + block2_count);
        blocks.extend(data[..total_block1_size].chunks(block1_size));
        if block2_size > 0 {
            blocks.extend(data[total_block1_size..].chunks(block2_size));
        }
        blocks
    }

    // Emits position i of every block that has one, for i = 0.. max block
    // size.
    pub(crate) fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
        let max_block_size = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
        let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
        let mut res = Vec::with_capacity(total_size);
        for i in 0..max_block_size {
            for b in blocks {
                if i < b.len() {
                    res.push(b[i]);
                }
            }
        }
        res
    }
}

use image::GrayImage;

// Integral image
//------------------------------------------------------------------------------

/// Summed-area table over a grayscale buffer, for O(1) window means.
pub(crate) struct IntegralImage {
    w: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(gray: &[u8], w: usize, h: usize) -> Self {
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += gray[y * w + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { w, sums }
    }

    /// Sum over the inclusive rectangle [x0, x1] x [y0, y1].
    pub fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let stride = self.w + 1;
        self.sums[(y1 + 1) * stride + x1 + 1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1 + 1]
            - self.sums[(y1 + 1) * stride + x0]
    }
}

// Binary image
//------------------------------------------------------------------------------

const THRESHOLD_OFFSET: u64 = 7;

/// Black-and-white view of a captured frame after adaptive thresholding.
pub(crate) struct BinaryImage {
    pub w: u32,
    pub h: u32,
    bits: Vec<bool>,
}

impl BinaryImage {
    /// Builds from an RGBA8 interleaved buffer, top-left origin. `None` if
    /// the buffer doesn't match the dimensions.
    pub fn from_rgba(pixels: &[u8], w: u32, h: u32) -> Option<Self> {
        if pixels.len() != (4 * w * h) as usize || w == 0 || h == 0 {
            return None;
        }
        let gray: Vec<u8> = pixels
            .chunks_exact(4)
            .map(|px| {
                ((299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32 + 500) / 1000) as u8
            })
            .collect();
        Some(Self::binarize(&gray, w, h))
    }

    pub fn from_gray(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self::binarize(img.as_raw(), w, h)
    }

    // Adaptive threshold: a pixel is dark iff its luma is at least
    // THRESHOLD_OFFSET below the mean of the surrounding block, the block
    // side being max(3, min(w, h) / 8) forced odd and clipped at the edges.
    fn binarize(gray: &[u8], w: u32, h: u32) -> Self {
        let (wu, hu) = (w as usize, h as usize);
        let integral = IntegralImage::new(gray, wu, hu);
        let block = (wu.min(hu) / 8).max(3) | 1;
        let half = block / 2;

        let mut bits = vec![false; wu * hu];
        for y in 0..hu {
            let y0 = y.saturating_sub(half);
            let y1 = (y + half).min(hu - 1);
            for x in 0..wu {
                let x0 = x.saturating_sub(half);
                let x1 = (x + half).min(wu - 1);
                let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
                let sum = integral.sum(x0, y0, x1, y1);
                // gray <= mean - C, kept in integer arithmetic
                bits[y * wu + x] = (gray[y * wu + x] as u64 + THRESHOLD_OFFSET) * area <= sum;
            }
        }
        Self { w, h, bits }
    }

    /// Whether the pixel is dark; out-of-bounds reads as light.
    pub fn dark(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.w as i32 || y >= self.h as i32 {
            return false;
        }
        self.bits[(y as u32 * self.w + x as u32) as usize]
    }
}

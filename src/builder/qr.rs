use std::ops::Deref;

use image::{GrayImage, Luma};

use crate::common::{
    iter::EncRegionIter,
    mask::{mask_bit, MaskPattern},
    metadata::{
        format_info, Color, ECLevel, Version, FORMAT_INFO_BIT_LEN, FORMAT_INFO_COORDS_MAIN,
        FORMAT_INFO_COORDS_SIDE, VERSION_INFO_BIT_LEN, VERSION_INFO_COORDS_BL,
        VERSION_INFO_COORDS_TR,
    },
};

// Module
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Color),
    Format(Color),
    Version(Color),
    Data(Color),
}

impl Deref for Module {
    type Target = Color;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Color::Dark,
            Module::Func(c) => c,
            Module::Format(c) => c,
            Module::Version(c) => c,
            Module::Data(c) => c,
        }
    }
}

// Qr module matrix
//------------------------------------------------------------------------------

/// The symbol under construction: one grid holding both the module colors
/// and, through the [`Module`] tags, the reservation state of every cell.
#[derive(Debug, Clone)]
pub struct Qr {
    version: Version,
    width: usize,
    ec_level: ECLevel,
    mask_pattern: Option<MaskPattern>,
    grid: Vec<Module>,
}

impl Qr {
    pub(crate) fn new(version: Version, ec_level: ECLevel) -> Self {
        let width = version.width();
        Self { version, width, ec_level, mask_pattern: None, grid: vec![Module::Empty; width * width] }
    }

    /// Reservation map for the given version: all function patterns drawn,
    /// format and version areas claimed, data modules left empty. The reader
    /// uses this to skip exactly the modules the writer skipped.
    pub(crate) fn function_map(version: Version) -> Self {
        let mut qr = Self::new(version, ECLevel::L);
        qr.draw_all_function_patterns();
        qr.reserve_format_area();
        qr.draw_version_info();
        qr
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ec_level
    }

    pub fn mask_pattern(&self) -> Option<MaskPattern> {
        self.mask_pattern
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|&m| matches!(**m, Color::Dark)).count()
    }

    /// Whether the module at `(r, c)` is dark. Negative indices wrap.
    pub fn is_dark(&self, r: i16, c: i16) -> bool {
        matches!(*self.get(r, c), Color::Dark)
    }

    /// The finished matrix as rows of dark flags.
    pub fn to_vec(&self) -> Vec<Vec<bool>> {
        let w = self.width as i16;
        (0..w).map(|r| (0..w).map(|c| self.is_dark(r, c)).collect()).collect()
    }

    fn coord_to_index(&self, r: i16, c: i16) -> usize {
        let w = self.width as i16;
        debug_assert!(-w <= r && r < w, "row out of bounds");
        debug_assert!(-w <= c && c < w, "column out of bounds");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r * w + c) as _
    }

    pub(crate) fn get(&self, r: i16, c: i16) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub(crate) fn set(&mut self, r: i16, c: i16, module: Module) {
        let index = self.coord_to_index(r, c);
        self.grid[index] = module;
    }

    #[cfg(test)]
    pub(crate) fn to_debug_str(&self) -> String {
        let w = self.width as i16;
        let mut res = String::with_capacity((w * (w + 1)) as usize);
        res.push('\n');
        for i in 0..w {
            for j in 0..w {
                let c = match self.get(i, j) {
                    Module::Empty => '.',
                    Module::Func(Color::Dark) => 'f',
                    Module::Func(Color::Light) => 'F',
                    Module::Format(Color::Dark) => 'm',
                    Module::Format(Color::Light) => 'M',
                    Module::Version(Color::Dark) => 'v',
                    Module::Version(Color::Light) => 'V',
                    Module::Data(Color::Dark) => 'd',
                    Module::Data(Color::Light) => 'D',
                };
                res.push(c);
            }
            res.push('\n');
        }
        res
    }
}


// Finder patterns
//------------------------------------------------------------------------------

impl Qr {
    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        self.draw_finder_pattern_at(3, -4);
        self.draw_finder_pattern_at(-4, 3);
    }

    // Draws the 7x7 concentric pattern around (r, c) along with the one
    // module light separator on its inward sides.
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let (dr_top, dr_bottom) = if r > 0 { (-3, 4) } else { (-4, 3) };
        let (dc_left, dc_right) = if c > 0 { (-3, 4) } else { (-4, 3) };
        for i in dr_top..=dr_bottom {
            for j in dc_left..=dc_right {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (4 | -4, _) | (_, 4 | -4) => Module::Func(Color::Light),
                        (3 | -3, _) | (_, 3 | -3) => Module::Func(Color::Dark),
                        (2 | -2, _) | (_, 2 | -2) => Module::Func(Color::Light),
                        _ => Module::Func(Color::Dark),
                    },
                );
            }
        }
    }
}

// Timing patterns
//------------------------------------------------------------------------------

impl Qr {
    fn draw_timing_patterns(&mut self) {
        let w = self.width as i16;
        self.draw_line(6, 8, 6, w - 9);
        self.draw_line(8, 6, w - 9, 6);
    }

    fn draw_line(&mut self, r1: i16, c1: i16, r2: i16, c2: i16) {
        debug_assert!(r1 == r2 || c1 == c2, "Line is neither vertical nor horizontal");

        if r1 == r2 {
            for j in c1..=c2 {
                let m =
                    if j & 1 == 0 { Module::Func(Color::Dark) } else { Module::Func(Color::Light) };
                self.set(r1, j, m);
            }
        } else {
            for i in r1..=r2 {
                let m =
                    if i & 1 == 0 { Module::Func(Color::Dark) } else { Module::Func(Color::Light) };
                self.set(i, c1, m);
            }
        }
    }
}

// Alignment patterns
//------------------------------------------------------------------------------

impl Qr {
    fn draw_alignment_patterns(&mut self) {
        let positions = self.version.alignment_positions();
        for &r in positions {
            for &c in positions {
                self.draw_alignment_pattern_at(r, c);
            }
        }
    }

    fn draw_alignment_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.width as i16;
        // The three placements that would overlap a finder are skipped
        if (r == 6 && (c == 6 || c - w == -7)) || (r - w == -7 && c == 6) {
            return;
        }
        for i in -2..=2 {
            for j in -2..=2 {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (-2 | 2, _) | (_, -2 | 2) | (0, 0) => Module::Func(Color::Dark),
                        _ => Module::Func(Color::Light),
                    },
                )
            }
        }
    }
}

// Format & version info
//------------------------------------------------------------------------------

impl Qr {
    pub(crate) fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_patterns();
        self.draw_alignment_patterns();
    }

    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, info: u32) {
        self.draw_number(
            info,
            FORMAT_INFO_BIT_LEN,
            Module::Format(Color::Light),
            Module::Format(Color::Dark),
            &FORMAT_INFO_COORDS_MAIN,
        );
        self.draw_number(
            info,
            FORMAT_INFO_BIT_LEN,
            Module::Format(Color::Light),
            Module::Format(Color::Dark),
            &FORMAT_INFO_COORDS_SIDE,
        );
        // Dark module
        self.set(-8, 8, Module::Format(Color::Dark));
    }

    fn draw_version_info(&mut self) {
        if *self.version < 7 {
            return;
        }
        let info = self.version.info();
        self.draw_number(
            info,
            VERSION_INFO_BIT_LEN,
            Module::Version(Color::Light),
            Module::Version(Color::Dark),
            &VERSION_INFO_COORDS_BL,
        );
        self.draw_number(
            info,
            VERSION_INFO_BIT_LEN,
            Module::Version(Color::Light),
            Module::Version(Color::Dark),
            &VERSION_INFO_COORDS_TR,
        );
    }

    fn draw_number(
        &mut self,
        number: u32,
        bit_len: usize,
        off_color: Module,
        on_color: Module,
        coords: &[(i16, i16)],
    ) {
        let mut mask = 1 << (bit_len - 1);
        for (r, c) in coords {
            let module = if number & mask == 0 { off_color } else { on_color };
            self.set(*r, *c, module);
            mask >>= 1;
        }
    }
}

// Encoding region
//------------------------------------------------------------------------------

impl Qr {
    pub(crate) fn draw_encoding_region(&mut self, payload: &[u8]) {
        debug_assert!(
            payload.len() == self.version.total_codewords(),
            "Payload length {} doesn't match total codewords {}",
            payload.len(),
            self.version.total_codewords()
        );

        self.reserve_format_area();
        self.draw_version_info();
        self.draw_codewords(payload);

        debug_assert!(!self.grid.contains(&Module::Empty), "Empty module left after placement");
    }

    fn draw_codewords(&mut self, codewords: &[u8]) {
        let mut coords = EncRegionIter::new(self.version);
        for &codeword in codewords {
            for i in (0..8).rev() {
                let bit = (codeword >> i) & 1;
                let module = Module::Data(Color::from(bit == 1));
                for (r, c) in coords.by_ref() {
                    if matches!(self.get(r, c), Module::Empty) {
                        self.set(r, c, module);
                        break;
                    }
                }
            }
        }
        // Residual unfilled modules stay light
        let remainder: Vec<_> =
            coords.filter(|&(r, c)| self.get(r, c) == Module::Empty).collect();
        debug_assert!(
            remainder.len() == self.version.remainder_bits(),
            "Expected {} remainder bits, found {}",
            self.version.remainder_bits(),
            remainder.len()
        );
        for (r, c) in remainder {
            self.set(r, c, Module::Data(Color::Light));
        }
    }

    /// XORs the mask over every data module and writes the matching format
    /// word.
    pub(crate) fn mask(&mut self, pattern: MaskPattern) {
        self.mask_pattern = Some(pattern);
        let w = self.width as i16;
        for r in 0..w {
            for c in 0..w {
                if mask_bit(pattern, r, c) {
                    if let Module::Data(clr) = self.get(r, c) {
                        self.set(r, c, Module::Data(!clr));
                    }
                }
            }
        }
        let info = format_info(self.ec_level, *pattern);
        self.draw_format_info(info as u32);
    }
}

// Render
//------------------------------------------------------------------------------

const QUIET_ZONE_MODULES: u32 = 4;

impl Qr {
    /// Rasterizes the symbol at `module_size` pixels per module with the
    /// standard four module quiet zone.
    pub fn to_gray_image(&self, module_size: u32) -> GrayImage {
        let qz = QUIET_ZONE_MODULES * module_size;
        let qr_size = self.width as u32 * module_size;
        let total = qz + qr_size + qz;

        let mut canvas = GrayImage::from_pixel(total, total, Luma([255]));
        for i in 0..qr_size {
            for j in 0..qr_size {
                let r = (i / module_size) as i16;
                let c = (j / module_size) as i16;
                if self.is_dark(r, c) {
                    canvas.put_pixel(qz + j, qz + i, Luma([0]));
                }
            }
        }
        canvas
    }

    /// RGBA8 interleaved buffer of the rendered symbol, the format the
    /// decoder consumes.
    pub fn to_rgba(&self, module_size: u32) -> (Vec<u8>, u32, u32) {
        let gray = self.to_gray_image(module_size);
        let (w, h) = gray.dimensions();
        let mut buf = Vec::with_capacity((w * h * 4) as usize);
        for px in gray.pixels() {
            let v = px.0[0];
            buf.extend_from_slice(&[v, v, v, 255]);
        }
        (buf, w, h)
    }
}

#[cfg(test)]
mod function_pattern_tests {
    use super::Qr;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_finder_patterns() {
        let mut qr = Qr::new(Version::new(1), ECLevel::L);
        qr.draw_finder_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             fffffffF.....Ffffffff\n\
             fFFFFFfF.....FfFFFFFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFFFFFfF.....FfFFFFFf\n\
             fffffffF.....Ffffffff\n\
             FFFFFFFF.....FFFFFFFF\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             FFFFFFFF.............\n\
             fffffffF.............\n\
             fFFFFFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFFFFFfF.............\n\
             fffffffF.............\n"
        );
    }

    #[test]
    fn test_timing_patterns() {
        let mut qr = Qr::new(Version::new(1), ECLevel::L);
        qr.draw_timing_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             ........fFfFf........\n\
             .....................\n\
             ......f..............\n\
             ......F..............\n\
             ......f..............\n\
             ......F..............\n\
             ......f..............\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n"
        );
    }

    #[test]
    fn test_all_function_patterns_v3() {
        let mut qr = Qr::new(Version::new(3), ECLevel::L);
        qr.draw_all_function_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             fffffffF.............Ffffffff\n\
             fFFFFFfF.............FfFFFFFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFFFFFfF.............FfFFFFFf\n\
             fffffffFfFfFfFfFfFfFfFfffffff\n\
             FFFFFFFF.............FFFFFFFF\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f.............fffff....\n\
             FFFFFFFF............fFFFf....\n\
             fffffffF............fFfFf....\n\
             fFFFFFfF............fFFFf....\n\
             fFfffFfF............fffff....\n\
             fFfffFfF.....................\n\
             fFfffFfF.....................\n\
             fFFFFFfF.....................\n\
             fffffffF.....................\n"
        );
    }

    #[test]
    fn test_version_info_v7() {
        let mut qr = Qr::new(Version::new(7), ECLevel::L);
        qr.draw_version_info();
        let s = qr.to_debug_str();
        let rows: Vec<&str> = s.lines().skip(1).collect();
        assert_eq!(&rows[0][34..37], "VVv");
        assert_eq!(&rows[1][34..37], "VvV");
        assert_eq!(&rows[2][34..37], "VvV");
        assert_eq!(&rows[3][34..37], "Vvv");
        assert_eq!(&rows[4][34..37], "vvv");
        assert_eq!(&rows[5][34..37], "VVV");
        assert_eq!(&rows[34][..6], "VVVVvV");
        assert_eq!(&rows[35][..6], "VvvvvV");
        assert_eq!(&rows[36][..6], "vVVvvV");
    }

    #[test]
    fn test_reserve_format_area() {
        let mut qr = Qr::new(Version::new(1), ECLevel::L);
        qr.reserve_format_area();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             .....................\n\
             ........m............\n\
             mmmmmm.mm....mmmmmmmm\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n\
             ........m............\n"
        );
    }

    #[test]
    fn test_function_map_leaves_data_empty() {
        for v in [1, 2, 7] {
            let ver = Version::new(v);
            let map = Qr::function_map(ver);
            let empty = map.grid.iter().filter(|m| matches!(m, super::Module::Empty)).count();
            assert_eq!(empty, ver.total_codewords() * 8 + ver.remainder_bits(), "version {v}");
        }
    }
}

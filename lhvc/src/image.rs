use crate::error::{CodecError, Result};

pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// Rejects frame sizes outside `1..=MAX_DIMENSION` in either direction.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        return Err(CodecError::InvalidParameters(format!(
            "invalid dimensions {width}x{height}: both must be 1..={MAX_DIMENSION}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Eight = 8,
    Ten = 10,
    Twelve = 12,
    Sixteen = 16,
}

impl BitDepth {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            8 => Some(Self::Eight),
            10 => Some(Self::Ten),
            12 => Some(Self::Twelve),
            16 => Some(Self::Sixteen),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn max_value(self) -> u16 {
        ((1u32 << self.bits()) - 1) as u16
    }

    /// Fallback sample for intra neighbours outside the plane.
    pub fn mid_value(self) -> u16 {
        1u16 << (self.bits() - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Gray,
    Yuv444,
    Yuv420,
}

impl ColorMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Gray),
            1 => Some(Self::Yuv444),
            2 => Some(Self::Yuv420),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Gray => 0,
            Self::Yuv444 => 1,
            Self::Yuv420 => 2,
        }
    }

    pub fn plane_count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Yuv444 | Self::Yuv420 => 3,
        }
    }

    /// Dimensions of plane `index` for a `width x height` image.
    pub fn plane_dimensions(self, index: usize, width: u32, height: u32) -> (u32, u32) {
        match (self, index) {
            (Self::Yuv420, 1 | 2) => (width.div_ceil(2), height.div_ceil(2)),
            _ => (width, height),
        }
    }
}

/// A rectangular view into a plane. Edge blocks are clipped to the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Block {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the block displaced by `(dx, dy)` lies entirely inside a `w x h` plane.
    pub fn fits_displaced(&self, dx: i32, dy: i32, w: u32, h: u32) -> bool {
        let x0 = self.x as i64 + dx as i64;
        let y0 = self.y as i64 + dy as i64;
        x0 >= 0
            && y0 >= 0
            && x0 + self.width as i64 <= w as i64
            && y0 + self.height as i64 <= h as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
}

impl Plane {
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> Result<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(CodecError::InvalidParameters(format!(
                "plane {}x{} needs {} samples, got {}",
                width,
                height,
                width as usize * height as usize,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, value: u16) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u16) {
        self.data[(y * self.width + x) as usize] = value;
    }

    pub fn row(&self, y: u32) -> &[u16] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn blocks(&self, block_size: u32) -> Blocks {
        Blocks::new(self.width, self.height, block_size)
    }

    pub fn contains(&self, block: &Block) -> bool {
        block.fits_displaced(0, 0, self.width, self.height)
    }

    /// Samples of `block` displaced by `(dx, dy)`, row-major.
    pub fn block_samples(&self, block: &Block, dx: i32, dy: i32) -> Result<Vec<u16>> {
        if !block.fits_displaced(dx, dy, self.width, self.height) {
            return Err(self.out_of_bounds(block, dx, dy));
        }
        let x0 = (block.x as i64 + dx as i64) as u32;
        let y0 = (block.y as i64 + dy as i64) as u32;
        let mut out = Vec::with_capacity(block.len());
        for r in 0..block.height {
            let row = self.row(y0 + r);
            out.extend_from_slice(&row[x0 as usize..(x0 + block.width) as usize]);
        }
        Ok(out)
    }

    pub fn write_block(&mut self, block: &Block, samples: &[u16]) -> Result<()> {
        if !self.contains(block) || samples.len() != block.len() {
            return Err(self.out_of_bounds(block, 0, 0));
        }
        let width = self.width;
        for (r, chunk) in samples.chunks_exact(block.width as usize).enumerate() {
            let start = ((block.y + r as u32) * width + block.x) as usize;
            self.data[start..start + chunk.len()].copy_from_slice(chunk);
        }
        Ok(())
    }

    pub(crate) fn out_of_bounds(&self, block: &Block, dx: i32, dy: i32) -> CodecError {
        CodecError::OutOfBounds {
            x: block.x,
            y: block.y,
            block_w: block.width,
            block_h: block.height,
            dx,
            dy,
            plane_w: self.width,
            plane_h: self.height,
        }
    }
}

/// Raster-order block partition of a plane.
#[derive(Debug, Clone)]
pub struct Blocks {
    width: u32,
    height: u32,
    size: u32,
    next_x: u32,
    next_y: u32,
}

impl Blocks {
    fn new(width: u32, height: u32, size: u32) -> Self {
        Self {
            width,
            height,
            size: size.max(1),
            next_x: 0,
            next_y: 0,
        }
    }

    pub fn cols(&self) -> u32 {
        self.width.div_ceil(self.size)
    }

    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.size)
    }
}

impl Iterator for Blocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.next_y >= self.height || self.width == 0 {
            return None;
        }
        let block = Block {
            x: self.next_x,
            y: self.next_y,
            width: self.size.min(self.width - self.next_x),
            height: self.size.min(self.height - self.next_y),
        };
        self.next_x += self.size;
        if self.next_x >= self.width {
            self.next_x = 0;
            self.next_y += self.size;
        }
        Some(block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
    pub bit_depth: BitDepth,
    pub planes: Vec<Plane>,
}

impl Image {
    /// Builds an image from its planes, checking geometry and sample range.
    pub fn from_planes(
        width: u32,
        height: u32,
        color_mode: ColorMode,
        bit_depth: BitDepth,
        planes: Vec<Plane>,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        if planes.len() != color_mode.plane_count() {
            return Err(CodecError::InvalidParameters(format!(
                "{:?} needs {} planes, got {}",
                color_mode,
                color_mode.plane_count(),
                planes.len()
            )));
        }
        for (i, plane) in planes.iter().enumerate() {
            let (pw, ph) = color_mode.plane_dimensions(i, width, height);
            if plane.width != pw || plane.height != ph {
                return Err(CodecError::DimensionMismatch {
                    expected_w: pw,
                    expected_h: ph,
                    got_w: plane.width,
                    got_h: plane.height,
                });
            }
            let max = bit_depth.max_value();
            if let Some(&s) = plane.data.iter().find(|&&s| s > max) {
                return Err(CodecError::InvalidParameters(format!(
                    "sample {s} exceeds {}-bit range",
                    bit_depth.bits()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            color_mode,
            bit_depth,
            planes,
        })
    }

    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let plane = Plane::new(width, height, data.into_iter().map(u16::from).collect())?;
        Self::from_planes(width, height, ColorMode::Gray, BitDepth::Eight, vec![plane])
    }

    pub fn solid(width: u32, height: u32, color_mode: ColorMode, bit_depth: BitDepth, value: u16) -> Self {
        let planes = (0..color_mode.plane_count())
            .map(|i| {
                let (pw, ph) = color_mode.plane_dimensions(i, width, height);
                Plane::filled(pw, ph, value.min(bit_depth.max_value()))
            })
            .collect();
        Self {
            width,
            height,
            color_mode,
            bit_depth,
            planes,
        }
    }

    /// Sample at `(row, col)` of `channel`.
    pub fn sample(&self, row: u32, col: u32, channel: usize) -> u16 {
        self.planes[channel].get(col, row)
    }

    pub fn plane(&self, channel: usize) -> &Plane {
        &self.planes[channel]
    }

    /// Whether `other` has the same geometry, colour mode and bit depth.
    pub fn same_layout(&self, other: &Image) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.color_mode == other.color_mode
            && self.bit_depth == other.bit_depth
    }
}

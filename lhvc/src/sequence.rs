use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, Result};
use crate::image::{BitDepth, ColorMode, MAX_DIMENSION};
use crate::{CodecParameters, GolombParameter, ModePolicy};

pub const MAGIC: [u8; 4] = *b"LHVC";
pub const VERSION: u8 = 1;

/// Size of the serialized header in bits.
pub const HEADER_BITS: u64 = 32 + 8 + 16 + 16 + 2 + 5 + 8 + 8 + 2 + 1 + 16 + 16 + 32;

/// Stream-level parameters, written once ahead of the first frame record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    pub width: u32,
    pub height: u32,
    pub params: CodecParameters,
    pub frame_count: u32,
}

impl SequenceHeader {
    pub fn write(&self, w: &mut BitWriter) {
        for byte in MAGIC {
            w.write_bits(byte as u64, 8);
        }
        w.write_bits(VERSION as u64, 8);
        w.write_bits(self.width as u64, 16);
        w.write_bits(self.height as u64, 16);
        w.write_bits(self.params.color_mode.to_u8() as u64, 2);
        w.write_bits(self.params.bit_depth.bits() as u64, 5);
        w.write_bits(self.params.block_size as u64, 8);
        w.write_bits(self.params.search_window as u64, 8);
        w.write_bits(self.params.policy.to_u8() as u64, 2);
        match self.params.golomb {
            GolombParameter::Adaptive => {
                w.write_bit(true);
                w.write_bits(0, 16);
            }
            GolombParameter::Fixed(m) => {
                w.write_bit(false);
                w.write_bits(m as u64, 16);
            }
        }
        w.write_bits(self.params.intra_period as u64, 16);
        w.write_bits(self.frame_count as u64, 32);
    }

    pub fn read(r: &mut BitReader<'_>) -> Result<Self> {
        let mut magic = [0u8; 4];
        for byte in &mut magic {
            *byte = r.read_bits(8)? as u8;
        }
        if magic != MAGIC {
            return Err(CodecError::InvalidStream(format!("bad magic {magic:02X?}")));
        }
        let version = r.read_bits(8)? as u8;
        if version != VERSION {
            return Err(CodecError::InvalidStream(format!(
                "unsupported version {version}"
            )));
        }

        let width = r.read_bits(16)? as u32;
        let height = r.read_bits(16)? as u32;
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(CodecError::InvalidStream(format!(
                "invalid dimensions {width}x{height}"
            )));
        }

        let color_code = r.read_bits(2)? as u8;
        let color_mode = ColorMode::from_u8(color_code)
            .ok_or_else(|| CodecError::InvalidStream(format!("unknown colour mode {color_code}")))?;
        let depth_code = r.read_bits(5)? as u8;
        let bit_depth = BitDepth::from_u8(depth_code)
            .ok_or_else(|| CodecError::InvalidStream(format!("unsupported bit depth {depth_code}")))?;

        let block_size = r.read_bits(8)? as u8;
        if block_size == 0 {
            return Err(CodecError::InvalidStream("block size 0".into()));
        }
        let search_window = r.read_bits(8)? as u8;
        let policy_code = r.read_bits(2)? as u8;
        let policy = ModePolicy::from_u8(policy_code)
            .ok_or_else(|| CodecError::InvalidStream(format!("unknown mode policy {policy_code}")))?;

        let adaptive = r.read_bit()?;
        let fixed_m = r.read_bits(16)? as u32;
        let golomb = match (adaptive, fixed_m) {
            (true, 0) => GolombParameter::Adaptive,
            (false, m) if m > 0 => GolombParameter::Fixed(m),
            (true, m) => {
                return Err(CodecError::InvalidStream(format!(
                    "adaptive stream carries fixed golomb m {m}"
                )));
            }
            (false, _) => {
                return Err(CodecError::InvalidStream("fixed golomb m 0".into()));
            }
        };

        let intra_period = r.read_bits(16)? as u16;
        let frame_count = r.read_bits(32)? as u32;

        Ok(Self {
            width,
            height,
            params: CodecParameters {
                block_size,
                search_window,
                golomb,
                color_mode,
                bit_depth,
                policy,
                intra_period,
            },
            frame_count,
        })
    }
}

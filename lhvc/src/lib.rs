#![forbid(unsafe_code)]

pub mod bitstream;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod golomb;
pub mod image;
pub mod motion;
pub mod predict;
pub mod record;
pub mod sequence;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use image::{BitDepth, Block, ColorMode, Image, Plane};
pub use motion::MotionVector;
pub use record::{FrameRecord, FrameType};
pub use sequence::SequenceHeader;

use bitstream::{BitReader, BitWriter};
use frame::{FrameDecoder, FrameEncoder};

pub const DEFAULT_BLOCK_SIZE: u8 = 8;
pub const DEFAULT_SEARCH_WINDOW: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GolombParameter {
    Fixed(u32),
    /// Derived per frame from the values it codes.
    #[default]
    Adaptive,
}

/// How blocks of inter frames choose between intra and inter prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModePolicy {
    IntraOnly,
    InterOnly,
    #[default]
    Hybrid,
}

impl ModePolicy {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::IntraOnly),
            1 => Some(Self::InterOnly),
            2 => Some(Self::Hybrid),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::IntraOnly => 0,
            Self::InterOnly => 1,
            Self::Hybrid => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    pub block_size: u8,
    pub search_window: u8,
    pub golomb: GolombParameter,
    pub color_mode: ColorMode,
    pub bit_depth: BitDepth,
    pub policy: ModePolicy,
    /// Every `intra_period`-th frame is coded intra; 0 keeps only the first.
    pub intra_period: u16,
}

impl Default for CodecParameters {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            search_window: DEFAULT_SEARCH_WINDOW,
            golomb: GolombParameter::Adaptive,
            color_mode: ColorMode::Gray,
            bit_depth: BitDepth::Eight,
            policy: ModePolicy::Hybrid,
            intra_period: 0,
        }
    }
}

impl CodecParameters {
    /// Parameters matching the layout of `image`, defaults elsewhere.
    pub fn for_image(image: &Image) -> Self {
        Self {
            color_mode: image.color_mode,
            bit_depth: image.bit_depth,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(CodecError::InvalidParameters(
                "block size must be at least 1".into(),
            ));
        }
        if let GolombParameter::Fixed(m) = self.golomb {
            golomb::GolombCoder::new(m)?;
        }
        Ok(())
    }

    pub(crate) fn check_layout(&self, image: &Image) -> Result<()> {
        if image.color_mode != self.color_mode || image.bit_depth != self.bit_depth {
            return Err(CodecError::InvalidParameters(format!(
                "image is {:?}/{}-bit, parameters expect {:?}/{}-bit",
                image.color_mode,
                image.bit_depth.bits(),
                self.color_mode,
                self.bit_depth.bits()
            )));
        }
        Ok(())
    }
}

pub fn encode_sequence(images: &[Image], params: &CodecParameters) -> Result<Vec<u8>> {
    let Some(first) = images.first() else {
        return Err(CodecError::InvalidParameters(
            "a sequence needs at least one image".into(),
        ));
    };

    let mut enc = Encoder::new(first.width, first.height, params.clone())?;
    for image in images {
        enc.send_frame(image)?;
    }
    Ok(enc.finish())
}

/// Decodes a stream whose header must carry exactly `params`.
pub fn decode_sequence(data: &[u8], params: &CodecParameters) -> Result<Vec<Image>> {
    let (header, images) = decode(data)?;
    if &header.params != params {
        return Err(CodecError::InvalidParameters(format!(
            "stream was encoded with {:?}, caller expects {:?}",
            header.params, params
        )));
    }
    Ok(images)
}

/// Decodes a stream using the parameters recorded in its header.
pub fn decode(data: &[u8]) -> Result<(SequenceHeader, Vec<Image>)> {
    let mut dec = Decoder::new(data)?;
    let mut images = Vec::new();
    while let Some(frame) = dec.next_frame() {
        let (image, _) = frame?;
        images.push(image);
    }
    dec.finish()?;
    Ok((dec.header().clone(), images))
}

/// Codes one standalone, byte-aligned frame record. The frame is intra when
/// `reference` is `None` and inter otherwise.
pub fn encode_frame(image: &Image, reference: Option<&Image>, params: &CodecParameters) -> Result<Vec<u8>> {
    let frame_type = if reference.is_some() {
        FrameType::Inter
    } else {
        FrameType::Intra
    };
    let mut w = BitWriter::new();
    FrameEncoder::new(params)?.encode(image, reference, frame_type, 0, &mut w)?;
    Ok(w.finalize())
}

pub fn decode_frame(
    data: &[u8],
    reference: Option<&Image>,
    width: u32,
    height: u32,
    params: &CodecParameters,
) -> Result<Image> {
    let mut r = BitReader::new(data);
    let (image, _) = FrameDecoder::new(params)?.decode(&mut r, reference, width, height, 0)?;
    Ok(image)
}

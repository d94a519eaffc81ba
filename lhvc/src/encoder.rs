use crate::bitstream::BitWriter;
use crate::error::{CodecError, Result};
use crate::frame::FrameEncoder;
use crate::image::{check_dimensions, Image};
use crate::record::{FrameRecord, FrameType};
use crate::sequence::SequenceHeader;
use crate::CodecParameters;

/// Sequence encoder. Frames are coded as they arrive; the header, which
/// carries the frame count, is emitted by [`Encoder::finish`].
#[derive(Debug)]
pub struct Encoder {
    params: CodecParameters,
    width: u32,
    height: u32,
    frame_index: u64,
    frames: FrameEncoder,
    reference: Option<Image>,
    data: BitWriter,
}

impl Encoder {
    pub fn new(width: u32, height: u32, params: CodecParameters) -> Result<Self> {
        check_dimensions(width, height)?;
        let frames = FrameEncoder::new(&params)?;

        Ok(Self {
            params,
            width,
            height,
            frame_index: 0,
            frames,
            reference: None,
            data: BitWriter::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn params(&self) -> &CodecParameters {
        &self.params
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Frame type the next [`Encoder::send_frame`] will use.
    pub fn next_frame_type(&self) -> FrameType {
        let period = self.params.intra_period as u64;
        if self.reference.is_none() || (period > 0 && self.frame_index.is_multiple_of(period)) {
            FrameType::Intra
        } else {
            FrameType::Inter
        }
    }

    pub fn send_frame(&mut self, image: &Image) -> Result<FrameRecord> {
        let frame_type = self.next_frame_type();
        self.send_frame_as(image, frame_type)
    }

    /// Codes `image` with an explicit frame type. Requesting an inter frame
    /// before any frame has been coded fails with `ReferenceMissing`.
    pub fn send_frame_as(&mut self, image: &Image, frame_type: FrameType) -> Result<FrameRecord> {
        if image.width != self.width || image.height != self.height {
            return Err(CodecError::DimensionMismatch {
                expected_w: self.width,
                expected_h: self.height,
                got_w: image.width,
                got_h: image.height,
            });
        }
        if self.frame_index >= u32::MAX as u64 {
            return Err(CodecError::InvalidParameters(
                "frame count exceeds the 32-bit header field".into(),
            ));
        }

        // Frames are staged so a failed frame leaves no partial record behind.
        let mut staged = BitWriter::new();
        let record = self.frames.encode(
            image,
            self.reference.as_ref(),
            frame_type,
            self.frame_index,
            &mut staged,
        )?;
        self.data.append(staged);

        // Lossless: the reconstruction is the source image.
        self.reference = Some(image.clone());
        self.frame_index += 1;

        Ok(record)
    }

    pub fn finish(self) -> Vec<u8> {
        let header = SequenceHeader {
            width: self.width,
            height: self.height,
            params: self.params,
            frame_count: self.frame_index as u32,
        };
        let mut w = BitWriter::new();
        header.write(&mut w);
        let payload_bits = self.data.position();
        w.append(self.data);
        let out = w.finalize();

        tracing::info!(
            width = header.width,
            height = header.height,
            frames = header.frame_count,
            payload_bits,
            bytes = out.len(),
            "finished sequence"
        );

        out
    }
}

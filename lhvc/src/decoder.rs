use crate::bitstream::BitReader;
use crate::error::{CodecError, Result};
use crate::frame::FrameDecoder;
use crate::image::Image;
use crate::record::FrameRecord;
use crate::sequence::SequenceHeader;

/// Pull-style sequence decoder over a complete byte stream.
#[derive(Debug)]
pub struct Decoder<'a> {
    reader: BitReader<'a>,
    header: SequenceHeader,
    frames: FrameDecoder,
    reference: Option<Image>,
    decoded: u32,
    failed: bool,
}

impl<'a> Decoder<'a> {
    /// Parses the sequence header. Frame records are read by [`Decoder::next_frame`].
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);
        let header = SequenceHeader::read(&mut reader)?;
        let frames = FrameDecoder::new(&header.params)
            .map_err(|e| CodecError::InvalidStream(format!("header parameters: {e}")))?;

        tracing::debug!(
            width = header.width,
            height = header.height,
            frames = header.frame_count,
            block_size = header.params.block_size,
            "parsed sequence header"
        );

        Ok(Self {
            reader,
            header,
            frames,
            reference: None,
            decoded: 0,
            failed: false,
        })
    }

    pub fn header(&self) -> &SequenceHeader {
        &self.header
    }

    pub fn frames_decoded(&self) -> u32 {
        self.decoded
    }

    /// Decodes the next frame. Returns `None` once every frame announced by
    /// the header has been read, or after the first error.
    pub fn next_frame(&mut self) -> Option<Result<(Image, FrameRecord)>> {
        if self.failed || self.decoded >= self.header.frame_count {
            return None;
        }
        let result = self.frames.decode(
            &mut self.reader,
            self.reference.as_ref(),
            self.header.width,
            self.header.height,
            self.decoded as u64,
        );
        match result {
            Ok((image, record)) => {
                self.reference = Some(image.clone());
                self.decoded += 1;
                Some(Ok((image, record)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    /// Checks that the stream ends after the last frame, allowing only the
    /// zero padding up to the next byte boundary.
    pub fn finish(&self) -> Result<()> {
        if self.decoded < self.header.frame_count {
            return Err(CodecError::InvalidStream(format!(
                "{} of {} frames decoded",
                self.decoded, self.header.frame_count
            )));
        }
        let mut tail = self.reader.clone();
        let remaining = tail.remaining();
        if remaining >= 8 {
            return Err(CodecError::InvalidStream(format!(
                "{remaining} bits of trailing data"
            )));
        }
        if tail.read_bits(remaining as u8)? != 0 {
            return Err(CodecError::InvalidStream("non-zero padding bits".into()));
        }
        Ok(())
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Image>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().map(|r| r.map(|(image, _)| image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::image::{BitDepth, ColorMode};
    use crate::record::FrameType;
    use crate::CodecParameters;

    fn gradient(width: u32, height: u32, phase: u32) -> Image {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 5 + y * 3 + phase) % 251) as u8))
            .collect();
        Image::gray(width, height, data).unwrap()
    }

    fn encode(images: &[Image]) -> Vec<u8> {
        let mut enc = Encoder::new(images[0].width, images[0].height, CodecParameters::default()).unwrap();
        for image in images {
            enc.send_frame(image).unwrap();
        }
        enc.finish()
    }

    #[test]
    fn header_exposed() {
        let data = encode(&[gradient(10, 6, 0)]);
        let dec = Decoder::new(&data).unwrap();
        assert_eq!(dec.header().width, 10);
        assert_eq!(dec.header().height, 6);
        assert_eq!(dec.header().frame_count, 1);
        assert_eq!(dec.header().params, CodecParameters::default());
    }

    #[test]
    fn frames_in_order() {
        let images: Vec<Image> = (0..4).map(|p| gradient(16, 12, p)).collect();
        let data = encode(&images);
        let mut dec = Decoder::new(&data).unwrap();
        for (i, expected) in images.iter().enumerate() {
            let (image, record) = dec.next_frame().unwrap().unwrap();
            assert_eq!(&image, expected);
            assert_eq!(record.frame_number, i as u64);
            let ft = if i == 0 { FrameType::Intra } else { FrameType::Inter };
            assert_eq!(record.frame_type, ft);
        }
        assert!(dec.next_frame().is_none());
        dec.finish().unwrap();
    }

    #[test]
    fn iterator_yields_images() {
        let images: Vec<Image> = (0..3).map(|p| gradient(9, 9, p * 2)).collect();
        let data = encode(&images);
        let decoded: Vec<Image> = Decoder::new(&data)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(decoded, images);
    }

    #[test]
    fn trailing_data_rejected() {
        let mut data = encode(&[gradient(8, 8, 1)]);
        data.push(0);
        let mut dec = Decoder::new(&data).unwrap();
        dec.next_frame().unwrap().unwrap();
        assert!(matches!(dec.finish(), Err(CodecError::InvalidStream(_))));
    }

    #[test]
    fn unfinished_sequence_rejected_by_finish() {
        let data = encode(&[gradient(8, 8, 1), gradient(8, 8, 2)]);
        let mut dec = Decoder::new(&data).unwrap();
        dec.next_frame().unwrap().unwrap();
        assert!(matches!(dec.finish(), Err(CodecError::InvalidStream(_))));
    }

    #[test]
    fn truncated_frame_stops_iteration() {
        let data = encode(&[gradient(16, 16, 1), gradient(16, 16, 7)]);
        let cut = &data[..data.len() - 4];
        let mut dec = Decoder::new(cut).unwrap();
        dec.next_frame().unwrap().unwrap();
        assert!(matches!(
            dec.next_frame(),
            Some(Err(CodecError::EndOfStream { .. }))
        ));
        assert!(dec.next_frame().is_none());
    }

    #[test]
    fn header_only_stream() {
        let data = Encoder::new(4, 4, CodecParameters::default()).unwrap().finish();
        let mut dec = Decoder::new(&data).unwrap();
        assert!(dec.next_frame().is_none());
        dec.finish().unwrap();
    }

    #[test]
    fn empty_input_is_end_of_stream() {
        assert!(matches!(
            Decoder::new(&[]),
            Err(CodecError::EndOfStream { .. })
        ));
    }

    #[test]
    fn high_depth_colour_sequence() {
        let params = CodecParameters {
            color_mode: ColorMode::Yuv444,
            bit_depth: BitDepth::Twelve,
            ..Default::default()
        };
        let a = Image::solid(6, 5, ColorMode::Yuv444, BitDepth::Twelve, 4000);
        let b = Image::solid(6, 5, ColorMode::Yuv444, BitDepth::Twelve, 17);
        let mut enc = Encoder::new(6, 5, params.clone()).unwrap();
        enc.send_frame(&a).unwrap();
        enc.send_frame(&b).unwrap();
        let data = enc.finish();
        let mut dec = Decoder::new(&data).unwrap();
        assert_eq!(dec.header().params, params);
        assert_eq!(dec.next_frame().unwrap().unwrap().0, a);
        assert_eq!(dec.next_frame().unwrap().unwrap().0, b);
        dec.finish().unwrap();
    }
}

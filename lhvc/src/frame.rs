//! Frame records: per-block mode decision, residual serialization and the
//! mirror-image decoder.
//!
//! Layout of one frame record:
//!
//! ```text
//! golomb m      16 bits
//! frame type     1 bit   (0 intra, 1 inter)
//! for each plane, for each block in raster order:
//!   mode         1 bit   (0 intra, 1 inter)
//!   dx, dy       signed Golomb, inter blocks only
//!   residuals    signed Golomb, raster order inside the block
//! ```

use rayon::prelude::*;

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, Result};
use crate::golomb::{self, GolombCoder};
use crate::image::{check_dimensions, Block, ColorMode, Image, Plane};
use crate::motion::{self, MotionVector};
use crate::predict::{self, PredictionMode};
use crate::record::{FrameRecord, FrameType};
use crate::{CodecParameters, GolombParameter, ModePolicy};

const GOLOMB_M_BITS: u8 = 16;

#[derive(Debug, Clone)]
struct BlockDecision {
    mode: PredictionMode,
    residual: Vec<i32>,
}

struct PlaneContext<'a> {
    plane: &'a Plane,
    reference: Option<&'a Plane>,
    fallback: u16,
    window: u32,
    policy: ModePolicy,
}

impl PlaneContext<'_> {
    fn analyze(&self, block: &Block) -> Result<BlockDecision> {
        let original = self.plane.block_samples(block, 0, 0)?;

        let reference = match (self.reference, self.policy) {
            (Some(reference), ModePolicy::InterOnly | ModePolicy::Hybrid) => reference,
            _ => return self.intra(block, &original),
        };

        let found = motion::search(reference, self.plane, block, self.window)?;
        let predicted = predict::predict_inter(reference, block, found.vector)?;
        let inter = BlockDecision {
            mode: PredictionMode::Inter(found.vector),
            residual: predict::residual(&original, &predicted),
        };

        if self.policy == ModePolicy::InterOnly {
            return Ok(inter);
        }

        let intra = self.intra(block, &original)?;
        if found.cost < predict::sum_abs(&intra.residual) {
            Ok(inter)
        } else {
            Ok(intra)
        }
    }

    fn intra(&self, block: &Block, original: &[u16]) -> Result<BlockDecision> {
        let predicted = predict::predict_intra(self.plane, block, self.fallback)?;
        Ok(BlockDecision {
            mode: PredictionMode::Intra,
            residual: predict::residual(original, &predicted),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FrameEncoder {
    params: CodecParameters,
}

impl FrameEncoder {
    pub fn new(params: &CodecParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
        })
    }

    /// Appends one frame record for `image` to `w`.
    ///
    /// Intra frames ignore `reference`. Inter frames require it and fail with
    /// `ReferenceMissing` otherwise.
    pub fn encode(
        &self,
        image: &Image,
        reference: Option<&Image>,
        frame_type: FrameType,
        frame_number: u64,
        w: &mut BitWriter,
    ) -> Result<FrameRecord> {
        self.params.check_layout(image)?;
        let reference = match frame_type {
            FrameType::Intra => None,
            FrameType::Inter => {
                let reference = reference.ok_or(CodecError::ReferenceMissing)?;
                check_reference(image, reference)?;
                Some(reference)
            }
        };

        let block_size = self.params.block_size as u32;
        let mut decisions = Vec::with_capacity(image.planes.len());
        for (i, plane) in image.planes.iter().enumerate() {
            let ctx = PlaneContext {
                plane,
                reference: reference.map(|r| &r.planes[i]),
                fallback: image.bit_depth.mid_value(),
                window: self.params.search_window as u32,
                policy: self.params.policy,
            };
            let blocks: Vec<Block> = plane.blocks(block_size).collect();
            let plane_decisions = blocks
                .into_par_iter()
                .map(|block| ctx.analyze(&block))
                .collect::<Result<Vec<_>>>()?;
            decisions.push(plane_decisions);
        }

        let m = match self.params.golomb {
            GolombParameter::Fixed(m) => m,
            GolombParameter::Adaptive => golomb::select_parameter(&coded_values(&decisions)),
        };
        let coder = GolombCoder::new(m)?;

        let start = w.position();
        w.write_bits(m as u64, GOLOMB_M_BITS);
        w.write_bit(frame_type.flag());

        let mut record = FrameRecord {
            frame_number,
            frame_type,
            golomb_m: m,
            intra_blocks: 0,
            inter_blocks: 0,
            bits: 0,
        };
        for decision in decisions.iter().flatten() {
            match decision.mode {
                PredictionMode::Intra => {
                    w.write_bit(false);
                    record.intra_blocks += 1;
                }
                PredictionMode::Inter(mv) => {
                    w.write_bit(true);
                    coder.encode(w, mv.dx);
                    coder.encode(w, mv.dy);
                    record.inter_blocks += 1;
                }
            }
            for &r in &decision.residual {
                coder.encode(w, r);
            }
        }
        record.bits = w.position() - start;

        tracing::debug!(
            frame = frame_number,
            frame_type = ?frame_type,
            m,
            intra = record.intra_blocks,
            inter = record.inter_blocks,
            bits = record.bits,
            "encoded frame"
        );

        Ok(record)
    }
}

fn coded_values(decisions: &[Vec<BlockDecision>]) -> Vec<i32> {
    let mut values = Vec::new();
    for decision in decisions.iter().flatten() {
        if let PredictionMode::Inter(mv) = decision.mode {
            values.push(mv.dx);
            values.push(mv.dy);
        }
        values.extend_from_slice(&decision.residual);
    }
    values
}

/// Fewest bits a record for this geometry can occupy: the frame fields, one
/// mode bit per block and at least one bit per residual.
fn minimum_record_bits(color_mode: ColorMode, width: u32, height: u32, block_size: u32) -> u64 {
    let mut bits = GOLOMB_M_BITS as u64 + 1;
    for i in 0..color_mode.plane_count() {
        let (pw, ph) = color_mode.plane_dimensions(i, width, height);
        let blocks = pw.div_ceil(block_size) as u64 * ph.div_ceil(block_size) as u64;
        bits += pw as u64 * ph as u64 + blocks;
    }
    bits
}

fn check_reference(image: &Image, reference: &Image) -> Result<()> {
    if reference.width != image.width || reference.height != image.height {
        return Err(CodecError::DimensionMismatch {
            expected_w: image.width,
            expected_h: image.height,
            got_w: reference.width,
            got_h: reference.height,
        });
    }
    if !reference.same_layout(image) {
        return Err(CodecError::InvalidParameters(
            "reference frame has a different colour mode or bit depth".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    params: CodecParameters,
}

impl FrameDecoder {
    pub fn new(params: &CodecParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
        })
    }

    /// Reads one frame record. Any failure aborts the whole frame.
    pub fn decode(
        &self,
        r: &mut BitReader<'_>,
        reference: Option<&Image>,
        width: u32,
        height: u32,
        frame_number: u64,
    ) -> Result<(Image, FrameRecord)> {
        check_dimensions(width, height)?;
        let color_mode = self.params.color_mode;
        let bit_depth = self.params.bit_depth;
        let block_size = self.params.block_size as u32;

        // Nothing is allocated for a record the input cannot hold.
        let start = r.position();
        if r.remaining() < minimum_record_bits(color_mode, width, height, block_size) {
            return Err(CodecError::EndOfStream { position: start });
        }

        let m = r.read_bits(GOLOMB_M_BITS)? as u32;
        if let GolombParameter::Fixed(expected) = self.params.golomb {
            if m != expected {
                return Err(CodecError::InvalidStream(format!(
                    "frame {frame_number} uses golomb m {m}, header fixes {expected}"
                )));
            }
        }
        let coder = GolombCoder::new(m)
            .map_err(|_| CodecError::InvalidStream(format!("frame {frame_number} has golomb m 0")))?;
        let frame_type = FrameType::from_flag(r.read_bit()?);

        let reference = match frame_type {
            FrameType::Intra => None,
            FrameType::Inter => {
                let reference = reference.ok_or(CodecError::ReferenceMissing)?;
                if reference.width != width || reference.height != height {
                    return Err(CodecError::DimensionMismatch {
                        expected_w: width,
                        expected_h: height,
                        got_w: reference.width,
                        got_h: reference.height,
                    });
                }
                if reference.color_mode != color_mode || reference.bit_depth != bit_depth {
                    return Err(CodecError::InvalidParameters(
                        "reference frame has a different colour mode or bit depth".into(),
                    ));
                }
                Some(reference)
            }
        };

        let mut record = FrameRecord {
            frame_number,
            frame_type,
            golomb_m: m,
            intra_blocks: 0,
            inter_blocks: 0,
            bits: 0,
        };

        let window = self.params.search_window as u32;
        let fallback = bit_depth.mid_value();
        let max_value = bit_depth.max_value();

        let mut planes = Vec::with_capacity(color_mode.plane_count());
        for i in 0..color_mode.plane_count() {
            let (pw, ph) = color_mode.plane_dimensions(i, width, height);
            let mut recon = Plane::filled(pw, ph, 0);
            let mut residual = Vec::with_capacity(block_size as usize * block_size as usize);

            for block in recon.blocks(block_size) {
                let inter = r.read_bit()?;
                let mode = if inter {
                    let Some(reference) = reference else {
                        return Err(CodecError::InvalidStream(format!(
                            "inter block at ({}, {}) in intra frame {frame_number}",
                            block.x, block.y
                        )));
                    };
                    let mv = MotionVector::new(coder.decode(r)?, coder.decode(r)?);
                    let plane = &reference.planes[i];
                    if !mv.within(window) || !block.fits_displaced(mv.dx, mv.dy, plane.width, plane.height) {
                        return Err(CodecError::InvalidStream(format!(
                            "motion vector ({}, {}) for block at ({}, {}) is out of range",
                            mv.dx, mv.dy, block.x, block.y
                        )));
                    }
                    record.inter_blocks += 1;
                    PredictionMode::Inter(mv)
                } else {
                    record.intra_blocks += 1;
                    PredictionMode::Intra
                };

                residual.clear();
                for _ in 0..block.len() {
                    residual.push(coder.decode(r)?);
                }

                match mode {
                    PredictionMode::Intra => {
                        predict::reconstruct_intra_in_place(&mut recon, &block, &residual, fallback, max_value)?;
                    }
                    PredictionMode::Inter(mv) => {
                        let reference = reference.ok_or(CodecError::ReferenceMissing)?;
                        let predicted = predict::predict_inter(&reference.planes[i], &block, mv)?;
                        let samples = predict::reconstruct(&predicted, &residual, max_value)?;
                        recon.write_block(&block, &samples)?;
                    }
                }
            }
            planes.push(recon);
        }
        record.bits = r.position() - start;

        tracing::debug!(
            frame = frame_number,
            frame_type = ?frame_type,
            m,
            intra = record.intra_blocks,
            inter = record.inter_blocks,
            bits = record.bits,
            "decoded frame"
        );

        let image = Image {
            width,
            height,
            color_mode,
            bit_depth,
            planes,
        };
        Ok((image, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{BitDepth, MAX_DIMENSION};

    fn textured(width: u32, height: u32, seed: u32) -> Image {
        let mut state = seed.wrapping_add(0x9E37_79B9);
        let data = (0..width * height)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xFF) as u8
            })
            .collect();
        Image::gray(width, height, data).unwrap()
    }

    fn params(policy: ModePolicy, block_size: u8) -> CodecParameters {
        CodecParameters {
            block_size,
            policy,
            ..Default::default()
        }
    }

    fn roundtrip(
        params: &CodecParameters,
        image: &Image,
        reference: Option<&Image>,
        frame_type: FrameType,
    ) -> (FrameRecord, FrameRecord, Image) {
        let mut w = BitWriter::new();
        let enc_record = FrameEncoder::new(params)
            .unwrap()
            .encode(image, reference, frame_type, 3, &mut w)
            .unwrap();
        assert_eq!(w.position(), enc_record.bits);
        let bytes = w.finalize();
        let mut r = BitReader::new(&bytes);
        let (decoded, dec_record) = FrameDecoder::new(params)
            .unwrap()
            .decode(&mut r, reference, image.width, image.height, 3)
            .unwrap();
        (enc_record, dec_record, decoded)
    }

    #[test]
    fn identical_previous_frame_is_all_inter_zero_motion() {
        let image = textured(8, 8, 42);
        let p = params(ModePolicy::Hybrid, 4);
        let (enc, dec, decoded) = roundtrip(&p, &image, Some(&image), FrameType::Inter);
        assert_eq!(enc.inter_blocks, 4);
        assert_eq!(enc.intra_blocks, 0);
        assert_eq!(enc, dec);
        assert_eq!(decoded, image);

        // every block: mode 1, dx 0, dy 0, 16 zero residuals -> 3 + 16 bits with m = 1
        assert_eq!(enc.golomb_m, 1);
        assert_eq!(enc.bits, 16 + 1 + 4 * (1 + 2 + 16));
    }

    #[test]
    fn intra_frame_is_all_intra() {
        let image = textured(20, 12, 1);
        let p = params(ModePolicy::Hybrid, 8);
        let (enc, dec, decoded) = roundtrip(&p, &image, Some(&image), FrameType::Intra);
        assert_eq!(enc.inter_blocks, 0);
        assert_eq!(enc.intra_blocks, 3 * 2);
        assert_eq!(enc, dec);
        assert_eq!(decoded, image);
    }

    #[test]
    fn inter_frame_without_reference_fails() {
        let image = textured(8, 8, 1);
        let encoder = FrameEncoder::new(&CodecParameters::default()).unwrap();
        let mut w = BitWriter::new();
        assert_eq!(
            encoder.encode(&image, None, FrameType::Inter, 0, &mut w).unwrap_err(),
            CodecError::ReferenceMissing
        );
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn intra_only_policy_ignores_reference() {
        let image = textured(16, 16, 8);
        let p = params(ModePolicy::IntraOnly, 8);
        let (enc, _, decoded) = roundtrip(&p, &image, Some(&image), FrameType::Inter);
        assert_eq!(enc.frame_type, FrameType::Inter);
        assert_eq!(enc.inter_blocks, 0);
        assert_eq!(decoded, image);
    }

    #[test]
    fn inter_only_policy_forces_inter() {
        let reference = textured(16, 16, 8);
        let image = textured(16, 16, 9);
        let p = params(ModePolicy::InterOnly, 8);
        let (enc, _, decoded) = roundtrip(&p, &image, Some(&reference), FrameType::Inter);
        assert_eq!(enc.inter_blocks, 4);
        assert_eq!(decoded, image);
    }

    #[test]
    fn hybrid_prefers_intra_on_ties() {
        // Flat frame at the fallback value: both predictors are exact.
        let image = Image::solid(8, 8, ColorMode::Gray, BitDepth::Eight, 128);
        let p = params(ModePolicy::Hybrid, 4);
        let (enc, _, decoded) = roundtrip(&p, &image, Some(&image), FrameType::Inter);
        assert_eq!(enc.intra_blocks, 4);
        assert_eq!(decoded, image);
    }

    #[test]
    fn edge_blocks_roundtrip() {
        let reference = textured(23, 17, 2);
        let image = textured(23, 17, 3);
        for policy in [ModePolicy::IntraOnly, ModePolicy::InterOnly, ModePolicy::Hybrid] {
            let p = params(policy, 8);
            let (enc, dec, decoded) = roundtrip(&p, &image, Some(&reference), FrameType::Inter);
            assert_eq!(enc.blocks(), 3 * 3);
            assert_eq!(enc, dec);
            assert_eq!(decoded, image);
        }
    }

    #[test]
    fn fixed_non_power_of_two_parameter() {
        let image = textured(12, 12, 6);
        let p = CodecParameters {
            golomb: GolombParameter::Fixed(37),
            ..Default::default()
        };
        let (enc, _, decoded) = roundtrip(&p, &image, None, FrameType::Intra);
        assert_eq!(enc.golomb_m, 37);
        assert_eq!(decoded, image);
    }

    #[test]
    fn yuv420_high_bit_depth_roundtrip() {
        let mut planes = Vec::new();
        for i in 0..3 {
            let (pw, ph) = ColorMode::Yuv420.plane_dimensions(i, 13, 9);
            let data = (0..pw * ph).map(|k| ((k * 97 + i as u32 * 31) % 1024) as u16).collect();
            planes.push(Plane::new(pw, ph, data).unwrap());
        }
        let image = Image::from_planes(13, 9, ColorMode::Yuv420, BitDepth::Ten, planes).unwrap();
        let p = CodecParameters {
            color_mode: ColorMode::Yuv420,
            bit_depth: BitDepth::Ten,
            block_size: 4,
            ..Default::default()
        };
        let (_, _, decoded) = roundtrip(&p, &image, Some(&image), FrameType::Inter);
        assert_eq!(decoded, image);
    }

    #[test]
    fn layout_mismatch_rejected() {
        let image = textured(8, 8, 1);
        let p = CodecParameters {
            bit_depth: BitDepth::Ten,
            ..Default::default()
        };
        let mut w = BitWriter::new();
        assert!(matches!(
            FrameEncoder::new(&p)
                .unwrap()
                .encode(&image, None, FrameType::Intra, 0, &mut w),
            Err(CodecError::InvalidParameters(_))
        ));
    }

    #[test]
    fn reference_size_mismatch_rejected() {
        let image = textured(8, 8, 1);
        let reference = textured(16, 8, 1);
        let mut w = BitWriter::new();
        assert!(matches!(
            FrameEncoder::new(&CodecParameters::default())
                .unwrap()
                .encode(&image, Some(&reference), FrameType::Inter, 0, &mut w),
            Err(CodecError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn truncated_record_is_fatal() {
        let image = textured(16, 16, 12);
        let p = CodecParameters::default();
        let mut w = BitWriter::new();
        FrameEncoder::new(&p)
            .unwrap()
            .encode(&image, None, FrameType::Intra, 0, &mut w)
            .unwrap();
        let bytes = w.finalize();
        let cut = &bytes[..bytes.len() / 2];
        let mut r = BitReader::new(cut);
        assert!(matches!(
            FrameDecoder::new(&p).unwrap().decode(&mut r, None, 16, 16, 0),
            Err(CodecError::EndOfStream { .. })
        ));
    }

    #[test]
    fn inter_bit_in_intra_frame_is_invalid() {
        let mut w = BitWriter::new();
        w.write_bits(1, 16);
        w.write_bit(false);
        w.write_bit(true);
        w.write_bits(0, 32);
        let bytes = w.finalize();
        let mut r = BitReader::new(&bytes);
        assert!(matches!(
            FrameDecoder::new(&CodecParameters::default())
                .unwrap()
                .decode(&mut r, None, 4, 4, 0),
            Err(CodecError::InvalidStream(_))
        ));
    }

    #[test]
    fn motion_vector_beyond_window_is_invalid() {
        let reference = textured(16, 16, 1);
        let p = CodecParameters {
            search_window: 2,
            block_size: 8,
            ..Default::default()
        };
        let coder = GolombCoder::new(1).unwrap();
        let mut w = BitWriter::new();
        w.write_bits(1, 16);
        w.write_bit(true);
        w.write_bit(true);
        coder.encode(&mut w, 3);
        coder.encode(&mut w, 0);
        for _ in 0..5 {
            w.write_bits(0, 64);
        }
        let bytes = w.finalize();
        let mut r = BitReader::new(&bytes);
        assert!(matches!(
            FrameDecoder::new(&p)
                .unwrap()
                .decode(&mut r, Some(&reference), 16, 16, 0),
            Err(CodecError::InvalidStream(_))
        ));
    }

    #[test]
    fn minimum_record_size() {
        // 16 + 1 frame bits, 4 blocks, 256 residuals
        assert_eq!(minimum_record_bits(ColorMode::Gray, 16, 16, 8), 17 + 4 + 256);
        // 3x3 chroma planes of 1 block each
        assert_eq!(
            minimum_record_bits(ColorMode::Yuv420, 5, 5, 8),
            17 + (1 + 25) + 2 * (1 + 9)
        );
    }

    #[test]
    fn oversized_geometry_needs_matching_input() {
        let p = CodecParameters {
            block_size: 1,
            ..Default::default()
        };
        let bytes = [0u8, 1, 0, 0];
        let mut r = BitReader::new(&bytes);
        assert_eq!(
            FrameDecoder::new(&p)
                .unwrap()
                .decode(&mut r, None, MAX_DIMENSION, MAX_DIMENSION, 0)
                .unwrap_err(),
            CodecError::EndOfStream { position: 0 }
        );
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn decoder_rejects_invalid_dimensions() {
        let decoder = FrameDecoder::new(&CodecParameters::default()).unwrap();
        let bytes = [0u8; 64];
        for (w, h) in [(0, 0), (0, 4), (4, 0), (MAX_DIMENSION + 1, 4), (4, MAX_DIMENSION + 1)] {
            let mut r = BitReader::new(&bytes);
            match decoder.decode(&mut r, None, w, h, 0).unwrap_err() {
                CodecError::InvalidParameters(_) => {}
                other => panic!("{w}x{h}: expected InvalidParameters, got {other:?}"),
            }
            assert_eq!(r.position(), 0);
        }
    }
}

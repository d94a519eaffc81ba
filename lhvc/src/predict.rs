use crate::error::{CodecError, Result};
use crate::image::{Block, Plane};
use crate::motion::MotionVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    Intra,
    Inter(MotionVector),
}

impl PredictionMode {
    pub fn is_inter(&self) -> bool {
        matches!(self, PredictionMode::Inter(_))
    }
}

/// Median edge detector over the left (`a`), above (`b`) and above-left (`c`) neighbours.
#[inline]
pub fn med(a: i32, b: i32, c: i32) -> i32 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if c >= hi {
        lo
    } else if c <= lo {
        hi
    } else {
        a + b - c
    }
}

/// Intra prediction of the sample at `(x, y)` from causal neighbours in `plane`.
/// Neighbours outside the plane read as `fallback`.
#[inline]
pub fn predict_intra_sample(plane: &Plane, x: u32, y: u32, fallback: u16) -> i32 {
    let at = |px: Option<u32>, py: Option<u32>| -> i32 {
        match (px, py) {
            (Some(px), Some(py)) => plane.get(px, py) as i32,
            _ => fallback as i32,
        }
    };
    let left = x.checked_sub(1);
    let up = y.checked_sub(1);
    let a = at(left, Some(y));
    let b = at(Some(x), up);
    let c = at(left, up);
    med(a, b, c)
}

/// Intra prediction for `block`. Valid whenever every causal neighbour in
/// `plane` already holds its reconstructed value, which is the case for the
/// source image itself since coding is lossless.
pub fn predict_intra(plane: &Plane, block: &Block, fallback: u16) -> Result<Vec<i32>> {
    if !plane.contains(block) {
        return Err(plane.out_of_bounds(block, 0, 0));
    }
    let mut out = Vec::with_capacity(block.len());
    for r in 0..block.height {
        for c in 0..block.width {
            out.push(predict_intra_sample(plane, block.x + c, block.y + r, fallback));
        }
    }
    Ok(out)
}

pub fn predict_inter(reference: &Plane, block: &Block, mv: MotionVector) -> Result<Vec<i32>> {
    Ok(reference
        .block_samples(block, mv.dx, mv.dy)?
        .into_iter()
        .map(i32::from)
        .collect())
}

pub fn residual(original: &[u16], predicted: &[i32]) -> Vec<i32> {
    debug_assert_eq!(original.len(), predicted.len());
    original
        .iter()
        .zip(predicted)
        .map(|(&o, &p)| o as i32 - p)
        .collect()
}

pub fn reconstruct(predicted: &[i32], residual: &[i32], max_value: u16) -> Result<Vec<u16>> {
    debug_assert_eq!(predicted.len(), residual.len());
    predicted
        .iter()
        .zip(residual)
        .map(|(&p, &r)| to_sample(p as i64 + r as i64, max_value))
        .collect()
}

/// Decoder-side intra reconstruction: each sample is predicted from the
/// already reconstructed samples of `recon` and written back before the next.
pub fn reconstruct_intra_in_place(
    recon: &mut Plane,
    block: &Block,
    residual: &[i32],
    fallback: u16,
    max_value: u16,
) -> Result<()> {
    if !recon.contains(block) || residual.len() != block.len() {
        return Err(recon.out_of_bounds(block, 0, 0));
    }
    let mut i = 0;
    for r in 0..block.height {
        for c in 0..block.width {
            let (x, y) = (block.x + c, block.y + r);
            let p = predict_intra_sample(recon, x, y, fallback);
            let value = to_sample(p as i64 + residual[i] as i64, max_value)?;
            i += 1;
            recon.set(x, y, value);
        }
    }
    Ok(())
}

fn to_sample(v: i64, max_value: u16) -> Result<u16> {
    if (0..=max_value as i64).contains(&v) {
        Ok(v as u16)
    } else {
        Err(CodecError::InvalidStream(format!(
            "reconstructed sample {v} outside 0..={max_value}"
        )))
    }
}

pub fn sum_abs(residual: &[i32]) -> u64 {
    residual.iter().map(|r| r.unsigned_abs() as u64).sum()
}

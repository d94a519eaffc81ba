//! Block motion estimation against the previous reconstructed frame.

use crate::error::{CodecError, Result};
use crate::image::{Block, Plane};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MotionVector {
    pub dx: i32,
    pub dy: i32,
}

impl MotionVector {
    pub const ZERO: MotionVector = MotionVector { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }

    pub fn within(&self, window: u32) -> bool {
        self.dx.unsigned_abs() <= window && self.dy.unsigned_abs() <= window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub vector: MotionVector,
    pub cost: u64,
}

/// Sum of absolute differences between `block` of `target` and the same
/// block of `reference` displaced by `mv`. `None` when the displaced block
/// leaves the reference plane.
pub fn sad(reference: &Plane, target: &Plane, block: &Block, mv: MotionVector) -> Option<u64> {
    if !block.fits_displaced(mv.dx, mv.dy, reference.width, reference.height) {
        return None;
    }
    let rx = (block.x as i64 + mv.dx as i64) as usize;
    let ry = (block.y as i64 + mv.dy as i64) as u32;
    let w = block.width as usize;
    let mut total = 0u64;
    for r in 0..block.height {
        let src = &target.row(block.y + r)[block.x as usize..block.x as usize + w];
        let refr = &reference.row(ry + r)[rx..rx + w];
        total += src
            .iter()
            .zip(refr)
            .map(|(&s, &p)| (s as i32 - p as i32).unsigned_abs() as u64)
            .sum::<u64>();
    }
    Some(total)
}

fn check_inputs(reference: &Plane, target: &Plane, block: &Block) -> Result<()> {
    if reference.width != target.width || reference.height != target.height {
        return Err(CodecError::DimensionMismatch {
            expected_w: target.width,
            expected_h: target.height,
            got_w: reference.width,
            got_h: reference.height,
        });
    }
    if block.is_empty() || !target.contains(block) {
        return Err(target.out_of_bounds(block, 0, 0));
    }
    Ok(())
}

fn initial_step(window: u32) -> u32 {
    if window == 0 {
        0
    } else {
        1 << (31 - window.leading_zeros())
    }
}

/// Rood pattern search.
///
/// Starting from the zero vector, the four axis neighbours at distance
/// `step` are evaluated in the order up, down, left, right. The centre moves
/// to the cheapest neighbour when it is strictly cheaper; otherwise the step
/// is halved. The first step is the largest power of two not above `window`.
/// Candidates beyond the window or outside the reference plane are skipped.
pub fn search(reference: &Plane, target: &Plane, block: &Block, window: u32) -> Result<SearchResult> {
    check_inputs(reference, target, block)?;

    let mut best = MotionVector::ZERO;
    let mut best_cost = sad(reference, target, block, best)
        .ok_or_else(|| reference.out_of_bounds(block, 0, 0))?;
    let mut step = initial_step(window) as i32;
    let mut evaluated = 1u32;

    while step > 0 {
        let mut moved: Option<(MotionVector, u64)> = None;
        for (ox, oy) in [(0, -step), (0, step), (-step, 0), (step, 0)] {
            let cand = MotionVector::new(best.dx + ox, best.dy + oy);
            if !cand.within(window) {
                continue;
            }
            let Some(cost) = sad(reference, target, block, cand) else {
                continue;
            };
            evaluated += 1;
            let current = moved.map_or(best_cost, |(_, c)| c);
            if cost < current {
                moved = Some((cand, cost));
            }
        }
        match moved {
            Some((mv, cost)) => {
                best = mv;
                best_cost = cost;
            }
            None => step /= 2,
        }
    }

    tracing::trace!(
        x = block.x,
        y = block.y,
        dx = best.dx,
        dy = best.dy,
        cost = best_cost,
        evaluated,
        "rood search"
    );

    Ok(SearchResult {
        vector: best,
        cost: best_cost,
    })
}

/// Full search over every vector of the window, raster order, ties to the first found.
pub fn exhaustive_search(
    reference: &Plane,
    target: &Plane,
    block: &Block,
    window: u32,
) -> Result<SearchResult> {
    check_inputs(reference, target, block)?;

    let w = window as i32;
    let mut best = SearchResult {
        vector: MotionVector::ZERO,
        cost: sad(reference, target, block, MotionVector::ZERO)
            .ok_or_else(|| reference.out_of_bounds(block, 0, 0))?,
    };
    for dy in -w..=w {
        for dx in -w..=w {
            let cand = MotionVector::new(dx, dy);
            if let Some(cost) = sad(reference, target, block, cand) {
                if cost < best.cost {
                    best = SearchResult { vector: cand, cost };
                }
            }
        }
    }
    Ok(best)
}

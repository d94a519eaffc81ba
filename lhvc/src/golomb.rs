//! Golomb-Rice residual coding.
//!
//! A value `v` is split into `q = v / m`, written in unary, and `r = v % m`,
//! written in truncated binary so that the code stays prefix-free when `m` is
//! not a power of two. Signed values go through the zig-zag bijection first.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

pub const MAX_PARAMETER: u32 = u16::MAX as u32;
const MAX_RICE_K: u32 = 15;

/// Maps `0, 1, -1, 2, -2, ...` to `0, 1, 2, 3, 4, ...`. `i32::MIN` has no image.
pub fn zigzag(v: i32) -> u32 {
    debug_assert!(v != i32::MIN);
    if v > 0 {
        (v as u32) * 2 - 1
    } else {
        v.unsigned_abs() * 2
    }
}

pub fn unzigzag(u: u32) -> i32 {
    if u & 1 == 1 {
        (u / 2 + 1) as i32
    } else {
        -((u / 2) as i64) as i32
    }
}

/// Rice parameter selection: the smallest `k` with `N << k >= A`, where `A`
/// is the sum of the mapped values and `N` their count.
pub fn select_parameter(values: &[i32]) -> u32 {
    if values.is_empty() {
        return 1;
    }
    let n = values.len() as u64;
    let a: u64 = values.iter().map(|&v| zigzag(v) as u64).sum();
    let mut k = 0;
    while k < MAX_RICE_K && (n << k) < a {
        k += 1;
    }
    1 << k
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GolombCoder {
    m: u32,
    bits: u8,
    cutoff: u32,
}

impl GolombCoder {
    pub fn new(m: u32) -> Result<Self> {
        if m == 0 || m > MAX_PARAMETER {
            return Err(CodecError::InvalidParameters(format!(
                "golomb parameter must be in 1..={MAX_PARAMETER}, got {m}"
            )));
        }
        let bits = (32 - (m - 1).leading_zeros()) as u8;
        let cutoff = ((1u64 << bits) - m as u64) as u32;
        Ok(Self { m, bits, cutoff })
    }

    pub fn m(&self) -> u32 {
        self.m
    }

    pub fn is_rice(&self) -> bool {
        self.m.is_power_of_two()
    }

    pub fn encode_unsigned(&self, w: &mut BitWriter, v: u32) {
        w.write_unary((v / self.m) as u64);
        let r = v % self.m;
        if self.bits == 0 {
            return;
        }
        if r < self.cutoff {
            w.write_bits(r as u64, self.bits - 1);
        } else {
            w.write_bits((r + self.cutoff) as u64, self.bits);
        }
    }

    pub fn decode_unsigned(&self, r: &mut BitReader<'_>) -> Result<u32> {
        let q = r.read_unary()?;
        let rem = if self.bits == 0 {
            0
        } else {
            let head = r.read_bits(self.bits - 1)? as u32;
            if head < self.cutoff {
                head
            } else {
                let tail = r.read_bits(1)? as u32;
                ((head << 1) | tail) - self.cutoff
            }
        };
        let value = q * self.m as u64 + rem as u64;
        u32::try_from(value)
            .map_err(|_| CodecError::InvalidStream(format!("golomb value {value} overflows")))
    }

    pub fn encode(&self, w: &mut BitWriter, v: i32) {
        self.encode_unsigned(w, zigzag(v));
    }

    pub fn decode(&self, r: &mut BitReader<'_>) -> Result<i32> {
        Ok(unzigzag(self.decode_unsigned(r)?))
    }

    /// Length in bits of the code for `v`, without writing it.
    pub fn code_len(&self, v: i32) -> u64 {
        let u = zigzag(v);
        let q = (u / self.m) as u64 + 1;
        let r = u % self.m;
        let rem = match self.bits {
            0 => 0,
            b if r < self.cutoff => (b - 1) as u64,
            b => b as u64,
        };
        q + rem
    }
}

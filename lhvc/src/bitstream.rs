use crate::error::{CodecError, Result};

#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    current_byte: u8,
    bits_in_current: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | (bit as u8);
        self.bits_in_current += 1;
        if self.bits_in_current == 8 {
            self.buf.push(self.current_byte);
            self.current_byte = 0;
            self.bits_in_current = 0;
        }
    }

    /// Appends the `n` low-order bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, n: u8) {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// `n` one-bits terminated by a zero-bit.
    pub fn write_unary(&mut self, n: u64) {
        let mut left = n;
        while self.bits_in_current != 0 && left > 0 {
            self.write_bit(true);
            left -= 1;
        }
        while left >= 8 {
            self.buf.push(0xFF);
            left -= 8;
        }
        for _ in 0..left {
            self.write_bit(true);
        }
        self.write_bit(false);
    }

    pub fn position(&self) -> u64 {
        self.buf.len() as u64 * 8 + self.bits_in_current as u64
    }

    /// Appends every bit written to `other`, without alignment padding.
    pub fn append(&mut self, other: BitWriter) {
        if self.bits_in_current == 0 {
            self.buf.extend_from_slice(&other.buf);
        } else {
            for &byte in &other.buf {
                self.write_bits(byte as u64, 8);
            }
        }
        self.write_bits(other.current_byte as u64, other.bits_in_current);
    }

    pub fn byte_align(&mut self) {
        if self.bits_in_current > 0 {
            self.current_byte <<= 8 - self.bits_in_current;
            self.buf.push(self.current_byte);
            self.current_byte = 0;
            self.bits_in_current = 0;
        }
    }

    pub fn finalize(mut self) -> Vec<u8> {
        self.byte_align();
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> u64 {
        self.len() - self.pos
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.len() {
            return Err(CodecError::EndOfStream { position: self.pos });
        }
        let byte = self.data[(self.pos / 8) as usize];
        let bit = (byte >> (7 - (self.pos % 8))) & 1 == 1;
        self.pos += 1;
        Ok(bit)
    }

    /// Reads `n` bits, most significant first. The cursor does not move on failure.
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        debug_assert!(n <= 64);
        if (n as u64) > self.remaining() {
            return Err(CodecError::EndOfStream { position: self.pos });
        }
        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }

    /// Counts one-bits up to the terminating zero-bit, which is consumed.
    pub fn read_unary(&mut self) -> Result<u64> {
        let mut n = 0u64;
        loop {
            if self.pos % 8 == 0 {
                let idx = (self.pos / 8) as usize;
                if idx < self.data.len() && self.data[idx] == 0xFF {
                    n += 8;
                    self.pos += 8;
                    continue;
                }
            }
            if !self.read_bit()? {
                return Ok(n);
            }
            n += 1;
        }
    }

    pub fn byte_align(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
        self.pos = self.pos.min(self.len());
    }
}

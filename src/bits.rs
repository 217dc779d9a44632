// ecomp: Lossless compression of multiple sequence alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::error::Error;

/// MSB-first bit accumulator for residue payloads.
///
/// Bits are emitted into bytes starting from bit 7; the final byte is
/// zero-padded on [BitWriter::finish].
///
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter { bytes: Vec::new(), bit_pos: 0 }
    }

    /// Write the lowest `width` bits of `value`, most significant first.
    pub fn write_bits(
        &mut self,
        value: u32,
        width: u8,
    ) {
        for shift in (0..width).rev() {
            let bit = (value >> shift) & 1;
            if self.bit_pos == 0 {
                self.bytes.push(0);
            }
            if bit != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (7 - self.bit_pos);
            }
            self.bit_pos = (self.bit_pos + 1) % 8;
        }
    }

    pub fn finish(
        self,
    ) -> Vec<u8> {
        self.bytes
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        BitWriter::new()
    }
}

/// MSB-first bit cursor over a byte slice.
pub struct BitReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(
        bytes: &'a [u8],
    ) -> Self {
        BitReader { bytes, cursor: 0, bit_pos: 0 }
    }

    /// Read a single bit.
    pub fn read_bit(
        &mut self,
    ) -> Result<u8, Error> {
        if self.cursor >= self.bytes.len() {
            return Err(Error::MalformedArchive(
                "residue bitstream exhausted".to_string(),
            ));
        }
        let bit = (self.bytes[self.cursor] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.cursor += 1;
        }
        Ok(bit)
    }

    /// Read `width` bits, most significant first.
    pub fn read_bits(
        &mut self,
        width: u8,
    ) -> Result<u32, Error> {
        let mut value: u32 = 0;
        for _ in 0..width {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Ok(value)
    }
}

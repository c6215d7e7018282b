// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

fn end_of_bitstream_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of bitstream"))
}

/// `BitReader` reads bits from most-significant to least-significant over a byte buffer.
///
/// Reading past the end of the buffer is an explicit error, never a silent wrap.
pub struct BitReader<'a> {
    buf: &'a [u8],
    byte_pos: usize,
    bit_pos: u32,
}

impl<'a> BitReader<'a> {
    /// Instantiate a new `BitReader` over the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, byte_pos: 0, bit_pos: 0 }
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        if self.byte_pos >= self.buf.len() {
            return end_of_bitstream_error();
        }

        let bit = (self.buf[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.advance(1);
        Ok(bit == 1)
    }

    /// Read up to 64 bits as an unsigned integer, MSB-first, crossing byte boundaries as
    /// required.
    pub fn read_bits(&mut self, num_bits: u32) -> io::Result<u64> {
        debug_assert!(num_bits <= 64);

        let mut value = 0u64;

        for _ in 0..num_bits {
            if self.byte_pos >= self.buf.len() {
                return end_of_bitstream_error();
            }

            let bit = (self.buf[self.byte_pos] >> (7 - self.bit_pos)) & 1;
            value = (value << 1) | u64::from(bit);
            self.advance(1);
        }

        Ok(value)
    }

    /// Advance the cursor by `num_bits` without materializing a value.
    pub fn ignore_bits(&mut self, num_bits: u32) -> io::Result<()> {
        let total = self.byte_pos as u64 * 8 + u64::from(self.bit_pos) + u64::from(num_bits);
        if total > self.buf.len() as u64 * 8 {
            return end_of_bitstream_error();
        }
        self.byte_pos = (total / 8) as usize;
        self.bit_pos = (total % 8) as u32;
        Ok(())
    }

    /// Returns true if at least one unread bit remains.
    pub fn has_data(&self) -> bool {
        self.byte_pos < self.buf.len()
    }

    /// The unread remainder of the buffer, starting at the next whole-byte boundary.
    pub fn remaining_buf(&self) -> &'a [u8] {
        let start = if self.bit_pos == 0 { self.byte_pos } else { self.byte_pos + 1 };
        &self.buf[start.min(self.buf.len())..]
    }

    fn advance(&mut self, num_bits: u32) {
        self.bit_pos += num_bits;
        self.byte_pos += (self.bit_pos / 8) as usize;
        self.bit_pos %= 8;
    }
}

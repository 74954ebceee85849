//! Bounds-checked reading of header bytes.
//!
//! Headers are loaded into memory whole (their size is recorded in the start
//! header and capped by [`ResourceLimits`](crate::ResourceLimits)), so the
//! parser reads from a slice rather than a stream. Every read checks the
//! remaining length first, which also means a hostile count can never make
//! the parser allocate more than the header itself holds.

use std::io;

use crate::backend::{DecoderError, DecoderResult, Status};

fn truncated(what: &str) -> DecoderError {
    DecoderError::new(Status::InputEof, format!("header truncated reading {what}"))
}

/// A cursor over header bytes.
#[derive(Debug, Clone)]
pub struct HeaderReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Reads a single byte.
    pub fn u8(&mut self) -> DecoderResult<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(|| truncated("byte"))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads `count` bytes.
    pub fn bytes(&mut self, count: usize) -> DecoderResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(truncated("bytes"));
        }
        let out = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(out)
    }

    /// Skips `count` bytes.
    pub fn skip(&mut self, count: u64) -> DecoderResult<()> {
        let count = usize::try_from(count).map_err(|_| truncated("skipped property"))?;
        self.bytes(count).map(|_| ())
    }

    /// Reads a little-endian u32.
    pub fn u32_le(&mut self) -> DecoderResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian u64.
    pub fn u64_le(&mut self) -> DecoderResult<u64> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a 7z variable-length number.
    ///
    /// The count of leading one bits in the first byte gives the number of
    /// extra little-endian bytes; the remaining low bits of the first byte
    /// are the most significant part of the value.
    ///
    /// - `0xxxxxxx`: value 0-127
    /// - `10xxxxxx` + 1 byte: value 0-16383
    /// - `11111111` + 8 bytes: full u64
    pub fn number(&mut self) -> DecoderResult<u64> {
        let first = self.u8()? as u64;
        let mut mask = 0x80u64;
        let mut value = 0u64;
        for i in 0..8 {
            if first & mask == 0 {
                return Ok(value | ((first & (mask - 1)) << (8 * i)));
            }
            value |= (self.u8()? as u64) << (8 * i);
            mask >>= 1;
        }
        Ok(value)
    }

    /// Reads a number that counts in-memory items, checking it against `max`.
    pub fn count(&mut self, max: usize, what: &str) -> DecoderResult<usize> {
        let n = self.number()?;
        match usize::try_from(n) {
            Ok(n) if n <= max => Ok(n),
            _ => Err(DecoderError::new(
                Status::Mem,
                format!("too many {what}: {n} (limit {max})"),
            )),
        }
    }

    /// Reads a bit vector of `count` entries, most significant bit first.
    pub fn bit_vector(&mut self, count: usize) -> DecoderResult<Vec<bool>> {
        let bytes = self.bytes(count.div_ceil(8))?;
        Ok((0..count)
            .map(|i| bytes[i / 8] & (0x80 >> (i % 8)) != 0)
            .collect())
    }

    /// Reads an "all defined" marker followed, when it is zero, by a bit
    /// vector.
    pub fn defined_vector(&mut self, count: usize) -> DecoderResult<Vec<bool>> {
        if self.u8()? != 0 {
            Ok(vec![true; count])
        } else {
            self.bit_vector(count)
        }
    }

    /// Reads the byte that flags data stored outside the header, rejecting
    /// it when set.
    pub fn inline_marker(&mut self, what: &str) -> DecoderResult<()> {
        match self.u8()? {
            0 => Ok(()),
            _ => Err(DecoderError::unsupported(format!("external {what}"))),
        }
    }
}

/// Writes a 7z variable-length number.
///
/// This is the inverse of [`HeaderReader::number`].
pub fn write_number<W: io::Write>(w: &mut W, value: u64) -> io::Result<()> {
    // Number of extra bytes: each one moves 8 bits out of the first byte,
    // which loses one bit of payload per extra byte.
    let mut extra = 0usize;
    while extra < 8 && value >= 1u64 << (7 * (extra + 1)) {
        extra += 1;
    }
    let mut out = [0u8; 9];
    if extra == 8 {
        out[0] = 0xFF;
    } else {
        let prefix = !(0xFFu8 >> extra);
        let high = (value >> (8 * extra)) as u8;
        out[0] = prefix | high;
    }
    for i in 0..extra {
        out[1 + i] = (value >> (8 * i)) as u8;
    }
    w.write_all(&out[..1 + extra])
}

//! LZMA and LZMA2 decoders.

use std::io::{self, Read};

use super::{Decoder, method};
use crate::backend::{DecoderError, DecoderResult};

/// LZMA decoder.
pub struct LzmaDecoder<R> {
    inner: lzma_rust2::LzmaReader<R>,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> LzmaDecoder<R> {
    /// Creates a new LZMA decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source
    /// * `properties` - LZMA properties (5 bytes: 1 byte props + 4 byte dict size)
    /// * `uncompressed_size` - Expected uncompressed size
    ///
    /// # Errors
    ///
    /// `Status::Unsupported` if the properties are short or invalid.
    pub fn new(input: R, properties: &[u8], uncompressed_size: u64) -> DecoderResult<Self> {
        let [props_byte, d0, d1, d2, d3, ..] = *properties else {
            return Err(DecoderError::unsupported(format!(
                "LZMA properties of {} bytes (need 5)",
                properties.len()
            )));
        };
        let dict_size = u32::from_le_bytes([d0, d1, d2, d3]);

        let reader = lzma_rust2::LzmaReader::new_with_props(
            input,
            uncompressed_size,
            props_byte,
            dict_size,
            None,
        )
        .map_err(|e| DecoderError::unsupported(format!("LZMA properties: {e}")))?;

        Ok(Self { inner: reader })
    }
}

impl<R: Read> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder for LzmaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA
    }
}

/// LZMA2 decoder.
pub struct Lzma2Decoder<R> {
    inner: lzma_rust2::Lzma2Reader<R>,
}

impl<R> std::fmt::Debug for Lzma2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lzma2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read> Lzma2Decoder<R> {
    /// Creates a new LZMA2 decoder.
    ///
    /// `properties` is the single byte encoding the dictionary size.
    pub fn new(input: R, properties: &[u8]) -> DecoderResult<Self> {
        let &[prop, ..] = properties else {
            return Err(DecoderError::unsupported("LZMA2 properties missing"));
        };
        let dict_size = decode_lzma2_dict_size(prop)?;

        Ok(Self {
            inner: lzma_rust2::Lzma2Reader::new(input, dict_size, None),
        })
    }
}

impl<R: Read> Read for Lzma2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder for Lzma2Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA2
    }
}

/// Decodes the LZMA2 dictionary size from the property byte.
///
/// The encoding is:
/// - 0-39: sizes from 4 KiB to 3 GiB, alternating `2^n` and `3 * 2^(n-1)`
/// - 40: 4 GiB - 1
pub fn decode_lzma2_dict_size(prop: u8) -> DecoderResult<u32> {
    if prop > 40 {
        return Err(DecoderError::unsupported(format!(
            "LZMA2 dictionary size property {prop}"
        )));
    }

    if prop == 40 {
        return Ok(0xFFFF_FFFF);
    }

    let base_log = (prop as u32) / 2 + 12;
    let dict_size = if prop % 2 == 0 {
        1u32 << base_log
    } else {
        3u32 << (base_log - 1)
    };

    Ok(dict_size)
}

/// Encodes a dictionary size into the LZMA2 property byte, rounding up to
/// the nearest representable size.
pub fn encode_lzma2_dict_size(dict_size: u32) -> u8 {
    (0..40u8)
        .find(|&prop| decode_lzma2_dict_size(prop).is_ok_and(|size| size >= dict_size))
        .unwrap_or(40)
}

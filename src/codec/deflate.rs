//! Deflate decoder.

use std::io::{self, BufRead, BufReader, Read};

use flate2::bufread::DeflateDecoder as FlateDecoder;

use super::{Decoder, method};

/// Deflate decoder.
pub struct DeflateDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder").finish_non_exhaustive()
    }
}

impl<R: BufRead> DeflateDecoder<R> {
    /// Creates a Deflate decoder over a buffered source.
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }
}

impl<R: Read> DeflateDecoder<BufReader<R>> {
    /// Creates a Deflate decoder, buffering an unbuffered source.
    pub fn unbuffered(input: R) -> Self {
        Self::new(BufReader::new(input))
    }
}

impl<R: BufRead> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: BufRead> Decoder for DeflateDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::DEFLATE
    }
}

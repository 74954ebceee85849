//! Reusable storage for decoded entry names.
//!
//! 7z stores names as UTF-16LE. Enumerating a large archive asks for every
//! name in turn, so the archive handle keeps a single [`FilenameBuffer`] and
//! hands out borrowed views into it instead of allocating per entry.

use crate::error::{Error, Result};

/// A growable byte buffer holding one UTF-16LE entry name.
///
/// The buffer only reallocates when a name is larger than its current
/// capacity and never shrinks until [`release`](Self::release) is called.
#[derive(Debug, Default)]
pub struct FilenameBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl FilenameBuffer {
    /// Creates an empty buffer. No memory is allocated until the first name
    /// is prepared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Readies the buffer for a name of `byte_len` bytes and returns the
    /// writable region.
    ///
    /// Existing storage is reused when it is large enough. Otherwise it is
    /// grown in place; if that allocation fails the buffer keeps its previous
    /// storage and contents.
    pub fn prepare(&mut self, byte_len: usize) -> Result<&mut [u8]> {
        if byte_len > self.bytes.len() {
            self.bytes
                .try_reserve_exact(byte_len - self.bytes.len())
                .map_err(|_| Error::out_of_memory(byte_len))?;
            self.bytes.resize(byte_len, 0);
        }
        self.len = byte_len;
        Ok(&mut self.bytes[..byte_len])
    }

    /// Returns the current name as raw UTF-16LE bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Returns the logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no name is held.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the allocated size in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Frees the storage.
    pub fn release(&mut self) {
        self.bytes = Vec::new();
        self.len = 0;
    }
}

/// Decodes UTF-16LE bytes into a `String`.
///
/// Trailing NUL code units are trimmed. Unpaired surrogates are replaced
/// with U+FFFD. An odd trailing byte is ignored.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let end = units
        .iter()
        .rposition(|&u| u != 0)
        .map_or(0, |pos| pos + 1);
    String::from_utf16_lossy(&units[..end])
}

/// Encodes a string as UTF-16LE bytes without a terminator.
pub fn encode_utf16le(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_unallocated() {
        let buf = FilenameBuffer::new();
        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_prepare_grows_then_reuses() {
        let mut buf = FilenameBuffer::new();
        buf.prepare(40).unwrap();
        assert_eq!(buf.capacity(), 40);

        buf.prepare(10).unwrap();
        assert_eq!(buf.capacity(), 40);
        assert_eq!(buf.len(), 10);

        buf.prepare(100).unwrap();
        assert_eq!(buf.capacity(), 100);
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn test_as_bytes_tracks_logical_length() {
        let mut buf = FilenameBuffer::new();
        buf.prepare(6).unwrap().copy_from_slice(&encode_utf16le("abc"));
        buf.prepare(2).unwrap().copy_from_slice(&encode_utf16le("z"));
        assert_eq!(buf.as_bytes(), &encode_utf16le("z")[..]);
        assert_eq!(decode_utf16le(buf.as_bytes()), "z");
    }

    #[test]
    fn test_failed_growth_keeps_storage() {
        let mut buf = FilenameBuffer::new();
        buf.prepare(6).unwrap().copy_from_slice(&encode_utf16le("abc"));

        let err = buf.prepare(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert_eq!(buf.capacity(), 6);
        assert_eq!(decode_utf16le(buf.as_bytes()), "abc");
    }

    #[test]
    fn test_release() {
        let mut buf = FilenameBuffer::new();
        buf.prepare(16).unwrap();
        buf.release();
        assert_eq!(buf.capacity(), 0);
        assert!(buf.as_bytes().is_empty());
    }

    #[test]
    fn test_decode_trims_trailing_nul() {
        let mut bytes = encode_utf16le("dir/file.txt");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(decode_utf16le(&bytes), "dir/file.txt");
    }

    #[test]
    fn test_decode_non_ascii() {
        let name = "данные/日本語.txt";
        assert_eq!(decode_utf16le(&encode_utf16le(name)), name);
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_utf16le(&[]), "");
        assert_eq!(decode_utf16le(&[0, 0]), "");
    }
}

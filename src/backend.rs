//! The archive backend contract.
//!
//! The archive handle never parses container formats or runs entropy
//! decoders itself. It talks to a backend through two traits:
//!
//! - [`ArchiveBackend`] turns an open stream into parsed index state.
//! - [`ArchiveIndex`] answers metadata queries and decodes whole blocks into
//!   a [`BlockCache`].
//!
//! The crate ships [`SevenZip`](crate::SevenZip) as the default backend.
//! Tests substitute instrumented doubles that count decode invocations.
//!
//! # Implementing `extract_block`
//!
//! A backend locates the block holding the entry and hands a decode closure
//! to [`BlockCache::load_block`]. The cache runs the closure only on a miss,
//! so solid-block entries are decoded once and sliced many times:
//!
//! ```rust,ignore
//! fn extract_block<R: Read + Seek>(
//!     &mut self,
//!     stream: &mut R,
//!     index: u32,
//!     cache: &mut BlockCache,
//! ) -> zextract::Result<EntrySpan> {
//!     let loc = self.locate(index);
//!     cache.load_block(loc.block, loc.block_size, |out| {
//!         self.decode(stream, loc.block, out).map_err(|e| e.for_entry(index))
//!     })?;
//!     Ok(EntrySpan::new(loc.offset, loc.len))
//! }
//! ```

use std::fmt;
use std::io::{self, Read, Seek};

use crate::cache::BlockCache;
use crate::config::ResourceLimits;
use crate::error::Error;

/// Status codes reported by a backend.
///
/// The set mirrors the result codes of the reference LZMA SDK, which is what
/// callers of archive libraries conventionally switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Status {
    /// Compressed data is corrupt.
    Data,
    /// The backend could not allocate working memory.
    Mem,
    /// A checksum did not match.
    Crc,
    /// The archive uses a method or feature the backend does not support.
    Unsupported,
    /// A parameter was invalid (for example an entry span outside its block).
    Param,
    /// The stream ended before the expected data.
    InputEof,
    /// Reading from the stream failed.
    Read,
    /// The archive structure is invalid.
    Archive,
    /// Any other failure.
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data error",
            Self::Mem => "memory error",
            Self::Crc => "CRC error",
            Self::Unsupported => "unsupported",
            Self::Param => "parameter error",
            Self::InputEof => "unexpected end of input",
            Self::Read => "read error",
            Self::Archive => "archive error",
            Self::Fail => "failure",
        };
        f.write_str(name)
    }
}

/// A failure reported by a backend, carrying its [`Status`] code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderError {
    status: Status,
    detail: String,
}

impl DecoderError {
    /// Creates a new backend error.
    pub fn new(status: Status, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`Status::Archive`] error.
    pub fn archive(detail: impl Into<String>) -> Self {
        Self::new(Status::Archive, detail)
    }

    /// Shorthand for a [`Status::Unsupported`] error.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(Status::Unsupported, detail)
    }

    /// Returns the status code.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the human-readable detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Converts this failure into an [`Error::Decode`] for `index`.
    pub fn for_entry(self, index: u32) -> Error {
        Error::Decode {
            index,
            source: self,
        }
    }
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl std::error::Error for DecoderError {}

impl From<io::Error> for DecoderError {
    fn from(e: io::Error) -> Self {
        let status = match e.kind() {
            io::ErrorKind::UnexpectedEof => Status::InputEof,
            io::ErrorKind::OutOfMemory => Status::Mem,
            io::ErrorKind::InvalidData => Status::Data,
            _ => Status::Read,
        };
        Self::new(status, e.to_string())
    }
}

/// Result alias used inside backends.
pub type DecoderResult<T> = std::result::Result<T, DecoderError>;

/// Location of one entry's bytes inside the resident block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntrySpan {
    /// Byte offset of the entry within the decoded block.
    pub offset: usize,
    /// Decoded length of the entry in bytes.
    pub len: usize,
}

impl EntrySpan {
    /// The span of an entry without data (directories, empty files).
    pub const EMPTY: Self = Self { offset: 0, len: 0 };

    /// Creates a span.
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Returns the exclusive end offset, or `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len)
    }
}

/// Opens archive index state from a stream.
pub trait ArchiveBackend {
    /// The parsed index type produced by this backend.
    type Index: ArchiveIndex;

    /// Parses the archive index.
    ///
    /// `limits` bounds what a hostile header may make the backend allocate.
    fn open_index<R: Read + Seek>(
        &self,
        stream: &mut R,
        limits: &ResourceLimits,
    ) -> DecoderResult<Self::Index>;
}

/// Parsed archive index state.
///
/// Index arguments are guaranteed by the caller to be in
/// `[0, file_count())`; the archive handle validates them before delegating.
pub trait ArchiveIndex {
    /// Returns the number of entries.
    fn file_count(&self) -> u32;

    /// Returns the length of the entry name in UTF-16 code units.
    fn name_utf16_len(&self, index: u32) -> usize;

    /// Writes the entry name as UTF-16LE into `dest`.
    ///
    /// `dest` is exactly `2 * name_utf16_len(index)` bytes long.
    fn name_utf16(&self, index: u32, dest: &mut [u8]) -> DecoderResult<()>;

    /// Returns `true` if the entry is a directory.
    fn is_directory(&self, index: u32) -> bool;

    /// Returns the decoded size of the entry in bytes.
    fn decoded_size(&self, index: u32) -> u64;

    /// Returns the CRC-32 recorded for the entry, if any.
    fn entry_crc(&self, _index: u32) -> Option<u32> {
        None
    }

    /// Makes the block holding `index` resident in `cache` and returns where
    /// the entry lives inside it.
    ///
    /// Implementations go through [`BlockCache::load_block`] so that a
    /// resident block is never decoded twice.
    fn extract_block<R: Read + Seek>(
        &mut self,
        stream: &mut R,
        index: u32,
        cache: &mut BlockCache,
    ) -> crate::Result<EntrySpan>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_status_mapping() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(DecoderError::from(eof).status(), Status::InputEof);

        let data = io::Error::new(io::ErrorKind::InvalidData, "bad");
        assert_eq!(DecoderError::from(data).status(), Status::Data);

        let other = io::Error::other("x");
        assert_eq!(DecoderError::from(other).status(), Status::Read);
    }

    #[test]
    fn test_display() {
        let e = DecoderError::new(Status::Crc, "folder 2");
        assert_eq!(e.to_string(), "CRC error: folder 2");
    }

    #[test]
    fn test_for_entry() {
        let e = DecoderError::unsupported("BCJ2").for_entry(4);
        match e {
            Error::Decode { index, source } => {
                assert_eq!(index, 4);
                assert_eq!(source.status(), Status::Unsupported);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_span_end_overflow() {
        assert_eq!(EntrySpan::new(3, 4).end(), Some(7));
        assert_eq!(EntrySpan::new(usize::MAX, 1).end(), None);
        assert_eq!(EntrySpan::EMPTY.end(), Some(0));
    }
}

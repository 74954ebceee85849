//! Error types for archive extraction.
//!
//! This module provides the [`Error`] enum which represents every failure
//! mode of the archive handle, the decode cache, and the disk-backed spill
//! buffer, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Failures
//! reported by the archive backend are wrapped rather than flattened, so the
//! underlying [`Status`] code is always available through [`Error::status`].
//!
//! ```rust,no_run
//! use zextract::{Archive, Error};
//!
//! fn first_entry_len(path: &str) -> zextract::Result<usize> {
//!     let mut archive = match Archive::open_path(path) {
//!         Ok(archive) => archive,
//!         Err(Error::Open { path, source }) => {
//!             eprintln!("cannot open {}: {}", path.display(), source);
//!             return Err(Error::Open { path, source });
//!         }
//!         Err(e) => return Err(e),
//!     };
//!     Ok(archive.extract(0)?.len())
//! }
//! ```
//!
//! ## Falling Back From Spill Mode
//!
//! A disk-backed buffer may be unavailable (no writable temp directory,
//! descriptor exhaustion). That failure is recoverable: keep using the heap.
//!
//! ```rust,no_run
//! use zextract::{Archive, Error};
//!
//! # fn main() -> zextract::Result<()> {
//! let mut archive = Archive::open_path("large.7z")?;
//! match archive.enable_spill() {
//!     Ok(()) => {}
//!     Err(Error::MapUnavailable(e)) => eprintln!("spill disabled: {}", e),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::PathBuf;

use crate::backend::{DecoderError, Status};

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Opening | [`Open`][Self::Open], [`CorruptArchive`][Self::CorruptArchive] | Missing file, damaged index |
/// | Contract | [`IndexOutOfRange`][Self::IndexOutOfRange], [`AlreadySpilled`][Self::AlreadySpilled] | Caller bug |
/// | Decoding | [`NameDecode`][Self::NameDecode], [`Decode`][Self::Decode], [`CrcMismatch`][Self::CrcMismatch] | Corrupt data, unsupported method |
/// | Memory | [`MapUnavailable`][Self::MapUnavailable], [`OutOfMemory`][Self::OutOfMemory] | Resource pressure |
/// | I/O | [`Io`][Self::Io] | Writing extracted data |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The archive file could not be opened.
    ///
    /// Fatal to this open attempt only; the caller may retry with another
    /// path. No descriptor is left open when this is returned.
    #[error("Cannot open archive {}: {source}", path.display())]
    Open {
        /// The path that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The archive index could not be parsed.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(#[source] DecoderError),

    /// An entry index outside `[0, count)` was supplied.
    ///
    /// This is a programming-contract violation. Validate indices against
    /// [`Archive::file_count`](crate::Archive::file_count) before calling.
    /// The decode cache is never touched when this is returned.
    #[error("Entry index {index} out of range (archive has {count} entries)")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Number of entries in the archive.
        count: u32,
    },

    /// The backend failed to produce the name of an entry.
    ///
    /// The handle remains usable for other entries.
    #[error("Cannot decode name of entry {index}: {source}")]
    NameDecode {
        /// Entry index.
        index: u32,
        /// The backend failure.
        #[source]
        source: DecoderError,
    },

    /// The backend failed to decode the block holding an entry.
    ///
    /// Typical causes are corrupt data or an unsupported compression method.
    /// The handle remains usable for other entries and the decode cache is
    /// left empty.
    #[error("Cannot decode entry {index}: {source}")]
    Decode {
        /// Entry index.
        index: u32,
        /// The backend failure.
        #[source]
        source: DecoderError,
    },

    /// A disk-backed decode buffer could not be established.
    ///
    /// Non-fatal: the cache keeps its heap backing and extraction can
    /// continue without spill mode.
    #[error("Disk-backed buffer unavailable: {0}")]
    MapUnavailable(#[source] io::Error),

    /// An allocation or mapping of `requested` bytes could not be satisfied.
    ///
    /// Reported separately from [`MapUnavailable`][Self::MapUnavailable] so
    /// callers can decide whether retrying with a smaller block makes sense.
    #[error("Out of memory allocating {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested.
        requested: u64,
    },

    /// Spill mode was requested on a cache that is already disk-backed.
    #[error("Decode buffer is already disk-backed")]
    AlreadySpilled,

    /// The extracted data does not match the CRC recorded in the archive.
    #[error("CRC mismatch for entry {index}: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// Entry index.
        index: u32,
        /// CRC recorded in the archive.
        expected: u32,
        /// CRC of the extracted bytes.
        actual: u32,
    },

    /// An I/O error occurred outside of archive parsing (for example while
    /// writing extracted data to a sink).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` if the handle is still usable after this error.
    ///
    /// Opening failures are not recoverable (there is no handle yet), and an
    /// allocation failure means the caller should abandon the entry rather
    /// than retry it identically.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. }
                | Self::NameDecode { .. }
                | Self::Decode { .. }
                | Self::MapUnavailable(_)
                | Self::CrcMismatch { .. }
                | Self::AlreadySpilled
        )
    }

    /// Returns the backend status code wrapped by this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::CorruptArchive(e) => Some(e.status()),
            Self::NameDecode { source, .. } | Self::Decode { source, .. } => Some(source.status()),
            _ => None,
        }
    }

    /// Maps an allocation failure onto [`Error::OutOfMemory`].
    pub(crate) fn out_of_memory(requested: impl TryInto<u64>) -> Self {
        Self::OutOfMemory {
            requested: requested.try_into().unwrap_or(u64::MAX),
        }
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

//! The archive handle.
//!
//! An [`Archive`] owns everything needed to serve entries from one open
//! archive: the parsed index, the file stream, a [`FilenameBuffer`] reused
//! by every metadata query, and a [`BlockCache`] holding the most recently
//! decoded block.
//!
//! # Example
//!
//! ```rust,no_run
//! use zextract::Archive;
//!
//! # fn main() -> zextract::Result<()> {
//! let mut archive = Archive::open_path("archive.7z")?;
//!
//! for index in 0..archive.file_count() {
//!     let meta = archive.metadata(index)?;
//!     if meta.is_directory {
//!         continue;
//!     }
//!     let name = meta.name_string();
//!     let data = archive.extract(index)?;
//!     println!("{}: {} bytes", name, data.len());
//! }
//!
//! archive.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Borrowed Views
//!
//! [`metadata`](Archive::metadata) and [`extract`](Archive::extract) return
//! views into buffers the handle owns. The borrow checker keeps each view
//! alive only until the next call that may overwrite the buffer:
//!
//! ```rust,compile_fail
//! # fn demo(archive: &mut zextract::Archive) -> zextract::Result<()> {
//! let first = archive.extract(0)?;
//! let second = archive.extract(1)?; // error: `archive` is still borrowed
//! assert_eq!(first.len(), second.len());
//! # Ok(())
//! # }
//! ```

mod archive_open;
mod archive_query;
mod extraction;

use std::fs::File;
use std::io::BufReader;

use crate::cache::{BlockCache, CacheOwner};
use crate::config::ArchiveConfig;
use crate::names::{FilenameBuffer, decode_utf16le};
use crate::sevenz::SevenZipIndex;

/// An open archive.
///
/// `I` is the backend's index type and `R` the stream it reads from. The
/// defaults describe a 7z file opened with
/// [`open_path`](Archive::open_path).
///
/// A handle is used through `&mut self` only; it may move between threads
/// when `I` and `R` allow it but is never shared.
pub struct Archive<I = SevenZipIndex, R = BufReader<File>> {
    pub(crate) index: I,
    pub(crate) reader: R,
    pub(crate) names: FilenameBuffer,
    pub(crate) cache: BlockCache,
    pub(crate) config: ArchiveConfig,
    /// Tags every cache this handle decodes into.
    pub(crate) owner: CacheOwner,
}

impl<I, R> std::fmt::Debug for Archive<I, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Metadata of one entry, borrowed from the archive's name buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata<'a> {
    /// The entry name as UTF-16LE bytes, without a terminating NUL.
    pub name: &'a [u8],
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Decoded size in bytes.
    pub size: u64,
}

impl EntryMetadata<'_> {
    /// Decodes the name, replacing invalid UTF-16 and trimming trailing NUL
    /// code units.
    pub fn name_string(&self) -> String {
        decode_utf16le(self.name)
    }
}

/// Owned summary of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry index.
    pub index: u32,
    /// Entry path as stored in the archive.
    pub path: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

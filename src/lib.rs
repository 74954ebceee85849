//! # zextract
//!
//! Entry extraction from 7z archives with a reusable decode cache.
//!
//! Solid 7z archives compress many files into one block. Extracting those
//! files one at a time naively decodes the block once per file. This crate
//! keeps the most recently decoded block resident, so sequential entries
//! from the same block are served without decoding again, and can place
//! that block in a temporary file mapping instead of the heap when it is
//! large.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zextract::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("archive.7z")?;
//!
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.path, entry.size);
//!     }
//!
//!     let data = archive.extract_to_vec(0)?;
//!     println!("first entry has {} bytes", data.len());
//!
//!     // Entries 1 and 2 share a block: the second call decodes nothing.
//!     archive.extract(1)?;
//!     archive.extract(2)?;
//!     println!("{:?}", archive.cache_stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Spilling Large Blocks to Disk
//!
//! ```rust,no_run
//! use zextract::{Archive, ArchiveConfig, SpillPolicy};
//!
//! # fn main() -> zextract::Result<()> {
//! // Blocks over 64 MiB decode into an anonymous temporary file mapping.
//! let config = ArchiveConfig::new().spill(SpillPolicy::AboveBytes(64 << 20));
//! let mut archive = Archive::open_path_with_config("huge.7z", config)?;
//! let data = archive.extract(0)?;
//! # let _ = data;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA, LZMA2, BCJ and Delta via `lzma-rust2` |
//! | `deflate` | Yes | Deflate via `flate2` |
//! | `bzip2` | Yes | BZip2 via `bzip2` |
//! | `cli` | No | The `zextract` command-line tool |
//!
//! ## Custom Backends
//!
//! [`Archive`] is generic over an [`ArchiveBackend`]. The built-in
//! [`SevenZip`] backend handles 7z files; other index formats can plug in
//! by implementing [`ArchiveBackend`] and [`ArchiveIndex`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod archive;
pub mod backend;
pub mod buffer;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod names;
pub mod sevenz;

pub use archive::{Archive, EntryInfo, EntryMetadata};
pub use backend::{ArchiveBackend, ArchiveIndex, DecoderError, DecoderResult, EntrySpan, Status};
pub use buffer::{DecodeBuffer, MappedBuffer};
pub use cache::{BlockCache, CacheLookup, CacheOwner, CacheStats};
pub use config::{ArchiveConfig, ResourceLimits, SpillPolicy};
pub use error::{Error, Result};
pub use names::FilenameBuffer;
pub use sevenz::{SevenZip, SevenZipIndex};

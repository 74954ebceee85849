//! Entry extraction through the block cache.

use std::io::{Read, Seek, Write};

use super::Archive;
use crate::backend::ArchiveIndex;
use crate::cache::{BlockCache, CacheOwner, CacheStats};
use crate::{Error, Result};

impl<I: ArchiveIndex, R: Read + Seek> Archive<I, R> {
    /// Extracts entry `index` and returns its bytes.
    ///
    /// If the entry lives in the block already held by the handle's cache,
    /// nothing is decoded. Otherwise the whole block is decoded, replacing
    /// whatever was cached. The returned slice borrows the cache and stays
    /// valid until the next call that takes `&mut self`.
    ///
    /// Directories and empty files yield an empty slice.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] for a bad index (the cache is untouched),
    /// [`Error::Decode`] if the backend fails (the cache is left empty),
    /// [`Error::OutOfMemory`] or [`Error::MapUnavailable`] if the decode
    /// buffer cannot be provided, [`Error::CrcMismatch`] if verification is
    /// enabled and fails.
    pub fn extract(&mut self, index: u32) -> Result<&[u8]> {
        self.check_index(index)?;
        extract_into(
            &mut self.index,
            &mut self.reader,
            self.owner,
            self.config.verify_crc,
            index,
            &mut self.cache,
        )?;
        Ok(self.cache.entry())
    }

    /// Extracts entry `index` using a caller-supplied cache.
    ///
    /// Behaves like [`extract`](Self::extract) but decodes into `cache`,
    /// which lets a caller keep several blocks resident across separate
    /// caches, or keep a view alive while querying the archive.
    ///
    /// A cache may be shared between handles. A block left resident by
    /// another archive is never served; it is replaced on the next decode.
    ///
    /// # Errors
    ///
    /// Same as [`extract`](Self::extract).
    pub fn extract_with<'c>(&mut self, index: u32, cache: &'c mut BlockCache) -> Result<&'c [u8]> {
        self.check_index(index)?;
        extract_into(
            &mut self.index,
            &mut self.reader,
            self.owner,
            self.config.verify_crc,
            index,
            cache,
        )?;
        Ok(cache.entry())
    }

    /// Extracts entry `index` into an owned vector.
    ///
    /// # Errors
    ///
    /// Same as [`extract`](Self::extract).
    pub fn extract_to_vec(&mut self, index: u32) -> Result<Vec<u8>> {
        Ok(self.extract(index)?.to_vec())
    }

    /// Extracts entry `index` into `writer` and returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Same as [`extract`](Self::extract), plus [`Error::Io`] if writing
    /// fails.
    pub fn extract_to<W: Write>(&mut self, index: u32, writer: &mut W) -> Result<u64> {
        let data = self.extract(index)?;
        writer.write_all(data)?;
        Ok(data.len() as u64)
    }

    /// Switches the handle's cache to a disk-backed mapping.
    ///
    /// The cache is emptied; the next extraction decodes into the mapping.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadySpilled`], [`Error::MapUnavailable`] (the cache stays
    /// on the heap) or [`Error::OutOfMemory`].
    pub fn enable_spill(&mut self) -> Result<()> {
        self.cache.enable_spill()
    }

    /// Returns the handle's cache to heap storage, unmapping and closing any
    /// temporary file. The cache is emptied.
    pub fn disable_spill(&mut self) {
        self.cache.disable_spill();
    }

    /// Returns the handle's decode cache.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Returns hit/miss counters of the handle's decode cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn extract_into<I: ArchiveIndex, R: Read + Seek>(
    archive_index: &mut I,
    reader: &mut R,
    owner: CacheOwner,
    verify_crc: bool,
    index: u32,
    cache: &mut BlockCache,
) -> Result<()> {
    cache.claim(owner);
    let span = archive_index.extract_block(reader, index, cache)?;
    cache.set_entry(span).map_err(|e| e.for_entry(index))?;

    if verify_crc {
        if let Some(expected) = archive_index.entry_crc(index) {
            let actual = crc32fast::hash(cache.entry());
            if actual != expected {
                return Err(Error::CrcMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }
    }
    Ok(())
}

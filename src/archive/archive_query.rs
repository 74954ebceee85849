//! Entry enumeration and metadata.

use std::io::{Read, Seek};

use super::{Archive, EntryInfo, EntryMetadata};
use crate::backend::ArchiveIndex;
use crate::config::ArchiveConfig;
use crate::{Error, Result};

impl<I: ArchiveIndex, R: Read + Seek> Archive<I, R> {
    /// Returns the number of entries.
    pub fn file_count(&self) -> u32 {
        self.index.file_count()
    }

    /// Returns the metadata of entry `index`.
    ///
    /// The returned name borrows the handle's name buffer, which is reused
    /// by the next query. The buffer grows only when a longer name arrives.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] for a bad index, [`Error::OutOfMemory`] if
    /// the name buffer cannot grow, [`Error::NameDecode`] if the backend
    /// cannot produce the name.
    pub fn metadata(&mut self, index: u32) -> Result<EntryMetadata<'_>> {
        self.check_index(index)?;

        let units = self.index.name_utf16_len(index);
        let byte_len = units
            .checked_mul(2)
            .ok_or_else(|| Error::out_of_memory(u64::MAX))?;
        let dest = self.names.prepare(byte_len)?;
        self.index
            .name_utf16(index, dest)
            .map_err(|source| Error::NameDecode { index, source })?;

        Ok(EntryMetadata {
            name: self.names.as_bytes(),
            is_directory: self.index.is_directory(index),
            size: self.index.decoded_size(index),
        })
    }

    /// Returns an owned summary of every entry.
    ///
    /// Entries whose names cannot be decoded are skipped with a warning.
    pub fn entries(&mut self) -> Vec<EntryInfo> {
        let count = self.file_count();
        let mut entries = Vec::with_capacity(count as usize);
        for index in 0..count {
            match self.metadata(index) {
                Ok(meta) => entries.push(EntryInfo {
                    index,
                    path: meta.name_string(),
                    size: meta.size,
                    is_directory: meta.is_directory,
                }),
                Err(e) => log::warn!("skipping entry {index}: {e}"),
            }
        }
        entries
    }

    /// Returns the index of the first entry whose decoded name equals
    /// `path`.
    pub fn find(&mut self, path: &str) -> Option<u32> {
        (0..self.file_count())
            .find(|&index| self.metadata(index).is_ok_and(|m| m.name_string() == path))
    }

    /// Returns the backend index.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Returns the configuration the archive was opened with.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Returns the name buffer's current capacity in bytes.
    pub fn name_capacity(&self) -> usize {
        self.names.capacity()
    }

    pub(crate) fn check_index(&self, index: u32) -> Result<()> {
        let count = self.index.file_count();
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        Ok(())
    }
}

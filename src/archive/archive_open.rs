//! Opening and closing archives.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use super::Archive;
use crate::backend::{ArchiveBackend, ArchiveIndex};
use crate::cache::{BlockCache, CacheOwner};
use crate::config::ArchiveConfig;
use crate::names::FilenameBuffer;
use crate::sevenz::{SevenZip, SevenZipIndex};
use crate::{Error, Result};

impl Archive<SevenZipIndex, BufReader<File>> {
    /// Opens a 7z archive with the default configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if the file cannot be opened, [`Error::CorruptArchive`]
    /// if its index cannot be parsed.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with_config(path, ArchiveConfig::default())
    }

    /// Opens a 7z archive with a custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`open_path`](Self::open_path).
    pub fn open_path_with_config(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Self> {
        Self::open_with_backend(path, &SevenZip, config)
    }
}

impl<I: ArchiveIndex> Archive<I, BufReader<File>> {
    /// Opens an archive file through an arbitrary backend.
    ///
    /// The file is read through a [`BufReader`] of
    /// [`read_buffer_size`](ArchiveConfig::read_buffer_size) bytes. On
    /// failure the file is closed before returning.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if the file cannot be opened, [`Error::CorruptArchive`]
    /// if the backend rejects it.
    pub fn open_with_backend<B>(
        path: impl AsRef<Path>,
        backend: &B,
        config: ArchiveConfig,
    ) -> Result<Self>
    where
        B: ArchiveBackend<Index = I>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::with_capacity(config.read_buffer_size, file);
        log::debug!("opening archive {}", path.display());
        Self::from_reader(reader, backend, config)
    }
}

impl<I: ArchiveIndex, R: Read + Seek> Archive<I, R> {
    /// Opens an archive from any seekable stream.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptArchive`] if the backend rejects the stream.
    pub fn from_reader<B>(mut reader: R, backend: &B, config: ArchiveConfig) -> Result<Self>
    where
        B: ArchiveBackend<Index = I>,
    {
        let index = backend
            .open_index(&mut reader, &config.limits)
            .map_err(Error::CorruptArchive)?;
        log::debug!("archive index ready: {} entries", index.file_count());

        Ok(Self {
            index,
            reader,
            names: FilenameBuffer::new(),
            cache: BlockCache::with_spill_policy(config.spill),
            config,
            owner: CacheOwner::unique(),
        })
    }

    /// Closes the archive.
    ///
    /// Releases the decode cache (including any temporary mapping), the
    /// name buffer, the index and the stream. Dropping the handle does the
    /// same; `close` makes the point of release explicit.
    pub fn close(mut self) {
        self.cache.release();
        self.names.release();
        log::debug!("archive closed");
    }
}

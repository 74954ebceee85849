//! Backing storage for decoded blocks.
//!
//! A [`DecodeBuffer`] is either plain heap memory or a read-write mapping of
//! an anonymous temporary file. The mapped form lets a process decode blocks
//! much larger than it could comfortably hold on the heap: the kernel pages
//! the data out to the temporary file under memory pressure.
//!
//! The temporary file is created with [`tempfile::tempfile`], which unlinks
//! it immediately, so it has no discoverable path and is reclaimed by the OS
//! even if the process dies abnormally.
//!
//! Callers never branch on the mode: [`ensure_capacity`], [`as_slice`] and
//! [`as_mut_slice`] behave the same way for both.
//!
//! [`ensure_capacity`]: DecodeBuffer::ensure_capacity
//! [`as_slice`]: DecodeBuffer::as_slice
//! [`as_mut_slice`]: DecodeBuffer::as_mut_slice

use std::fs::File;
use std::io;

use memmap2::{MmapMut, MmapOptions};

use crate::error::{Error, Result};

/// Page size used when the platform cannot report one.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the platform page size.
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no memory-safety preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    FALLBACK_PAGE_SIZE
}

/// Rounds `len` up to a whole number of pages, with a minimum of one page.
///
/// Returns `None` on overflow.
pub fn page_align(len: usize) -> Option<usize> {
    let page = page_size();
    len.max(1).div_ceil(page).checked_mul(page)
}

/// A read-write mapping of an anonymous temporary file.
pub struct MappedBuffer {
    map: MmapMut,
    file: File,
    len: usize,
}

impl std::fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl MappedBuffer {
    /// Creates a mapping covering at least `min_len` bytes.
    pub fn create(min_len: usize) -> Result<Self> {
        let len = page_align(min_len).ok_or_else(|| Error::out_of_memory(min_len))?;
        let file = tempfile::tempfile().map_err(Error::MapUnavailable)?;
        let map = map_file(&file, len)?;
        log::debug!("mapped {} byte spill buffer", len);
        Ok(Self { map, file, len })
    }

    /// Grows the mapping so it covers at least `min_len` bytes.
    fn grow(&mut self, min_len: usize) -> Result<()> {
        if min_len <= self.len {
            return Ok(());
        }
        let len = page_align(min_len).ok_or_else(|| Error::out_of_memory(min_len))?;
        self.map = map_file(&self.file, len)?;
        log::debug!("remapped spill buffer from {} to {} bytes", self.len, len);
        self.len = len;
        Ok(())
    }

    /// Returns the mapped length in bytes (a multiple of the page size).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the mapping is empty. Never true in practice since a
    /// mapping covers at least one page.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn map_file(file: &File, len: usize) -> Result<MmapMut> {
    file.set_len(len as u64).map_err(|e| classify(e, len))?;
    // SAFETY: the file is private to this process (unlinked on creation), so
    // no other party can truncate or modify it while it is mapped.
    unsafe { MmapOptions::new().len(len).map_mut(file) }.map_err(|e| classify(e, len))
}

/// Distinguishes memory exhaustion from other mapping failures.
fn classify(e: io::Error, requested: usize) -> Error {
    if e.kind() == io::ErrorKind::OutOfMemory {
        Error::out_of_memory(requested)
    } else {
        Error::MapUnavailable(e)
    }
}

/// Storage for the most recently decoded block.
#[derive(Debug)]
pub enum DecodeBuffer {
    /// Heap allocation.
    Heap(Vec<u8>),
    /// Disk-backed mapping.
    Mapped(MappedBuffer),
}

impl Default for DecodeBuffer {
    fn default() -> Self {
        Self::Heap(Vec::new())
    }
}

impl DecodeBuffer {
    /// Creates an empty heap buffer.
    pub fn heap() -> Self {
        Self::default()
    }

    /// Creates a disk-backed buffer covering at least `min_len` bytes.
    pub fn mapped(min_len: usize) -> Result<Self> {
        MappedBuffer::create(min_len).map(Self::Mapped)
    }

    /// Makes sure at least `len` bytes are addressable.
    ///
    /// Heap storage is freed before the larger allocation is attempted, so
    /// peak usage never holds both. Existing contents are not preserved
    /// across growth.
    pub fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        match self {
            Self::Heap(vec) => {
                if vec.len() >= len {
                    return Ok(());
                }
                *vec = Vec::new();
                let mut fresh = Vec::new();
                fresh
                    .try_reserve_exact(len)
                    .map_err(|_| Error::out_of_memory(len))?;
                fresh.resize(len, 0);
                *vec = fresh;
                Ok(())
            }
            Self::Mapped(mapped) => mapped.grow(len),
        }
    }

    /// Returns the addressable bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Heap(vec) => &vec[..],
            Self::Mapped(mapped) => &mapped.map[..],
        }
    }

    /// Returns the addressable bytes mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Heap(vec) => &mut vec[..],
            Self::Mapped(mapped) => &mut mapped.map[..],
        }
    }

    /// Returns the number of addressable bytes.
    pub fn capacity(&self) -> usize {
        match self {
            Self::Heap(vec) => vec.len(),
            Self::Mapped(mapped) => mapped.len,
        }
    }

    /// Returns `true` for disk-backed storage.
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Returns the mapped length, or `None` for heap storage.
    pub fn mapped_len(&self) -> Option<usize> {
        match self {
            Self::Heap(_) => None,
            Self::Mapped(mapped) => Some(mapped.len),
        }
    }

    /// Frees the storage and returns to an empty heap buffer.
    ///
    /// A mapping is unmapped before its temporary file is closed. The unmap
    /// happens in [`MmapMut`]'s `Drop`, which discards any `munmap` error, so
    /// an unmap failure is not observable here and does not abort.
    pub fn release(&mut self) {
        if let Self::Mapped(mapped) = std::mem::take(self) {
            let MappedBuffer { map, file, len } = mapped;
            drop(map);
            drop(file);
            log::debug!("released {} byte spill buffer", len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_align() {
        let page = page_size();
        assert!(page.is_power_of_two());
        assert_eq!(page_align(0), Some(page));
        assert_eq!(page_align(1), Some(page));
        assert_eq!(page_align(page), Some(page));
        assert_eq!(page_align(page + 1), Some(2 * page));
        assert_eq!(page_align(usize::MAX), None);
    }

    #[test]
    fn test_heap_grows_and_reuses() {
        let mut buf = DecodeBuffer::heap();
        assert_eq!(buf.capacity(), 0);
        assert!(!buf.is_mapped());

        buf.ensure_capacity(100).unwrap();
        assert_eq!(buf.capacity(), 100);

        buf.ensure_capacity(50).unwrap();
        assert_eq!(buf.capacity(), 100);
        assert_eq!(buf.mapped_len(), None);
    }

    #[test]
    fn test_heap_allocation_failure_is_out_of_memory() {
        let mut buf = DecodeBuffer::heap();
        let err = buf.ensure_capacity(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn test_mapped_is_page_aligned() {
        let buf = DecodeBuffer::mapped(10).unwrap();
        assert!(buf.is_mapped());
        assert_eq!(buf.mapped_len(), Some(page_size()));
        assert_eq!(buf.capacity(), page_size());
    }

    #[test]
    fn test_mapped_read_write() {
        let mut buf = DecodeBuffer::mapped(8).unwrap();
        buf.as_mut_slice()[..5].copy_from_slice(b"hello");
        assert_eq!(&buf.as_slice()[..5], b"hello");
    }

    #[test]
    fn test_mapped_growth_remaps() {
        let page = page_size();
        let mut buf = DecodeBuffer::mapped(1).unwrap();
        buf.ensure_capacity(3 * page + 1).unwrap();
        assert_eq!(buf.mapped_len(), Some(4 * page));
        buf.as_mut_slice()[4 * page - 1] = 0xAB;
        assert_eq!(buf.as_slice()[4 * page - 1], 0xAB);
    }

    #[test]
    fn test_release_returns_to_heap() {
        let mut buf = DecodeBuffer::mapped(1).unwrap();
        buf.release();
        assert!(!buf.is_mapped());
        assert_eq!(buf.capacity(), 0);

        let mut buf = DecodeBuffer::heap();
        buf.ensure_capacity(16).unwrap();
        buf.release();
        assert_eq!(buf.capacity(), 0);
    }
}

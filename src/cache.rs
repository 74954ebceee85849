//! Single-block decode cache for solid archives.
//!
//! Entries of a solid archive share compression blocks, and a block can only
//! be decoded from its start. Extracting entries one by one without a cache
//! would decode the same block again for every entry it holds. The
//! [`BlockCache`] keeps the most recently decoded block resident so that
//! sequential extraction of entries in one block decodes it once.
//!
//! # How It Works
//!
//! 1. A backend asks the cache to [`load_block`](BlockCache::load_block).
//! 2. If that block is resident, the call is a hit and no decoding happens.
//! 3. Otherwise the cache is invalidated, the backing buffer grows if needed,
//!    and the backend's decode closure fills it.
//! 4. The entry's span within the block is recorded with
//!    [`set_entry`](BlockCache::set_entry) and read back as a borrowed slice.
//!
//! Slices returned by [`entry`](BlockCache::entry) borrow the cache, so the
//! compiler rejects any attempt to keep one across the next extraction.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{DecoderError, EntrySpan, Status};
use crate::buffer::DecodeBuffer;
use crate::config::SpillPolicy;
use crate::error::{Error, Result};

/// Outcome of [`BlockCache::load_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// The block was already resident; nothing was decoded.
    Hit,
    /// The block was decoded into the cache.
    Miss,
}

/// Statistics for cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups served from the resident block.
    pub hits: u64,
    /// Number of lookups that decoded a block.
    pub misses: u64,
    /// Number of decodes that failed and left the cache empty.
    pub failures: u64,
    /// Total bytes decoded on misses.
    pub bytes_decoded: u64,
}

impl CacheStats {
    /// Returns the cache hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Identifies the archive a cache's resident block was decoded from.
///
/// Block numbers are only meaningful within one archive, so a cache shared
/// between handles must not treat block 0 of one as block 0 of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheOwner(u64);

impl CacheOwner {
    /// Returns an owner distinct from every other one in this process.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The most recently decoded block and the span of the last requested entry.
///
/// The cache is either empty (no resident block) or holds exactly one block.
#[derive(Debug, Default)]
pub struct BlockCache {
    buffer: DecodeBuffer,
    policy: SpillPolicy,
    owner: Option<CacheOwner>,
    resident: Option<u32>,
    resident_len: usize,
    entry: EntrySpan,
    stats: CacheStats,
}

impl BlockCache {
    /// Creates an empty, heap-backed cache. Nothing is allocated until the
    /// first block is decoded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache that switches to a disk-backed buffer according
    /// to `policy`.
    pub fn with_spill_policy(policy: SpillPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Returns the spill policy.
    pub fn spill_policy(&self) -> SpillPolicy {
        self.policy
    }

    /// Scopes subsequent [`load_block`](Self::load_block) calls to `owner`.
    ///
    /// If the resident block belongs to another owner the cache is emptied
    /// first, so the next load for any block number is a miss.
    pub fn claim(&mut self, owner: CacheOwner) {
        if self.owner != Some(owner) {
            if self.resident.is_some() {
                log::trace!("cache claimed by another archive, dropping resident block");
            }
            self.invalidate();
            self.owner = Some(owner);
        }
    }

    /// Returns the owner the cache is currently scoped to.
    pub fn owner(&self) -> Option<CacheOwner> {
        self.owner
    }

    /// Makes `block` resident, decoding it with `decode` on a miss.
    ///
    /// `decode` receives exactly `decoded_size` writable bytes and must fill
    /// them completely. If it fails, the cache is left empty: a partially
    /// written buffer is never reported as resident.
    ///
    /// # Errors
    ///
    /// Returns whatever `decode` returns, [`Error::OutOfMemory`] if the
    /// buffer cannot grow, or [`Error::MapUnavailable`] if the spill policy
    /// asks for a mapping that cannot be created.
    pub fn load_block<F>(&mut self, block: u32, decoded_size: usize, decode: F) -> Result<CacheLookup>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        if self.resident == Some(block) {
            self.stats.hits += 1;
            log::trace!("block {} resident, skipping decode", block);
            return Ok(CacheLookup::Hit);
        }

        self.invalidate();

        if !self.buffer.is_mapped() && self.policy.should_spill(decoded_size as u64) {
            self.buffer.release();
            self.buffer = DecodeBuffer::mapped(decoded_size)?;
        }
        self.buffer.ensure_capacity(decoded_size)?;

        if let Err(e) = decode(&mut self.buffer.as_mut_slice()[..decoded_size]) {
            self.stats.failures += 1;
            return Err(e);
        }

        self.resident = Some(block);
        self.resident_len = decoded_size;
        self.stats.misses += 1;
        self.stats.bytes_decoded += decoded_size as u64;
        log::debug!(
            "decoded block {} ({} bytes, {})",
            block,
            decoded_size,
            if self.buffer.is_mapped() { "mapped" } else { "heap" }
        );
        Ok(CacheLookup::Miss)
    }

    /// Records where the requested entry lives inside the resident block.
    ///
    /// An empty span is always accepted, even when no block is resident.
    pub fn set_entry(&mut self, span: EntrySpan) -> std::result::Result<(), DecoderError> {
        let fits = span.end().is_some_and(|end| end <= self.resident_len);
        if !fits {
            return Err(DecoderError::new(
                Status::Param,
                format!(
                    "entry span {}..{} outside resident block of {} bytes",
                    span.offset,
                    span.offset.saturating_add(span.len),
                    self.resident_len
                ),
            ));
        }
        self.entry = span;
        Ok(())
    }

    /// Returns the bytes of the last recorded entry.
    pub fn entry(&self) -> &[u8] {
        let EntrySpan { offset, len } = self.entry;
        &self.buffer.as_slice()[offset..offset + len]
    }

    /// Returns the span of the last recorded entry.
    pub fn entry_span(&self) -> EntrySpan {
        self.entry
    }

    /// Returns the resident block, or `None` if the cache is empty.
    pub fn resident_block(&self) -> Option<u32> {
        self.resident
    }

    /// Returns the decoded size of the resident block.
    pub fn resident_len(&self) -> usize {
        self.resident_len
    }

    /// Returns the number of bytes the backing buffer can hold without
    /// growing.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns `true` if the backing buffer is disk-backed.
    pub fn is_spilled(&self) -> bool {
        self.buffer.is_mapped()
    }

    /// Returns the mapped length of a disk-backed buffer.
    pub fn mapped_len(&self) -> Option<usize> {
        self.buffer.mapped_len()
    }

    /// Returns usage statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Resets usage statistics.
    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// Forgets the resident block but keeps the storage for reuse.
    pub fn invalidate(&mut self) {
        self.resident = None;
        self.resident_len = 0;
        self.entry = EntrySpan::EMPTY;
    }

    /// Frees the storage and empties the cache.
    pub fn release(&mut self) {
        self.invalidate();
        self.buffer.release();
    }

    /// Replaces heap storage with a disk-backed mapping.
    ///
    /// The heap buffer is freed first and the mapping is sized to cover the
    /// capacity it had. The cache is left empty.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadySpilled`] if the cache is already disk-backed,
    /// [`Error::MapUnavailable`] if no mapping could be created (the cache
    /// stays heap-backed), [`Error::OutOfMemory`] if the OS refused the
    /// mapping for lack of memory.
    pub fn enable_spill(&mut self) -> Result<()> {
        if self.buffer.is_mapped() {
            return Err(Error::AlreadySpilled);
        }
        let capacity = self.buffer.capacity();
        self.release();
        self.buffer = DecodeBuffer::mapped(capacity)?;
        log::debug!("spill enabled");
        Ok(())
    }

    /// Drops a disk-backed mapping and returns to heap storage.
    ///
    /// Unmaps and closes the temporary file. The cache is left empty. Does
    /// nothing to a heap-backed cache beyond emptying it.
    pub fn disable_spill(&mut self) {
        let was_mapped = self.buffer.is_mapped();
        if was_mapped {
            self.release();
            log::debug!("spill disabled");
        } else {
            self.invalidate();
        }
    }
}

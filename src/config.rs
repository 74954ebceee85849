//! Configuration for opening archives and managing decode memory.
//!
//! [`ArchiveConfig`] controls how an [`Archive`](crate::Archive) handles
//! memory: when decoded blocks move from the heap to a disk-backed mapping,
//! how much a hostile header may make the parser allocate, and whether
//! extracted entries are checked against their recorded CRC.
//!
//! # Example
//!
//! ```rust
//! use zextract::{ArchiveConfig, ResourceLimits, SpillPolicy};
//!
//! // Defaults: heap-only decode buffer, CRC verification on
//! let config = ArchiveConfig::default();
//!
//! // Spill any block larger than 16 MiB to a temporary mapping
//! let config = ArchiveConfig::new()
//!     .spill(SpillPolicy::AboveBytes(16 * 1024 * 1024))
//!     .limits(ResourceLimits::new().max_entries(10_000))
//!     .verify_crc(false);
//! ```

/// Default size of the buffered reader wrapped around the archive file.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Threshold used by [`ArchiveConfig::low_memory`].
pub const LOW_MEMORY_SPILL_THRESHOLD: u64 = 32 * 1024 * 1024;

/// When the block decode cache should use a disk-backed mapping instead of
/// heap memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpillPolicy {
    /// Always decode into heap memory unless spill is enabled explicitly.
    #[default]
    Never,
    /// Always decode into a disk-backed mapping.
    Always,
    /// Switch to a disk-backed mapping the first time a block larger than
    /// the given number of bytes is decoded.
    AboveBytes(u64),
}

impl SpillPolicy {
    /// Returns `true` if a block of `decoded_size` bytes should be decoded
    /// into a mapping.
    pub fn should_spill(&self, decoded_size: u64) -> bool {
        match *self {
            Self::Never => false,
            Self::Always => true,
            Self::AboveBytes(threshold) => decoded_size > threshold,
        }
    }
}

/// Resource limits applied while parsing an archive index and decoding
/// blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum number of entries, folders or pack streams.
    pub max_entries: usize,
    /// Maximum size of the (decoded) archive header in bytes.
    pub max_header_bytes: u64,
    /// Maximum decoded size of a single block in bytes.
    pub max_block_size: u64,
}

impl Default for ResourceLimits {
    /// Creates resource limits with the following default values:
    ///
    /// | Limit | Default Value |
    /// |-------|---------------|
    /// | `max_entries` | 1,000,000 |
    /// | `max_header_bytes` | 64 MiB |
    /// | `max_block_size` | 16 GiB |
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_header_bytes: 64 << 20,
            max_block_size: 16 << 30,
        }
    }
}

impl ResourceLimits {
    /// Creates new resource limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resource limits with no restrictions.
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
            max_header_bytes: u64::MAX,
            max_block_size: u64::MAX,
        }
    }

    /// Sets the maximum number of entries.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the maximum header bytes.
    pub fn max_header_bytes(mut self, max: u64) -> Self {
        self.max_header_bytes = max;
        self
    }

    /// Sets the maximum decoded block size.
    pub fn max_block_size(mut self, max: u64) -> Self {
        self.max_block_size = max;
        self
    }
}

/// Options for opening an archive.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// When the decode cache switches to a disk-backed mapping.
    ///
    /// Default: [`SpillPolicy::Never`].
    pub spill: SpillPolicy,

    /// Limits applied to the archive index and block sizes.
    pub limits: ResourceLimits,

    /// Check each extracted entry against the CRC recorded in the archive.
    ///
    /// Default: true.
    pub verify_crc: bool,

    /// Capacity of the buffered reader around the archive file (bytes).
    ///
    /// Default: 64 KiB.
    pub read_buffer_size: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            spill: SpillPolicy::Never,
            limits: ResourceLimits::default(),
            verify_crc: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ArchiveConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for memory-constrained environments.
    ///
    /// Blocks above 32 MiB are decoded into a temporary mapping and the
    /// read buffer is reduced to 16 KiB.
    pub fn low_memory() -> Self {
        Self {
            spill: SpillPolicy::AboveBytes(LOW_MEMORY_SPILL_THRESHOLD),
            read_buffer_size: 16 * 1024,
            ..Self::default()
        }
    }

    /// Sets the spill policy.
    pub fn spill(mut self, policy: SpillPolicy) -> Self {
        self.spill = policy;
        self
    }

    /// Sets the resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enables or disables CRC verification of extracted entries.
    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Sets the read buffer size. Zero is raised to one byte.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

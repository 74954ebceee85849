//! Fuzz target for opening an archive from arbitrary bytes.
//!
//! This target exercises header parsing (plain and encoded headers, streams
//! info, files info) with potentially malformed or adversarial input. The
//! goal is to find panics, hangs, or unbounded allocations.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zextract::{Archive, ArchiveConfig, ResourceLimits, SevenZip};

fuzz_target!(|data: &[u8]| {
    let limits = ResourceLimits::new()
        .max_entries(10_000)
        .max_header_bytes(1 << 20)
        .max_block_size(16 << 20);
    let config = ArchiveConfig::new().limits(limits);

    // We don't care about the result - we're looking for panics or hangs
    if let Ok(mut archive) = Archive::from_reader(Cursor::new(data), &SevenZip, config) {
        for index in 0..archive.file_count() {
            if let Ok(meta) = archive.metadata(index) {
                let _ = meta.name_string();
                let _ = meta.size;
                let _ = meta.is_directory;
            }
        }
    }
});

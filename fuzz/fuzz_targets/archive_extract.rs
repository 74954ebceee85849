//! Fuzz target for extracting every entry of an arbitrary archive.
//!
//! Exercises the coder chain, block cache bookkeeping and CRC checks. Blocks
//! are capped so the fuzzer cannot request huge decode buffers.
//!
//! Run with: cargo +nightly fuzz run archive_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zextract::{Archive, ArchiveConfig, ResourceLimits, SevenZip};

fuzz_target!(|data: &[u8]| {
    let limits = ResourceLimits::new()
        .max_entries(1_000)
        .max_header_bytes(1 << 20)
        .max_block_size(4 << 20);
    let config = ArchiveConfig::new().limits(limits);

    let Ok(mut archive) = Archive::from_reader(Cursor::new(data), &SevenZip, config) else {
        return;
    };

    for index in 0..archive.file_count() {
        let expected = archive.metadata(index).map(|m| m.size).ok();
        if let Ok(bytes) = archive.extract(index) {
            // A successful extraction always matches the recorded size.
            if let Some(size) = expected {
                assert_eq!(bytes.len() as u64, size);
            }
        }
    }
});

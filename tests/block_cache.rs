//! Block cache behavior through the archive handle.
//!
//! These tests drive [`Archive`] with an instrumented in-memory backend so
//! that every block decode is counted.

use zextract::{BlockCache, CacheLookup, Error, Status};

mod common;

use common::{StubBackend, StubEntry};

/// Two blocks: block 0 holds three entries, block 1 holds one.
fn two_block_backend() -> StubBackend {
    StubBackend::new(
        vec![
            StubEntry::file("a.txt", 0, 0, 5),
            StubEntry::file("b.txt", 0, 5, 6),
            StubEntry::file("c.txt", 0, 11, 4),
            StubEntry::directory("dir"),
            StubEntry::file("dir/d.bin", 1, 0, 8),
        ],
        vec![b"alphabravo!char".to_vec(), b"DDDDDDDD".to_vec()],
    )
}

// =============================================================================
// Hits and Misses
// =============================================================================

#[test]
fn test_same_block_decoded_once() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    assert_eq!(archive.extract(0).unwrap(), b"alpha");
    assert_eq!(archive.extract(1).unwrap(), b"bravo!");
    assert_eq!(archive.extract(2).unwrap(), b"char");

    assert_eq!(backend.decode_count(), 1);
    let stats = archive.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.bytes_decoded, 15);
}

#[test]
fn test_repeated_entry_is_a_hit() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    for _ in 0..5 {
        assert_eq!(archive.extract(4).unwrap(), b"DDDDDDDD");
    }
    assert_eq!(backend.decode_count(), 1);
    assert_eq!(archive.cache().resident_block(), Some(1));
}

#[test]
fn test_alternating_blocks_never_serve_stale_bytes() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    for round in 0..4 {
        assert_eq!(archive.extract(1).unwrap(), b"bravo!", "round {round}");
        assert_eq!(archive.extract(4).unwrap(), b"DDDDDDDD", "round {round}");
    }
    // Each switch replaces the resident block.
    assert_eq!(backend.decode_count(), 8);
    assert_eq!(archive.cache_stats().hits, 0);
}

#[test]
fn test_directory_yields_empty_view_without_decoding() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    assert!(archive.extract(3).unwrap().is_empty());
    assert_eq!(backend.decode_count(), 0);
}

#[test]
fn test_directory_keeps_resident_block() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    archive.extract(0).unwrap();
    assert!(archive.extract(3).unwrap().is_empty());
    assert_eq!(archive.extract(2).unwrap(), b"char");
    assert_eq!(backend.decode_count(), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_out_of_range_index_leaves_cache_untouched() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();
    archive.extract(1).unwrap();

    match archive.extract(99) {
        Err(Error::IndexOutOfRange { index, count }) => {
            assert_eq!(index, 99);
            assert_eq!(count, 5);
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }

    assert_eq!(archive.cache().resident_block(), Some(0));
    assert_eq!(archive.extract(0).unwrap(), b"alpha");
    assert_eq!(backend.decode_count(), 1);
}

#[test]
fn test_failed_decode_leaves_cache_empty() {
    let backend = two_block_backend().fail_block(1);
    let mut archive = backend.open().unwrap();
    archive.extract(0).unwrap();

    let err = archive.extract(4).unwrap_err();
    assert!(matches!(err, Error::Decode { index: 4, .. }));
    assert_eq!(err.status(), Some(Status::Data));
    assert!(err.is_recoverable());
    assert_eq!(archive.cache().resident_block(), None);
    assert_eq!(archive.cache_stats().failures, 1);

    // The handle stays usable and block 0 is decoded again.
    assert_eq!(archive.extract(1).unwrap(), b"bravo!");
    assert_eq!(backend.decode_count(), 3);
}

#[test]
fn test_failed_decode_is_retried() {
    let backend = two_block_backend().fail_block(1);
    let mut archive = backend.open().unwrap();

    assert!(archive.extract(4).is_err());
    assert!(archive.extract(4).is_err());
    assert_eq!(backend.decode_count(), 2);
}

#[test]
fn test_span_outside_block_is_rejected() {
    let backend = StubBackend::new(
        vec![StubEntry::file("broken", 0, 3, 10)],
        vec![b"short".to_vec()],
    );
    let mut archive = backend.open().unwrap();

    let err = archive.extract(0).unwrap_err();
    assert_eq!(err.status(), Some(Status::Param));
}

// =============================================================================
// Caller-Supplied Caches
// =============================================================================

#[test]
fn test_extract_with_keeps_views_alive() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();
    let mut first = BlockCache::new();
    let mut second = BlockCache::new();

    let a = archive.extract_with(0, &mut first).unwrap();
    let d = archive.extract_with(4, &mut second).unwrap();
    assert_eq!(a, b"alpha");
    assert_eq!(d, b"DDDDDDDD");

    // The handle's own cache was never used.
    assert_eq!(archive.cache().resident_block(), None);
    assert_eq!(backend.decode_count(), 2);
}

#[test]
fn test_extract_with_reuses_resident_block() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();
    let mut cache = BlockCache::new();

    archive.extract_with(0, &mut cache).unwrap();
    assert_eq!(archive.extract_with(2, &mut cache).unwrap(), b"char");
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(backend.decode_count(), 1);
}

#[test]
fn test_shared_cache_never_serves_another_archives_block() {
    let first = StubBackend::new(
        vec![StubEntry::file("a.bin", 0, 0, 8)],
        vec![b"AAAAAAAA".to_vec()],
    );
    let second = StubBackend::new(
        vec![StubEntry::file("b.bin", 0, 0, 8)],
        vec![b"BBBBBBBB".to_vec()],
    );
    let mut archive_a = first.open().unwrap();
    let mut archive_b = second.open().unwrap();
    let mut cache = BlockCache::new();

    assert_eq!(archive_a.extract_with(0, &mut cache).unwrap(), b"AAAAAAAA");
    assert_eq!(archive_b.extract_with(0, &mut cache).unwrap(), b"BBBBBBBB");
    assert_eq!(archive_a.extract_with(0, &mut cache).unwrap(), b"AAAAAAAA");

    assert_eq!(first.decode_count(), 2);
    assert_eq!(second.decode_count(), 1);
    assert_eq!(cache.stats().misses, 3);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_shared_cache_hits_within_one_archive() {
    let backend = two_block_backend();
    let other = two_block_backend();
    let mut archive = backend.open().unwrap();
    let mut other_archive = other.open().unwrap();
    let mut cache = BlockCache::new();

    other_archive.extract_with(0, &mut cache).unwrap();
    assert_eq!(archive.extract_with(1, &mut cache).unwrap(), b"bravo!");
    assert_eq!(archive.extract_with(2, &mut cache).unwrap(), b"char");
    assert_eq!(backend.decode_count(), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_load_block_reports_lookup() {
    let mut cache = BlockCache::new();
    let fill = |out: &mut [u8]| -> zextract::Result<()> {
        out.fill(7);
        Ok(())
    };

    assert_eq!(cache.load_block(3, 16, fill).unwrap(), CacheLookup::Miss);
    assert_eq!(cache.load_block(3, 16, fill).unwrap(), CacheLookup::Hit);
    assert_eq!(cache.resident_len(), 16);
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_metadata() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    let meta = archive.metadata(4).unwrap();
    assert_eq!(meta.name_string(), "dir/d.bin");
    assert_eq!(meta.name.len(), 2 * "dir/d.bin".len());
    assert_eq!(meta.size, 8);
    assert!(!meta.is_directory);

    assert!(archive.metadata(3).unwrap().is_directory);
    assert!(matches!(
        archive.metadata(5),
        Err(Error::IndexOutOfRange { index: 5, count: 5 })
    ));
}

#[test]
fn test_name_failure_is_per_entry() {
    let backend = two_block_backend().fail_name(1);
    let mut archive = backend.open().unwrap();

    let err = archive.metadata(1).unwrap_err();
    assert!(matches!(err, Error::NameDecode { index: 1, .. }));
    assert!(err.is_recoverable());

    assert_eq!(archive.metadata(2).unwrap().name_string(), "c.txt");

    let paths: Vec<String> = archive.entries().into_iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["a.txt", "c.txt", "dir", "dir/d.bin"]);
}

#[test]
fn test_find() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    assert_eq!(archive.find("c.txt"), Some(2));
    assert_eq!(archive.find("missing"), None);
}

#[test]
fn test_extract_to_writer() {
    let backend = two_block_backend();
    let mut archive = backend.open().unwrap();

    let mut out = Vec::new();
    assert_eq!(archive.extract_to(1, &mut out).unwrap(), 6);
    assert_eq!(archive.extract_to(4, &mut out).unwrap(), 8);
    assert_eq!(out, b"bravo!DDDDDDDD");
}

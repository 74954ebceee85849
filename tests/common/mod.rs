//! Shared test utilities for integration tests.
//!
//! This module provides an in-memory 7z writer and an instrumented stub
//! backend used across multiple test files.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};
use std::rc::Rc;

use zextract::format::header::StartHeader;
use zextract::format::property_id;
use zextract::format::reader::write_number;
use zextract::{
    Archive, ArchiveBackend, ArchiveConfig, ArchiveIndex, BlockCache, DecoderError,
    DecoderResult, EntrySpan, ResourceLimits, Status,
};

/// Compression method for blocks written by [`SevenZipWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Copy,
    #[cfg(feature = "lzma")]
    Lzma2,
}

enum Item {
    /// A file whose bytes live in a block.
    Data,
    EmptyFile,
    Directory,
}

struct Block {
    method: Method,
    sizes: Vec<u64>,
    crcs: Vec<u32>,
    data: Vec<u8>,
}

/// Minimal 7z writer producing plain headers.
///
/// Entries are stored in insertion order. Every call to
/// [`solid_block`](Self::solid_block) or [`file`](Self::file) opens a new
/// folder holding the non-empty files passed to it.
pub struct SevenZipWriter {
    method: Method,
    names: Vec<String>,
    items: Vec<Item>,
    blocks: Vec<Block>,
}

impl Default for SevenZipWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SevenZipWriter {
    pub fn new() -> Self {
        Self {
            method: Method::Copy,
            names: Vec::new(),
            items: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Sets the method for blocks added after this call.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds one folder holding every non-empty file in `files`.
    pub fn solid_block(mut self, files: &[(&str, &[u8])]) -> Self {
        let mut block = Block {
            method: self.method,
            sizes: Vec::new(),
            crcs: Vec::new(),
            data: Vec::new(),
        };
        for (name, data) in files {
            self.names.push((*name).to_string());
            if data.is_empty() {
                self.items.push(Item::EmptyFile);
                continue;
            }
            self.items.push(Item::Data);
            block.sizes.push(data.len() as u64);
            block.crcs.push(crc32fast::hash(data));
            block.data.extend_from_slice(data);
        }
        if !block.sizes.is_empty() {
            self.blocks.push(block);
        }
        self
    }

    /// Adds a file stored in its own folder.
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.solid_block(&[(name, data)])
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self.items.push(Item::Directory);
        self
    }

    /// Serializes the archive.
    pub fn finish(self) -> Vec<u8> {
        let mut packed = Vec::new();
        let mut pack_sizes = Vec::new();
        let mut coders = Vec::new();
        for block in &self.blocks {
            let (bytes, coder) = encode_block(block.method, &block.data);
            pack_sizes.push(bytes.len() as u64);
            packed.extend_from_slice(&bytes);
            coders.push(coder);
        }

        let mut h = vec![property_id::HEADER];
        if !self.blocks.is_empty() {
            h.push(property_id::MAIN_STREAMS_INFO);
            self.write_streams(&mut h, &pack_sizes, &coders);
        }
        if !self.names.is_empty() {
            self.write_files(&mut h);
        }
        h.push(property_id::END);

        let start = StartHeader::new(packed.len() as u64, h.len() as u64, crc32fast::hash(&h));
        let mut out = start.to_bytes().to_vec();
        out.extend_from_slice(&packed);
        out.extend_from_slice(&h);
        out
    }

    fn write_streams(&self, h: &mut Vec<u8>, pack_sizes: &[u64], coders: &[Vec<u8>]) {
        h.push(property_id::PACK_INFO);
        num(h, 0);
        num(h, pack_sizes.len() as u64);
        h.push(property_id::SIZE);
        for size in pack_sizes {
            num(h, *size);
        }
        h.push(property_id::END);

        h.extend_from_slice(&[property_id::UNPACK_INFO, property_id::FOLDER]);
        num(h, self.blocks.len() as u64);
        h.push(0);
        for coder in coders {
            h.push(1);
            h.extend_from_slice(coder);
        }
        h.push(property_id::CODERS_UNPACK_SIZE);
        for block in &self.blocks {
            num(h, block.data.len() as u64);
        }
        h.push(property_id::CRC);
        h.push(1);
        for block in &self.blocks {
            h.extend_from_slice(&crc32fast::hash(&block.data).to_le_bytes());
        }
        h.push(property_id::END);

        h.extend_from_slice(&[property_id::SUBSTREAMS_INFO, property_id::NUM_UNPACK_STREAM]);
        for block in &self.blocks {
            num(h, block.sizes.len() as u64);
        }
        h.push(property_id::SIZE);
        for block in &self.blocks {
            for size in &block.sizes[..block.sizes.len() - 1] {
                num(h, *size);
            }
        }
        // Single-stream folders inherit the folder CRC.
        h.push(property_id::CRC);
        h.push(1);
        for block in self.blocks.iter().filter(|b| b.sizes.len() > 1) {
            for crc in &block.crcs {
                h.extend_from_slice(&crc.to_le_bytes());
            }
        }
        h.push(property_id::END);
        h.push(property_id::END);
    }

    fn write_files(&self, h: &mut Vec<u8>) {
        h.push(property_id::FILES_INFO);
        num(h, self.names.len() as u64);

        let empty_stream: Vec<bool> = self.items.iter().map(|i| !matches!(i, Item::Data)).collect();
        if empty_stream.iter().any(|e| *e) {
            let bits = pack_bits(&empty_stream);
            h.push(property_id::EMPTY_STREAM);
            num(h, bits.len() as u64);
            h.extend(bits);

            let empty_file: Vec<bool> = self
                .items
                .iter()
                .filter(|i| !matches!(i, Item::Data))
                .map(|i| matches!(i, Item::EmptyFile))
                .collect();
            let bits = pack_bits(&empty_file);
            h.push(property_id::EMPTY_FILE);
            num(h, bits.len() as u64);
            h.extend(bits);
        }

        let mut body = vec![0u8];
        for name in &self.names {
            for unit in name.encode_utf16() {
                body.extend_from_slice(&unit.to_le_bytes());
            }
            body.extend_from_slice(&[0, 0]);
        }
        h.push(property_id::NAME);
        num(h, body.len() as u64);
        h.extend(body);
        h.push(property_id::END);
    }
}

fn num(buf: &mut Vec<u8>, value: u64) {
    write_number(buf, value).unwrap();
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

/// Returns the packed bytes and the serialized coder record (after the
/// coder count byte).
fn encode_block(method: Method, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    match method {
        Method::Copy => (data.to_vec(), vec![0x01, 0x00]),
        #[cfg(feature = "lzma")]
        Method::Lzma2 => {
            use std::io::Write;

            let opts = lzma_rust2::Lzma2Options::with_preset(1);
            let prop =
                zextract::codec::lzma::encode_lzma2_dict_size(opts.lzma_options.dict_size);
            let mut writer = lzma_rust2::Lzma2Writer::new(Vec::new(), opts);
            writer.write_all(data).unwrap();
            let compressed = writer.finish().unwrap();
            // flags: 1-byte id, has properties
            (compressed, vec![0x21, 0x21, 0x01, prop])
        }
    }
}

/// Deterministic pseudo-random bytes.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

/// Opens an in-memory archive with the 7z backend.
pub fn open_bytes(bytes: Vec<u8>) -> zextract::Result<Archive<zextract::SevenZipIndex, Cursor<Vec<u8>>>> {
    open_bytes_with_config(bytes, ArchiveConfig::default())
}

pub fn open_bytes_with_config(
    bytes: Vec<u8>,
    config: ArchiveConfig,
) -> zextract::Result<Archive<zextract::SevenZipIndex, Cursor<Vec<u8>>>> {
    Archive::from_reader(Cursor::new(bytes), &zextract::SevenZip, config)
}

/// One entry served by [`StubBackend`].
#[derive(Debug, Clone)]
pub struct StubEntry {
    pub name: String,
    pub is_directory: bool,
    /// Block holding the entry, `None` for entries without data.
    pub block: Option<u32>,
    pub offset: usize,
    pub len: usize,
}

impl StubEntry {
    pub fn file(name: &str, block: u32, offset: usize, len: usize) -> Self {
        Self {
            name: name.to_string(),
            is_directory: false,
            block: Some(block),
            offset,
            len,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_directory: true,
            block: None,
            offset: 0,
            len: 0,
        }
    }
}

/// A backend serving fixed blocks from memory and counting decodes.
#[derive(Debug, Clone, Default)]
pub struct StubBackend {
    pub entries: Vec<StubEntry>,
    pub blocks: Vec<Vec<u8>>,
    pub failing_blocks: HashSet<u32>,
    pub failing_names: HashSet<u32>,
    pub fail_open: bool,
    pub decodes: Rc<Cell<usize>>,
}

impl StubBackend {
    pub fn new(entries: Vec<StubEntry>, blocks: Vec<Vec<u8>>) -> Self {
        Self {
            entries,
            blocks,
            ..Default::default()
        }
    }

    pub fn fail_block(mut self, block: u32) -> Self {
        self.failing_blocks.insert(block);
        self
    }

    pub fn fail_name(mut self, index: u32) -> Self {
        self.failing_names.insert(index);
        self
    }

    /// Number of times a block has been decoded so far.
    pub fn decode_count(&self) -> usize {
        self.decodes.get()
    }

    /// Opens an archive over an empty stream.
    pub fn open(&self) -> zextract::Result<Archive<StubIndex, Cursor<Vec<u8>>>> {
        self.open_with_config(ArchiveConfig::default())
    }

    pub fn open_with_config(
        &self,
        config: ArchiveConfig,
    ) -> zextract::Result<Archive<StubIndex, Cursor<Vec<u8>>>> {
        Archive::from_reader(Cursor::new(Vec::new()), self, config)
    }
}

impl ArchiveBackend for StubBackend {
    type Index = StubIndex;

    fn open_index<R: Read + Seek>(
        &self,
        _stream: &mut R,
        limits: &ResourceLimits,
    ) -> DecoderResult<StubIndex> {
        if self.fail_open {
            return Err(DecoderError::archive("stub refused to open"));
        }
        if self.entries.len() > limits.max_entries {
            return Err(DecoderError::new(Status::Mem, "too many entries"));
        }
        Ok(StubIndex {
            backend: self.clone(),
        })
    }
}

/// Index produced by [`StubBackend`].
#[derive(Debug)]
pub struct StubIndex {
    backend: StubBackend,
}

impl ArchiveIndex for StubIndex {
    fn file_count(&self) -> u32 {
        self.backend.entries.len() as u32
    }

    fn name_utf16_len(&self, index: u32) -> usize {
        self.backend.entries[index as usize].name.encode_utf16().count()
    }

    fn name_utf16(&self, index: u32, dest: &mut [u8]) -> DecoderResult<()> {
        if self.backend.failing_names.contains(&index) {
            return Err(DecoderError::new(Status::Data, "name unavailable"));
        }
        let name = &self.backend.entries[index as usize].name;
        for (chunk, unit) in dest.chunks_exact_mut(2).zip(name.encode_utf16()) {
            chunk.copy_from_slice(&unit.to_le_bytes());
        }
        Ok(())
    }

    fn is_directory(&self, index: u32) -> bool {
        self.backend.entries[index as usize].is_directory
    }

    fn decoded_size(&self, index: u32) -> u64 {
        self.backend.entries[index as usize].len as u64
    }

    fn extract_block<R: Read + Seek>(
        &mut self,
        _stream: &mut R,
        index: u32,
        cache: &mut BlockCache,
    ) -> zextract::Result<EntrySpan> {
        let entry = &self.backend.entries[index as usize];
        let Some(block) = entry.block else {
            return Ok(EntrySpan::EMPTY);
        };
        let data = &self.backend.blocks[block as usize];
        let fails = self.backend.failing_blocks.contains(&block);
        let decodes = &self.backend.decodes;

        cache.load_block(block, data.len(), |out| {
            decodes.set(decodes.get() + 1);
            if fails {
                // Leave garbage behind to prove it is never served.
                out.fill(0xEE);
                return Err(DecoderError::new(Status::Data, "stub block corrupt").for_entry(index));
            }
            out.copy_from_slice(data);
            Ok(())
        })?;
        Ok(EntrySpan::new(entry.offset, entry.len))
    }
}

//! The built-in 7z backend.
//!
//! [`SevenZip`] parses the archive header into a [`SevenZipIndex`], which
//! maps every entry to the folder (solid block) holding it and decodes
//! whole folders into a [`BlockCache`].

use std::io::{Read, Seek, SeekFrom};

use crate::backend::{
    ArchiveBackend, ArchiveIndex, DecoderError, DecoderResult, EntrySpan, Status,
};
use crate::cache::BlockCache;
use crate::codec;
use crate::config::ResourceLimits;
use crate::error::{Error, Result};
use crate::format::SIGNATURE_HEADER_SIZE;
use crate::format::parser::{ArchiveHeader, read_archive};
use crate::format::streams::Folder;

/// The 7z archive backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZip;

impl ArchiveBackend for SevenZip {
    type Index = SevenZipIndex;

    fn open_index<R: Read + Seek>(
        &self,
        stream: &mut R,
        limits: &ResourceLimits,
    ) -> DecoderResult<SevenZipIndex> {
        let header = read_archive(stream, limits)?;
        let index = SevenZipIndex::from_header(header, limits)?;
        log::debug!(
            "opened 7z index: {} entries in {} blocks",
            index.entries.len(),
            index.blocks.len()
        );
        Ok(index)
    }
}

#[derive(Debug, Clone, Copy)]
struct Location {
    block: u32,
    offset: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    name: Vec<u16>,
    is_directory: bool,
    size: u64,
    crc: Option<u32>,
    location: Option<Location>,
}

/// How to decode one folder.
#[derive(Debug, Clone)]
struct BlockPlan {
    folder: Folder,
    /// Absolute offset of the folder's packed data.
    pack_offset: u64,
    pack_size: u64,
    unpack_size: u64,
}

/// Parsed 7z index: entry metadata plus the blocks that hold entry data.
#[derive(Debug, Clone)]
pub struct SevenZipIndex {
    entries: Vec<Entry>,
    blocks: Vec<BlockPlan>,
    max_block_size: u64,
}

impl SevenZipIndex {
    fn from_header(header: ArchiveHeader, limits: &ResourceLimits) -> DecoderResult<Self> {
        let ArchiveHeader { streams, files } = header;

        if u32::try_from(files.len()).is_err() {
            return Err(DecoderError::new(
                Status::Mem,
                format!("{} entries exceed the u32 index range", files.len()),
            ));
        }

        let pack_starts = streams.folder_pack_starts();
        let mut blocks = Vec::with_capacity(streams.folders.len());
        for (i, folder) in streams.folders.iter().enumerate() {
            let first = pack_starts[i];
            let pack_sizes = streams
                .pack_info
                .pack_sizes
                .get(first..first + folder.packed_streams.len())
                .ok_or_else(|| DecoderError::archive(format!("folder {i} has no pack stream")))?;
            let pack_size = pack_sizes
                .iter()
                .try_fold(0u64, |acc, &s| acc.checked_add(s))
                .ok_or_else(|| DecoderError::archive(format!("folder {i} pack size overflows")))?;
            let pack_offset = streams
                .pack_info
                .stream_offset(first)
                .and_then(|o| o.checked_add(SIGNATURE_HEADER_SIZE))
                .ok_or_else(|| DecoderError::archive(format!("folder {i} offset overflows")))?;
            let unpack_size = folder
                .unpack_size()
                .ok_or_else(|| DecoderError::archive(format!("folder {i} has no unpack size")))?;

            blocks.push(BlockPlan {
                folder: folder.clone(),
                pack_offset,
                pack_size,
                unpack_size,
            });
        }

        let substreams = &streams.substreams;
        let mut entries = Vec::with_capacity(files.len());
        let mut block = 0usize;
        let mut in_block = 0usize;
        let mut offset = 0u64;
        let mut stream = 0usize;

        for file in files {
            if !file.has_stream {
                entries.push(Entry {
                    name: file.name,
                    is_directory: file.is_directory,
                    size: 0,
                    crc: None,
                    location: None,
                });
                continue;
            }

            while substreams.num_unpack_streams.get(block) == Some(&0) {
                block += 1;
            }
            if block >= blocks.len() {
                return Err(DecoderError::archive("more entries with data than substreams"));
            }
            let size = *substreams
                .unpack_sizes
                .get(stream)
                .ok_or_else(|| DecoderError::archive("substream sizes missing"))?;
            let crc = substreams.digests.get(stream).copied().flatten();

            entries.push(Entry {
                name: file.name,
                is_directory: false,
                size,
                crc,
                location: Some(Location {
                    // Folder count is bounded by the entry count, which fits u32.
                    block: block as u32,
                    offset,
                }),
            });

            stream += 1;
            offset += size;
            in_block += 1;
            if in_block == substreams.num_unpack_streams[block] {
                block += 1;
                in_block = 0;
                offset = 0;
            }
        }

        Ok(Self {
            entries,
            blocks,
            max_block_size: limits.max_block_size,
        })
    }

    fn entry(&self, index: u32) -> Option<&Entry> {
        self.entries.get(index as usize)
    }

    /// Returns the number of blocks (folders) holding entry data.
    pub fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    /// Returns the block holding the entry, or `None` for entries without
    /// data.
    pub fn block_of(&self, index: u32) -> Option<u32> {
        self.entry(index)?.location.map(|l| l.block)
    }

    /// Returns the decoded size of a block.
    pub fn block_size(&self, block: u32) -> Option<u64> {
        self.blocks.get(block as usize).map(|b| b.unpack_size)
    }

    /// Returns the coder names of a block, outermost first.
    pub fn block_methods(&self, block: u32) -> Vec<&'static str> {
        self.blocks
            .get(block as usize)
            .map(|b| {
                b.folder
                    .coders
                    .iter()
                    .map(|c| codec::method::name(&c.method_id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ArchiveIndex for SevenZipIndex {
    fn file_count(&self) -> u32 {
        // Checked against u32 when the index was built.
        self.entries.len() as u32
    }

    fn name_utf16_len(&self, index: u32) -> usize {
        self.entry(index).map_or(0, |e| e.name.len())
    }

    fn name_utf16(&self, index: u32, dest: &mut [u8]) -> DecoderResult<()> {
        let entry = self
            .entry(index)
            .ok_or_else(|| DecoderError::new(Status::Param, format!("no entry {index}")))?;
        if dest.len() != entry.name.len() * 2 {
            return Err(DecoderError::new(
                Status::Param,
                format!(
                    "name buffer of {} bytes for {} code units",
                    dest.len(),
                    entry.name.len()
                ),
            ));
        }
        for (chunk, unit) in dest.chunks_exact_mut(2).zip(&entry.name) {
            chunk.copy_from_slice(&unit.to_le_bytes());
        }
        Ok(())
    }

    fn is_directory(&self, index: u32) -> bool {
        self.entry(index).is_some_and(|e| e.is_directory)
    }

    fn decoded_size(&self, index: u32) -> u64 {
        self.entry(index).map_or(0, |e| e.size)
    }

    fn entry_crc(&self, index: u32) -> Option<u32> {
        self.entry(index)?.crc
    }

    fn extract_block<R: Read + Seek>(
        &mut self,
        stream: &mut R,
        index: u32,
        cache: &mut BlockCache,
    ) -> Result<EntrySpan> {
        let entry = self
            .entry(index)
            .ok_or_else(|| DecoderError::new(Status::Param, "no such entry").for_entry(index))?;
        let Some(location) = entry.location else {
            return Ok(EntrySpan::EMPTY);
        };
        let plan = &self.blocks[location.block as usize];

        if plan.unpack_size > self.max_block_size {
            return Err(DecoderError::new(
                Status::Mem,
                format!(
                    "block of {} bytes exceeds limit of {}",
                    plan.unpack_size, self.max_block_size
                ),
            )
            .for_entry(index));
        }
        let block_len =
            usize::try_from(plan.unpack_size).map_err(|_| Error::out_of_memory(plan.unpack_size))?;

        cache.load_block(location.block, block_len, |out| {
            decode_block(stream, plan, out).map_err(|e| e.for_entry(index))
        })?;

        // Substream sizes were checked against the folder size while parsing,
        // so both fit in the block length.
        Ok(EntrySpan::new(location.offset as usize, entry.size as usize))
    }
}

/// Decodes a whole block into `out`, which is exactly the block's size.
fn decode_block<R: Read + Seek>(stream: &mut R, plan: &BlockPlan, out: &mut [u8]) -> DecoderResult<()> {
    stream.seek(SeekFrom::Start(plan.pack_offset))?;
    let mut decoder = codec::build_folder_decoder(&plan.folder, stream.by_ref().take(plan.pack_size))?;
    decoder.read_exact(out)?;

    if let Some(expected) = plan.folder.unpack_crc {
        let actual = crc32fast::hash(out);
        if actual != expected {
            return Err(DecoderError::new(
                Status::Crc,
                format!("block CRC mismatch: expected {expected:#x}, got {actual:#x}"),
            ));
        }
    }
    Ok(())
}

//! Streams info structures for 7z archives.
//!
//! These structures describe where the packed data lives, how each folder
//! (compression block) turns packed streams back into bytes, and how the
//! decoded bytes of a folder split into individual entries.

use super::property_id;
use super::reader::HeaderReader;
use crate::backend::{DecoderError, DecoderResult, Status};
use crate::config::ResourceLimits;

/// Maximum number of coders in one folder.
const MAX_CODERS: usize = 16;

/// Maximum number of in or out streams of one coder.
const MAX_CODER_STREAMS: usize = 32;

fn unexpected(section: &str, prop_id: u8) -> DecoderError {
    DecoderError::archive(format!("unexpected property ID in {section}: {prop_id:#x}"))
}

/// Reads a stream index that must be below `bound`.
fn stream_index(r: &mut HeaderReader<'_>, bound: usize, what: &str) -> DecoderResult<usize> {
    let index = r.number()?;
    usize::try_from(index)
        .ok()
        .filter(|i| *i < bound)
        .ok_or_else(|| DecoderError::archive(format!("{what} {index} out of range (< {bound})")))
}

/// Information about packed (compressed) streams.
#[derive(Debug, Clone, Default)]
pub struct PackInfo {
    /// Position of the first pack stream, relative to the end of the
    /// signature header.
    pub pack_pos: u64,
    /// Sizes of each packed stream.
    pub pack_sizes: Vec<u64>,
    /// Optional CRC values for each packed stream.
    pub pack_crcs: Vec<Option<u32>>,
}

impl PackInfo {
    /// Parses PackInfo; the reader is positioned after the `PACK_INFO` ID.
    pub fn parse(r: &mut HeaderReader<'_>, limits: &ResourceLimits) -> DecoderResult<Self> {
        let pack_pos = r.number()?;
        let num_streams = r.count(limits.max_entries, "pack streams")?;

        let mut pack_sizes = vec![0u64; num_streams];
        let mut pack_crcs = vec![None; num_streams];

        loop {
            match r.u8()? {
                property_id::END => break,
                property_id::SIZE => {
                    for size in pack_sizes.iter_mut() {
                        *size = r.number()?;
                    }
                }
                property_id::CRC => {
                    let defined = r.defined_vector(num_streams)?;
                    for (crc, has_crc) in pack_crcs.iter_mut().zip(defined) {
                        if has_crc {
                            *crc = Some(r.u32_le()?);
                        }
                    }
                }
                other => return Err(unexpected("PackInfo", other)),
            }
        }

        Ok(Self {
            pack_pos,
            pack_sizes,
            pack_crcs,
        })
    }

    /// Returns the number of pack streams.
    pub fn num_streams(&self) -> usize {
        self.pack_sizes.len()
    }

    /// Returns the offset of pack stream `index` relative to the end of the
    /// signature header.
    pub fn stream_offset(&self, index: usize) -> Option<u64> {
        self.pack_sizes
            .get(..index)?
            .iter()
            .try_fold(self.pack_pos, |acc, &size| acc.checked_add(size))
    }
}

/// A compression or filter coder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coder {
    /// Method ID bytes (typically 1-4 bytes).
    pub method_id: Vec<u8>,
    /// Number of input streams.
    pub num_in_streams: usize,
    /// Number of output streams.
    pub num_out_streams: usize,
    /// Coder properties (e.g. the LZMA dictionary size); empty if absent.
    pub properties: Vec<u8>,
}

/// A binding pair connecting an output stream to an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPair {
    /// Index of the input stream.
    pub in_index: usize,
    /// Index of the output stream feeding it.
    pub out_index: usize,
}

/// A folder (block) describing how packed streams decode into bytes.
#[derive(Debug, Clone, Default)]
pub struct Folder {
    /// Coders in this folder.
    pub coders: Vec<Coder>,
    /// Binding pairs connecting coder streams.
    pub bind_pairs: Vec<BindPair>,
    /// Input stream index fed by each packed stream, in pack order.
    pub packed_streams: Vec<usize>,
    /// Unpacked size of each coder output stream.
    pub unpack_sizes: Vec<u64>,
    /// CRC of the folder's final output, if recorded.
    pub unpack_crc: Option<u32>,
}

impl Folder {
    fn parse(r: &mut HeaderReader<'_>) -> DecoderResult<Self> {
        let num_coders = r.count(MAX_CODERS, "coders in folder")?;
        if num_coders == 0 {
            return Err(DecoderError::archive("folder has no coders"));
        }

        let mut coders = Vec::with_capacity(num_coders);
        for _ in 0..num_coders {
            let flags = r.u8()?;
            if flags & 0x80 != 0 {
                return Err(DecoderError::unsupported("alternative coder methods"));
            }
            let method_id = r.bytes((flags & 0x0F) as usize)?.to_vec();

            let (num_in_streams, num_out_streams) = if flags & 0x10 != 0 {
                (
                    r.count(MAX_CODER_STREAMS, "coder in streams")?,
                    r.count(MAX_CODER_STREAMS, "coder out streams")?,
                )
            } else {
                (1, 1)
            };

            let properties = if flags & 0x20 != 0 {
                let available = r.remaining();
                let len = r.count(available, "coder property bytes")?;
                r.bytes(len)?.to_vec()
            } else {
                Vec::new()
            };

            coders.push(Coder {
                method_id,
                num_in_streams,
                num_out_streams,
                properties,
            });
        }

        let total_in: usize = coders.iter().map(|c| c.num_in_streams).sum();
        let total_out: usize = coders.iter().map(|c| c.num_out_streams).sum();
        if total_out == 0 {
            return Err(DecoderError::archive("folder has no output streams"));
        }

        let num_bind_pairs = total_out - 1;
        let mut bind_pairs = Vec::with_capacity(num_bind_pairs);
        for _ in 0..num_bind_pairs {
            let in_index = stream_index(r, total_in, "bind pair input")?;
            let out_index = stream_index(r, total_out, "bind pair output")?;
            bind_pairs.push(BindPair {
                in_index,
                out_index,
            });
        }

        let num_packed = total_in.checked_sub(num_bind_pairs).ok_or_else(|| {
            DecoderError::archive("folder has more bind pairs than input streams")
        })?;
        let mut packed_streams = Vec::with_capacity(num_packed);
        if num_packed == 1 {
            let unbound = (0..total_in)
                .find(|i| !bind_pairs.iter().any(|bp| bp.in_index == *i))
                .ok_or_else(|| DecoderError::archive("folder has no unbound input stream"))?;
            packed_streams.push(unbound);
        } else {
            for _ in 0..num_packed {
                packed_streams.push(stream_index(r, total_in, "packed stream input")?);
            }
        }

        Ok(Self {
            coders,
            bind_pairs,
            packed_streams,
            unpack_sizes: Vec::new(),
            unpack_crc: None,
        })
    }

    /// Returns the total number of input streams.
    pub fn total_in_streams(&self) -> usize {
        self.coders.iter().map(|c| c.num_in_streams).sum()
    }

    /// Returns the total number of output streams.
    pub fn total_out_streams(&self) -> usize {
        self.coders.iter().map(|c| c.num_out_streams).sum()
    }

    /// Returns the output stream not consumed by any bind pair: the folder's
    /// final output.
    pub fn main_out_stream(&self) -> Option<usize> {
        (0..self.total_out_streams()).find(|o| !self.bind_pairs.iter().any(|bp| bp.out_index == *o))
    }

    /// Returns the decoded size of the folder.
    pub fn unpack_size(&self) -> Option<u64> {
        self.unpack_sizes.get(self.main_out_stream()?).copied()
    }

    /// Returns the first input and output stream index of each coder.
    fn stream_bases(&self) -> Vec<(usize, usize)> {
        let mut bases = Vec::with_capacity(self.coders.len());
        let (mut ins, mut outs) = (0, 0);
        for coder in &self.coders {
            bases.push((ins, outs));
            ins += coder.num_in_streams;
            outs += coder.num_out_streams;
        }
        bases
    }

    /// Resolves the folder into a linear chain of single-stream coders.
    ///
    /// The result lists coder indices from the one producing the final
    /// output down to the one reading the packed stream.
    pub fn linear_chain(&self) -> DecoderResult<Vec<usize>> {
        if let Some(coder) = self
            .coders
            .iter()
            .find(|c| c.num_in_streams != 1 || c.num_out_streams != 1)
        {
            return Err(DecoderError::unsupported(format!(
                "coder {:02x?} with {} inputs and {} outputs",
                coder.method_id, coder.num_in_streams, coder.num_out_streams
            )));
        }
        if self.packed_streams.len() != 1 {
            return Err(DecoderError::unsupported(format!(
                "folder with {} packed streams",
                self.packed_streams.len()
            )));
        }

        // With one stream per coder, stream indices equal coder indices.
        let mut current = self
            .main_out_stream()
            .ok_or_else(|| DecoderError::archive("folder has no final output"))?;
        let mut chain = Vec::with_capacity(self.coders.len());
        loop {
            if chain.len() == self.coders.len() {
                return Err(DecoderError::archive("cycle in folder bind pairs"));
            }
            chain.push(current);
            match self.bind_pairs.iter().find(|bp| bp.in_index == current) {
                Some(bp) => current = bp.out_index,
                None if self.packed_streams[0] == current => return Ok(chain),
                None => return Err(DecoderError::archive("coder input is not connected")),
            }
        }
    }

    /// Returns the decoded size of coder `coder`'s first output stream.
    pub fn coder_unpack_size(&self, coder: usize) -> Option<u64> {
        let (_, out_base) = *self.stream_bases().get(coder)?;
        self.unpack_sizes.get(out_base).copied()
    }
}

/// Unpack info containing folder definitions.
#[derive(Debug, Clone, Default)]
pub struct UnpackInfo {
    /// Folders (blocks).
    pub folders: Vec<Folder>,
}

impl UnpackInfo {
    /// Parses UnpackInfo; the reader is positioned after the `UNPACK_INFO`
    /// ID.
    pub fn parse(r: &mut HeaderReader<'_>, limits: &ResourceLimits) -> DecoderResult<Self> {
        let mut folders = Vec::new();

        loop {
            match r.u8()? {
                property_id::END => break,
                property_id::FOLDER => {
                    let num_folders = r.count(limits.max_entries, "folders")?;
                    r.inline_marker("folder definitions")?;
                    // Each folder takes at least two header bytes.
                    folders = Vec::with_capacity(num_folders.min(r.remaining() / 2));
                    for _ in 0..num_folders {
                        folders.push(Folder::parse(r)?);
                    }
                }
                property_id::CODERS_UNPACK_SIZE => {
                    for folder in &mut folders {
                        let sizes = (0..folder.total_out_streams())
                            .map(|_| r.number())
                            .collect::<DecoderResult<Vec<_>>>()?;
                        folder.unpack_sizes = sizes;
                    }
                }
                property_id::CRC => {
                    let defined = r.defined_vector(folders.len())?;
                    for (folder, has_crc) in folders.iter_mut().zip(defined) {
                        if has_crc {
                            folder.unpack_crc = Some(r.u32_le()?);
                        }
                    }
                }
                other => return Err(unexpected("UnpackInfo", other)),
            }
        }

        for (i, folder) in folders.iter().enumerate() {
            if folder.unpack_size().is_none() {
                return Err(DecoderError::archive(format!("folder {i} has no unpack size")));
            }
        }

        Ok(Self { folders })
    }
}

/// Information about substreams within folders.
///
/// In solid archives several entries share one folder. SubStreamsInfo
/// records how many entries each folder holds and their sizes.
#[derive(Debug, Clone, Default)]
pub struct SubStreamsInfo {
    /// Number of unpack streams (entries) in each folder.
    pub num_unpack_streams: Vec<usize>,
    /// Unpacked size of each substream, in folder order.
    pub unpack_sizes: Vec<u64>,
    /// CRC of each substream, if recorded.
    pub digests: Vec<Option<u32>>,
}

impl SubStreamsInfo {
    /// Derives substream info for archives that omit it: one entry per
    /// folder, inheriting the folder CRC.
    pub fn one_per_folder(folders: &[Folder]) -> Self {
        Self {
            num_unpack_streams: vec![1; folders.len()],
            unpack_sizes: folders.iter().map(|f| f.unpack_size().unwrap_or(0)).collect(),
            digests: folders.iter().map(|f| f.unpack_crc).collect(),
        }
    }

    /// Parses SubStreamsInfo; the reader is positioned after the
    /// `SUBSTREAMS_INFO` ID.
    pub fn parse(
        r: &mut HeaderReader<'_>,
        folders: &[Folder],
        limits: &ResourceLimits,
    ) -> DecoderResult<Self> {
        let mut num_unpack_streams = vec![1usize; folders.len()];
        let mut prop_id = r.u8()?;

        if prop_id == property_id::NUM_UNPACK_STREAM {
            let mut total = 0usize;
            for n in num_unpack_streams.iter_mut() {
                *n = r.count(limits.max_entries, "substreams")?;
                total = total
                    .checked_add(*n)
                    .filter(|t| *t <= limits.max_entries)
                    .ok_or_else(|| DecoderError::new(Status::Mem, "too many substreams"))?;
            }
            prop_id = r.u8()?;
        }

        let mut unpack_sizes = Vec::new();
        let has_sizes = prop_id == property_id::SIZE;
        for (folder, &n) in folders.iter().zip(&num_unpack_streams) {
            if n == 0 {
                continue;
            }
            let folder_size = folder.unpack_size().unwrap_or(0);
            let mut used = 0u64;
            if has_sizes {
                for _ in 1..n {
                    let size = r.number()?;
                    used = used
                        .checked_add(size)
                        .filter(|u| *u <= folder_size)
                        .ok_or_else(|| {
                            DecoderError::archive("substream sizes exceed folder size")
                        })?;
                    unpack_sizes.push(size);
                }
            }
            // The last size in each folder is implicit.
            unpack_sizes.push(folder_size - used);
        }
        if has_sizes {
            prop_id = r.u8()?;
        }

        let mut digests = Vec::new();
        loop {
            match prop_id {
                property_id::END => break,
                property_id::CRC => {
                    let needing: usize = folders
                        .iter()
                        .zip(&num_unpack_streams)
                        .filter(|(f, n)| !(**n == 1 && f.unpack_crc.is_some()))
                        .map(|(_, n)| *n)
                        .sum();
                    let defined = r.defined_vector(needing)?;
                    let mut defined = defined.into_iter();
                    digests.clear();
                    for (folder, &n) in folders.iter().zip(&num_unpack_streams) {
                        if n == 1 && folder.unpack_crc.is_some() {
                            digests.push(folder.unpack_crc);
                            continue;
                        }
                        for _ in 0..n {
                            digests.push(match defined.next() {
                                Some(true) => Some(r.u32_le()?),
                                _ => None,
                            });
                        }
                    }
                }
                other => return Err(unexpected("SubStreamsInfo", other)),
            }
            prop_id = r.u8()?;
        }

        if digests.is_empty() {
            for (folder, &n) in folders.iter().zip(&num_unpack_streams) {
                if n == 1 {
                    digests.push(folder.unpack_crc);
                } else {
                    digests.extend(std::iter::repeat_n(None, n));
                }
            }
        }

        Ok(Self {
            num_unpack_streams,
            unpack_sizes,
            digests,
        })
    }
}

/// The streams section of a header: packed data, folders and substreams.
#[derive(Debug, Clone, Default)]
pub struct StreamsInfo {
    /// Pack info.
    pub pack_info: PackInfo,
    /// Folder definitions.
    pub folders: Vec<Folder>,
    /// Per-entry split of each folder.
    pub substreams: SubStreamsInfo,
}

impl StreamsInfo {
    /// Parses a streams section up to and including its `END` marker.
    pub fn parse(r: &mut HeaderReader<'_>, limits: &ResourceLimits) -> DecoderResult<Self> {
        let mut pack_info = PackInfo::default();
        let mut folders = Vec::new();
        let mut substreams = None;

        loop {
            match r.u8()? {
                property_id::END => break,
                property_id::PACK_INFO => pack_info = PackInfo::parse(r, limits)?,
                property_id::UNPACK_INFO => folders = UnpackInfo::parse(r, limits)?.folders,
                property_id::SUBSTREAMS_INFO => {
                    substreams = Some(SubStreamsInfo::parse(r, &folders, limits)?);
                }
                other => return Err(unexpected("StreamsInfo", other)),
            }
        }

        let packed_needed: usize = folders.iter().map(|f| f.packed_streams.len()).sum();
        if packed_needed > pack_info.num_streams() {
            return Err(DecoderError::archive(format!(
                "folders use {packed_needed} pack streams but only {} exist",
                pack_info.num_streams()
            )));
        }

        let substreams = substreams.unwrap_or_else(|| SubStreamsInfo::one_per_folder(&folders));
        Ok(Self {
            pack_info,
            folders,
            substreams,
        })
    }

    /// Returns the index of the first pack stream used by each folder.
    pub fn folder_pack_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.folders.len());
        let mut next = 0;
        for folder in &self.folders {
            starts.push(next);
            next += folder.packed_streams.len();
        }
        starts
    }
}

//! Top-level header parsing.
//!
//! Reads the start header, loads the next header, and unwraps encoded
//! (compressed) headers until a plain one is reached.

use std::io::{Read, Seek, SeekFrom};

use super::files::{FileRecord, parse_files_info};
use super::header::StartHeader;
use super::property_id;
use super::reader::HeaderReader;
use super::streams::StreamsInfo;
use super::SIGNATURE_HEADER_SIZE;
use crate::backend::{DecoderError, DecoderResult, Status};
use crate::codec;
use crate::config::ResourceLimits;

/// Maximum nesting of encoded headers.
const MAX_ENCODED_DEPTH: usize = 4;

/// The parsed contents of an archive header.
#[derive(Debug, Clone, Default)]
pub struct ArchiveHeader {
    /// Where the packed data is and how it decodes.
    pub streams: StreamsInfo,
    /// Per-entry records, in archive order.
    pub files: Vec<FileRecord>,
}

impl ArchiveHeader {
    /// Returns the number of entries that carry data.
    pub fn entries_with_data(&self) -> usize {
        self.files.iter().filter(|f| f.has_stream).count()
    }
}

/// Reads and parses the header of the archive in `r`.
///
/// The stream is rewound to its start first.
///
/// # Errors
///
/// `Status::Archive` for malformed structure, `Status::Crc` for checksum
/// failures, `Status::Mem` when a limit is exceeded, `Status::Unsupported`
/// for features outside this crate and `Status::InputEof` for truncation.
pub fn read_archive<R: Read + Seek>(
    r: &mut R,
    limits: &ResourceLimits,
) -> DecoderResult<ArchiveHeader> {
    r.seek(SeekFrom::Start(0))?;
    let start = StartHeader::read(r)?;

    if start.next_header_size == 0 {
        return Ok(ArchiveHeader::default());
    }
    let size = header_size(start.next_header_size, limits)?;
    let position = start
        .next_header_position()
        .ok_or_else(|| DecoderError::archive("next header offset overflows"))?;

    r.seek(SeekFrom::Start(position))?;
    let mut data = vec![0u8; size];
    r.read_exact(&mut data)?;

    let actual = crc32fast::hash(&data);
    if actual != start.next_header_crc {
        return Err(DecoderError::new(
            Status::Crc,
            format!(
                "next header CRC mismatch: expected {:#x}, got {actual:#x}",
                start.next_header_crc
            ),
        ));
    }

    let header = parse_next_header(r, data, limits)?;
    check_consistency(&header)?;
    Ok(header)
}

fn header_size(size: u64, limits: &ResourceLimits) -> DecoderResult<usize> {
    usize::try_from(size)
        .ok()
        .filter(|_| size <= limits.max_header_bytes)
        .ok_or_else(|| {
            DecoderError::new(
                Status::Mem,
                format!(
                    "header of {size} bytes exceeds limit of {}",
                    limits.max_header_bytes
                ),
            )
        })
}

fn parse_next_header<R: Read + Seek>(
    r: &mut R,
    mut data: Vec<u8>,
    limits: &ResourceLimits,
) -> DecoderResult<ArchiveHeader> {
    for depth in 0..=MAX_ENCODED_DEPTH {
        let mut hr = HeaderReader::new(&data);
        match hr.u8()? {
            property_id::HEADER => return parse_main_header(&mut hr, limits),
            property_id::ENCODED_HEADER => {
                let streams = StreamsInfo::parse(&mut hr, limits)?;
                log::debug!("decoding encoded header (level {})", depth + 1);
                data = decode_encoded_header(r, &streams, limits)?;
            }
            other => {
                return Err(DecoderError::archive(format!(
                    "expected header marker, got {other:#x}"
                )));
            }
        }
    }
    Err(DecoderError::unsupported(format!(
        "encoded headers nested deeper than {MAX_ENCODED_DEPTH}"
    )))
}

/// Decodes the header bytes described by an encoded header's streams.
fn decode_encoded_header<R: Read + Seek>(
    r: &mut R,
    streams: &StreamsInfo,
    limits: &ResourceLimits,
) -> DecoderResult<Vec<u8>> {
    let folder = streams
        .folders
        .first()
        .ok_or_else(|| DecoderError::archive("encoded header has no folders"))?;
    let unpack_size = folder
        .unpack_size()
        .ok_or_else(|| DecoderError::archive("encoded header missing unpack size"))?;
    let unpack_size = header_size(unpack_size, limits)?;

    let pack_size = streams
        .pack_info
        .pack_sizes
        .first()
        .copied()
        .ok_or_else(|| DecoderError::archive("encoded header missing pack size"))?;
    let pack_pos = SIGNATURE_HEADER_SIZE
        .checked_add(streams.pack_info.pack_pos)
        .ok_or_else(|| DecoderError::archive("encoded header position overflows"))?;

    r.seek(SeekFrom::Start(pack_pos))?;
    let mut decoder = codec::build_folder_decoder(folder, r.by_ref().take(pack_size))?;
    let mut decoded = vec![0u8; unpack_size];
    decoder.read_exact(&mut decoded)?;

    if let Some(expected) = folder.unpack_crc {
        let actual = crc32fast::hash(&decoded);
        if actual != expected {
            return Err(DecoderError::new(
                Status::Crc,
                format!("encoded header CRC mismatch: expected {expected:#x}, got {actual:#x}"),
            ));
        }
    }

    Ok(decoded)
}

fn parse_main_header(
    r: &mut HeaderReader<'_>,
    limits: &ResourceLimits,
) -> DecoderResult<ArchiveHeader> {
    let mut header = ArchiveHeader::default();

    loop {
        match r.u8()? {
            property_id::END => break,
            property_id::ARCHIVE_PROPERTIES => skip_archive_properties(r)?,
            property_id::ADDITIONAL_STREAMS_INFO => {
                // Only used by encrypted or external headers; nothing here
                // refers to it.
                StreamsInfo::parse(r, limits)?;
            }
            property_id::MAIN_STREAMS_INFO => header.streams = StreamsInfo::parse(r, limits)?,
            property_id::FILES_INFO => header.files = parse_files_info(r, limits)?,
            other => {
                return Err(DecoderError::archive(format!(
                    "unexpected property ID in header: {other:#x}"
                )));
            }
        }
    }

    Ok(header)
}

fn skip_archive_properties(r: &mut HeaderReader<'_>) -> DecoderResult<()> {
    while r.u8()? != property_id::END {
        let size = r.number()?;
        r.skip(size)?;
    }
    Ok(())
}

/// Every entry with data must map onto exactly one substream.
fn check_consistency(header: &ArchiveHeader) -> DecoderResult<()> {
    let with_data = header.entries_with_data();
    let substreams = header.streams.substreams.unpack_sizes.len();
    if with_data != substreams {
        return Err(DecoderError::archive(format!(
            "{with_data} entries with data but {substreams} substreams"
        )));
    }
    Ok(())
}

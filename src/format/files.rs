//! Files info: the per-entry records of a 7z header.

use super::attributes;
use super::property_id;
use super::reader::HeaderReader;
use crate::backend::{DecoderError, DecoderResult};
use crate::config::ResourceLimits;

/// Maximum length of an entry name in UTF-16 code units.
///
/// 32,768 code units allows paths far longer than any file system accepts
/// while stopping a hostile header from claiming an unbounded name.
pub const MAX_NAME_UNITS: usize = 32768;

/// One entry record from the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    /// Name as UTF-16 code units, without the terminating NUL.
    pub name: Vec<u16>,
    /// Whether this entry has data in a folder.
    pub has_stream: bool,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Whether this is an anti-item (a deletion marker in update archives).
    pub is_anti: bool,
    /// Windows attributes, if recorded.
    pub attributes: Option<u32>,
}

/// Parses the files section; the reader is positioned after the
/// `FILES_INFO` ID.
pub fn parse_files_info(
    r: &mut HeaderReader<'_>,
    limits: &ResourceLimits,
) -> DecoderResult<Vec<FileRecord>> {
    let num_files = r.count(limits.max_entries, "files")?;
    let mut empty_streams = vec![false; num_files];
    let mut empty_files: Vec<bool> = Vec::new();
    let mut anti_items: Vec<bool> = Vec::new();
    let mut names: Vec<Vec<u16>> = Vec::new();
    let mut attrs: Vec<Option<u32>> = vec![None; num_files];

    loop {
        let prop_id = r.u8()?;
        if prop_id == property_id::END {
            break;
        }
        let size = r.number()?;
        let size = usize::try_from(size)
            .ok()
            .filter(|s| *s <= r.remaining())
            .ok_or_else(|| {
                DecoderError::archive(format!("file property {prop_id:#x} overruns header"))
            })?;
        let mut body = HeaderReader::new(r.bytes(size)?);

        match prop_id {
            property_id::EMPTY_STREAM => {
                empty_streams = body.bit_vector(num_files)?;
            }
            property_id::EMPTY_FILE => {
                let num_empty = empty_streams.iter().filter(|e| **e).count();
                empty_files = body.bit_vector(num_empty)?;
            }
            property_id::ANTI => {
                let num_empty = empty_streams.iter().filter(|e| **e).count();
                anti_items = body.bit_vector(num_empty)?;
            }
            property_id::NAME => {
                body.inline_marker("file names")?;
                names = parse_names(&mut body, num_files)?;
            }
            property_id::WIN_ATTRIBUTES => {
                let defined = body.defined_vector(num_files)?;
                body.inline_marker("attributes")?;
                for (attr, has_attr) in attrs.iter_mut().zip(defined) {
                    if has_attr {
                        *attr = Some(body.u32_le()?);
                    }
                }
            }
            // Timestamps, comments, start positions and padding carry
            // nothing extraction needs.
            _ => {}
        }
    }

    let mut names = names.into_iter();

    let mut empty_index = 0;
    let mut records = Vec::with_capacity(num_files);
    for (&is_empty_stream, attr) in empty_streams.iter().zip(attrs) {
        let mut record = FileRecord {
            name: names.next().unwrap_or_default(),
            has_stream: !is_empty_stream,
            attributes: attr,
            ..FileRecord::default()
        };
        if is_empty_stream {
            let is_empty_file = empty_files.get(empty_index).copied().unwrap_or(false);
            let dir_attr = attr.is_some_and(|a| a & attributes::DIRECTORY != 0);
            record.is_directory = !is_empty_file || dir_attr;
            record.is_anti = anti_items.get(empty_index).copied().unwrap_or(false);
            empty_index += 1;
        }
        records.push(record);
    }

    Ok(records)
}

/// Reads `count` NUL-terminated UTF-16LE names.
fn parse_names(body: &mut HeaderReader<'_>, count: usize) -> DecoderResult<Vec<Vec<u16>>> {
    // Each name needs at least its two-byte terminator.
    let mut names = Vec::with_capacity(count.min(body.remaining() / 2));
    for index in 0..count {
        let mut name = Vec::new();
        loop {
            let b = body.bytes(2)?;
            let unit = u16::from_le_bytes([b[0], b[1]]);
            if unit == 0 {
                break;
            }
            if name.len() == MAX_NAME_UNITS {
                return Err(DecoderError::archive(format!(
                    "name of entry {index} exceeds {MAX_NAME_UNITS} code units"
                )));
            }
            name.push(unit);
        }
        names.push(name);
    }
    Ok(names)
}

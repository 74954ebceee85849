//! The 7z signature header.

use std::io::Read;

use super::{SIGNATURE, SIGNATURE_HEADER_SIZE, VERSION_MAJOR, VERSION_MINOR};
use crate::backend::{DecoderError, DecoderResult, Status};

/// The fixed-size start header at offset 0 of every 7z archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartHeader {
    /// Archive format version - major number.
    pub version_major: u8,
    /// Archive format version - minor number.
    pub version_minor: u8,
    /// Offset from the end of the start header to the next header.
    pub next_header_offset: u64,
    /// Size of the next header (compressed if encoded).
    pub next_header_size: u64,
    /// CRC of the next header data.
    pub next_header_crc: u32,
}

impl StartHeader {
    /// Creates a start header pointing at a next header.
    pub fn new(next_header_offset: u64, next_header_size: u64, next_header_crc: u32) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            next_header_offset,
            next_header_size,
            next_header_crc,
        }
    }

    /// Reads and validates the signature and start header.
    ///
    /// # Errors
    ///
    /// `Status::Archive` for a bad signature or CRC, `Status::Unsupported`
    /// for a newer format version, `Status::InputEof` if the stream is
    /// shorter than 32 bytes.
    pub fn read<R: Read>(r: &mut R) -> DecoderResult<Self> {
        let mut raw = [0u8; SIGNATURE_HEADER_SIZE as usize];
        r.read_exact(&mut raw)?;

        if raw[..6] != SIGNATURE[..] {
            return Err(DecoderError::archive("invalid 7z signature"));
        }

        let version_major = raw[6];
        let version_minor = raw[7];
        if version_major > VERSION_MAJOR
            || (version_major == VERSION_MAJOR && version_minor > VERSION_MINOR)
        {
            return Err(DecoderError::unsupported(format!(
                "archive version {version_major}.{version_minor}"
            )));
        }

        let stored_crc = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let actual_crc = crc32fast::hash(&raw[12..32]);
        if stored_crc != actual_crc {
            return Err(DecoderError::new(
                Status::Crc,
                format!("start header CRC mismatch: expected {stored_crc:#x}, got {actual_crc:#x}"),
            ));
        }

        let mut offset = [0u8; 8];
        offset.copy_from_slice(&raw[12..20]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&raw[20..28]);

        Ok(Self {
            version_major,
            version_minor,
            next_header_offset: u64::from_le_bytes(offset),
            next_header_size: u64::from_le_bytes(size),
            next_header_crc: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        })
    }

    /// Serializes the start header, computing its CRC.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_HEADER_SIZE as usize] {
        let mut raw = [0u8; SIGNATURE_HEADER_SIZE as usize];
        raw[..6].copy_from_slice(SIGNATURE);
        raw[6] = self.version_major;
        raw[7] = self.version_minor;
        raw[12..20].copy_from_slice(&self.next_header_offset.to_le_bytes());
        raw[20..28].copy_from_slice(&self.next_header_size.to_le_bytes());
        raw[28..32].copy_from_slice(&self.next_header_crc.to_le_bytes());
        let crc = crc32fast::hash(&raw[12..32]);
        raw[8..12].copy_from_slice(&crc.to_le_bytes());
        raw
    }

    /// Returns the absolute position of the next header, or `None` on
    /// overflow.
    pub fn next_header_position(&self) -> Option<u64> {
        SIGNATURE_HEADER_SIZE.checked_add(self.next_header_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_valid_start_header() {
        let raw = StartHeader::new(100, 50, 0xDEADBEEF).to_bytes();
        let header = StartHeader::read(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(header.version_major, 0);
        assert_eq!(header.version_minor, 4);
        assert_eq!(header.next_header_offset, 100);
        assert_eq!(header.next_header_size, 50);
        assert_eq!(header.next_header_crc, 0xDEADBEEF);
        assert_eq!(header.next_header_position(), Some(132));
    }

    #[test]
    fn test_invalid_signature() {
        let mut raw = StartHeader::new(100, 50, 0).to_bytes();
        raw[0] = 0x00;
        let err = StartHeader::read(&mut Cursor::new(&raw)).unwrap_err();
        assert_eq!(err.status(), Status::Archive);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut raw = StartHeader::new(100, 50, 0).to_bytes();
        raw[12] ^= 0xFF;
        let err = StartHeader::read(&mut Cursor::new(&raw)).unwrap_err();
        assert_eq!(err.status(), Status::Crc);
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut header = StartHeader::new(0, 0, 0);
        header.version_minor = VERSION_MINOR + 1;
        let raw = header.to_bytes();
        let err = StartHeader::read(&mut Cursor::new(&raw)).unwrap_err();
        assert_eq!(err.status(), Status::Unsupported);
    }

    #[test]
    fn test_truncated_header() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00];
        let err = StartHeader::read(&mut Cursor::new(&data)).unwrap_err();
        assert_eq!(err.status(), Status::InputEof);
    }

    #[test]
    fn test_position_overflow() {
        let header = StartHeader::new(u64::MAX, 0, 0);
        assert_eq!(header.next_header_position(), None);
    }
}

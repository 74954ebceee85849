//! Decoders for the coders a 7z folder may use.
//!
//! A folder lists its coders and how their streams connect. The decoders
//! here each wrap one coder as a [`Read`] adapter; [`build_folder_decoder`]
//! stacks them so that reading from the result yields the folder's output.
//!
//! | Method | Feature |
//! |--------|---------|
//! | Copy | always |
//! | LZMA, LZMA2, BCJ filters, Delta | `lzma` |
//! | Deflate | `deflate` |
//! | BZip2 | `bzip2` |

#[cfg(feature = "lzma")]
pub mod lzma;

#[cfg(feature = "lzma")]
pub mod filters;

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "bzip2")]
pub mod bzip2;

mod copy;

use std::io::Read;

use crate::backend::{DecoderError, DecoderResult};
use crate::format::streams::{Coder, Folder};

/// A decoder that reads coded data and produces decoded output.
pub trait Decoder: Read {
    /// Returns the method ID for this decoder.
    fn method_id(&self) -> &'static [u8];
}

pub use copy::CopyDecoder;

#[cfg(feature = "lzma")]
pub use lzma::{Lzma2Decoder, LzmaDecoder};

#[cfg(feature = "lzma")]
pub use filters::{BcjArch, BcjDecoder, DeltaDecoder};

#[cfg(feature = "deflate")]
pub use deflate::DeflateDecoder;

#[cfg(feature = "bzip2")]
pub use bzip2::Bzip2Decoder;

/// Method IDs for coders.
pub mod method {
    /// Copy (no compression).
    pub const COPY: &[u8] = &[0x00];
    /// LZMA compression.
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    /// LZMA2 compression.
    pub const LZMA2: &[u8] = &[0x21];
    /// Deflate compression.
    pub const DEFLATE: &[u8] = &[0x04, 0x01, 0x08];
    /// BZip2 compression.
    pub const BZIP2: &[u8] = &[0x04, 0x02, 0x02];
    /// PPMd compression.
    pub const PPMD: &[u8] = &[0x03, 0x04, 0x01];
    /// BCJ (x86) filter.
    pub const BCJ_X86: &[u8] = &[0x03, 0x03, 0x01, 0x03];
    /// BCJ (ARM) filter.
    pub const BCJ_ARM: &[u8] = &[0x03, 0x03, 0x05, 0x01];
    /// BCJ (ARM64/AArch64) filter.
    pub const BCJ_ARM64: &[u8] = &[0x0A];
    /// BCJ (ARM Thumb) filter.
    pub const BCJ_ARM_THUMB: &[u8] = &[0x03, 0x03, 0x07, 0x01];
    /// BCJ (PowerPC) filter.
    pub const BCJ_PPC: &[u8] = &[0x03, 0x03, 0x02, 0x05];
    /// BCJ (SPARC) filter.
    pub const BCJ_SPARC: &[u8] = &[0x03, 0x03, 0x08, 0x05];
    /// BCJ (IA64) filter.
    pub const BCJ_IA64: &[u8] = &[0x03, 0x03, 0x04, 0x01];
    /// BCJ (RISC-V) filter.
    pub const BCJ_RISCV: &[u8] = &[0x0B];
    /// BCJ2 (4-stream x86) filter.
    pub const BCJ2: &[u8] = &[0x03, 0x03, 0x01, 0x1B];
    /// Delta filter.
    pub const DELTA: &[u8] = &[0x03];
    /// AES-256 encryption.
    pub const AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

    /// Returns true if the method ID is a filter (BCJ, Delta) rather than a
    /// compressor.
    pub fn is_filter(method_id: &[u8]) -> bool {
        matches!(
            method_id,
            BCJ_X86
                | BCJ_ARM
                | BCJ_ARM64
                | BCJ_ARM_THUMB
                | BCJ_PPC
                | BCJ_SPARC
                | BCJ_IA64
                | BCJ_RISCV
                | DELTA
        )
    }

    /// Returns a human-readable name for a method ID.
    pub fn name(id: &[u8]) -> &'static str {
        match id {
            COPY => "Copy",
            LZMA => "LZMA",
            LZMA2 => "LZMA2",
            DEFLATE => "Deflate",
            BZIP2 => "BZip2",
            PPMD => "PPMd",
            BCJ_X86 => "BCJ (x86)",
            BCJ_ARM => "BCJ (ARM)",
            BCJ_ARM64 => "BCJ (ARM64)",
            BCJ_ARM_THUMB => "BCJ (ARM Thumb)",
            BCJ_PPC => "BCJ (PowerPC)",
            BCJ_SPARC => "BCJ (SPARC)",
            BCJ_IA64 => "BCJ (IA64)",
            BCJ_RISCV => "BCJ (RISC-V)",
            BCJ2 => "BCJ2",
            DELTA => "Delta",
            AES => "AES-256",
            _ => "Unknown",
        }
    }
}

/// Builds a decoder for one coder.
///
/// # Errors
///
/// `Status::Unsupported` if the method is unknown, needs a feature that is
/// not enabled, or has invalid properties.
pub fn build_decoder<'a, R: Read + 'a>(
    input: R,
    coder: &Coder,
    unpack_size: u64,
) -> DecoderResult<Box<dyn Decoder + 'a>> {
    #[allow(unused_variables)]
    let properties = coder.properties.as_slice();

    match coder.method_id.as_slice() {
        method::COPY => Ok(Box::new(CopyDecoder::new(input, unpack_size))),

        #[cfg(feature = "lzma")]
        method::LZMA => Ok(Box::new(LzmaDecoder::new(input, properties, unpack_size)?)),

        #[cfg(feature = "lzma")]
        method::LZMA2 => Ok(Box::new(Lzma2Decoder::new(input, properties)?)),

        #[cfg(feature = "lzma")]
        method::DELTA => Ok(Box::new(DeltaDecoder::new(input, properties))),

        #[cfg(feature = "lzma")]
        id if BcjArch::from_method(id).is_some() => {
            let arch = BcjArch::from_method(id).ok_or_else(|| unsupported(coder))?;
            Ok(Box::new(BcjDecoder::new(input, arch)))
        }

        #[cfg(feature = "deflate")]
        method::DEFLATE => Ok(Box::new(DeflateDecoder::unbuffered(input))),

        #[cfg(feature = "bzip2")]
        method::BZIP2 => Ok(Box::new(Bzip2Decoder::new(input))),

        _ => Err(unsupported(coder)),
    }
}

fn unsupported(coder: &Coder) -> DecoderError {
    DecoderError::unsupported(format!(
        "method {} ({:02x?})",
        method::name(&coder.method_id),
        coder.method_id
    ))
}

/// Builds the decoder chain for a folder over its packed stream.
///
/// Reading from the result yields the folder's decoded bytes. Coders are
/// stacked from the one reading `packed` up to the one producing the final
/// output, each told the size of its own output.
///
/// # Errors
///
/// `Status::Unsupported` for folders that are not a single linear chain
/// (BCJ2) or use an unsupported method; `Status::Archive` if the folder
/// omits a coder's output size.
pub fn build_folder_decoder<'a, R: Read + 'a>(
    folder: &Folder,
    packed: R,
) -> DecoderResult<Box<dyn Read + 'a>> {
    let chain = folder.linear_chain()?;

    let mut reader: Box<dyn Read + 'a> = Box::new(packed);
    for &index in chain.iter().rev() {
        let coder = &folder.coders[index];
        let size = folder.coder_unpack_size(index).ok_or_else(|| {
            DecoderError::archive(format!("no unpack size for coder {index}"))
        })?;
        log::trace!(
            "stacking {} decoder, {size} bytes out",
            method::name(&coder.method_id)
        );
        reader = Box::new(build_decoder(reader, coder, size)?);
    }
    Ok(reader)
}

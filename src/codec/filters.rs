//! Branch converter (BCJ) and Delta filter decoders.
//!
//! Filters do not compress. They undo a reversible transform applied before
//! compression: BCJ turns absolute branch targets in machine code back into
//! relative ones, Delta turns byte differences back into samples.

use std::io::{self, Read};

use lzma_rust2::filter::bcj::BcjReader;
use lzma_rust2::filter::delta::DeltaReader;

use super::{Decoder, method};

/// Instruction sets with a BCJ filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcjArch {
    /// x86 and x86-64.
    X86,
    /// 32-bit ARM.
    Arm,
    /// ARM64 (AArch64).
    Arm64,
    /// ARM Thumb.
    ArmThumb,
    /// PowerPC (big-endian).
    Ppc,
    /// SPARC.
    Sparc,
    /// Itanium.
    Ia64,
    /// RISC-V.
    RiscV,
}

impl BcjArch {
    /// Returns the architecture whose filter has the given method ID.
    pub fn from_method(id: &[u8]) -> Option<Self> {
        Some(match id {
            method::BCJ_X86 => Self::X86,
            method::BCJ_ARM => Self::Arm,
            method::BCJ_ARM64 => Self::Arm64,
            method::BCJ_ARM_THUMB => Self::ArmThumb,
            method::BCJ_PPC => Self::Ppc,
            method::BCJ_SPARC => Self::Sparc,
            method::BCJ_IA64 => Self::Ia64,
            method::BCJ_RISCV => Self::RiscV,
            _ => return None,
        })
    }

    /// Returns the 7z method ID of this filter.
    pub fn method_id(self) -> &'static [u8] {
        match self {
            Self::X86 => method::BCJ_X86,
            Self::Arm => method::BCJ_ARM,
            Self::Arm64 => method::BCJ_ARM64,
            Self::ArmThumb => method::BCJ_ARM_THUMB,
            Self::Ppc => method::BCJ_PPC,
            Self::Sparc => method::BCJ_SPARC,
            Self::Ia64 => method::BCJ_IA64,
            Self::RiscV => method::BCJ_RISCV,
        }
    }
}

/// BCJ filter decoder for one instruction set.
pub struct BcjDecoder<R> {
    inner: BcjReader<R>,
    arch: BcjArch,
}

impl<R> std::fmt::Debug for BcjDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcjDecoder")
            .field("arch", &self.arch)
            .finish_non_exhaustive()
    }
}

impl<R: Read> BcjDecoder<R> {
    /// Creates a BCJ decoder reading filtered data from `input`, with
    /// addresses counted from zero.
    pub fn new(input: R, arch: BcjArch) -> Self {
        let inner = match arch {
            BcjArch::X86 => BcjReader::new_x86(input, 0),
            BcjArch::Arm => BcjReader::new_arm(input, 0),
            BcjArch::Arm64 => BcjReader::new_arm64(input, 0),
            BcjArch::ArmThumb => BcjReader::new_arm_thumb(input, 0),
            BcjArch::Ppc => BcjReader::new_ppc(input, 0),
            BcjArch::Sparc => BcjReader::new_sparc(input, 0),
            BcjArch::Ia64 => BcjReader::new_ia64(input, 0),
            BcjArch::RiscV => BcjReader::new_riscv(input, 0),
        };
        Self { inner, arch }
    }

    /// Returns the instruction set this decoder filters.
    pub fn arch(&self) -> BcjArch {
        self.arch
    }
}

impl<R: Read> Read for BcjDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder for BcjDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        self.arch.method_id()
    }
}

/// Delta filter decoder.
pub struct DeltaDecoder<R> {
    inner: DeltaReader<R>,
}

impl<R> std::fmt::Debug for DeltaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> DeltaDecoder<R> {
    /// Creates a Delta decoder.
    ///
    /// The single property byte stores `distance - 1`; without it the
    /// distance is 1.
    pub fn new(input: R, properties: &[u8]) -> Self {
        let distance = properties.first().map_or(1, |b| *b as usize + 1);
        Self {
            inner: DeltaReader::new(input, distance),
        }
    }
}

impl<R: Read> Read for DeltaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder for DeltaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::DELTA
    }
}

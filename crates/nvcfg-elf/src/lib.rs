//! ELF parser for CUDA CUBIN images.
//!
//! CUBINs are little-endian ELF64 containers. This crate reads the pieces
//! the CFG reconstruction needs: the symbol table (names, offsets, sizes,
//! function classification) and the SM architecture generation NVIDIA's
//! toolchain encodes in `e_flags`.

mod constants;
mod file;

pub use constants::*;
pub use file::*;

use thiserror::Error;

/// ELF parsing errors.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ELF data too small")]
    TooSmall,
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("CUBIN images must be ELF64, got class {0}")]
    NotElf64(u8),
    #[error("Only little-endian ELF supported")]
    NotLittleEndian,
    #[error("Section header out of bounds")]
    SectionOutOfBounds,
    #[error("Symbol string table out of bounds")]
    StringTableOutOfBounds,
}

pub type Result<T> = std::result::Result<T, ElfError>;

//! CUBIN ELF file parser.

use std::path::Path;

use nvcfg_ir::{BinaryImage, Symbol, SymbolKind};

use crate::constants::*;
use crate::{ElfError, Result};

/// Read little-endian u16 from bytes.
#[inline]
fn read_le16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Read little-endian u32 from bytes.
#[inline]
fn read_le32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Read little-endian u64 from bytes.
#[inline]
fn read_le64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ])
}

/// The section-header fields the symbol walk needs.
#[derive(Clone, Debug)]
struct SectionHeader {
    sh_type: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

/// A parsed CUBIN image: raw bytes, SM architecture, symbol table.
#[derive(Clone, Debug)]
pub struct CubinFile {
    data: Vec<u8>,
    arch: u32,
    symbols: Vec<Symbol>,
}

impl CubinFile {
    /// Parse a CUBIN image from raw bytes.
    ///
    /// # Errors
    /// Fails on non-ELF input, a non-64-bit or big-endian image, or
    /// section/symbol tables extending past the end of the data.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < 64 {
            return Err(ElfError::TooSmall);
        }
        if read_le32(&data, 0) != ELF_MAGIC {
            return Err(ElfError::InvalidMagic);
        }
        if data[4] != ELF_CLASS_64 {
            return Err(ElfError::NotElf64(data[4]));
        }
        if data[5] != ELF_DATA_LSB {
            return Err(ElfError::NotLittleEndian);
        }

        let arch = read_le32(&data, 48) & EF_CUDA_SM_MASK;
        let sections = Self::parse_sections(&data)?;
        let symbols = Self::parse_symbols(&data, &sections)?;

        Ok(Self {
            data,
            arch,
            symbols,
        })
    }

    /// Read and parse a CUBIN image from a file.
    ///
    /// # Errors
    /// Propagates I/O errors and [`CubinFile::parse`] failures.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(data)
    }

    /// SM architecture generation from `e_flags` (e.g. 70 for sm_70).
    #[must_use]
    pub const fn arch(&self) -> u32 {
        self.arch
    }

    /// All symbol-table entries, in table order.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Function symbols only.
    pub fn function_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.is_function())
    }

    fn parse_sections(data: &[u8]) -> Result<Vec<SectionHeader>> {
        let shoff = read_le64(data, 40) as usize;
        let shentsize = read_le16(data, 58) as usize;
        let shnum = read_le16(data, 60) as usize;

        let mut sections = Vec::with_capacity(shnum);
        for i in 0..shnum {
            let offset = shoff + i * shentsize;
            if offset + 64 > data.len() {
                return Err(ElfError::SectionOutOfBounds);
            }
            sections.push(SectionHeader {
                sh_type: read_le32(data, offset + 4),
                offset: read_le64(data, offset + 24),
                size: read_le64(data, offset + 32),
                link: read_le32(data, offset + 40),
                entsize: read_le64(data, offset + 56),
            });
        }
        Ok(sections)
    }

    fn parse_symbols(data: &[u8], sections: &[SectionHeader]) -> Result<Vec<Symbol>> {
        // A GPU image with no symbol table is legal; it simply has nothing
        // to reconstruct.
        let Some(symtab) = sections.iter().find(|s| s.sh_type == SHT_SYMTAB) else {
            return Ok(Vec::new());
        };

        let strtab = sections
            .get(symtab.link as usize)
            .ok_or(ElfError::StringTableOutOfBounds)?;
        let strtab_offset = strtab.offset as usize;
        if strtab_offset + strtab.size as usize > data.len() {
            return Err(ElfError::StringTableOutOfBounds);
        }

        let entsize = symtab.entsize as usize;
        if entsize == 0 {
            return Ok(Vec::new());
        }
        let symtab_offset = symtab.offset as usize;
        let num_symbols = symtab.size as usize / entsize;

        let mut symbols = Vec::with_capacity(num_symbols);
        for i in 0..num_symbols {
            let offset = symtab_offset + i * entsize;
            if offset + 24 > data.len() {
                return Err(ElfError::SectionOutOfBounds);
            }
            let name_idx = read_le32(data, offset) as usize;
            let info = data[offset + 4];
            let value = read_le64(data, offset + 8);
            let size = read_le64(data, offset + 16);

            let kind = match info & 0xf {
                STT_FUNC => SymbolKind::Function,
                STT_OBJECT => SymbolKind::Object,
                _ => SymbolKind::Other,
            };

            symbols.push(Symbol {
                name: extract_string(data, strtab_offset, name_idx),
                index: i,
                offset: value,
                size,
                kind,
            });
        }
        Ok(symbols)
    }
}

impl BinaryImage for CubinFile {
    fn sm_arch(&self) -> u32 {
        self.arch
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Extract a NUL-terminated string from a string table.
fn extract_string(data: &[u8], strtab_offset: usize, string_offset: usize) -> String {
    let start = strtab_offset + string_offset;
    if start >= data.len() {
        return String::new();
    }
    data[start..]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

//! Symbol-table records consumed by the reconstruction.

/// Coarse symbol classification; only functions drive the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Object,
    Other,
}

/// One symbol-table entry, read-only to the reconstruction.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Mangled name.
    pub name: String,
    /// Symbol-table index, as the external disassembler counts functions.
    pub index: usize,
    /// Byte offset of the symbol in the image.
    pub offset: u64,
    /// Byte size of the symbol.
    pub size: u64,
    /// Classification.
    pub kind: SymbolKind,
}

impl Symbol {
    /// Whether this symbol names a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }
}

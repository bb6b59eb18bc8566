//! CFG reconstruction for CUDA CUBIN binaries.
//!
//! Drives `nvdisasm` once per function symbol, parses its dot-format graph
//! output, and repairs the result against the symbol table until every
//! function symbol is covered by a complete function/block/instruction/edge
//! model - including symbols the tool could not process at all.
//!
//! # Example
//!
//! ```ignore
//! use nvcfg::{reconstruct, CubinFile, ReconstructOptions};
//!
//! let cubin = CubinFile::open("kernel.cubin".as_ref())?;
//! let symbols: Vec<_> = cubin.symbols().to_vec();
//! let result = reconstruct(&cubin, &symbols, &ReconstructOptions::default())?;
//! for function in result.functions.functions() {
//!     println!("{} at {:#x}", function.name, function.address);
//! }
//! ```

// Re-export from sub-crates
pub use nvcfg_dot::{DotError, Graph, Node, parse_graph, read_graph};
pub use nvcfg_elf::{CubinFile, ElfError};
pub use nvcfg_ir::{
    BinaryImage, Block, BlockId, Function, FunctionTable, GpuArch, IdCounters, Inst, IrError,
    RawImage, Symbol, SymbolKind, Target, TargetKind, VOLTA_SM_ARCH,
};

mod disasm;
mod parser;
mod reconcile;

pub use disasm::*;
pub use parser::*;
pub use reconcile::*;

use thiserror::Error;

/// Reconstruction errors.
///
/// Per-symbol disassembly and parse failures never surface here; they
/// degrade the affected symbol to a synthesized function. These errors are
/// either internal plumbing (I/O on scratch files) or invariant violations
/// a correct pipeline never produces.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("graph error: {0}")]
    Dot(#[from] DotError),
    #[error("model error: {0}")]
    Ir(#[from] IrError),
    #[error("ELF error: {0}")]
    Elf(#[from] ElfError),
    #[error("disassembly of function {index} failed with status {code:?}")]
    Disassembly { index: usize, code: Option<i32> },
    #[error("graph node {node} appears outside any function")]
    OrphanBlock { node: String },
}

pub type Result<T> = std::result::Result<T, Error>;

//! Reconciliation engine: merges per-symbol parses against the symbol
//! table into one complete function collection.
//!
//! The external tool's output is partial and unreliable; downstream
//! consumers still need every byte of every function symbol covered. The
//! passes here run in a fixed order: relocation needs parsed blocks, gap
//! detection needs relocated addresses, id assignment needs final function
//! membership, and call resolution needs final addresses and membership.

use std::path::Path;

use tracing::{debug, info_span, warn};

use nvcfg_ir::{
    BinaryImage, Block, FunctionTable, GpuArch, IdCounters, Inst, Symbol, Target, TargetKind,
};

use crate::disasm::{DEFAULT_TOOL, Disassembler};
use crate::parser::{self, ParsedFunction};
use crate::Result;

/// Knobs for one reconstruction run.
#[derive(Clone, Debug)]
pub struct ReconstructOptions {
    /// Disassembler binary to invoke.
    pub tool: String,
    /// Architecture generation override; defaults to the image's own.
    pub arch: Option<u32>,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            arch: None,
        }
    }
}

impl ReconstructOptions {
    /// Set the disassembler binary.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Override the architecture generation.
    #[must_use]
    pub const fn with_arch(mut self, arch: u32) -> Self {
        self.arch = Some(arch);
        self
    }
}

/// The reconstructed model for one binary.
#[derive(Clone, Debug)]
pub struct Reconstruction {
    /// Function collection, ids assigned.
    pub functions: FunctionTable,
    /// `false` when the tool or the image dump was unavailable and the
    /// collection is the symbol-only fallback (functions without blocks).
    pub complete: bool,
}

/// Reconstruct the control-flow graph of one binary.
///
/// Per-symbol problems (tool failure, malformed graph output) degrade the
/// affected symbol to a synthesized placeholder function; only a missing
/// tool or an unwritable image dump degrade the whole binary, reported via
/// [`Reconstruction::complete`]. Scratch files live in a private temporary
/// directory named from the process id and are removed before returning.
///
/// # Errors
/// Only on internal invariant violations; expected tool failures never
/// surface here.
pub fn reconstruct(
    image: &dyn BinaryImage,
    symbols: &[Symbol],
    options: &ReconstructOptions,
) -> Result<Reconstruction> {
    let _span = info_span!("reconstruct", arch = image.sm_arch()).entered();

    let disasm = Disassembler::with_tool(options.tool.clone());
    let arch = GpuArch::from_sm_arch(options.arch.unwrap_or_else(|| image.sm_arch()));

    if !disasm.is_usable() {
        return Ok(fallback(symbols));
    }

    let scratch = match tempfile::tempdir() {
        Ok(scratch) => scratch,
        Err(error) => {
            warn!(%error, "unable to create a scratch directory for control-flow analysis");
            return Ok(fallback(symbols));
        }
    };
    let pid = std::process::id();
    let binary_path = scratch.path().join(pid.to_string());
    let graph_path = scratch.path().join(format!("{pid}.dot"));

    if let Err(error) = image.write_to(&binary_path) {
        warn!(%error, "unable to write the binary image for control-flow analysis");
        return Ok(fallback(symbols));
    }

    let mut table = FunctionTable::new();
    for symbol in symbols.iter().filter(|s| s.is_function()) {
        match parse_symbol(&disasm, &binary_path, &graph_path, symbol.index) {
            Ok(parsed) => {
                for function in parsed {
                    // A local function nested under several kernels shows up
                    // once per enclosing invocation; the first parse wins.
                    if table.insert(&function.name, function.blocks).is_none() {
                        debug!(function = %function.name, "dropped duplicate local function");
                    }
                }
            }
            Err(error) => {
                warn!(symbol = %symbol.name, %error, "unable to parse function");
            }
        }
    }

    relocate(&mut table, symbols);
    synthesize(&mut table, symbols, arch);
    let counters = table.assign_ids();
    compensate(&mut table, symbols, arch, counters)?;
    parser::parse_calls(&mut table)?;

    Ok(Reconstruction {
        functions: table,
        complete: true,
    })
}

/// Run the tool for one symbol and parse its graph output.
fn parse_symbol(
    disasm: &Disassembler,
    binary: &Path,
    graph: &Path,
    index: usize,
) -> Result<Vec<ParsedFunction>> {
    disasm.disassemble(binary, index, graph)?;
    let graph = nvcfg_dot::read_graph(graph)?;
    parser::parse(&graph)
}

/// Symbol-only collection for when no graph output is obtainable at all.
fn fallback(symbols: &[Symbol]) -> Reconstruction {
    let mut table = FunctionTable::new();
    for symbol in symbols.iter().filter(|s| s.is_function()) {
        if let Some(index) = table.insert(&symbol.name, Vec::new()) {
            table.function_mut(index).address = symbol.offset;
        }
    }
    table.assign_ids();
    Reconstruction {
        functions: table,
        complete: false,
    }
}

/// Shift every parsed function from the tool's invocation-local numbering
/// to the symbol table's virtual addresses.
fn relocate(table: &mut FunctionTable, symbols: &[Symbol]) {
    for symbol in symbols.iter().filter(|s| s.is_function()) {
        let Some(index) = table.index_of(&symbol.name) else {
            continue;
        };
        let Some(&first) = table.function(index).blocks.first() else {
            continue;
        };
        let begin = table.block(first).begin_offset;

        let block_ids = table.function(index).blocks.clone();
        for id in block_ids {
            let block = table.block_mut(id);
            for inst in &mut block.insts {
                inst.offset = inst.offset - begin + symbol.offset;
            }
            if let Some(first_offset) = block.first_offset() {
                block.address = first_offset;
            }
        }
        table.function_mut(index).address = symbol.offset;
    }
}

/// Create a single-block placeholder function for every function symbol the
/// tool produced nothing for, covering exactly the symbol's extent.
fn synthesize(table: &mut FunctionTable, symbols: &[Symbol], arch: GpuArch) {
    for symbol in symbols.iter().filter(|s| s.is_function()) {
        if table.contains_name(&symbol.name) {
            continue;
        }
        debug!(symbol = %symbol.name, size = symbol.size, "synthesizing placeholder function");

        let mut block = Block::new(format!("{}_0", symbol.name));
        block.begin_offset = arch.entry_offset;
        block.address = symbol.offset + arch.entry_offset;
        let mut offset = block.address;
        while offset < block.address + symbol.size {
            block.insts.push(Inst::placeholder(offset));
            offset += arch.inst_width;
        }

        if let Some(index) = table.insert(&symbol.name, vec![block]) {
            table.function_mut(index).address = symbol.offset;
        }
    }
}

/// Append a filler block wherever the reconstructed extent falls short of
/// the symbol's declared size (the tool omits trailing padding and code it
/// declines to graph). Runs after id assignment and draws block ids from
/// the running maximum; a second run over a complete function is a no-op.
fn compensate(
    table: &mut FunctionTable,
    symbols: &[Symbol],
    arch: GpuArch,
    counters: IdCounters,
) -> Result<()> {
    let mut next_block = counters.next_block;
    for symbol in symbols.iter().filter(|s| s.is_function() && s.size > 0) {
        let Some(index) = table.index_of(&symbol.name) else {
            continue;
        };
        let Some(&last_id) = table.function(index).blocks.last() else {
            continue;
        };
        let Some(last_offset) = table.block(last_id).last_offset() else {
            continue;
        };
        let address = table.function(index).address;
        let extent = last_offset + arch.inst_width - address;
        if extent >= symbol.size {
            continue;
        }
        debug!(
            symbol = %symbol.name,
            extent,
            size = symbol.size,
            "appending filler block"
        );

        let mut block = Block::new(format!(".L_{next_block}"));
        block.id = next_block;
        block.address = address + extent;
        block.begin_offset = arch.inst_width;
        let mut covered = extent;
        while covered < symbol.size {
            block.insts.push(Inst::placeholder(address + covered));
            covered += arch.inst_width;
        }

        let source_inst = table.block(last_id).len() - 1;
        let new_id = table.add_block(index, block)?;
        next_block += 1;
        table.add_target(
            last_id,
            Target {
                inst: source_inst,
                block: new_id,
                kind: TargetKind::Direct,
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvcfg_ir::SymbolKind;

    fn function_symbol(name: &str, index: usize, offset: u64, size: u64) -> Symbol {
        Symbol {
            name: name.to_string(),
            index,
            offset,
            size,
            kind: SymbolKind::Function,
        }
    }

    fn parsed_block(name: &str, offsets: &[u64]) -> Block {
        let mut block = Block::new(name.to_string());
        block.insts = offsets
            .iter()
            .map(|&o| Inst::new(o, None, "NOP".to_string(), Vec::new()))
            .collect();
        block.begin_offset = offsets.first().copied().unwrap_or(0);
        block.address = block.begin_offset;
        block
    }

    #[test]
    fn test_relocate_to_symbol_offset() {
        let mut table = FunctionTable::new();
        table.insert(
            "kernel",
            vec![parsed_block(".L_0", &[0, 8]), parsed_block(".L_1", &[16])],
        )
        .unwrap();
        let symbols = [function_symbol("kernel", 1, 0x1000, 24)];

        relocate(&mut table, &symbols);

        let function = table.function(0);
        assert_eq!(function.address, 0x1000);
        let offsets: Vec<u64> = table
            .blocks_of(function)
            .flat_map(|b| b.insts.iter().map(|i| i.offset))
            .collect();
        assert_eq!(offsets, vec![0x1000, 0x1008, 0x1010]);
        let addresses: Vec<u64> = table.blocks_of(function).map(|b| b.address).collect();
        assert_eq!(addresses, vec![0x1000, 0x1010]);
    }

    #[test]
    fn test_synthesize_volta_geometry() {
        let mut table = FunctionTable::new();
        let symbols = [function_symbol("lost", 3, 0x2000, 32)];

        synthesize(&mut table, &symbols, GpuArch::from_sm_arch(75));

        assert_eq!(table.num_functions(), 1);
        let function = table.function(0);
        assert_eq!(function.name, "lost");
        assert_eq!(function.address, 0x2000);
        assert_eq!(function.blocks.len(), 1);

        let block = table.block(function.blocks[0]);
        assert_eq!(block.name, "lost_0");
        assert_eq!(block.address, 0x2000);
        assert_eq!(block.insts.len(), 2);
        assert!(block.insts.iter().all(Inst::is_placeholder));
        assert_eq!(block.insts[1].offset, 0x2010);
    }

    #[test]
    fn test_synthesize_pre_volta_header() {
        let mut table = FunctionTable::new();
        let symbols = [function_symbol("lost", 3, 0x400, 16)];

        synthesize(&mut table, &symbols, GpuArch::from_sm_arch(61));

        let block = table.block(table.function(0).blocks[0]);
        assert_eq!(block.begin_offset, 8);
        assert_eq!(block.address, 0x408);
        assert_eq!(block.insts.len(), 2);
        assert_eq!(block.insts[0].offset, 0x408);
        assert_eq!(block.insts[1].offset, 0x410);
    }

    #[test]
    fn test_synthesize_skips_parsed_functions() {
        let mut table = FunctionTable::new();
        table.insert("seen", vec![parsed_block(".L_0", &[0])]).unwrap();
        let symbols = [function_symbol("seen", 1, 0x100, 16)];

        synthesize(&mut table, &symbols, GpuArch::from_sm_arch(75));
        assert_eq!(table.num_functions(), 1);
        assert_eq!(table.num_blocks(), 1);
    }

    #[test]
    fn test_compensate_appends_filler_once() {
        let arch = GpuArch::from_sm_arch(75);
        let mut table = FunctionTable::new();
        table.insert("short", vec![parsed_block(".L_0", &[0])]).unwrap();
        let symbols = [function_symbol("short", 1, 0x1000, 64)];
        relocate(&mut table, &symbols);
        let counters = table.assign_ids();

        compensate(&mut table, &symbols, arch, counters).unwrap();

        let function = table.function(0);
        assert_eq!(function.blocks.len(), 2);
        let filler = table.block(function.blocks[1]);
        assert_eq!(filler.id, counters.next_block);
        assert_eq!(filler.name, format!(".L_{}", counters.next_block));
        assert_eq!(filler.address, 0x1010);
        // 64-byte symbol, 16 bytes reconstructed: three filler slots.
        assert_eq!(filler.insts.len(), 3);
        assert_eq!(filler.insts[2].offset, 0x1030);

        // The previously-last block now falls through into the filler.
        let entry = table.block(function.blocks[0]);
        assert_eq!(entry.targets.len(), 1);
        assert_eq!(entry.targets[0].block, function.blocks[1]);
        assert_eq!(entry.targets[0].kind, TargetKind::Direct);

        // Re-running over the now-complete function appends nothing.
        compensate(&mut table, &symbols, arch, counters).unwrap();
        assert_eq!(table.function(0).blocks.len(), 2);
        assert_eq!(table.block(table.function(0).blocks[0]).targets.len(), 1);
    }

    #[test]
    fn test_compensate_leaves_complete_functions_alone() {
        let arch = GpuArch::from_sm_arch(75);
        let mut table = FunctionTable::new();
        table.insert("whole", vec![parsed_block(".L_0", &[0, 16])]).unwrap();
        let symbols = [function_symbol("whole", 1, 0x1000, 32)];
        relocate(&mut table, &symbols);
        let counters = table.assign_ids();

        compensate(&mut table, &symbols, arch, counters).unwrap();
        assert_eq!(table.function(0).blocks.len(), 1);
    }

    #[test]
    fn test_fallback_is_blockless_with_dense_ids() {
        let symbols = [
            function_symbol("a", 1, 0x100, 16),
            function_symbol("b", 2, 0x200, 16),
        ];
        let result = fallback(&symbols);

        assert!(!result.complete);
        assert_eq!(result.functions.num_functions(), 2);
        assert_eq!(result.functions.num_blocks(), 0);
        for (i, function) in result.functions.functions().iter().enumerate() {
            assert_eq!(function.id, i);
            assert!(function.blocks.is_empty());
        }
        assert_eq!(result.functions.function(0).address, 0x100);
    }

    #[test]
    fn test_reconstruct_missing_tool_degrades() {
        let image = nvcfg_ir::RawImage::new(75, vec![0u8; 16]);
        let symbols = [function_symbol("k", 1, 0x0, 16)];
        let options =
            ReconstructOptions::default().with_tool("/nonexistent/no-such-disassembler");

        let result = reconstruct(&image, &symbols, &options).unwrap();
        assert!(!result.complete);
        assert_eq!(result.functions.num_functions(), 1);
        assert!(result.functions.function(0).blocks.is_empty());
    }
}

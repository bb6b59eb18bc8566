//! Name-keyed function collection over a block arena.

use rustc_hash::FxHashMap;

use crate::block::{Block, BlockId, Target};
use crate::function::Function;
use crate::{IrError, Result};

/// Running id maxima after [`FunctionTable::assign_ids`].
///
/// Passes that append blocks afterwards draw ids from `next_block` so the
/// numbering stays dense without renumbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdCounters {
    pub next_function: usize,
    pub next_block: usize,
}

/// The accumulated function collection for one binary.
///
/// Blocks live in a single arena and functions refer to them by [`BlockId`],
/// so edges can reference blocks across functions and new blocks can be
/// appended without invalidating existing references. Functions are keyed by
/// name; the first insertion of a name wins and later ones are rejected,
/// which de-duplicates locally-scoped functions that appear inside several
/// disassembler invocations.
#[derive(Clone, Debug, Default)]
pub struct FunctionTable {
    blocks: Vec<Block>,
    functions: Vec<Function>,
    by_name: FxHashMap<String, usize>,
}

impl FunctionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of functions.
    #[must_use]
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    /// Number of blocks in the arena.
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the table holds no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All functions in insertion order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Function by index.
    #[must_use]
    pub fn function(&self, index: usize) -> &Function {
        &self.functions[index]
    }

    /// Mutable function by index.
    pub fn function_mut(&mut self, index: usize) -> &mut Function {
        &mut self.functions[index]
    }

    /// Index of a function by name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Whether a function with this name exists.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Block by arena id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Mutable block by arena id.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Iterate a function's blocks in order.
    pub fn blocks_of<'a>(&'a self, function: &'a Function) -> impl Iterator<Item = &'a Block> {
        function.blocks.iter().map(|id| &self.blocks[id.index()])
    }

    /// Entry block of a function, if it has any blocks.
    #[must_use]
    pub fn entry_of(&self, index: usize) -> Option<BlockId> {
        self.functions.get(index).and_then(Function::entry)
    }

    /// Insert a function and its blocks; first occurrence of a name wins.
    ///
    /// The blocks' targets must use function-local indices (0 = first block
    /// of this function); they are rebased onto the arena here. Returns the
    /// function index, or `None` if the name is already present (the blocks
    /// are dropped wholesale in that case).
    pub fn insert(&mut self, name: &str, mut blocks: Vec<Block>) -> Option<usize> {
        if self.by_name.contains_key(name) {
            return None;
        }

        let base = self.blocks.len();
        let mut ids = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter_mut().enumerate() {
            for target in &mut block.targets {
                target.block = BlockId(target.block.index() + base);
            }
            ids.push(BlockId(base + i));
        }
        self.blocks.extend(blocks);

        let index = self.functions.len();
        let mut function = Function::new(name.to_string());
        function.blocks = ids;
        self.functions.push(function);
        self.by_name.insert(name.to_string(), index);
        Some(index)
    }

    /// Append a block to an existing function, returning its arena id.
    ///
    /// # Errors
    /// Fails if `index` names no function.
    pub fn add_block(&mut self, index: usize, block: Block) -> Result<BlockId> {
        if index >= self.functions.len() {
            return Err(IrError::FunctionOutOfBounds(index));
        }
        let id = BlockId(self.blocks.len());
        self.blocks.push(block);
        self.functions[index].blocks.push(id);
        Ok(id)
    }

    /// Append an outgoing edge to a block, validating the destination.
    ///
    /// # Errors
    /// Fails if the destination lies outside the arena; a correct caller
    /// never triggers this.
    pub fn add_target(&mut self, from: BlockId, target: Target) -> Result<()> {
        if target.block.index() >= self.blocks.len() {
            return Err(IrError::DanglingTarget {
                destination: target.block.index(),
                arena_len: self.blocks.len(),
            });
        }
        self.blocks[from.index()].targets.push(target);
        Ok(())
    }

    /// Assign dense ids to every function and block, in collection order.
    ///
    /// Must run only once membership is final; returns the running maxima
    /// for passes that append blocks afterwards.
    pub fn assign_ids(&mut self) -> IdCounters {
        let mut next_function = 0;
        let mut next_block = 0;
        for fi in 0..self.functions.len() {
            self.functions[fi].id = next_function;
            next_function += 1;
            for &id in &self.functions[fi].blocks {
                self.blocks[id.index()].id = next_block;
                next_block += 1;
            }
        }
        IdCounters {
            next_function,
            next_block,
        }
    }
}

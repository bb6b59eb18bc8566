//! Function model.

use crate::block::BlockId;

/// One symbol's worth of code: an ordered sequence of blocks.
#[derive(Clone, Debug)]
pub struct Function {
    /// Dense id, assigned only once the function set is complete.
    pub id: usize,
    /// Mangled symbol name.
    pub name: String,
    /// Start address; the matching symbol's offset once relocated.
    pub address: u64,
    /// Blocks in address order, entry block first. Empty only on the
    /// symbol-only fallback path.
    pub blocks: Vec<BlockId>,
}

impl Function {
    /// Create a function with a provisional id and no blocks.
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            address: 0,
            blocks: Vec::new(),
        }
    }

    /// Entry block, if the function has any blocks.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

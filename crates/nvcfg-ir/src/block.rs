//! Basic block and outgoing edge model.

use crate::inst::Inst;

/// Index of a block in the [`FunctionTable`](crate::FunctionTable) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl BlockId {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// How control leaves a block along an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// Unconditional jump, conditional branch, or fallthrough within the
    /// same function.
    Direct,
    /// Computed transfer (return, indirect branch); the recorded destination
    /// is the tool's guess, not a decoded target.
    Indirect,
    /// Inter-function call to the destination function's entry block.
    Call,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Direct => "direct",
            Self::Indirect => "indirect",
            Self::Call => "call",
        };
        f.write_str(kind)
    }
}

/// A control transfer out of a block.
///
/// `inst` indexes the owning block's instruction vector; indices stay valid
/// across relocation, which only rewrites offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    /// Index of the source instruction in the owning block.
    pub inst: usize,
    /// Destination block in the arena.
    pub block: BlockId,
    /// Edge kind.
    pub kind: TargetKind,
}

/// A maximal straight-line instruction sequence.
#[derive(Clone, Debug)]
pub struct Block {
    /// Dense id, assigned only once the function set is complete.
    pub id: usize,
    /// Block label from the graph (e.g. `.L_x_3`), or a synthetic name.
    pub name: String,
    /// Start address; first instruction's offset once relocated.
    pub address: u64,
    /// Offset of the first instruction relative to the invocation output
    /// (parsed blocks) or into the owning symbol (synthetic blocks).
    pub begin_offset: u64,
    /// Instructions in address order.
    pub insts: Vec<Inst>,
    /// Outgoing edges in discovery order.
    pub targets: Vec<Target>,
}

impl Block {
    /// Create an empty block with a provisional id.
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            address: 0,
            begin_offset: 0,
            insts: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Offset of the first instruction, if any.
    #[must_use]
    pub fn first_offset(&self) -> Option<u64> {
        self.insts.first().map(|i| i.offset)
    }

    /// Offset of the last instruction, if any.
    #[must_use]
    pub fn last_offset(&self) -> Option<u64> {
        self.insts.last().map(|i| i.offset)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Whether the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_offsets() {
        let mut block = Block::new(".L_0".to_string());
        assert!(block.is_empty());
        assert_eq!(block.first_offset(), None);

        block.insts.push(Inst::placeholder(0x0));
        block.insts.push(Inst::placeholder(0x10));
        assert_eq!(block.len(), 2);
        assert_eq!(block.first_offset(), Some(0x0));
        assert_eq!(block.last_offset(), Some(0x10));
    }
}

//! Instruction model.

/// Call-family base mnemonics across SASS generations.
///
/// Pre-Volta code uses `CAL`/`JCAL`; Volta and later use `CALL` with
/// relative/absolute modifiers (`CALL.REL.NOINC`, ...).
const CALL_MNEMONICS: &[&str] = &["CAL", "JCAL", "CALL", "JCALL"];

/// One real or synthetic machine instruction.
///
/// Only the position and the control-transfer-relevant text survive parsing;
/// operand semantics are never interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inst {
    /// Instruction offset. Invocation-local after parsing, absolute once the
    /// owning function has been relocated.
    pub offset: u64,
    /// Guard predicate without the leading `@` (e.g. `!P0`), if any.
    pub predicate: Option<String>,
    /// Opcode mnemonic including dot modifiers (e.g. `IMAD.MOV.U32`).
    /// Empty for placeholder instructions.
    pub opcode: String,
    /// Operand tokens, comma-split and trimmed.
    pub operands: Vec<String>,
}

impl Inst {
    /// Create an instruction from its parsed parts.
    #[must_use]
    pub const fn new(
        offset: u64,
        predicate: Option<String>,
        opcode: String,
        operands: Vec<String>,
    ) -> Self {
        Self {
            offset,
            predicate,
            opcode,
            operands,
        }
    }

    /// Create a placeholder instruction carrying only an offset.
    ///
    /// Placeholders fill synthesized and compensation blocks so that every
    /// byte of a function symbol is covered by some block.
    #[must_use]
    pub const fn placeholder(offset: u64) -> Self {
        Self {
            offset,
            predicate: None,
            opcode: String::new(),
            operands: Vec::new(),
        }
    }

    /// Whether this instruction is synthetic filler.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.opcode.is_empty()
    }

    /// Base mnemonic without dot modifiers (`CALL.REL.NOINC` -> `CALL`).
    #[must_use]
    pub fn base_opcode(&self) -> &str {
        self.opcode.split('.').next().unwrap_or("")
    }

    /// Whether this instruction transfers control to another function.
    #[must_use]
    pub fn is_call(&self) -> bool {
        CALL_MNEMONICS.contains(&self.base_opcode())
    }
}

//! Reader for the external disassembler's dot-format CFG output.
//!
//! Parses one invocation's textual graph into a generic attributed graph:
//! nodes with opaque labels plus unlabeled directed edges. Interpreting the
//! label content is the CFG parser's job, not this crate's.

mod graph;
mod reader;

pub use graph::*;
pub use reader::*;

use thiserror::Error;

/// Graph-reading errors.
#[derive(Error, Debug)]
pub enum DotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: unparsable graph statement: {text}")]
    Syntax { line: usize, text: String },
    #[error("line {line}: edge references undeclared node {id}")]
    UnknownNode { line: usize, id: String },
}

pub type Result<T> = std::result::Result<T, DotError>;

//! External disassembler driver.

use std::cell::OnceCell;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Default disassembler binary, resolved through `PATH`.
pub const DEFAULT_TOOL: &str = "nvdisasm";

/// Driver for the external disassembler.
///
/// Invoked once per function symbol with the per-function CFG flags; stdout
/// is redirected into the graph file. Availability is probed lazily with a
/// bare invocation and cached for the driver's lifetime, so a missing tool
/// costs one failed spawn per reconstruction, not one per symbol.
#[derive(Debug)]
pub struct Disassembler {
    tool: String,
    usable: OnceCell<bool>,
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::with_tool(DEFAULT_TOOL)
    }
}

impl Disassembler {
    /// Create a driver for the default tool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver for a specific tool binary.
    #[must_use]
    pub fn with_tool(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            usable: OnceCell::new(),
        }
    }

    /// Tool binary this driver invokes.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Whether the tool runs at all. Probed once, then cached.
    pub fn is_usable(&self) -> bool {
        *self.usable.get_or_init(|| {
            let usable = Command::new(&self.tool)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|status| status.success());
            if !usable {
                warn!(
                    tool = %self.tool,
                    "disassembler is not available; recovering control flow from symbols only"
                );
            }
            usable
        })
    }

    /// Produce the CFG of one function symbol into `output`.
    ///
    /// Runs `<tool> -fun <index> -cfg -poff <binary>` with stdout redirected
    /// to the output file. A nonzero exit is an error for this symbol only;
    /// the caller synthesizes the function instead.
    ///
    /// # Errors
    /// Fails if the output file cannot be created, the tool cannot be
    /// spawned, or it exits with a nonzero status.
    pub fn disassemble(&self, binary: &Path, index: usize, output: &Path) -> Result<()> {
        let stdout = File::create(output)?;
        let status = Command::new(&self.tool)
            .arg("-fun")
            .arg(index.to_string())
            .arg("-cfg")
            .arg("-poff")
            .arg(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .status()?;

        if status.success() {
            debug!(index, "disassembled function");
            Ok(())
        } else {
            Err(Error::Disassembly {
                index,
                code: status.code(),
            })
        }
    }
}

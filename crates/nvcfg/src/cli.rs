//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::Parser;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure or degraded reconstruction.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "nvcfg")]
#[command(about = "Recover control-flow graphs from CUDA CUBIN images")]
#[command(version)]
pub struct Cli {
    /// Input CUBIN image
    #[arg(value_name = "CUBIN")]
    pub input: PathBuf,

    /// Disassembler binary to invoke
    #[arg(long, default_value = "nvdisasm")]
    pub tool: String,

    /// Override the SM architecture generation (e.g. 70)
    #[arg(long)]
    pub arch: Option<u32>,

    /// Enable verbose output (sets the log level to debug)
    #[arg(short, long)]
    pub verbose: bool,
}

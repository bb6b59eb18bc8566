//! nvcfg CLI - dump reconstructed control-flow graphs from CUBIN images.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, EXIT_FAILURE, EXIT_SUCCESS};
use nvcfg::{CubinFile, ReconstructOptions, Reconstruction, reconstruct};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "nvcfg=debug" } else { "nvcfg=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .with_target(false)
        .init();

    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let cubin = match CubinFile::open(&cli.input) {
        Ok(cubin) => cubin,
        Err(error) => {
            eprintln!("error: {}: {error}", cli.input.display());
            return EXIT_FAILURE;
        }
    };

    let mut options = ReconstructOptions::default().with_tool(cli.tool.clone());
    if let Some(arch) = cli.arch {
        options = options.with_arch(arch);
    }

    let symbols = cubin.symbols().to_vec();
    let result = match reconstruct(&cubin, &symbols, &options) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("error: {error}");
            return EXIT_FAILURE;
        }
    };

    dump(&result);
    if result.complete {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn dump(result: &Reconstruction) {
    let table = &result.functions;
    for function in table.functions() {
        println!(
            "function {:>3} {:#010x} {} ({} blocks)",
            function.id,
            function.address,
            function.name,
            function.blocks.len()
        );
        for block in table.blocks_of(function) {
            println!(
                "  block {:>4} {:#010x} {} [{} insts]",
                block.id,
                block.address,
                block.name,
                block.insts.len()
            );
            for target in &block.targets {
                let destination = table.block(target.block);
                println!(
                    "    -> block {} {} ({})",
                    destination.id, destination.name, target.kind
                );
            }
        }
    }
    if !result.complete {
        eprintln!("warning: reconstruction degraded to symbol-only functions");
    }
}

//! codemap-engine CLI entry point

use std::process::ExitCode;

use codemap_engine::cli::{Cli, Commands};
use codemap_engine::commands::{
    run_cache, run_projects, run_scan, run_status, run_watch, CommandContext,
};

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> codemap_engine::Result<String> {
    let cli = Cli::parse_args();
    let ctx = CommandContext::from_cli(cli.format, cli.verbose, cli.config.clone());

    match &cli.command {
        Commands::Scan(args) => run_scan(args, &ctx),
        Commands::Watch(args) => run_watch(args, &ctx),
        Commands::Status(args) => run_status(args, &ctx),
        Commands::Projects => run_projects(&ctx),
        Commands::Cache(args) => run_cache(args, &ctx),
    }
}

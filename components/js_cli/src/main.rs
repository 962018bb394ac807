//! sync-worker command line entry point
//!
//! Parses CLI arguments, sets up logging, and delegates to the Runtime.

use clap::Parser as ClapParser;
use js_cli::repl::{format_value, run_repl};
use js_cli::{Cli, CliResult, Runtime};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> CliResult<i32> {
    let mode = cli.run_mode()?;
    let runtime = if cli.host {
        Runtime::host_only()?
    } else {
        Runtime::new(cli.worker_options()?)?
    };
    let mut runtime = runtime.with_mode(mode);

    let result = if let Some(file) = &cli.file {
        runtime.execute_file(file).map(|_| ())
    } else if let Some(code) = &cli.eval {
        runtime.execute_string(code).map(|value| {
            if !value.is_undefined() {
                println!("{}", format_value(&value));
            }
        })
    } else if cli.repl {
        run_repl(&mut runtime)
    } else {
        println!("sync-worker {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage:");
        println!("  sync-worker --file <FILE>     Execute a JavaScript file in a worker");
        println!("  sync-worker --eval <CODE>     Evaluate inline JavaScript in a worker");
        println!("  sync-worker --repl            Start interactive REPL");
        println!();
        println!("Run 'sync-worker --help' for more options.");
        return Ok(0);
    };

    let code = match result {
        Ok(()) => runtime.exit_code().unwrap_or(0),
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };
    runtime.shutdown()?;
    Ok(code)
}

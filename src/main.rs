//! Entry point for the `climstats` binary.
//! Parses the command line, loads the requested datasets and prints or saves the JSON result.

use std::{fs, process};

use clap::Parser;
use climate_stats::cli::{execute, Cli};
use climate_stats::errors::Result;
use climate_stats::logging;
use climate_stats::parallel::get_parallel_info;
use tracing::info;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate()?;
    get_parallel_info(&config.parallel()).log();

    let output = execute(&cli.command, &config).await?;
    match cli.command.output() {
        Some(path) => {
            fs::write(path, output)?;
            info!(file = %path.display(), "Saved result");
        }
        None => println!("{output}"),
    }
    Ok(())
}

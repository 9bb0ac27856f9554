use clap::Parser;
use pooldl_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Log to the state file; fall back to stderr if it cannot be opened.
    if logging::init_logging(cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    if let Err(err) = cli.run().await {
        eprintln!("pooldl error: {:#}", err);
        std::process::exit(1);
    }
}

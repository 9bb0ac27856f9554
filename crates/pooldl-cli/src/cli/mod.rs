//! CLI for pooldl.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use pooldl_core::config;
use std::path::PathBuf;
use url::Url;

use commands::{run_config, run_fetch, FetchOptions};

/// Top-level CLI for pooldl.
#[derive(Debug, Parser)]
#[command(name = "pooldl")]
#[command(about = "pooldl: batch downloads over a fixed pool of reused connections", long_about = None)]
pub struct Cli {
    /// More log detail in the log file (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download URLs over at most N reused connections.
    Fetch {
        /// Direct HTTP/HTTPS URLs to download.
        urls: Vec<Url>,

        /// Read more URLs from a file (one per line; blank lines and `#` comments ignored).
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Connections to open; also the number of downloads in flight (default from config).
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Directory to save into (default from config, else current directory).
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Replace existing files instead of saving as "name (1).ext".
        #[arg(long)]
        overwrite: bool,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Fetch {
                urls,
                input,
                jobs,
                output_dir,
                overwrite,
            } => {
                let opts = FetchOptions {
                    urls,
                    input,
                    jobs,
                    output_dir,
                    overwrite,
                };
                run_fetch(&cfg, opts).await?;
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

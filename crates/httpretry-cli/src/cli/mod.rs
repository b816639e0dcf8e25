//! CLI for httpretry resumable downloads.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use httpretry_core::config;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_get, GetOptions};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "httpretry")]
#[command(about = "Resumable HTTP downloads that survive dropped connections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, resuming with Range requests after failures.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Write the body here instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Extra request header, e.g. -H 'Authorization: Bearer x'. Repeatable.
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,

        /// Use one timeout (seconds) for dial, keep-alive and inactivity instead of the config values.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Fail unless the body hashes to this SHA-256 (hex).
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                url,
                output,
                headers,
                timeout,
                sha256,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(
                    &cfg,
                    GetOptions {
                        url,
                        output,
                        headers,
                        timeout,
                        sha256,
                    },
                )?;
            }
            CliCommand::Checksum { path } => run_checksum(Path::new(&path))?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "beacon",
    about = "Randomness beacon: a signed, hash-chained ledger of random values",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file; flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record log path, or ":memory:"
    #[arg(long, global = true)]
    pub data: Option<String>,

    /// Signing key material file; required unless --data is ":memory:"
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API and generate records periodically
    Serve(ServeArgs),
    /// Append new records
    Append(AppendArgs),
    /// Show the latest record
    Latest,
    /// Show the record with the given id
    Get { id: u64 },
    /// Show the latest record at or before a time (unix ms or RFC 3339)
    Before { time: String },
    /// Show the earliest record at or after a time (unix ms or RFC 3339)
    After { time: String },
    /// Print the signing public key
    Key,
    /// Check every link hash, signature and timestamp in the ledger
    Verify,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Seconds between generated records; 0 disables generation
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct AppendArgs {
    /// Number of records to append
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,
}

//! This module implements the CLI interface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Cli {
    /// Enable verbose logging. Can be specified multiple times to
    /// increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Name of the built-in demo map to compile (currently only `demo` is
    /// implemented). Parsing a description file is out of scope; see
    /// `crate::builder`.
    #[arg(short, long, default_value = "demo")]
    pub map: String,

    /// Write the synthesized decoder statement count to this path instead
    /// of stdout, for scripting.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

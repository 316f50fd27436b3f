//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// artpack - Build, verify and load sealed package bundles
#[derive(Parser, Debug)]
#[command(name = "artpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit machine-readable JSON on stdout (and JSON logs on stderr)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/artpack/config.toml + ./artpack.toml)
    #[arg(long, global = true, env = "ARTPACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack a directory into a signed bundle
    Pack(commands::pack::PackArgs),

    /// Verify and extract a bundle
    Unpack(commands::unpack::UnpackArgs),

    /// Check a bundle's envelope and signature without extracting
    Verify(commands::verify::VerifyArgs),

    /// Run the content-risk scanner over a file or directory
    Scan(commands::scan::ScanArgs),

    /// Load a bundle's entry point
    Load(commands::load::LoadArgs),
}

//! artpack pack - Pack a directory into a signed bundle

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::bundler::package::{PackOptions, default_bundle_path, pack, write_bundle};
use crate::cli::output::{emit_json, print_flagged};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Source directory
    pub source: PathBuf,

    /// Output bundle path (default: <bundle dir>/<package name>.art)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Write the bundle even if the risk scan rejects content
    #[arg(long)]
    pub force_pack: bool,
}

pub fn run(ctx: &AppContext, args: &PackArgs) -> Result<()> {
    let options = PackOptions {
        force: args.force_pack,
        scanner: ctx.config.scanner.clone(),
    };
    let (bytes, mut report) = pack(&args.source, &ctx.signer(), &options)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_bundle_path(&ctx.bundle_dir(), &report.package_name));
    write_bundle(&output, &bytes)?;
    report.bundle_path = Some(output.clone());

    if ctx.json {
        return emit_json(&report);
    }
    if ctx.quiet {
        return Ok(());
    }

    println!(
        "{} Packed {} ({} files, {} bytes) -> {}",
        "✓".green().bold(),
        report.package_name.bold(),
        report.metadata.file_count,
        report.bundle_size,
        output.display()
    );
    println!("  Signed with key from {}", report.key_source);
    if !report.flagged.is_empty() {
        println!("  Flagged files:");
        print_flagged(&report.flagged);
    }
    Ok(())
}

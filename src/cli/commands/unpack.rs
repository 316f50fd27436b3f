//! artpack unpack - Verify and extract a bundle

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::bundler::package::unpack_file;
use crate::cli::output::{emit_json, print_flagged};
use crate::error::Result;
use crate::security::signing::Verification;

#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// Bundle file
    pub bundle: PathBuf,

    /// Destination directory (replaced if it exists)
    pub dest: PathBuf,

    /// Accept unsigned legacy bundles and write rejected scripts
    #[arg(long)]
    pub force_unpack: bool,

    /// Accept a bundle whose signature does not match
    #[arg(long)]
    pub allow_invalid_signature: bool,
}

pub fn run(ctx: &AppContext, args: &UnpackArgs) -> Result<()> {
    let options = ctx.unpack_options(args.force_unpack, args.allow_invalid_signature);
    let report = unpack_file(&args.bundle, &args.dest, &ctx.signer(), &options)?;

    if ctx.json {
        return emit_json(&report);
    }
    if ctx.quiet {
        return Ok(());
    }

    let status = match report.verification {
        Verification::Verified => "signature verified".green(),
        Verification::LegacyAccepted => "unsigned legacy bundle accepted".yellow(),
        Verification::MismatchAccepted => "signature MISMATCH accepted".red(),
    };
    println!(
        "{} Unpacked {} files to {} ({status})",
        "✓".green().bold(),
        report.metadata.file_count,
        report.destination.display()
    );
    if !report.flagged.is_empty() {
        println!("  Flagged files:");
        print_flagged(&report.flagged);
    }
    Ok(())
}

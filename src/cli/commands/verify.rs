//! artpack verify - Check a bundle without extracting it

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::bundler::package::{InspectionStatus, inspect, read_bundle};
use crate::cli::output::emit_json;
use crate::error::{ArtError, Result};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Bundle file
    pub bundle: PathBuf,

    /// List every entry
    #[arg(long)]
    pub list: bool,
}

pub fn run(ctx: &AppContext, args: &VerifyArgs) -> Result<()> {
    let bytes = read_bundle(&args.bundle)?;
    let inspection = inspect(&bytes, &ctx.signer())?;

    if ctx.json {
        emit_json(&inspection)?;
    } else if !ctx.quiet {
        let status = match inspection.status {
            InspectionStatus::SignedValid => "signed, valid".green().bold(),
            InspectionStatus::SignedInvalid => "signed, INVALID".red().bold(),
            InspectionStatus::Legacy => "unsigned legacy".yellow().bold(),
        };
        println!("{}: {status}", args.bundle.display());
        if let Some(version) = &inspection.version {
            println!("  Version:  {version}");
        }
        println!("  Package:  {}", inspection.metadata.package_name);
        println!("  Created:  {}", inspection.metadata.created);
        println!("  Files:    {}", inspection.metadata.file_count);
        println!("  Digest:   {}", inspection.digest);
        if args.list {
            for entry in &inspection.entries {
                println!("    {:>10}  {}", entry.size, entry.path);
            }
        }
    }

    match inspection.status {
        InspectionStatus::SignedValid => Ok(()),
        InspectionStatus::SignedInvalid => Err(ArtError::Integrity(
            "signature present but invalid".to_string(),
        )),
        InspectionStatus::Legacy => Err(ArtError::Integrity(
            "no signature present: bundle uses the legacy unsigned format".to_string(),
        )),
    }
}

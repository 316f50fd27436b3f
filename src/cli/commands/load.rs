//! artpack load - Load a bundle's entry point

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::emit_json;
use crate::error::Result;
use crate::loader::{ModuleExport, ModuleVariant};
use crate::security::signing::Verification;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Bundle name (resolved in the bundle dir) or path to a .art file
    pub name: String,

    /// Print the full export instead of a summary
    #[arg(long)]
    pub full: bool,

    /// Accept unsigned legacy bundles and write rejected scripts
    #[arg(long)]
    pub force_unpack: bool,

    /// Accept a bundle whose signature does not match
    #[arg(long)]
    pub allow_invalid_signature: bool,
}

#[derive(Debug, Serialize)]
struct LoadSummary<'a> {
    name: &'a str,
    bundle: String,
    entry: String,
    variant: ModuleVariant,
    verification: Verification,
    export_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<&'a ModuleExport>,
}

pub fn run(ctx: &AppContext, args: &LoadArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let options = ctx.unpack_options(args.force_unpack, args.allow_invalid_signature);
    let mut loader = ctx.loader(options);
    let handle = runtime.block_on(loader.load_module(&args.name))?;

    let summary = LoadSummary {
        name: &handle.name,
        bundle: handle.bundle_path.display().to_string(),
        entry: handle.entry.display().to_string(),
        variant: handle.variant,
        verification: handle.verification,
        export_kind: handle.export.kind(),
        export: args.full.then_some(&handle.export),
    };

    if ctx.json {
        emit_json(&summary)?;
    } else if !ctx.quiet {
        println!(
            "{} Loaded {} ({:?}, {})",
            "✓".green().bold(),
            summary.name.bold(),
            summary.variant,
            summary.export_kind
        );
        println!("  Bundle: {}", summary.bundle);
        if args.full {
            match &handle.export {
                ModuleExport::Json(value) => println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_default()
                ),
                ModuleExport::Text(text) => println!("{text}"),
                ModuleExport::Binary(bytes) => println!("<{} bytes>", bytes.len()),
            }
        }
    }

    loader.close()
}

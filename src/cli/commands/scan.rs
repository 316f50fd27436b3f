//! artpack scan - Run the content-risk scanner

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use walkdir::WalkDir;

use crate::app::AppContext;
use crate::cli::output::{classification_label, emit_json};
use crate::error::{ArtError, Result};
use crate::security::risk_scanner::{ScanResult, is_script_path, scan};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// File or directory to scan
    pub path: PathBuf,

    /// Package name used for trust and thresholds
    #[arg(long)]
    pub package: Option<String>,

    /// Scan every text file in a directory, not only scripts
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct ScannedFile {
    path: String,
    #[serde(flatten)]
    result: ScanResult,
}

pub fn run(ctx: &AppContext, args: &ScanArgs) -> Result<()> {
    let package = args.package.clone().unwrap_or_else(|| default_package(&args.path));
    let options = ctx.config.scanner.options(&package);

    let mut results = Vec::new();
    for file in collect_files(&args.path, args.all, &ctx.config.scanner.script_extensions)? {
        let bytes = std::fs::read(&file).map_err(|err| ArtError::fs(&file, err))?;
        let Ok(text) = String::from_utf8(bytes) else {
            continue;
        };
        results.push(ScannedFile {
            path: file.display().to_string(),
            result: scan(&text, &options),
        });
    }

    if ctx.json {
        emit_json(&results)?;
    } else if !ctx.quiet {
        for file in &results {
            println!(
                "{} [{}] score {}",
                file.path,
                classification_label(file.result.classification),
                file.result.risk_score
            );
            for finding in &file.result.findings {
                println!(
                    "    {} {}: {}",
                    finding.severity.to_string().dimmed(),
                    finding.pattern_id,
                    finding.description
                );
            }
        }
        println!("{} files scanned", results.len());
    }

    let rejected: Vec<String> = results
        .iter()
        .filter(|file| file.result.is_rejected())
        .map(|file| file.path.clone())
        .collect();
    if rejected.is_empty() {
        Ok(())
    } else {
        Err(ArtError::RiskRejected { paths: rejected })
    }
}

fn collect_files(path: &Path, all: bool, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(ArtError::fs(path, "no such file or directory"));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| ArtError::fs(path, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let keep = all
            || entry
                .path()
                .to_str()
                .is_some_and(|name| is_script_path(name, extensions));
        if keep {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Directory name, or the parent directory's name for a single file.
fn default_package(path: &Path) -> String {
    let dir = if path.is_file() { path.parent() } else { Some(path) };
    dir.and_then(|dir| dir.canonicalize().ok())
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

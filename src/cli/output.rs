use colored::Colorize;
use serde::Serialize;

use crate::bundler::package::FileScan;
use crate::error::{ArtError, Result};
use crate::security::risk_scanner::Classification;

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| ArtError::Config(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub fn classification_label(classification: Classification) -> String {
    match classification {
        Classification::Clean => "clean".green().to_string(),
        Classification::Warn => "warn".yellow().to_string(),
        Classification::Reject => "reject".red().bold().to_string(),
    }
}

/// Print flagged files, one block per file.
pub fn print_flagged(flagged: &[FileScan]) {
    for scan in flagged {
        let overridden = scan
            .overridden
            .map(|reason| format!(" (overridden: {reason:?})").dimmed().to_string())
            .unwrap_or_default();
        println!(
            "  {} {} [{}] score {}{}",
            "!".yellow(),
            scan.path,
            classification_label(scan.result.classification),
            scan.result.risk_score,
            overridden
        );
        for finding in &scan.result.findings {
            println!(
                "      {} {}: {}",
                finding.severity.to_string().dimmed(),
                finding.pattern_id,
                finding.description
            );
        }
    }
}

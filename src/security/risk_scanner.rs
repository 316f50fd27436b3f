//! Content-risk scanner.
//!
//! Assigns a numeric risk score to source text from a static table of
//! patterns in three tiers and classifies the result as clean, warn or
//! reject. This is triage, not a security boundary: it flags content for a
//! human to look at and never executes anything.
//!
//! Scoring:
//! - high tier: [`HIGH_RISK_WEIGHT`] per finding, trusted or not, and any
//!   high finding rejects outright
//! - medium tier: [`MEDIUM_RISK_WEIGHT`], or [`MEDIUM_RISK_TRUSTED_WEIGHT`]
//!   for trusted packages
//! - low tier: [`LOW_RISK_WEIGHT`], ignored entirely for trusted packages
//!
//! Text that looks like test code has its total divided by
//! [`TEST_CODE_DIVISOR`].

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const HIGH_RISK_WEIGHT: u32 = 25;
pub const MEDIUM_RISK_WEIGHT: u32 = 6;
pub const MEDIUM_RISK_TRUSTED_WEIGHT: u32 = 2;
pub const LOW_RISK_WEIGHT: u32 = 2;
pub const TEST_CODE_DIVISOR: u32 = 2;
pub const DEFAULT_REJECT_THRESHOLD: u32 = 10;
/// Scoped packages (`@scope/name`) tend to be larger and get more headroom.
pub const SCOPED_REJECT_THRESHOLD: u32 = 20;
pub const DEFAULT_WARN_THRESHOLD: u32 = 2;

/// Extensions scanned as a gate during unpack.
pub const DEFAULT_SCRIPT_EXTENSIONS: &[&str] =
    &["js", "mjs", "cjs", "jsx", "ts", "tsx", "sh", "bash", "ps1", "py"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Clean,
    Warn,
    Reject,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Warn => write!(f, "warn"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskFinding {
    pub pattern_id: &'static str,
    pub description: &'static str,
    pub severity: SeverityTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub risk_score: u32,
    /// In table order: high tier first.
    pub findings: Vec<RiskFinding>,
    pub classification: Classification,
    pub trusted: bool,
    pub test_code: bool,
}

impl ScanResult {
    pub fn has_high_risk(&self) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity == SeverityTier::High)
    }

    pub fn is_rejected(&self) -> bool {
        self.classification == Classification::Reject
    }
}

/// Per-call scanning context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions<'a> {
    pub package_name: &'a str,
    pub trusted_packages: &'a [String],
    /// Overrides the name-based default when set.
    pub reject_threshold: Option<u32>,
    pub warn_threshold: Option<u32>,
}

impl<'a> ScanOptions<'a> {
    pub const fn new(package_name: &'a str, trusted_packages: &'a [String]) -> Self {
        Self {
            package_name,
            trusted_packages,
            reject_threshold: None,
            warn_threshold: None,
        }
    }

    pub fn is_trusted(&self) -> bool {
        !self.package_name.is_empty()
            && self
                .trusted_packages
                .iter()
                .any(|name| name == self.package_name)
    }

    pub fn reject_threshold(&self) -> u32 {
        self.reject_threshold.unwrap_or(if self.package_name.starts_with('@') {
            SCOPED_REJECT_THRESHOLD
        } else {
            DEFAULT_REJECT_THRESHOLD
        })
    }

    pub fn warn_threshold(&self) -> u32 {
        self.warn_threshold.unwrap_or(DEFAULT_WARN_THRESHOLD)
    }
}

struct RiskPattern {
    id: &'static str,
    severity: SeverityTier,
    description: &'static str,
    regex: Regex,
}

fn pattern(
    id: &'static str,
    severity: SeverityTier,
    description: &'static str,
    regex: &str,
) -> RiskPattern {
    RiskPattern {
        id,
        severity,
        description,
        regex: Regex::new(regex).expect("invalid risk pattern regex"),
    }
}

static RISK_PATTERNS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    use SeverityTier::{High, Low, Medium};
    vec![
        pattern(
            "obfuscated-eval",
            High,
            "eval over decoded or character-built input",
            r"\beval\s*\(\s*(?:atob|unescape|decodeURIComponent|Buffer\.from|String\.fromCharCode)\s*\(",
        ),
        pattern(
            "decoded-function",
            High,
            "Function constructor over decoded input",
            r"\bnew\s+Function\s*\(\s*(?:atob|unescape|Buffer\.from|String\.fromCharCode)\s*\(",
        ),
        pattern(
            "remote-script-tag",
            High,
            "script tag loading code from a remote origin",
            r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']?(?:https?:)?//"#,
        ),
        pattern(
            "pipe-to-shell",
            High,
            "download piped straight into a shell",
            r"(?i)\b(?:curl|wget)\b[^\n|]*\|\s*(?:sudo\s+)?(?:ba|z)?sh\b",
        ),
        pattern(
            "exfiltration-call",
            High,
            "network call carrying browser credentials or storage",
            r"(?:\bfetch|\baxios\.(?:post|put|get)|\bhttps?\.request|\bsendBeacon)\s*\([^\n]{0,200}(?:document\.cookie|localStorage|sessionStorage)",
        ),
        pattern(
            "credential-interpolation",
            High,
            "secret environment value interpolated into a network call",
            r"(?:\bfetch|\baxios\.\w+|\bhttps?\.(?:get|request))\s*\([^\n]{0,200}(?:\$\{\s*|\+\s*)process\.env\.[A-Za-z0-9_]*(?i:token|secret|key|pass)",
        ),
        pattern(
            "eval-long-literal",
            Medium,
            "eval over a long literal string",
            r#"\beval\s*\(\s*["'`][^"'`\n]{40,}"#,
        ),
        pattern(
            "dynamic-function",
            Medium,
            "Function constructor",
            r"\bnew\s+Function\s*\(",
        ),
        pattern(
            "dom-injection",
            Medium,
            "raw HTML injected into the document",
            r"\.(?:innerHTML|outerHTML)\s*=|\bdocument\.write(?:ln)?\s*\(|\binsertAdjacentHTML\s*\(",
        ),
        pattern(
            "spawn-network-tool",
            Medium,
            "process spawn invoking curl or wget",
            r"\b(?:exec|execSync|spawn|spawnSync|execFile|execFileSync)\s*\([^\n]{0,120}\b(?:curl|wget)\b",
        ),
        pattern(
            "process-spawn",
            Low,
            "child process creation",
            r"\bchild_process\b|\b(?:execSync|spawnSync|execFileSync)\s*\(|\bsubprocess\.(?:run|Popen|call)\b",
        ),
        pattern(
            "file-append",
            Low,
            "appends to a file",
            r"\b(?:appendFile|appendFileSync|createWriteStream)\s*\(",
        ),
        pattern(
            "env-access",
            Low,
            "reads environment variables",
            r"\bprocess\.env\b|\bos\.environ\b|\bos\.getenv\s*\(",
        ),
        pattern(
            "crypto-primitive",
            Low,
            "low-level crypto primitive",
            r"\bcrypto\.(?:createCipheriv|createDecipheriv|privateDecrypt|publicEncrypt|randomBytes)\b|\bsubtle\.(?:encrypt|decrypt|importKey)\b",
        ),
    ]
});

static TEST_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:^|[^.\w$])(?:describe|it|test|expect|beforeEach|afterEach)\s*\(|\bjest\.|\bassert\.|#\[test\]",
    )
    .expect("invalid test marker regex")
});

/// Score and classify `text`.
pub fn scan(text: &str, options: &ScanOptions<'_>) -> ScanResult {
    let trusted = options.is_trusted();
    let mut findings = Vec::new();
    let mut score = 0u32;

    for row in RISK_PATTERNS.iter() {
        if !row.regex.is_match(text) {
            continue;
        }
        let weight = match (row.severity, trusted) {
            (SeverityTier::High, _) => HIGH_RISK_WEIGHT,
            (SeverityTier::Medium, false) => MEDIUM_RISK_WEIGHT,
            (SeverityTier::Medium, true) => MEDIUM_RISK_TRUSTED_WEIGHT,
            (SeverityTier::Low, false) => LOW_RISK_WEIGHT,
            (SeverityTier::Low, true) => continue,
        };
        score = score.saturating_add(weight);
        findings.push(RiskFinding {
            pattern_id: row.id,
            description: row.description,
            severity: row.severity,
        });
    }

    let test_code = looks_like_test_code(text);
    if test_code {
        score /= TEST_CODE_DIVISOR;
    }

    let high = findings
        .iter()
        .any(|finding| finding.severity == SeverityTier::High);
    let classification = if high || score >= options.reject_threshold() {
        Classification::Reject
    } else if score >= options.warn_threshold() {
        Classification::Warn
    } else {
        Classification::Clean
    };

    ScanResult {
        risk_score: score,
        findings,
        classification,
        trusted,
        test_code,
    }
}

pub fn looks_like_test_code(text: &str) -> bool {
    TEST_MARKERS.is_match(text)
}

/// Whether `path` has one of `extensions` (case-insensitive, no dot).
pub fn is_script_path(path: &str, extensions: &[String]) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
}

pub fn default_script_extensions() -> Vec<String> {
    DEFAULT_SCRIPT_EXTENSIONS
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

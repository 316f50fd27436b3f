//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Bundle format errors
//! - 2xx: Integrity errors
//! - 3xx: Content risk errors
//! - 4xx: File system errors
//! - 5xx: Module resolution errors
//! - 6xx: Config errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for `--json` output.
///
/// Each variant maps to a numeric code (e.g., `FormatInvalid` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// E101: Structured text, payload encoding or compression is corrupt
    FormatInvalid,
    /// E201: Signature missing or invalid
    IntegrityFailed,
    /// E301: Risk scan rejected the content
    RiskRejected,
    /// E401: Path collision, missing manifest or unwritable destination
    FileSystemError,
    /// E501: Entry point missing or could not be loaded
    ModuleResolutionFailed,
    /// E601: Config file has invalid syntax or values
    ConfigInvalid,
    /// E602: Required config value is missing
    ConfigMissingRequired,
    /// E901: IO operation failed
    IoError,
}

impl ErrorCode {
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::FormatInvalid => 101,
            Self::IntegrityFailed => 201,
            Self::RiskRejected => 301,
            Self::FileSystemError => 401,
            Self::ModuleResolutionFailed => 501,
            Self::ConfigInvalid => 601,
            Self::ConfigMissingRequired => 602,
            Self::IoError => 901,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::FormatInvalid => "The bundle is corrupt or was not produced by artpack. Re-pack it from source",
            Self::IntegrityFailed => "Check ARTPACK_SIGNING_KEY matches the key used to pack. Use --force-unpack for legacy bundles or --allow-invalid-signature to bypass",
            Self::RiskRejected => "Review the reported findings. Add the package to scanner.trusted_packages or pass --force-pack/--force-unpack",
            Self::FileSystemError => "Check the reported path exists and is writable",
            Self::ModuleResolutionFailed => "Check the manifest `main` field points at a file inside the bundle",
            Self::ConfigInvalid => "Check TOML syntax in artpack.toml and the ARTPACK_* environment variables",
            Self::ConfigMissingRequired => "Set the required value in artpack.toml or the environment",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::IntegrityFailed
            | Self::RiskRejected
            | Self::FileSystemError
            | Self::ModuleResolutionFailed
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::IoError => true,

            // Corrupt input has to be rebuilt at the source
            Self::FormatInvalid => false,
        }
    }

    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "format",
            2 => "integrity",
            3 => "risk",
            4 => "filesystem",
            5 => "module",
            6 => "config",
            9 => "internal",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

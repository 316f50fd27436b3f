//! Error handling for artpack.
//!
//! This module provides:
//! - [`ArtError`]: The main error enum for all bundle operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Serializable error with suggestion and context

mod codes;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for artpack operations.
#[derive(Error, Debug)]
pub enum ArtError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed structured text, corrupt payload or compression stream.
    #[error("Bundle format error: {0}")]
    Format(String),

    /// Missing or invalid signature.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Aggregate scan classification was `reject` and nothing overrode it.
    #[error("Content rejected by risk scan: {}", .paths.join(", "))]
    RiskRejected { paths: Vec<String> },

    #[error("File system error at {}: {reason}", .path.display())]
    FileSystem { path: PathBuf, reason: String },

    #[error("Module resolution failed: {0}")]
    ModuleResolution(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),
}

impl ArtError {
    /// Build a [`ArtError::FileSystem`] for `path`.
    pub fn fs(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::FileSystem {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Format(_) => ErrorCode::FormatInvalid,
            Self::Integrity(_) => ErrorCode::IntegrityFailed,
            Self::RiskRejected { .. } => ErrorCode::RiskRejected,
            Self::FileSystem { .. } => ErrorCode::FileSystemError,
            Self::ModuleResolution(_) => ErrorCode::ModuleResolutionFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::RiskRejected { paths } => Some(serde_json::json!({ "paths": paths })),
            Self::FileSystem { path, .. } => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_art_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "INTEGRITY_FAILED")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 201)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error can be overridden or fixed by the user
    pub recoverable: bool,

    /// Error category (e.g., "format", "integrity")
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_art_error(err: &ArtError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&ArtError> for StructuredError {
    fn from(err: &ArtError) -> Self {
        Self::from_art_error(err)
    }
}

/// Result type alias using ArtError.
pub type Result<T> = std::result::Result<T, ArtError>;

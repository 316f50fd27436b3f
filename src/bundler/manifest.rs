//! Package manifest (`package.json`) as read from an extracted tree.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtError, Result};

/// Manifest file name at the root of every bundle.
pub const MANIFEST_FILE: &str = "package.json";

/// Entry point used when the manifest has no `main`.
pub const DEFAULT_ENTRY_POINT: &str = "index.js";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    /// `"module"` marks an asynchronously loaded entry point.
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| ArtError::Format(format!("package manifest parse error: {err}")))
    }

    /// Read a manifest from disk. A missing file is a file system error
    /// naming the path.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ArtError::fs(path, "package manifest not found"));
        }
        let bytes = std::fs::read(path).map_err(|err| ArtError::fs(path, err))?;
        Self::from_slice(&bytes)
    }

    pub fn entry_point(&self) -> &str {
        self.main
            .as_deref()
            .map(str::trim)
            .filter(|main| !main.is_empty())
            .unwrap_or(DEFAULT_ENTRY_POINT)
    }

    pub fn declares_module_type(&self) -> bool {
        self.module_type.as_deref() == Some("module")
    }
}

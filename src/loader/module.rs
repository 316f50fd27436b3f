//! Loaded modules and the loading seam.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::bundler::archive::ArchiveMetadata;
use crate::bundler::manifest::PackageManifest;
use crate::error::{ArtError, Result};
use crate::loader::workspace::Workspace;
use crate::security::signing::Verification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleVariant {
    /// Loaded and cached in the same call.
    Sync,
    /// Must be completed with `LoaderContext::complete`.
    Async,
}

impl ModuleVariant {
    /// `.mjs` or `"type": "module"` selects the asynchronous variant;
    /// `.cjs` always loads synchronously.
    pub fn detect(manifest: &PackageManifest, entry: &Path) -> Self {
        match entry.extension().and_then(|ext| ext.to_str()) {
            Some("mjs") => Self::Async,
            Some("cjs") => Self::Sync,
            _ if manifest.declares_module_type() => Self::Async,
            _ => Self::Sync,
        }
    }
}

/// What an entry point evaluated to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ModuleExport {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl ModuleExport {
    /// Decode entry bytes: `.json` parses, UTF-8 is text, anything else raw.
    pub fn from_bytes(entry: &Path, bytes: Vec<u8>) -> Result<Self> {
        if entry.extension().is_some_and(|ext| ext == "json") {
            let value = serde_json::from_slice(&bytes).map_err(|err| {
                ArtError::ModuleResolution(format!("{}: invalid JSON: {err}", entry.display()))
            })?;
            return Ok(Self::Json(value));
        }
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Binary(err.into_bytes()),
        })
    }

    /// Replace an object export by its `default` member when that member
    /// is truthy.
    pub fn unwrap_default(self) -> Self {
        match self {
            Self::Json(Value::Object(mut object)) => match object.remove("default") {
                Some(inner) if is_truthy(&inner) => Self::Json(inner),
                Some(inner) => {
                    object.insert("default".to_string(), inner);
                    Self::Json(Value::Object(object))
                }
                None => Self::Json(Value::Object(object)),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedModule {
    pub name: String,
    pub bundle_path: PathBuf,
    pub entry: PathBuf,
    pub variant: ModuleVariant,
    pub export: ModuleExport,
    pub metadata: ArchiveMetadata,
    pub verification: Verification,
}

pub type ModuleHandle = Arc<LoadedModule>;

pub type ModuleFuture = Pin<Box<dyn Future<Output = Result<ModuleExport>> + Send>>;

/// Turns an extracted entry point into an export.
pub trait ModuleLoader {
    fn load_sync(&self, entry: &Path) -> Result<ModuleExport>;

    fn load_async(&self, entry: PathBuf) -> ModuleFuture;
}

/// Reads entry points from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModuleLoader;

impl ModuleLoader for FsModuleLoader {
    fn load_sync(&self, entry: &Path) -> Result<ModuleExport> {
        let bytes = std::fs::read(entry).map_err(|err| ArtError::fs(entry, err))?;
        ModuleExport::from_bytes(entry, bytes)
    }

    fn load_async(&self, entry: PathBuf) -> ModuleFuture {
        Box::pin(async move {
            let bytes = tokio::fs::read(&entry)
                .await
                .map_err(|err| ArtError::fs(&entry, err))?;
            ModuleExport::from_bytes(&entry, bytes)
        })
    }
}

/// An extracted asynchronous module waiting to be completed.
///
/// Dropping it without completing removes its workspace.
#[derive(Debug)]
pub struct PendingModule {
    pub(crate) name: String,
    pub(crate) bundle_path: PathBuf,
    pub(crate) entry: PathBuf,
    pub(crate) metadata: ArchiveMetadata,
    pub(crate) verification: Verification,
    pub(crate) workspace: Workspace,
}

impl PendingModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Ready(ModuleHandle),
    Pending(PendingModule),
}

impl LoadOutcome {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

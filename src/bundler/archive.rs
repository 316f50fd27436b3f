//! Archive codec: a file tree to and from its serialized text form.
//!
//! The serialized form is JSON with base64 payloads:
//! `{ "files": { "<path>": "<base64>" }, "metadata": { ... } }`.
//! Entries are kept in a `BTreeMap` so the same tree always serializes to
//! the same text.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ArtError, Result};

/// Maximum decompressed envelope size in bytes (512 MB).
const MAX_ENVELOPE_SIZE: u64 = 512 * 1024 * 1024;

/// Maximum number of entries in one archive.
const MAX_FILE_COUNT: usize = 250_000;

/// Metadata attached to every archive and returned on extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    /// RFC3339 creation timestamp.
    pub created: String,
    pub file_count: usize,
    /// Name of the directory the archive was packed from. Empty for legacy
    /// archives that predate the field.
    #[serde(default)]
    pub package_name: String,
}

/// Wire shape of a serialized tree.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireTree {
    files: BTreeMap<String, String>,
    metadata: ArchiveMetadata,
}

/// An in-memory file tree: normalized relative paths to raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTree {
    files: BTreeMap<String, Vec<u8>>,
    metadata: ArchiveMetadata,
}

impl ArchiveTree {
    /// Build a tree from `(path, bytes)` pairs. Paths are normalized and must
    /// stay inside the archive root.
    pub fn from_entries<I, P>(entries: I, package_name: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (P, Vec<u8>)>,
        P: AsRef<str>,
    {
        let mut files = BTreeMap::new();
        for (path, bytes) in entries {
            let key = normalize_entry_path(path.as_ref())?;
            if files.insert(key.clone(), bytes).is_some() {
                return Err(ArtError::Format(format!("duplicate archive entry: {key}")));
            }
        }
        Ok(Self::with_files(files, package_name.into()))
    }

    /// Walk `source` recursively and capture every regular file.
    ///
    /// Symlinks are neither followed nor archived.
    pub fn from_dir(source: &Path) -> Result<Self> {
        if !source.is_dir() {
            return Err(ArtError::fs(source, "source is not a directory"));
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(source).to_path_buf();
                ArtError::fs(path, err)
            })?;
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "skipping symlink");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(source)
                .map_err(|err| ArtError::fs(entry.path(), err))?;
            let key = relative_key(rel)?;
            let bytes = fs::read(entry.path()).map_err(|err| ArtError::fs(entry.path(), err))?;
            if files.insert(key.clone(), bytes).is_some() {
                return Err(ArtError::fs(entry.path(), format!("path collision on {key}")));
            }
        }

        if files.len() > MAX_FILE_COUNT {
            return Err(ArtError::Format(format!(
                "file count {} exceeds maximum {MAX_FILE_COUNT}",
                files.len()
            )));
        }

        let package_name = source_name(source)?;
        debug!(source = %source.display(), files = files.len(), "collected source tree");
        Ok(Self::with_files(files, package_name))
    }

    fn with_files(files: BTreeMap<String, Vec<u8>>, package_name: String) -> Self {
        let metadata = ArchiveMetadata {
            created: Utc::now().to_rfc3339(),
            file_count: files.len(),
            package_name,
        };
        Self { files, metadata }
    }

    /// Parse serialized tree text. Every payload is decoded before this
    /// returns, so a failure here never leaves partially written files.
    pub fn from_serialized(text: &str) -> Result<Self> {
        let wire: WireTree = serde_json::from_str(text)
            .map_err(|err| ArtError::Format(format!("archive tree parse error: {err}")))?;
        Self::from_wire(wire)
    }

    pub(crate) fn from_wire(wire: WireTree) -> Result<Self> {
        if wire.files.len() > MAX_FILE_COUNT {
            return Err(ArtError::Format(format!(
                "file count {} exceeds maximum {MAX_FILE_COUNT}",
                wire.files.len()
            )));
        }
        if wire.metadata.file_count != wire.files.len() {
            return Err(ArtError::Format(format!(
                "metadata declares {} files but archive holds {}",
                wire.metadata.file_count,
                wire.files.len()
            )));
        }

        let mut files = BTreeMap::new();
        for (path, encoded) in wire.files {
            let key = normalize_entry_path(&path)?;
            let bytes = BASE64.decode(encoded.as_bytes()).map_err(|err| {
                ArtError::Format(format!("invalid payload encoding for {key}: {err}"))
            })?;
            if files.insert(key.clone(), bytes).is_some() {
                return Err(ArtError::Format(format!("duplicate archive entry: {key}")));
            }
        }

        Ok(Self {
            files,
            metadata: wire.metadata,
        })
    }

    /// Serialize to the structured text that gets signed.
    pub fn to_serialized(&self) -> Result<String> {
        let wire = WireTree {
            files: self
                .files
                .iter()
                .map(|(path, bytes)| (path.clone(), BASE64.encode(bytes)))
                .collect(),
            metadata: self.metadata.clone(),
        };
        serde_json::to_string(&wire)
            .map_err(|err| ArtError::Format(format!("archive tree serialize error: {err}")))
    }

    /// Write every entry under `dest`.
    ///
    /// `dest` is deleted and recreated first: extraction never merges into
    /// existing content.
    pub fn materialize(&self, dest: &Path) -> Result<()> {
        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|err| ArtError::fs(dest, err))?;
        }
        fs::create_dir_all(dest).map_err(|err| ArtError::fs(dest, err))?;

        for (rel, bytes) in &self.files {
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                if !parent.is_dir() {
                    fs::create_dir_all(parent).map_err(|err| ArtError::fs(parent, err))?;
                }
            }
            fs::write(&target, bytes).map_err(|err| ArtError::fs(&target, err))?;
        }

        debug!(dest = %dest.display(), files = self.files.len(), "materialized archive");
        Ok(())
    }

    pub const fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    pub const fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Gzip a byte stream.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Gunzip a byte stream, refusing output larger than the envelope limit.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take(MAX_ENVELOPE_SIZE + 1)
        .read_to_end(&mut out)
        .map_err(|err| ArtError::Format(format!("bundle is not a valid gzip stream: {err}")))?;
    if out.len() as u64 > MAX_ENVELOPE_SIZE {
        return Err(ArtError::Format(format!(
            "envelope size exceeds maximum {MAX_ENVELOPE_SIZE}"
        )));
    }
    Ok(out)
}

/// Normalize an archive entry path to forward slashes, rejecting anything
/// that would land outside the archive root.
pub fn normalize_entry_path(raw: &str) -> Result<String> {
    if raw.contains('\0') {
        return Err(ArtError::Format("entry path contains a null byte".to_string()));
    }
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(ArtError::Format(format!("entry path must be relative: {raw}")));
    }

    let mut parts = Vec::new();
    for (index, part) in unified.split('/').enumerate() {
        match part {
            "" | "." => {}
            ".." => {
                return Err(ArtError::Format(format!(
                    "entry path escapes archive root: {raw}"
                )));
            }
            drive if index == 0 && drive.ends_with(':') => {
                return Err(ArtError::Format(format!("entry path has a drive prefix: {raw}")));
            }
            part => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(ArtError::Format(format!("entry path is empty: {raw:?}")));
    }
    Ok(parts.join("/"))
}

fn relative_key(rel: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    ArtError::Format(format!("entry path is not valid UTF-8: {}", rel.display()))
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArtError::Format(format!(
                    "entry path contains invalid component: {}",
                    rel.display()
                )));
            }
        }
    }
    normalize_entry_path(&parts.join("/"))
}

fn source_name(source: &Path) -> Result<String> {
    let canonical = source
        .canonicalize()
        .map_err(|err| ArtError::fs(source, err))?;
    Ok(canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

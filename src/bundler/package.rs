//! Pack and unpack pipelines.
//!
//! Pack: source directory, scan every text entry, seal, compress.
//! Unpack: decompress, parse envelope, verify, gate script entries, write.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::bundler::archive::{ArchiveMetadata, ArchiveTree};
use crate::bundler::envelope::Envelope;
use crate::bundler::manifest::{MANIFEST_FILE, PackageManifest};
use crate::config::ScannerConfig;
use crate::error::{ArtError, Result};
use crate::security::risk_scanner::{Classification, ScanResult, is_script_path, scan};
use crate::security::signing::{BundleSigner, Verification, VerifyPolicy};
use crate::security::trust::TrustTree;

/// File extension of bundle files.
pub const BUNDLE_EXTENSION: &str = "art";

#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Write the bundle even when the scan rejects content.
    pub force: bool,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    pub verify: VerifyPolicy,
    /// Write rejected script entries anyway.
    pub force: bool,
    pub scanner: ScannerConfig,
}

impl UnpackOptions {
    /// Map command-line flags: force-unpack accepts legacy bundles and
    /// overrides the scan gate; signature mismatch has its own switch.
    pub fn from_flags(
        force_unpack: bool,
        allow_invalid_signature: bool,
        scanner: ScannerConfig,
    ) -> Self {
        Self {
            verify: VerifyPolicy {
                allow_legacy: force_unpack,
                allow_invalid_signature,
            },
            force: force_unpack,
            scanner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideReason {
    Force,
    TrustedDependency,
}

/// Scan outcome for one entry at warn level or above.
#[derive(Debug, Clone, Serialize)]
pub struct FileScan {
    pub path: String,
    pub package: String,
    pub result: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridden: Option<OverrideReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackReport {
    pub package_name: String,
    pub metadata: ArchiveMetadata,
    pub bundle_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<PathBuf>,
    pub key_source: String,
    pub flagged: Vec<FileScan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnpackReport {
    pub destination: PathBuf,
    pub metadata: ArchiveMetadata,
    pub verification: Verification,
    pub flagged: Vec<FileScan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InspectionStatus {
    SignedValid,
    SignedInvalid,
    Legacy,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub path: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleInspection {
    pub status: InspectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `sha256:<hex>` of the bundle file bytes.
    pub digest: String,
    pub metadata: ArchiveMetadata,
    pub entries: Vec<EntrySummary>,
}

/// Pack `source` into bundle bytes.
pub fn pack(
    source: &Path,
    signer: &BundleSigner,
    options: &PackOptions,
) -> Result<(Vec<u8>, PackReport)> {
    let tree = ArchiveTree::from_dir(source)?;
    let trust = TrustTree::from_tree(&tree, &options.scanner.trusted_packages);
    let package_name = bundle_package_name(&tree);

    let mut flagged = scan_entries(&tree, &trust, &options.scanner, |_| true);
    let mut rejected = Vec::new();
    for scan in flagged.iter_mut().filter(|scan| scan.result.is_rejected()) {
        if options.force {
            scan.overridden = Some(OverrideReason::Force);
            warn!(
                path = %scan.path,
                score = scan.result.risk_score,
                "override: force-pack keeps rejected file"
            );
        } else {
            rejected.push(scan.path.clone());
        }
    }
    if !rejected.is_empty() {
        return Err(ArtError::RiskRejected { paths: rejected });
    }

    let envelope = signer.seal(&tree)?;
    let bytes = envelope.to_bundle()?;
    info!(
        package = %package_name,
        files = tree.len(),
        bytes = bytes.len(),
        key_source = %signer.key_source(),
        "packed bundle"
    );

    let report = PackReport {
        package_name,
        metadata: tree.metadata().clone(),
        bundle_size: bytes.len(),
        bundle_path: None,
        key_source: signer.key_source().to_string(),
        flagged,
    };
    Ok((bytes, report))
}

/// Pack `source` and write the bundle to `output`.
pub fn pack_to_file(
    source: &Path,
    output: &Path,
    signer: &BundleSigner,
    options: &PackOptions,
) -> Result<PackReport> {
    let (bytes, mut report) = pack(source, signer, options)?;
    write_bundle(output, &bytes)?;
    report.bundle_path = Some(output.to_path_buf());
    Ok(report)
}

/// Write bundle bytes, creating parent directories as needed.
pub fn write_bundle(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ArtError::fs(parent, err))?;
    }
    fs::write(output, bytes).map_err(|err| ArtError::fs(output, err))
}

/// `<bundle_dir>/<name>.art`, with `/` in scoped names replaced by `-`.
pub fn default_bundle_path(bundle_dir: &Path, package_name: &str) -> PathBuf {
    bundle_dir.join(format!(
        "{}.{BUNDLE_EXTENSION}",
        package_name.replace('/', "-")
    ))
}

/// Verify, gate and extract bundle bytes into `dest`.
///
/// Nothing is written unless every check passes.
pub fn unpack(
    bundle: &[u8],
    dest: &Path,
    signer: &BundleSigner,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    let envelope = Envelope::from_bundle(bundle)?;
    let opened = signer.open(envelope, options.verify)?;
    let tree = opened.tree;

    let trust = TrustTree::from_tree(&tree, &options.scanner.trusted_packages);
    let extensions = &options.scanner.script_extensions;
    let mut flagged = scan_entries(&tree, &trust, &options.scanner, |path| {
        is_script_path(path, extensions)
    });

    let mut rejected = Vec::new();
    for scan in flagged.iter_mut().filter(|scan| scan.result.is_rejected()) {
        let reason = if options.force {
            Some(OverrideReason::Force)
        } else if trust.is_exempt(&scan.path) {
            Some(OverrideReason::TrustedDependency)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!(
                    path = %scan.path,
                    package = %scan.package,
                    reason = ?reason,
                    "override: writing rejected file"
                );
                scan.overridden = Some(reason);
            }
            None => rejected.push(scan.path.clone()),
        }
    }
    if !rejected.is_empty() {
        return Err(ArtError::RiskRejected { paths: rejected });
    }

    tree.materialize(dest)?;
    info!(
        dest = %dest.display(),
        files = tree.len(),
        verification = ?opened.verification,
        "unpacked bundle"
    );

    Ok(UnpackReport {
        destination: dest.to_path_buf(),
        metadata: tree.metadata().clone(),
        verification: opened.verification,
        flagged,
    })
}

pub fn unpack_file(
    path: &Path,
    dest: &Path,
    signer: &BundleSigner,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    let bytes = read_bundle(path)?;
    unpack(&bytes, dest, signer, options)
}

/// Read a bundle file; a missing file names the path.
pub fn read_bundle(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(ArtError::fs(path, "bundle file not found"));
    }
    fs::read(path).map_err(|err| ArtError::fs(path, err))
}

/// Parse and check a bundle without writing anything.
pub fn inspect(bundle: &[u8], signer: &BundleSigner) -> Result<BundleInspection> {
    let digest = format!("sha256:{}", hex::encode(Sha256::digest(bundle)));
    let (status, version, tree) = match Envelope::from_bundle(bundle)? {
        Envelope::Legacy(payload) => (InspectionStatus::Legacy, None, payload.into_tree()),
        Envelope::Signed(signed) => {
            let status = if signer.verify(&signed.data, &signed.signature) {
                InspectionStatus::SignedValid
            } else {
                InspectionStatus::SignedInvalid
            };
            let tree = signed.tree()?;
            (status, Some(signed.version), tree)
        }
    };
    debug!(status = ?status, digest = %digest, "inspected bundle");

    let entries = tree
        .files()
        .iter()
        .map(|(path, bytes)| EntrySummary {
            path: path.clone(),
            size: bytes.len(),
        })
        .collect();
    Ok(BundleInspection {
        status,
        version,
        digest,
        metadata: tree.metadata().clone(),
        entries,
    })
}

/// Manifest name if the tree has one, else the source directory name.
fn bundle_package_name(tree: &ArchiveTree) -> String {
    tree.get(MANIFEST_FILE)
        .and_then(|bytes| PackageManifest::from_slice(bytes).ok())
        .map(|manifest| manifest.name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| tree.metadata().package_name.clone())
}

/// Scan every UTF-8 entry accepted by `filter`; returns warn-or-worse
/// results with each finding logged.
fn scan_entries(
    tree: &ArchiveTree,
    trust: &TrustTree,
    scanner: &ScannerConfig,
    filter: impl Fn(&str) -> bool,
) -> Vec<FileScan> {
    let mut flagged = Vec::new();
    for (path, bytes) in tree.files() {
        if !filter(path) {
            continue;
        }
        let Ok(text) = std::str::from_utf8(bytes) else {
            continue;
        };
        let package = trust.owning_package(path);
        let result = scan(text, &scanner.options(package));
        if result.classification == Classification::Clean {
            continue;
        }
        for finding in &result.findings {
            warn!(
                path = %path,
                package = %package,
                pattern = finding.pattern_id,
                severity = %finding.severity,
                "risk finding: {}",
                finding.description
            );
        }
        warn!(
            path = %path,
            score = result.risk_score,
            classification = %result.classification,
            trusted = result.trusted,
            test_code = result.test_code,
            "risk scan flagged file"
        );
        flagged.push(FileScan {
            path: path.clone(),
            package: package.to_string(),
            result,
            overridden: None,
        });
    }
    flagged
}

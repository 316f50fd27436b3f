//! Bundle signing and verification.
//!
//! Signatures are HMAC-SHA256 over the exact serialized tree text, hex
//! encoded. Verification recomputes the MAC and compares it in constant time
//! through `ring::hmac::verify`.
//!
//! Key resolution, first match wins:
//! 1. `ARTPACK_SIGNING_KEY` from the environment
//! 2. the project signing-key file (`key = "..."` in TOML)
//! 3. the built-in development key, with a warning on every use

use std::fmt;
use std::path::{Path, PathBuf};

use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bundler::archive::ArchiveTree;
use crate::bundler::envelope::{Envelope, FORMAT_VERSION, SignedEnvelope};
use crate::error::{ArtError, Result};

/// Environment variable holding the signing key.
pub const SIGNING_KEY_ENV: &str = "ARTPACK_SIGNING_KEY";

/// Keys shorter than this are treated as absent.
pub const MIN_KEY_LENGTH: usize = 32;

const DEVELOPMENT_KEY: &str = "artpack-development-signing-key::not-for-distribution";

/// Where a signing key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    KeyFile(PathBuf),
    DevelopmentFallback,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment ({SIGNING_KEY_ENV})"),
            Self::KeyFile(path) => write!(f, "key file ({})", path.display()),
            Self::DevelopmentFallback => write!(f, "development fallback"),
        }
    }
}

#[derive(Clone)]
pub struct SigningKey {
    secret: Vec<u8>,
    source: KeySource,
}

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>, source: KeySource) -> Self {
        Self {
            secret: secret.into(),
            source,
        }
    }

    pub const fn source(&self) -> &KeySource {
        &self.source
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self.source, KeySource::DevelopmentFallback)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("secret", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct KeyFile {
    key: String,
}

/// Resolve the signing key from the process environment and `key_file`.
pub fn resolve_signing_key(key_file: &Path) -> SigningKey {
    let env_value = std::env::var(SIGNING_KEY_ENV).ok();
    resolve_signing_key_from(env_value.as_deref(), key_file)
}

/// Resolve the signing key from an explicit environment value and `key_file`.
pub fn resolve_signing_key_from(env_value: Option<&str>, key_file: &Path) -> SigningKey {
    if let Some(value) = env_value.map(str::trim).filter(|value| !value.is_empty()) {
        if value.len() >= MIN_KEY_LENGTH {
            debug!(source = "environment", "resolved signing key");
            return SigningKey::new(value, KeySource::Environment);
        }
        warn!(
            variable = SIGNING_KEY_ENV,
            min_length = MIN_KEY_LENGTH,
            "signing key from environment is too short, ignoring it"
        );
    }

    if let Some(key) = read_key_file(key_file) {
        debug!(source = "key_file", path = %key_file.display(), "resolved signing key");
        return SigningKey::new(key, KeySource::KeyFile(key_file.to_path_buf()));
    }

    warn!(
        "no signing key configured: using the built-in DEVELOPMENT key. \
         Bundles signed with it are not trustworthy. Set {SIGNING_KEY_ENV} or create {}",
        key_file.display()
    );
    SigningKey::new(DEVELOPMENT_KEY, KeySource::DevelopmentFallback)
}

fn read_key_file(path: &Path) -> Option<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read signing key file, ignoring it");
            return None;
        }
    };
    let parsed: KeyFile = match toml::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot parse signing key file, ignoring it");
            return None;
        }
    };
    let key = parsed.key.trim();
    if key.len() < MIN_KEY_LENGTH {
        warn!(
            path = %path.display(),
            min_length = MIN_KEY_LENGTH,
            "signing key file holds a key that is too short, ignoring it"
        );
        return None;
    }
    Some(key.to_string())
}

/// Which overrides a caller grants when opening an envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Accept unsigned legacy bundles.
    pub allow_legacy: bool,
    /// Accept a signature that does not match.
    pub allow_invalid_signature: bool,
}

impl VerifyPolicy {
    pub const fn strict() -> Self {
        Self {
            allow_legacy: false,
            allow_invalid_signature: false,
        }
    }
}

/// How an opened envelope passed (or was let through) verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    Verified,
    LegacyAccepted,
    MismatchAccepted,
}

#[derive(Debug, Clone)]
pub struct OpenedEnvelope {
    pub tree: ArchiveTree,
    pub verification: Verification,
}

#[derive(Debug, Clone)]
pub struct BundleSigner {
    key: hmac::Key,
    source: KeySource,
}

impl BundleSigner {
    pub fn new(key: &SigningKey) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, &key.secret),
            source: key.source.clone(),
        }
    }

    pub const fn key_source(&self) -> &KeySource {
        &self.source
    }

    /// Hex-encoded HMAC-SHA256 of `data`.
    pub fn sign(&self, data: &str) -> String {
        hex::encode(hmac::sign(&self.key, data.as_bytes()).as_ref())
    }

    /// Constant-time check of `signature` against `data`.
    pub fn verify(&self, data: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        hmac::verify(&self.key, data.as_bytes(), &expected).is_ok()
    }

    /// Serialize and sign a tree.
    pub fn seal(&self, tree: &ArchiveTree) -> Result<SignedEnvelope> {
        let data = tree.to_serialized()?;
        let signature = self.sign(&data);
        Ok(SignedEnvelope {
            data,
            signature,
            version: FORMAT_VERSION.to_string(),
        })
    }

    /// Verify an envelope under `policy` and decode its tree.
    pub fn open(&self, envelope: Envelope, policy: VerifyPolicy) -> Result<OpenedEnvelope> {
        match envelope {
            Envelope::Legacy(payload) => {
                if !policy.allow_legacy {
                    return Err(ArtError::Integrity(
                        "no signature present: bundle uses the legacy unsigned format".to_string(),
                    ));
                }
                warn!(
                    package = %payload.tree().metadata().package_name,
                    "override: accepting unsigned legacy bundle"
                );
                Ok(OpenedEnvelope {
                    tree: payload.into_tree(),
                    verification: Verification::LegacyAccepted,
                })
            }
            Envelope::Signed(signed) => {
                let verification = if self.verify(&signed.data, &signed.signature) {
                    debug!(key_source = %self.source, "bundle signature verified");
                    Verification::Verified
                } else if policy.allow_invalid_signature {
                    warn!(
                        key_source = %self.source,
                        "override: accepting bundle whose signature is present but invalid"
                    );
                    Verification::MismatchAccepted
                } else {
                    return Err(ArtError::Integrity(format!(
                        "signature present but invalid (verified with key from {})",
                        self.source
                    )));
                };
                Ok(OpenedEnvelope {
                    tree: signed.tree()?,
                    verification,
                })
            }
        }
    }
}

//! Bundle envelopes.
//!
//! A signed bundle wraps the serialized tree as
//! `{ "data": <tree text>, "signature": <hex>, "version": "1.0" }`.
//! Legacy bundles carry `{ "files", "metadata" }` at the top level with no
//! wrapper. [`Envelope::parse`] is the only place that tells the two apart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundler::archive::{self, ArchiveTree, WireTree};
use crate::error::{ArtError, Result};

/// The only envelope scheme this crate writes or accepts.
pub const FORMAT_VERSION: &str = "1.0";

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// Exact serialized tree text that was signed.
    pub data: String,
    /// Lowercase hex HMAC-SHA256 of `data`.
    pub signature: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl SignedEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| ArtError::Format(format!("envelope serialize error: {err}")))
    }

    /// Serialize and compress into bundle file bytes.
    pub fn to_bundle(&self) -> Result<Vec<u8>> {
        archive::compress(&self.to_bytes()?)
    }

    /// Decode the tree carried in `data`.
    pub fn tree(&self) -> Result<ArchiveTree> {
        ArchiveTree::from_serialized(&self.data)
    }
}

/// An unsigned archive written before envelopes existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPayload {
    tree: ArchiveTree,
}

impl LegacyPayload {
    pub const fn new(tree: ArchiveTree) -> Self {
        Self { tree }
    }

    pub const fn tree(&self) -> &ArchiveTree {
        &self.tree
    }

    pub fn into_tree(self) -> ArchiveTree {
        self.tree
    }

    /// Serialize and compress in the legacy layout.
    pub fn to_bundle(&self) -> Result<Vec<u8>> {
        archive::compress(self.tree.to_serialized()?.as_bytes())
    }

    fn from_object(object: Map<String, Value>) -> Result<Self> {
        let wire: WireTree = serde_json::from_value(Value::Object(object))
            .map_err(|err| ArtError::Format(format!("legacy archive parse error: {err}")))?;
        Ok(Self::new(ArchiveTree::from_wire(wire)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Signed(SignedEnvelope),
    Legacy(LegacyPayload),
}

impl Envelope {
    /// Parse decompressed envelope bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| ArtError::Format(format!("envelope is not valid JSON: {err}")))?;
        let Value::Object(object) = value else {
            return Err(ArtError::Format("envelope must be a JSON object".to_string()));
        };

        match (object.contains_key("data"), object.contains_key("signature")) {
            (false, false) => Ok(Self::Legacy(LegacyPayload::from_object(object)?)),
            (true, true) => {
                let envelope: SignedEnvelope = serde_json::from_value(Value::Object(object))
                    .map_err(|err| ArtError::Format(format!("envelope parse error: {err}")))?;
                if envelope.version != FORMAT_VERSION {
                    return Err(ArtError::Format(format!(
                        "unsupported envelope version {} (expected {FORMAT_VERSION})",
                        envelope.version
                    )));
                }
                Ok(Self::Signed(envelope))
            }
            (true, false) => Err(ArtError::Format(
                "envelope has `data` but no `signature` field".to_string(),
            )),
            (false, true) => Err(ArtError::Format(
                "envelope has `signature` but no `data` field".to_string(),
            )),
        }
    }

    /// Decompress and parse bundle file bytes.
    pub fn from_bundle(bundle: &[u8]) -> Result<Self> {
        Self::parse(&archive::decompress(bundle)?)
    }

    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

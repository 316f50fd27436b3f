//! Integrity and content-risk checks.

pub mod risk_scanner;
pub mod signing;
pub mod trust;

pub use risk_scanner::{Classification, RiskFinding, ScanOptions, ScanResult, SeverityTier, scan};
pub use signing::{
    BundleSigner, KeySource, OpenedEnvelope, SigningKey, Verification, VerifyPolicy,
    resolve_signing_key,
};
pub use trust::TrustTree;

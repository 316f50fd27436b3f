//! Bundle codec and pack/unpack pipelines.

pub mod archive;
pub mod envelope;
pub mod manifest;
pub mod package;

pub use archive::{ArchiveMetadata, ArchiveTree};
pub use envelope::{Envelope, LegacyPayload, SignedEnvelope};
pub use manifest::PackageManifest;
pub use package::{
    BundleInspection, InspectionStatus, PackOptions, PackReport, UnpackOptions, UnpackReport,
    default_bundle_path, inspect, pack, pack_to_file, unpack, unpack_file,
};

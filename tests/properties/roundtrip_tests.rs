use std::collections::BTreeMap;

use proptest::prelude::*;

use artpack::bundler::archive::ArchiveTree;
use artpack::bundler::envelope::Envelope;
use artpack::security::signing::{BundleSigner, KeySource, SigningKey, Verification, VerifyPolicy};

fn arb_entries() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        r"[a-z]{1,8}(/[a-z0-9_]{1,8}){0,2}\.[a-z]{1,3}",
        prop::collection::vec(any::<u8>(), 0..256),
        1..8,
    )
}

fn signer() -> BundleSigner {
    BundleSigner::new(&SigningKey::new(
        "property-test-signing-key-0123456789abcdef",
        KeySource::Environment,
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn serialized_tree_roundtrips(entries in arb_entries()) {
        let tree = ArchiveTree::from_entries(entries, "prop").unwrap();
        let text = tree.to_serialized().unwrap();
        prop_assert_eq!(ArchiveTree::from_serialized(&text).unwrap(), tree);
    }

    #[test]
    fn sealed_bundle_opens_to_same_tree(entries in arb_entries()) {
        let signer = signer();
        let tree = ArchiveTree::from_entries(entries, "prop").unwrap();
        let bundle = signer.seal(&tree).unwrap().to_bundle().unwrap();

        let envelope = Envelope::from_bundle(&bundle).unwrap();
        let opened = signer.open(envelope, VerifyPolicy::strict()).unwrap();
        prop_assert_eq!(opened.verification, Verification::Verified);
        prop_assert_eq!(opened.tree, tree);
    }

    #[test]
    fn signature_is_deterministic(data in ".{0,200}") {
        let signer = signer();
        let signature = signer.sign(&data);
        prop_assert_eq!(signature.len(), 64);
        prop_assert_eq!(&signer.sign(&data), &signature);
        prop_assert!(signer.verify(&data, &signature));
    }
}

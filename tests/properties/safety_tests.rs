//! Property-based tests for safety - parsers and scanners never panic.

use proptest::prelude::*;

use artpack::bundler::archive::{decompress, normalize_entry_path};
use artpack::bundler::envelope::Envelope;
use artpack::security::risk_scanner::{ScanOptions, scan};

proptest! {
    #[test]
    fn normalize_never_panics(raw in ".{0,64}") {
        let _ = normalize_entry_path(&raw);
    }

    #[test]
    fn normalized_paths_stay_inside_root(raw in r"[a-z./\\]{0,32}") {
        if let Ok(path) = normalize_entry_path(&raw) {
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.split('/').any(|part| part == ".." || part.is_empty()));
        }
    }

    #[test]
    fn scan_never_panics(text in "(?s).{0,400}") {
        let _ = scan(&text, &ScanOptions::default());
    }

    #[test]
    fn trust_never_raises_the_score(text in "(?s).{0,400}") {
        let trusted = vec!["friendly".to_string()];
        let plain = scan(&text, &ScanOptions::new("stranger", &trusted));
        let relaxed = scan(&text, &ScanOptions::new("friendly", &trusted));
        prop_assert!(relaxed.risk_score <= plain.risk_score);
        prop_assert_eq!(relaxed.has_high_risk(), plain.has_high_risk());
    }

    #[test]
    fn garbage_bundles_fail_cleanly(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = decompress(&bytes);
        let _ = Envelope::from_bundle(&bytes);
        let _ = Envelope::parse(&bytes);
    }
}

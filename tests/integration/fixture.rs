use std::path::{Path, PathBuf};

use artpack::bundler::package::{PackOptions, default_bundle_path, pack_to_file};
use artpack::security::signing::{BundleSigner, KeySource, SigningKey};
use tempfile::TempDir;

/// Fixed key shared by every integration test.
pub const TEST_KEY: &str = "integration-test-signing-key-0123456789abcdef";

/// Assert that a file exists at the given path
#[macro_export]
macro_rules! assert_file_exists {
    ($path:expr) => {
        assert!(
            std::path::Path::new($path).exists(),
            "Expected file to exist: {:?}",
            $path
        );
    };
}

/// A scratch project: a source tree, a bundle directory and an output area.
pub struct TestFixture {
    pub dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create fixture dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.root().join("src").join(name)
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.root().join("art-packages")
    }

    /// Write files under `src/<name>/`.
    pub fn write_source(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let source = self.source_dir(name);
        for (rel, contents) in files {
            let path = source.join(rel);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
            std::fs::write(&path, contents).expect("write source file");
        }
        source
    }

    /// Pack `src/<name>/` into the bundle directory and return the bundle path.
    pub fn pack(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let source = self.write_source(name, files);
        let output = default_bundle_path(&self.bundle_dir(), name);
        pack_to_file(&source, &output, &signer(), &PackOptions::default()).expect("pack bundle");
        output
    }
}

pub fn signer() -> BundleSigner {
    signer_with(TEST_KEY)
}

pub fn signer_with(key: &str) -> BundleSigner {
    BundleSigner::new(&SigningKey::new(key, KeySource::Environment))
}

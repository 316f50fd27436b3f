//! Loader behavior across bundles on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use artpack::ArtError;
use artpack::bundler::archive::ArchiveTree;
use artpack::bundler::envelope::LegacyPayload;
use artpack::bundler::package::{UnpackOptions, default_bundle_path, write_bundle};
use artpack::loader::{
    LoadOutcome, LoaderContext, ModuleExport, ModuleFuture, ModuleLoader, ModuleVariant,
};
use artpack::security::signing::Verification;
use serde_json::json;

use crate::fixture::{TestFixture, signer};

fn context(fixture: &TestFixture) -> LoaderContext {
    LoaderContext::new(fixture.bundle_dir(), signer(), UnpackOptions::default())
}

#[tokio::test]
async fn second_load_is_a_cache_hit() {
    let fixture = TestFixture::new();
    fixture.pack(
        "config",
        &[
            ("package.json", br#"{"name":"config","main":"settings.json"}"#),
            ("settings.json", br#"{"default":{"retries":3}}"#),
        ],
    );
    let mut ctx = context(&fixture);

    let first = ctx.load_module("config").await.unwrap();
    let second = ctx.load_module("config").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.export, ModuleExport::Json(json!({ "retries": 3 })));
    assert_eq!(ctx.workspaces_created(), 1);
    assert_eq!(ctx.active_workspaces(), 1);
}

#[tokio::test]
async fn cache_ignores_later_changes_to_the_file() {
    let fixture = TestFixture::new();
    let files: &[(&str, &[u8])] = &[
        ("package.json", br#"{"name":"v"}"#),
        ("index.js", b"module.exports = 'one';"),
    ];
    let bundle = fixture.pack("v", files);
    let mut ctx = context(&fixture);
    let first = ctx.load_module("v").await.unwrap();

    std::fs::remove_file(&bundle).unwrap();
    let again = ctx.load_module("v").await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[tokio::test]
async fn explicit_path_and_bare_name_share_a_cache_entry() {
    let fixture = TestFixture::new();
    let bundle = fixture.pack(
        "shared",
        &[("package.json", br#"{"name":"shared"}"#), ("index.js", b"1")],
    );
    let mut ctx = context(&fixture);

    let by_name = ctx.load_module("shared").await.unwrap();
    let by_path = ctx.load_module(bundle.to_str().unwrap()).await.unwrap();
    assert!(Arc::ptr_eq(&by_name, &by_path));
}

#[test]
fn integrity_failure_leaves_cache_empty() {
    let fixture = TestFixture::new();
    fixture.pack(
        "demo",
        &[("package.json", br#"{"name":"demo"}"#), ("index.js", b"1")],
    );
    let other = crate::fixture::signer_with("another-key-entirely-0123456789abcdef0123");
    let mut ctx = LoaderContext::new(fixture.bundle_dir(), other, UnpackOptions::default());

    let err = ctx.load("demo").unwrap_err();
    assert!(matches!(err, ArtError::Integrity(_)));
    assert_eq!(ctx.cached_modules(), 0);
    assert_eq!(ctx.active_workspaces(), 0);
}

#[test]
fn legacy_bundle_loads_only_with_force_unpack() {
    let fixture = TestFixture::new();
    let tree = ArchiveTree::from_entries(
        [
            ("package.json", br#"{"name":"old"}"#.to_vec()),
            ("index.js", b"module.exports = 'old';".to_vec()),
        ],
        "old",
    )
    .unwrap();
    let bytes = LegacyPayload::new(tree).to_bundle().unwrap();
    write_bundle(&default_bundle_path(&fixture.bundle_dir(), "old"), &bytes).unwrap();

    let mut strict = context(&fixture);
    assert!(matches!(strict.load("old"), Err(ArtError::Integrity(_))));

    let forced = UnpackOptions::from_flags(true, false, Default::default());
    let mut ctx = context(&fixture).with_unpack_options(forced);
    let LoadOutcome::Ready(handle) = ctx.load("old").unwrap() else {
        panic!("expected synchronous module");
    };
    assert_eq!(handle.verification, Verification::LegacyAccepted);
}

#[test]
fn missing_entry_point_is_a_resolution_error() {
    let fixture = TestFixture::new();
    fixture.pack(
        "broken",
        &[("package.json", br#"{"name":"broken","main":"dist/main.js"}"#)],
    );
    let mut ctx = context(&fixture);
    let err = ctx.load("broken").unwrap_err();
    assert!(matches!(err, ArtError::ModuleResolution(_)));
    assert!(err.to_string().contains("dist/main.js"));
}

#[test]
fn workspaces_are_removed_when_context_drops() {
    let fixture = TestFixture::new();
    fixture.pack(
        "demo",
        &[("package.json", br#"{"name":"demo"}"#), ("index.js", b"1")],
    );
    let workspace_root = fixture.root().join("workspaces");
    let entry: PathBuf;
    {
        let mut ctx = context(&fixture).with_workspace_root(&workspace_root);
        let LoadOutcome::Ready(handle) = ctx.load("demo").unwrap() else {
            panic!("expected synchronous module");
        };
        entry = handle.entry.clone();
        assert!(entry.is_file());
        assert!(entry.starts_with(&workspace_root));
    }
    assert!(!entry.exists());
}

/// Loader whose asynchronous path always fails.
struct FlakyAsyncLoader {
    sync_calls: Arc<AtomicUsize>,
}

impl ModuleLoader for FlakyAsyncLoader {
    fn load_sync(&self, entry: &Path) -> artpack::Result<ModuleExport> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModuleExport::Text(
            std::fs::read_to_string(entry).map_err(ArtError::Io)?,
        ))
    }

    fn load_async(&self, _entry: PathBuf) -> ModuleFuture {
        Box::pin(async {
            Err::<ModuleExport, _>(ArtError::ModuleResolution("async loader offline".to_string()))
        })
    }
}

/// Loader where both paths fail.
struct BrokenLoader;

impl ModuleLoader for BrokenLoader {
    fn load_sync(&self, _entry: &Path) -> artpack::Result<ModuleExport> {
        Err(ArtError::ModuleResolution("sync loader offline".to_string()))
    }

    fn load_async(&self, _entry: PathBuf) -> ModuleFuture {
        Box::pin(async {
            Err::<ModuleExport, _>(ArtError::ModuleResolution("async loader offline".to_string()))
        })
    }
}

const ESM_FILES: &[(&str, &[u8])] = &[
    ("package.json", br#"{"name":"esm","type":"module"}"#),
    ("index.js", b"export default 'esm';"),
];

#[tokio::test]
async fn async_failure_falls_back_to_sync() {
    let fixture = TestFixture::new();
    fixture.pack("esm", ESM_FILES);
    let sync_calls = Arc::new(AtomicUsize::new(0));
    let loader = FlakyAsyncLoader {
        sync_calls: Arc::clone(&sync_calls),
    };
    let mut ctx =
        LoaderContext::with_loader(fixture.bundle_dir(), signer(), UnpackOptions::default(), loader);

    let LoadOutcome::Pending(pending) = ctx.load("esm").unwrap() else {
        panic!("expected asynchronous module");
    };
    assert_eq!(sync_calls.load(Ordering::SeqCst), 0);

    let handle = ctx.complete(pending).await.unwrap();
    assert_eq!(handle.variant, ModuleVariant::Async);
    assert_eq!(handle.export, ModuleExport::Text("export default 'esm';".to_string()));
    assert_eq!(sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_loaders_failing_reports_both_causes() {
    let fixture = TestFixture::new();
    fixture.pack("esm", ESM_FILES);
    let mut ctx = LoaderContext::with_loader(
        fixture.bundle_dir(),
        signer(),
        UnpackOptions::default(),
        BrokenLoader,
    );

    let err = ctx.load_module("esm").await.unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, ArtError::ModuleResolution(_)));
    assert!(message.contains("async loader offline"));
    assert!(message.contains("sync loader offline"));
    assert_eq!(ctx.cached_modules(), 0);
    assert_eq!(ctx.active_workspaces(), 0);
}

#[test]
fn dropped_pending_module_removes_its_workspace() {
    let fixture = TestFixture::new();
    fixture.pack("esm", ESM_FILES);
    let mut ctx = context(&fixture);

    let LoadOutcome::Pending(pending) = ctx.load("esm").unwrap() else {
        panic!("expected asynchronous module");
    };
    let entry = pending.entry().to_path_buf();
    assert!(entry.is_file());
    drop(pending);
    assert!(!entry.exists());
    assert_eq!(ctx.cached_modules(), 0);
}

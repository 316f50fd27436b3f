//! Dynamic loader.
//!
//! Resolves a bundle by name or path, extracts it into a private workspace
//! through the full unpack pipeline, reads its manifest and loads the entry
//! point. Loaded modules are cached by absolute bundle path for the life of
//! the [`LoaderContext`]; workspaces are kept until [`LoaderContext::close`]
//! or drop.

pub mod module;
pub mod workspace;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bundler::archive::normalize_entry_path;
use crate::bundler::manifest::{MANIFEST_FILE, PackageManifest};
use crate::bundler::package::{
    BUNDLE_EXTENSION, UnpackOptions, default_bundle_path, read_bundle, unpack,
};
use crate::config::{Config, DEFAULT_WORKSPACE_DIR};
use crate::error::{ArtError, Result};
use crate::security::signing::{BundleSigner, resolve_signing_key};

pub use module::{
    FsModuleLoader, LoadOutcome, LoadedModule, ModuleExport, ModuleFuture, ModuleHandle,
    ModuleLoader, ModuleVariant, PendingModule,
};
pub use workspace::Workspace;

/// Suffixes tried, in order, after the literal entry point.
const ENTRY_SUFFIXES: &[&str] = &[".js", ".mjs", ".cjs", ".json", "/index.js"];

pub struct LoaderContext<L = FsModuleLoader> {
    bundle_dir: PathBuf,
    workspace_root: PathBuf,
    signer: BundleSigner,
    options: UnpackOptions,
    loader: L,
    cache: HashMap<PathBuf, ModuleHandle>,
    workspaces: Vec<Workspace>,
    workspaces_created: usize,
}

impl LoaderContext<FsModuleLoader> {
    pub fn new(bundle_dir: impl Into<PathBuf>, signer: BundleSigner, options: UnpackOptions) -> Self {
        Self::with_loader(bundle_dir, signer, options, FsModuleLoader)
    }

    /// Context for `project_root` with the signing key resolved now.
    pub fn from_config(config: &Config, project_root: &Path) -> Self {
        let key = resolve_signing_key(&config.signing.key_path(project_root));
        let options = UnpackOptions {
            scanner: config.scanner.clone(),
            ..UnpackOptions::default()
        };
        Self::new(
            config.bundle.bundle_dir(project_root),
            BundleSigner::new(&key),
            options,
        )
        .with_workspace_root(config.bundle.workspace_dir(project_root))
    }
}

impl<L: ModuleLoader> LoaderContext<L> {
    pub fn with_loader(
        bundle_dir: impl Into<PathBuf>,
        signer: BundleSigner,
        options: UnpackOptions,
        loader: L,
    ) -> Self {
        let bundle_dir = bundle_dir.into();
        let workspace_root = bundle_dir.join(DEFAULT_WORKSPACE_DIR);
        Self {
            bundle_dir,
            workspace_root,
            signer,
            options,
            loader,
            cache: HashMap::new(),
            workspaces: Vec::new(),
            workspaces_created: 0,
        }
    }

    /// Replace the verification and gating overrides used for every load.
    #[must_use]
    pub fn with_unpack_options(mut self, options: UnpackOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Absolute bundle path for `name`. Bare names map into the bundle
    /// directory; explicit paths and `.art` files are taken as given.
    pub fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        let explicit = name.starts_with("./")
            || name.starts_with("../")
            || name.starts_with('/')
            || Path::new(name).is_absolute()
            || Path::new(name)
                .extension()
                .is_some_and(|ext| ext == BUNDLE_EXTENSION);
        let path = if explicit {
            PathBuf::from(name)
        } else {
            default_bundle_path(&self.bundle_dir, name)
        };
        std::path::absolute(&path).map_err(|err| ArtError::fs(&path, err))
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.resolve_path(name)
            .is_ok_and(|path| self.cache.contains_key(&path))
    }

    /// Load `name`. Synchronous modules come back `Ready`; asynchronous ones
    /// come back `Pending` and must be passed to [`Self::complete`].
    ///
    /// On failure the cache is untouched and the workspace is removed.
    pub fn load(&mut self, name: &str) -> Result<LoadOutcome> {
        let bundle_path = self.resolve_path(name)?;
        if let Some(handle) = self.cache.get(&bundle_path) {
            debug!(bundle = %bundle_path.display(), "module cache hit");
            return Ok(LoadOutcome::Ready(Arc::clone(handle)));
        }

        let bytes = read_bundle(&bundle_path)?;
        let stem = bundle_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        let workspace = Workspace::create(&self.workspace_root, &stem)?;
        self.workspaces_created += 1;

        let report = unpack(&bytes, workspace.path(), &self.signer, &self.options)?;
        let manifest = PackageManifest::read(&workspace.path().join(MANIFEST_FILE))?;
        let entry = resolve_entry(workspace.path(), manifest.entry_point())?;
        let variant = ModuleVariant::detect(&manifest, &entry);
        let module_name = if manifest.name.is_empty() {
            name.to_string()
        } else {
            manifest.name
        };
        debug!(
            module = %module_name,
            entry = %entry.display(),
            variant = ?variant,
            "resolved entry point"
        );

        match variant {
            ModuleVariant::Sync => {
                let export = self.loader.load_sync(&entry)?.unwrap_default();
                let handle = Arc::new(LoadedModule {
                    name: module_name,
                    bundle_path: bundle_path.clone(),
                    entry,
                    variant,
                    export,
                    metadata: report.metadata,
                    verification: report.verification,
                });
                Ok(LoadOutcome::Ready(self.register(bundle_path, handle, workspace)))
            }
            ModuleVariant::Async => Ok(LoadOutcome::Pending(PendingModule {
                name: module_name,
                bundle_path,
                entry,
                metadata: report.metadata,
                verification: report.verification,
                workspace,
            })),
        }
    }

    /// Finish an asynchronous load. Falls back to the synchronous loader if
    /// the asynchronous one fails.
    pub async fn complete(&mut self, pending: PendingModule) -> Result<ModuleHandle> {
        let PendingModule {
            name,
            bundle_path,
            entry,
            metadata,
            verification,
            workspace,
        } = pending;

        let export = match self.loader.load_async(entry.clone()).await {
            Ok(export) => export,
            Err(async_err) => {
                warn!(
                    entry = %entry.display(),
                    error = %async_err,
                    "asynchronous load failed, falling back to synchronous load"
                );
                self.loader.load_sync(&entry).map_err(|sync_err| {
                    ArtError::ModuleResolution(format!(
                        "{}: asynchronous load failed ({async_err}); synchronous fallback failed ({sync_err})",
                        entry.display()
                    ))
                })?
            }
        }
        .unwrap_default();

        if let Some(existing) = self.cache.get(&bundle_path) {
            return Ok(Arc::clone(existing));
        }
        let handle = Arc::new(LoadedModule {
            name,
            bundle_path: bundle_path.clone(),
            entry,
            variant: ModuleVariant::Async,
            export,
            metadata,
            verification,
        });
        Ok(self.register(bundle_path, handle, workspace))
    }

    /// Load `name` and complete it if it is asynchronous.
    pub async fn load_module(&mut self, name: &str) -> Result<ModuleHandle> {
        match self.load(name)? {
            LoadOutcome::Ready(handle) => Ok(handle),
            LoadOutcome::Pending(pending) => self.complete(pending).await,
        }
    }

    fn register(
        &mut self,
        bundle_path: PathBuf,
        handle: ModuleHandle,
        workspace: Workspace,
    ) -> ModuleHandle {
        info!(
            module = %handle.name,
            bundle = %bundle_path.display(),
            workspace = %workspace.path().display(),
            "loaded module"
        );
        self.cache.insert(bundle_path, Arc::clone(&handle));
        self.workspaces.push(workspace);
        handle
    }

    /// Number of workspaces ever created by this context, including failed
    /// loads.
    pub fn workspaces_created(&self) -> usize {
        self.workspaces_created
    }

    /// Workspaces still on disk awaiting cleanup.
    pub fn active_workspaces(&self) -> usize {
        self.workspaces.len()
    }

    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    /// Remove every workspace. Safe to call more than once; cached handles
    /// stay valid.
    pub fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        let mut removed = 0usize;
        for workspace in self.workspaces.drain(..) {
            match workspace.remove() {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(error = %err, "failed to remove workspace");
                    first_error.get_or_insert(err);
                }
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up workspaces");
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<L> Drop for LoaderContext<L> {
    fn drop(&mut self) {
        // TempDir removes each directory on drop; log what is being swept.
        if !self.workspaces.is_empty() {
            debug!(count = self.workspaces.len(), "sweeping workspaces on drop");
        }
        self.workspaces.clear();
    }
}

/// Find the entry file for `main` inside `workspace`.
fn resolve_entry(workspace: &Path, main: &str) -> Result<PathBuf> {
    let rel = normalize_entry_path(main).map_err(|_| {
        ArtError::ModuleResolution(format!("entry point `{main}` escapes the package root"))
    })?;

    std::iter::once(rel.clone())
        .chain(ENTRY_SUFFIXES.iter().map(|suffix| format!("{rel}{suffix}")))
        .map(|candidate| workspace.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            ArtError::ModuleResolution(format!(
                "entry point `{main}` not found in {}",
                workspace.display()
            ))
        })
}

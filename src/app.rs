//! Per-invocation application context.

use std::path::PathBuf;

use crate::bundler::package::UnpackOptions;
use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::loader::LoaderContext;
use crate::security::signing::{BundleSigner, resolve_signing_key};

pub struct AppContext {
    pub config: Config,
    pub project_root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        Ok(Self {
            config,
            project_root,
            json: cli.json,
            quiet: cli.quiet,
        })
    }

    /// Signer with the key resolved now, so key changes between commands
    /// are picked up.
    pub fn signer(&self) -> BundleSigner {
        let key = resolve_signing_key(&self.config.signing.key_path(&self.project_root));
        BundleSigner::new(&key)
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.config.bundle.bundle_dir(&self.project_root)
    }

    /// Unpack options from the override flags and the configured scanner.
    pub fn unpack_options(&self, force_unpack: bool, allow_invalid_signature: bool) -> UnpackOptions {
        UnpackOptions::from_flags(
            force_unpack,
            allow_invalid_signature,
            self.config.scanner.clone(),
        )
    }

    pub fn loader(&self, options: UnpackOptions) -> LoaderContext {
        LoaderContext::from_config(&self.config, &self.project_root).with_unpack_options(options)
    }
}

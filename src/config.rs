use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArtError, Result};
use crate::security::risk_scanner::{ScanOptions, default_script_extensions};

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "artpack.toml";

/// Default bundle directory, relative to the project root.
pub const DEFAULT_BUNDLE_DIR: &str = "art-packages";

/// Default signing-key file, relative to the project root.
pub const DEFAULT_KEY_FILE: &str = "artpack-key.toml";

/// Workspace directory name under the bundle directory.
pub const DEFAULT_WORKSPACE_DIR: &str = ".workspaces";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("ARTPACK_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(ArtError::MissingConfig(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let path = dirs::config_dir()
            .ok_or_else(|| ArtError::MissingConfig("config directory not found".to_string()))?
            .join("artpack/config.toml");
        Self::load_patch(&path)
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&project_root.join(PROJECT_CONFIG_FILE))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| ArtError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| ArtError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.bundle {
            self.bundle.merge(patch);
        }
        if let Some(patch) = patch.signing {
            self.signing.merge(patch);
        }
        if let Some(patch) = patch.scanner {
            self.scanner.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("ARTPACK_BUNDLE_DIR") {
            self.bundle.dir = PathBuf::from(value);
        }
        if let Some(value) = env_string("ARTPACK_WORKSPACE_DIR") {
            self.bundle.workspace_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("ARTPACK_SIGNING_KEY_FILE") {
            self.signing.key_file = PathBuf::from(value);
        }

        if let Some(values) = env_list("ARTPACK_TRUSTED_PACKAGES") {
            self.scanner.trusted_packages = merge_unique(values, &self.scanner.trusted_packages);
        }
        if let Some(value) = env_u32("ARTPACK_REJECT_THRESHOLD")? {
            self.scanner.reject_threshold = Some(value);
        }
        if let Some(value) = env_u32("ARTPACK_WARN_THRESHOLD")? {
            self.scanner.warn_threshold = Some(value);
        }
        if let Some(values) = env_list("ARTPACK_SCRIPT_EXTENSIONS") {
            self.scanner.script_extensions = values;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if let (Some(warn), Some(reject)) =
            (self.scanner.warn_threshold, self.scanner.reject_threshold)
        {
            if warn > reject {
                return Err(ArtError::Config(format!(
                    "scanner.warn_threshold ({warn}) is above scanner.reject_threshold ({reject})"
                )));
            }
        }
        if self.scanner.script_extensions.is_empty() {
            return Err(ArtError::Config(
                "scanner.script_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Where bundles are written and where bare names resolve.
    #[serde(default = "default_bundle_dir")]
    pub dir: PathBuf,
    /// Extraction workspaces. Defaults to `<dir>/.workspaces`.
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BUNDLE_DIR)
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            dir: default_bundle_dir(),
            workspace_dir: None,
        }
    }
}

impl BundleConfig {
    fn merge(&mut self, patch: BundlePatch) {
        if let Some(value) = patch.dir {
            self.dir = value;
        }
        if let Some(value) = patch.workspace_dir {
            self.workspace_dir = Some(value);
        }
    }

    pub fn bundle_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.dir)
    }

    pub fn workspace_dir(&self, project_root: &Path) -> PathBuf {
        match &self.workspace_dir {
            Some(dir) => project_root.join(dir),
            None => self.bundle_dir(project_root).join(DEFAULT_WORKSPACE_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
}

fn default_key_file() -> PathBuf {
    PathBuf::from(DEFAULT_KEY_FILE)
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

impl SigningConfig {
    fn merge(&mut self, patch: SigningPatch) {
        if let Some(value) = patch.key_file {
            self.key_file = value;
        }
    }

    pub fn key_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.key_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub trusted_packages: Vec<String>,
    #[serde(default)]
    pub reject_threshold: Option<u32>,
    #[serde(default)]
    pub warn_threshold: Option<u32>,
    /// Extensions gated at unpack time.
    #[serde(default = "default_script_extensions")]
    pub script_extensions: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trusted_packages: Vec::new(),
            reject_threshold: None,
            warn_threshold: None,
            script_extensions: default_script_extensions(),
        }
    }
}

impl ScannerConfig {
    fn merge(&mut self, patch: ScannerPatch) {
        if let Some(values) = patch.trusted_packages {
            self.trusted_packages = merge_unique(values, &self.trusted_packages);
        }
        if let Some(value) = patch.reject_threshold {
            self.reject_threshold = Some(value);
        }
        if let Some(value) = patch.warn_threshold {
            self.warn_threshold = Some(value);
        }
        if let Some(values) = patch.script_extensions {
            self.script_extensions = values;
        }
    }

    /// Scan options for files owned by `package_name`.
    pub fn options<'a>(&'a self, package_name: &'a str) -> ScanOptions<'a> {
        ScanOptions {
            package_name,
            trusted_packages: &self.trusted_packages,
            reject_threshold: self.reject_threshold,
            warn_threshold: self.warn_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub bundle: Option<BundlePatch>,
    pub signing: Option<SigningPatch>,
    pub scanner: Option<ScannerPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BundlePatch {
    pub dir: Option<PathBuf>,
    pub workspace_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SigningPatch {
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScannerPatch {
    pub trusted_packages: Option<Vec<String>>,
    pub reject_threshold: Option<u32>,
    pub warn_threshold: Option<u32>,
    pub script_extensions: Option<Vec<String>>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<u32>().map(Some).map_err(|err| {
            ArtError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}

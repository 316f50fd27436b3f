//! Trusted dependency tree.
//!
//! Works out which parts of an archive are exempt from the unpack-time scan
//! gate, and which package owns a given file for trust weighting.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::bundler::archive::ArchiveTree;
use crate::bundler::manifest::{MANIFEST_FILE, PackageManifest};

const NODE_MODULES: &str = "node_modules";

#[derive(Debug, Clone, Default)]
pub struct TrustTree {
    root_name: String,
    all_exempt: bool,
    /// Directory prefixes (no trailing slash) exempt from gating.
    exempt_dirs: BTreeSet<String>,
    /// Package directory to the name its manifest declares.
    declared_names: BTreeMap<String, String>,
}

impl TrustTree {
    pub fn from_tree(tree: &ArchiveTree, trusted: &[String]) -> Self {
        let root_name = tree
            .get(MANIFEST_FILE)
            .and_then(|bytes| PackageManifest::from_slice(bytes).ok())
            .map(|manifest| manifest.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| tree.metadata().package_name.clone());

        let is_trusted = |name: &str| trusted.iter().any(|entry| entry == name);
        let packages = nested_packages(tree);
        let declared_names = packages
            .iter()
            .filter(|(_, manifest)| !manifest.name.is_empty())
            .map(|(dir, manifest)| (dir.clone(), manifest.name.clone()))
            .collect();

        if is_trusted(&root_name) {
            debug!(package = %root_name, "root package trusted, whole tree exempt");
            return Self {
                root_name,
                all_exempt: true,
                exempt_dirs: BTreeSet::new(),
                declared_names,
            };
        }

        let mut exempt_dirs = BTreeSet::new();
        let mut pending: Vec<&str> = packages
            .iter()
            .filter(|(_, manifest)| is_trusted(&manifest.name))
            .map(|(dir, _)| dir.as_str())
            .collect();

        while let Some(dir) = pending.pop() {
            if !exempt_dirs.insert(dir.to_string()) {
                continue;
            }
            let Some(manifest) = packages.get(dir) else {
                continue;
            };
            for dep in manifest.dependencies.keys() {
                let nested = format!("{dir}/{NODE_MODULES}/{dep}");
                let hoisted = format!("{NODE_MODULES}/{dep}");
                if let Some((found, _)) = packages
                    .get_key_value(nested.as_str())
                    .or_else(|| packages.get_key_value(hoisted.as_str()))
                {
                    pending.push(found.as_str());
                }
            }
        }

        if !exempt_dirs.is_empty() {
            debug!(dirs = ?exempt_dirs, "trusted dependency directories");
        }
        Self {
            root_name,
            all_exempt: false,
            exempt_dirs,
            declared_names,
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.all_exempt
            || self.exempt_dirs.iter().any(|dir| {
                path.strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    /// The package a file belongs to: the name declared by the manifest of
    /// the deepest `node_modules` package directory, that directory's name
    /// when it has no manifest, or the root package.
    pub fn owning_package<'a>(&'a self, path: &'a str) -> &'a str {
        match package_dir(path) {
            Some(dir) => self
                .declared_names
                .get(dir)
                .map_or_else(|| dir_package_name(dir), String::as_str),
            None => &self.root_name,
        }
    }
}

/// Directory name of the deepest `node_modules` package containing `path`,
/// if any.
pub fn owning_package(path: &str) -> Option<&str> {
    package_dir(path).map(dir_package_name)
}

/// Path of the deepest `node_modules/<name>` (or `node_modules/@scope/<name>`)
/// directory containing `path`.
fn package_dir(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut end_byte = None;
    let mut index = 0;
    // The last segment is the file itself and never names a package.
    while index + 1 < segments.len() {
        if segments[index] != NODE_MODULES {
            index += 1;
            continue;
        }
        let start = index + 1;
        let end = if segments[start].starts_with('@') { start + 2 } else { start + 1 };
        if end >= segments.len() {
            break;
        }
        let len: usize = segments[..end].iter().map(|s| s.len() + 1).sum::<usize>() - 1;
        end_byte = Some(len);
        index = end;
    }
    end_byte.map(|len| &path[..len])
}

/// `kit` for `.../node_modules/kit`, `@acme/ui` for `.../node_modules/@acme/ui`.
fn dir_package_name(dir: &str) -> &str {
    let marker = format!("{NODE_MODULES}/");
    dir.rfind(marker.as_str())
        .map_or(dir, |at| &dir[at + marker.len()..])
}

fn nested_packages(tree: &ArchiveTree) -> BTreeMap<String, PackageManifest> {
    let suffix = format!("/{MANIFEST_FILE}");
    let mut packages = BTreeMap::new();
    for (path, bytes) in tree.files() {
        let Some(dir) = path.strip_suffix(suffix.as_str()) else {
            continue;
        };
        // Only manifests sitting directly in a package directory count.
        if package_dir(path) != Some(dir) {
            continue;
        }
        match PackageManifest::from_slice(bytes) {
            Ok(manifest) => {
                packages.insert(dir.to_string(), manifest);
            }
            Err(err) => debug!(path = %path, error = %err, "skipping unreadable nested manifest"),
        }
    }
    packages
}

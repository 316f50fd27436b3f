//! Private extraction directories, one per load.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{ArtError, Result};

/// A uniquely named directory under the workspace root.
///
/// Dropping a workspace deletes it; [`Workspace::remove`] does the same but
/// reports failures.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create `<root>/<stem>-XXXXXX`.
    pub fn create(root: &Path, stem: &str) -> Result<Self> {
        fs::create_dir_all(root).map_err(|err| ArtError::fs(root, err))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .tempdir_in(root)
            .map_err(|err| ArtError::fs(root, err))?;
        debug!(workspace = %dir.path().display(), "created workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn remove(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|err| ArtError::fs(&path, err))?;
        debug!(workspace = %path.display(), "removed workspace");
        Ok(())
    }
}

//! Short-lived archive files handed to the installer.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tincture_compiler::OverridePackage;

use crate::error::{AgentError, Result};

pub const SCRATCH_PREFIX: &str = "tincture-";
pub const SCRATCH_SUFFIX: &str = ".pkg";

/// Directory holding scratch archives. Each archive is a
/// [`NamedTempFile`] and is removed when the handle drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    /// Create `dir` if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| AgentError::io(&dir, e))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write `package` to a fresh owner-only file.
    pub fn write_package(&self, package: &OverridePackage) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(SCRATCH_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| AgentError::io(&self.dir, e))?;
        file.write_all(&package.payload)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| AgentError::io(file.path(), e))?;
        Ok(file)
    }

    /// Scratch archives currently present.
    pub fn leftovers(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| AgentError::io(&self.dir, e))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AgentError::io(&self.dir, e))?.path();
            let is_scratch = path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
                name.starts_with(SCRATCH_PREFIX) && name.ends_with(SCRATCH_SUFFIX)
            });
            if is_scratch {
                found.push(path);
            }
        }
        Ok(found)
    }
}

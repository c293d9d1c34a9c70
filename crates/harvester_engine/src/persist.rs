use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid relative path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes files under a root directory via temp file + rename, so readers
/// never observe a half-written article or media object.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    /// Resolves `relative` under the root; `..` and absolute paths are refused.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PersistError> {
        let path = Path::new(relative);
        let escapes = path.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
        });
        if relative.is_empty() || escapes {
            return Err(PersistError::InvalidPath(relative.to_string()));
        }
        Ok(self.dir.join(path))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|path| path.is_file()).unwrap_or(false)
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.write_bytes(relative, content.as_bytes())
    }

    pub fn write_bytes(&self, relative: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.resolve(relative)?;
        let parent = target.parent().unwrap_or(&self.dir).to_path_buf();
        ensure_output_dir(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    pub fn read(&self, relative: &str) -> Result<Option<String>, PersistError> {
        let target = self.resolve(relative)?;
        match fs::read_to_string(&target) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

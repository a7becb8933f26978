use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

/// Errors carry only the I/O error kind so that local paths never leak into
/// responses.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Could not allocate staging file: {0}")]
    Create(io::ErrorKind),

    #[error("Could not remove staging file: {0}")]
    Release(io::ErrorKind),
}

/// Allocates per-request staging files in one directory.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: Option<PathBuf>,
    prefix: String,
    suffix: String,
}

impl Default for StagingArea {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "dicom-".to_string(),
            suffix: ".dcm".to_string(),
        }
    }
}

impl StagingArea {
    /// Staging area under `dir`, or the system temp directory when `None`.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            ..Self::default()
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Creates a fresh, uniquely named, empty file. The name is random and
    /// the file is created exclusively, so concurrent callers never share a
    /// path.
    pub fn acquire(&self) -> Result<StagingFile, StagingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix).suffix(&self.suffix);

        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| StagingError::Create(e.kind()))?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), "staging file acquired");
        Ok(StagingFile { path })
    }
}

/// A staged file owned by exactly one extraction.
///
/// The file is removed when this value is dropped, which covers early
/// returns, panics and cancelled futures. [`StagingFile::release`] does the
/// same removal but reports failures.
#[derive(Debug)]
pub struct StagingFile {
    path: TempPath,
}

impl StagingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file. A file that is already gone counts as released.
    pub fn release(self) -> Result<(), StagingError> {
        let location = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => {
                debug!(path = ?location, "staging file released");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::Release(e.kind())),
        }
    }
}

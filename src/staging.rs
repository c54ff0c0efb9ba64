//! Transient files for path-based readers and writers

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::ConvertError;

const STAGING_PREFIX: &str = "tabconv-";

/// A uniquely named temporary file that is removed when dropped
///
/// Removal also happens on early returns and unwinding, so callers only
/// need to keep the guard alive for as long as the path is in use.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    // Taken only by `Drop`
    guard: Option<TempPath>,
}

impl StagedFile {
    /// Create an empty staging file in `dir`, or in the system temp directory
    pub fn new(dir: Option<&Path>, suffix: &str) -> Result<Self, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(suffix);

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ConvertError::resource("create", dir.map(Path::to_path_buf), e))?;

        let guard = file.into_temp_path();
        let path = guard.to_path_buf();
        debug!(path = %path.display(), "staging file created");

        Ok(Self {
            path,
            guard: Some(guard),
        })
    }

    /// Create a staging file holding `bytes`
    pub fn with_contents(dir: Option<&Path>, suffix: &str, bytes: &[u8]) -> Result<Self, ConvertError> {
        let staged = Self::new(dir, suffix)?;
        fs::write(staged.path(), bytes)
            .map_err(|e| ConvertError::resource("write", Some(staged.path().to_path_buf()), e))?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file back
    pub fn read(&self) -> Result<Vec<u8>, ConvertError> {
        fs::read(self.path())
            .map_err(|e| ConvertError::resource("read", Some(self.path().to_path_buf()), e))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            match guard.close() {
                Ok(()) => debug!(path = %self.path.display(), "staging file removed"),
                Err(error) => warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to remove staging file"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::with_contents(Some(dir.path()), ".xpt", b"payload").unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.starts_with(dir.path()));
        assert_eq!(staged.read().unwrap(), b"payload");

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_file_is_removed_on_error_path() {
        let dir = tempfile::tempdir().unwrap();

        fn failing(dir: &Path) -> Result<(), ConvertError> {
            let staged = StagedFile::new(Some(dir), ".xpt")?;
            Err(ConvertError::resource(
                "read",
                Some(staged.path().to_path_buf()),
                std::io::Error::new(std::io::ErrorKind::Other, "simulated"),
            ))
        }

        assert!(failing(dir.path()).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_path_is_stable_until_drop() {
        let staged = StagedFile::new(None, ".parquet").unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.is_absolute());
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(STAGING_PREFIX) && n.ends_with(".parquet")));
        assert_eq!(staged.path(), path.as_path());
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = StagedFile::new(Some(&missing), ".xpt").unwrap_err();
        assert!(matches!(err, ConvertError::Resource { operation: "create", .. }));
    }
}

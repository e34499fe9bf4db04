use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Request-private directory holding materialized upload files.
///
/// Removed when dropped unless [`StagingDirectory::keep`] hands it over.
#[derive(Debug)]
pub struct StagingDirectory {
    dir: TempDir,
}

impl StagingDirectory {
    pub fn create_in(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("upload-").tempdir_in(root)?;
        tracing::debug!("Created staging directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination for `relative`, with its parent directories created.
    pub fn prepare(&self, relative: &Path) -> io::Result<PathBuf> {
        let dest = self.dir.path().join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(dest)
    }

    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    pub fn remove(self) -> io::Result<()> {
        self.dir.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDirectory::create_in(root.path()).unwrap();
        let path = staging.path().to_path_buf();
        fs::write(staging.prepare(Path::new("a/b/c.txt")).unwrap(), b"x").unwrap();
        assert!(path.join("a/b/c.txt").exists());
        drop(staging);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_detaches_directory() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDirectory::create_in(root.path()).unwrap();
        let kept = staging.keep();
        assert!(kept.is_dir());
        assert!(kept.starts_with(root.path()));
    }

    #[test]
    fn test_unique_per_call() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingDirectory::create_in(root.path()).unwrap();
        let b = StagingDirectory::create_in(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}

//! Durable storage for the last version that successfully triggered a dispatch.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info};

use crate::framework::{StateError, StateResult};

/// Where the stored version lives unless configured otherwise.
pub const DEFAULT_VERSION_FILE: &str = "/data/current_version.txt";

/// A single durable version value.
pub trait VersionStore {
    /// Reads the stored version, trimmed of surrounding whitespace.
    ///
    /// Returns [`None`] if nothing is stored yet. A value that cannot be read is reported as [`None`] as well.
    fn read(&self) -> impl Future<Output = Option<String>> + Send;

    /// Stores `version`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::StoreUnwritable`] if the value cannot be persisted.
    fn write(&self, version: &str) -> impl Future<Output = StateResult<()>> + Send;
}

/// A [`VersionStore`] backed by a plain-text file holding the version and a trailing newline.
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    path: PathBuf,
}

impl FileVersionStore {
    /// Creates a [`FileVersionStore`] at `path`. Nothing is touched until the store is read or written.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VersionStore for FileVersionStore {
    async fn read(&self) -> Option<String> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let version = content.trim().to_owned();
                info!("current stored version: {version}");
                Some(version)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "no version file at {:?}, treating as first run",
                    self.path
                );
                None
            }
            Err(err) => {
                // Indistinguishable from a first run for the caller
                error!("failed to read version file {:?}: {err}", self.path);
                None
            }
        }
    }

    async fn write(&self, version: &str) -> StateResult<()> {
        let fail = |err: std::io::Error| {
            error!("failed to write version file {:?}: {err}", self.path);
            StateError::StoreUnwritable(format!("{}: {err}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(fail)?;
        }
        fs::write(&self.path, format!("{version}\n"))
            .await
            .map_err(fail)?;

        info!("updated stored version to {version}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FailureKind;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVersionStore::new(dir.path().join("version.txt"));
        assert_eq!(store.read().await, None);
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVersionStore::new(dir.path().join("version.txt"));

        store.write("7.20.2").await.unwrap();
        assert_eq!(store.read().await.as_deref(), Some("7.20.2"));
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "7.20.2\n"
        );

        store.write("7.21").await.unwrap();
        assert_eq!(store.read().await.as_deref(), Some("7.21"));
    }

    #[tokio::test]
    async fn read_trims_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.txt");
        std::fs::write(&path, "  7.19.6 \r\n\n").unwrap();
        assert_eq!(
            FileVersionStore::new(path).read().await.as_deref(),
            Some("7.19.6")
        );
    }

    #[tokio::test]
    async fn write_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("version.txt");
        let store = FileVersionStore::new(&path);

        store.write("7.20.2").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unreadable_location_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        let store = FileVersionStore::new(dir.path());
        assert_eq!(store.read().await, None);
    }

    #[tokio::test]
    async fn unwritable_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileVersionStore::new(blocker.join("version.txt"));
        let err = store.write("7.20.2").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::StoreUnwritable);
    }
}

//! JSON persistence for the `.storage/` directory
//!
//! Every stored document is wrapped with its key and a major/minor version so
//! that readers can refuse data written by an incompatible schema.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Migration required for {key}: from {from} to {to}")]
    MigrationRequired { key: String, from: u32, to: u32 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Versioned document as written to disk
///
/// ```json
/// {
///   "version": 1,
///   "minor_version": 5,
///   "key": "core.config_entries",
///   "data": { "entries": [] }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    pub version: u32,
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

/// Types persisted under a fixed key and schema version
pub trait Storable: Serialize + DeserializeOwned {
    const KEY: &'static str;
    const VERSION: u32;
    const MINOR_VERSION: u32;
}

/// Handle on a config directory's `.storage/` folder
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Create a storage handle rooted at `<config_dir>/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Path of the file backing `key`
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Load the document stored for `T`, if any.
    ///
    /// A different major version is refused; an older minor version is read
    /// as-is with a warning since minor bumps only add defaulted fields.
    pub async fn load<T: Storable>(&self) -> StorageResult<Option<StorageFile<T>>> {
        let path = self.file_path(T::KEY);
        if !path.exists() {
            debug!("Storage file not found: {}", T::KEY);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;

        #[derive(Deserialize)]
        struct VersionInfo {
            version: u32,
            minor_version: u32,
        }

        let info: VersionInfo = serde_json::from_str(&content)?;
        if info.version != T::VERSION {
            return Err(StorageError::MigrationRequired {
                key: T::KEY.to_string(),
                from: info.version,
                to: T::VERSION,
            });
        }
        if info.minor_version < T::MINOR_VERSION {
            warn!(
                "Storage {} has older minor version ({} < {})",
                T::KEY,
                info.minor_version,
                T::MINOR_VERSION
            );
        }

        let file: StorageFile<T> = serde_json::from_str(&content)?;
        debug!(
            "Loaded storage file: {} (v{}.{})",
            T::KEY,
            file.version,
            file.minor_version
        );
        Ok(Some(file))
    }

    /// Write `data` under `T::KEY`.
    ///
    /// Goes through a temp file and a rename so readers never see a torn file.
    pub async fn save<T: Storable>(&self, data: &T) -> StorageResult<()> {
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await?;
        }

        let file = StorageFile {
            version: T::VERSION,
            minor_version: T::MINOR_VERSION,
            key: T::KEY.to_string(),
            data,
        };
        let content = serde_json::to_string_pretty(&file)?;

        let path = self.file_path(T::KEY);
        let temp_path = self.file_path(&format!("{}.tmp", T::KEY));
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved storage file: {}", T::KEY);
        Ok(())
    }

    /// Remove the document stored for `T`
    pub async fn delete<T: Storable>(&self) -> StorageResult<()> {
        let path = self.file_path(T::KEY);
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!("Deleted storage file: {}", T::KEY);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Chores {
        names: Vec<String>,
    }

    impl Storable for Chores {
        const KEY: &'static str = "test.chores";
        const VERSION: u32 = 2;
        const MINOR_VERSION: u32 = 1;
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        let data = Chores {
            names: vec!["Dishes".to_string()],
        };

        storage.save(&data).await.unwrap();
        assert!(storage.file_path("test.chores").exists());
        assert!(!storage.file_path("test.chores.tmp").exists());

        let loaded = storage.load::<Chores>().await.unwrap().unwrap();
        assert_eq!(loaded.data, data);
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.key, "test.chores");
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        assert!(storage.load::<Chores>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_major_version_mismatch_refused() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        std::fs::create_dir_all(storage.storage_dir()).unwrap();
        std::fs::write(
            storage.file_path("test.chores"),
            r#"{"version": 1, "minor_version": 1, "key": "test.chores", "data": {"names": []}}"#,
        )
        .unwrap();

        let result = storage.load::<Chores>().await;
        assert!(matches!(
            result,
            Err(StorageError::MigrationRequired { from: 1, to: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.save(&Chores { names: vec![] }).await.unwrap();

        storage.delete::<Chores>().await.unwrap();
        assert!(storage.load::<Chores>().await.unwrap().is_none());
    }
}

//! JSON-document profile store.
//!
//! Writers are serialised twice: a tokio mutex orders writers inside one
//! process, and an exclusive advisory lock on the sibling `.{name}.lock` file
//! orders writers across processes (the server and `sn-cli`).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use storynest_core::{ProfileId, ProfileRecord};

use super::StoreError;

/// On-disk shape of the profile document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    user_profiles: BTreeMap<String, ProfileRecord>,
    /// Top-level keys this backend does not own.
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Store mapping profile ids to profile records in one JSON file.
///
/// Cheaply cloneable; all clones share the same write lock.
#[derive(Clone)]
pub struct ProfileStore {
    inner: Arc<ProfileStoreInner>,
}

struct ProfileStoreInner {
    path: PathBuf,
    /// Unique per store instance, so stores never share a temp file.
    temp_path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

/// Cross-process write lock on the document; released on drop.
struct DocumentLock {
    _file: std::fs::File,
}

impl ProfileStore {
    /// Open the store at `path`, creating the parent directory and an empty
    /// document if the file does not exist yet.
    ///
    /// An existing file is not read or validated here; a corrupt document is
    /// reported by the first operation that touches it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Write` if the directory or initial document cannot
    /// be created, `StoreError::Read` if the path cannot be inspected.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self {
            inner: Arc::new(ProfileStoreInner {
                temp_path: sibling(&path, &format!("tmp.{}", Uuid::new_v4().simple())),
                lock_path: sibling(&path, "lock"),
                path,
                write_lock: Mutex::new(()),
            }),
        };

        let path = store.path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        let _lock = store.lock_document().await?;
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            store.write_document(&ProfileDocument::default()).await?;
            tracing::info!(path = %path.display(), "Created empty profile document");
        }

        Ok(store)
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Get a profile by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` if the document cannot be read and
    /// `StoreError::Corrupt` if it cannot be parsed.
    #[instrument(skip(self, id), fields(profile_id = %id))]
    pub async fn get(&self, id: &ProfileId) -> Result<Option<ProfileRecord>, StoreError> {
        let mut document = self.read_document().await?;
        Ok(document.user_profiles.remove(id.as_str()))
    }

    /// Insert or fully replace a profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` or `StoreError::Corrupt` if the current
    /// document cannot be loaded (nothing is written in that case), and
    /// `StoreError::Write` if the new document cannot be persisted.
    #[instrument(skip(self, id, record), fields(profile_id = %id))]
    pub async fn put(&self, id: &ProfileId, record: ProfileRecord) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let _lock = self.lock_document().await?;

        let mut document = self.read_document().await?;
        let replaced = document
            .user_profiles
            .insert(id.as_str().to_owned(), record)
            .is_some();
        self.write_document(&document).await?;

        debug!(replaced, "Profile written");
        Ok(())
    }

    /// Modify one existing profile under the write lock.
    ///
    /// Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no profile has this id, otherwise the
    /// same errors as [`ProfileStore::put`].
    #[instrument(skip(self, id, f), fields(profile_id = %id))]
    pub async fn update<F>(&self, id: &ProfileId, f: F) -> Result<ProfileRecord, StoreError>
    where
        F: FnOnce(&mut ProfileRecord) + Send,
    {
        let _guard = self.inner.write_lock.lock().await;
        let _lock = self.lock_document().await?;

        let mut document = self.read_document().await?;
        let record = document
            .user_profiles
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        f(record);
        let updated = record.clone();
        self.write_document(&document).await?;

        debug!("Profile updated");
        Ok(updated)
    }

    /// All profile ids, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` or `StoreError::Corrupt`.
    pub async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let document = self.read_document().await?;
        Ok(document.user_profiles.into_keys().collect())
    }

    /// Check that the document is readable and well-formed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` or `StoreError::Corrupt`.
    pub async fn check(&self) -> Result<(), StoreError> {
        self.read_document().await.map(|_| ())
    }

    /// Block (off the runtime) until this process holds the document lock.
    async fn lock_document(&self) -> Result<DocumentLock, StoreError> {
        let lock_path = self.inner.lock_path.clone();
        let locked = tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok::<_, io::Error>(file)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|result| result);

        locked
            .map(|file| DocumentLock { _file: file })
            .map_err(|source| StoreError::Write {
                path: self.inner.lock_path.clone(),
                source,
            })
    }

    async fn read_document(&self) -> Result<ProfileDocument, StoreError> {
        let path = self.path();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn write_document(&self, document: &ProfileDocument) -> Result<(), StoreError> {
        let path = self.path();
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| write_err(io::Error::other(e)))?;

        let tmp = &self.inner.temp_path;
        let result = async {
            let mut file = tokio::fs::File::create(tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(tmp, path).await
        }
        .await;

        if let Err(source) = result {
            let _ = tokio::fs::remove_file(tmp).await;
            return Err(write_err(source));
        }
        Ok(())
    }
}

/// Hidden sibling of the document: `.{name}.{suffix}`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("profiles.json");
    path.with_file_name(format!(".{name}.{suffix}"))
}

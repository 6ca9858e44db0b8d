//! Blob storage on the local filesystem.

use crate::path::{validate_blob_path, METADATA_SUFFIX};
use crate::{BlobError, BlobResult};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Sidecar contents. `hash` and `size` describe the bytes written by the
/// store call that produced them and are never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub hash: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_update: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// At least one of blob or sidecar was removed. Carries the sidecar
    /// contents when it was readable.
    Deleted { metadata: Option<BlobMetadata> },
    NothingToDelete,
}

/// Serializes writers of the same path. Entries are dropped once unused.
#[derive(Default)]
struct PathLocks {
    inner: parking_lot::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    fn handle(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    fn release(&self, path: &Path) {
        let mut inner = self.inner.lock();
        if inner.get(path).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            inner.remove(path);
        }
    }
}

pub struct BlobStore {
    root: PathBuf,
    locks: PathLocks,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: PathLocks::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> BlobResult<PathBuf> {
        validate_blob_path(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    async fn locked<T>(&self, path: &Path, work: impl Future<Output = T>) -> T {
        let lock = self.locks.handle(path);
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        self.locks.release(path);
        result
    }

    /// Stream `body` to `path`, hashing as it is written.
    ///
    /// The body lands in a partial file that is synced and renamed into
    /// place before the sidecar is written, so metadata never describes
    /// bytes that are not yet on disk. Any previous sidecar is removed
    /// first. On failure the partial is removed, and so is the blob if its
    /// sidecar could not be written.
    pub async fn store<S, E>(&self, path: &str, mut body: S) -> BlobResult<BlobMetadata>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let file_path = self.resolve(path)?;
        let metadata = self
            .locked(&file_path, async {
                if let Some(parent) = file_path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let sidecar = sidecar_path(&file_path);
                remove_if_exists(&sidecar).await?;

                let partial = sibling(&file_path, ".", ".partial");
                let result = async {
                    let (hash, size) = write_hashed(&partial, &mut body).await?;
                    fs::rename(&partial, &file_path).await?;

                    let metadata = BlobMetadata {
                        hash,
                        size,
                        last_update: Utc::now().timestamp_millis(),
                    };
                    if let Err(err) = write_sidecar(&sidecar, &metadata).await {
                        discard(&file_path).await;
                        return Err(err);
                    }
                    Ok::<_, BlobError>(metadata)
                }
                .await;
                if result.is_err() {
                    discard(&partial).await;
                }
                result
            })
            .await?;

        info!(path = %path, hash = %metadata.hash, size = metadata.size, "Stored blob");
        Ok(metadata)
    }

    /// Open a stored blob for reading.
    pub async fn open(&self, path: &str) -> BlobResult<fs::File> {
        let file_path = self.resolve(path)?;
        if !is_file(&file_path).await? {
            return Err(BlobError::NotFound(path.to_string()));
        }
        Ok(fs::File::open(&file_path).await?)
    }

    /// Lazy stream over a stored blob's bytes.
    pub async fn retrieve(&self, path: &str) -> BlobResult<ReaderStream<fs::File>> {
        Ok(ReaderStream::new(self.open(path).await?))
    }

    pub async fn retrieve_metadata(&self, path: &str) -> BlobResult<BlobMetadata> {
        let sidecar = sidecar_path(&self.resolve(path)?);
        if !is_file(&sidecar).await? {
            return Err(BlobError::NotFound(path.to_string()));
        }
        let content = fs::read(&sidecar).await?;
        serde_json::from_slice(&content).map_err(|e| BlobError::InvalidMetadata(e.to_string()))
    }

    pub async fn exists(&self, path: &str) -> BlobResult<bool> {
        is_file(&self.resolve(path)?).await
    }

    /// Remove blob and sidecar. Either may be missing on its own.
    pub async fn delete(&self, path: &str) -> BlobResult<DeleteOutcome> {
        let file_path = self.resolve(path)?;
        let outcome = self
            .locked(&file_path, async {
                let sidecar = sidecar_path(&file_path);
                let metadata = match fs::read(&sidecar).await {
                    Ok(content) => serde_json::from_slice::<BlobMetadata>(&content)
                        .map_err(|e| warn!(path = %path, error = %e, "Deleting unreadable metadata"))
                        .ok(),
                    Err(_) => None,
                };

                let removed_blob = remove_if_exists(&file_path).await?;
                let removed_sidecar = remove_if_exists(&sidecar).await?;
                if removed_blob || removed_sidecar {
                    Ok::<_, BlobError>(DeleteOutcome::Deleted { metadata })
                } else {
                    Ok(DeleteOutcome::NothingToDelete)
                }
            })
            .await?;

        match &outcome {
            DeleteOutcome::Deleted { .. } => info!(path = %path, "Deleted blob"),
            DeleteOutcome::NothingToDelete => debug!(path = %path, "Nothing to delete"),
        }
        Ok(outcome)
    }
}

fn sidecar_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.as_os_str().to_owned();
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

fn sibling(file_path: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_path.with_file_name(format!("{prefix}{name}{suffix}"))
}

async fn is_file(path: &Path) -> BlobResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort removal after a failed store.
async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to clean up after store");
        }
    }
}

async fn remove_if_exists(path: &Path) -> BlobResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn write_hashed<S, E>(target: &Path, body: &mut S) -> BlobResult<(String, u64)>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = fs::File::create(target).await?;
    let mut hasher = Sha256::new();
    let mut size = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| BlobError::Body(e.to_string()))?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok((hex::encode(hasher.finalize()), size))
}

async fn write_sidecar(sidecar: &Path, metadata: &BlobMetadata) -> BlobResult<()> {
    let partial = sibling(sidecar, ".", ".partial");
    let json = serde_json::to_vec(metadata).map_err(|e| BlobError::InvalidMetadata(e.to_string()))?;
    let written = match fs::write(&partial, json).await {
        Ok(()) => fs::rename(&partial, sidecar).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        discard(&partial).await;
    }
    Ok(written?)
}

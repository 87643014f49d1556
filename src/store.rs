//! Blob storage adapters.
//!
//! Paths are `/`-delimited strings whose first segment names the container
//! (`raw/...`, `logs/...`). Every store supports conditional writes so id log
//! updates can detect a concurrent writer instead of silently dropping ids.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::StoreError;

/// Opaque blob version used for conditional writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(pub u64);

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob together with its current version.
    async fn load_versioned(&self, path: &str) -> Result<(Vec<u8>, Version), StoreError>;

    /// Write a blob only if its current version matches `expected`.
    ///
    /// `expected = None` means "the blob must not exist yet". A mismatch is
    /// reported as [`StoreError::Conflict`].
    async fn store_if(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<Version>,
    ) -> Result<Version, StoreError>;

    /// Write a blob unconditionally, or only when absent if `overwrite` is false.
    async fn store(&self, path: &str, data: &[u8], overwrite: bool) -> Result<(), StoreError>;

    /// All blob paths starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.load_versioned(path).await.map(|(data, _)| data)
    }
}

/// In-memory store. Versions are per-path generation counters.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, (Vec<u8>, Version)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load_versioned(&self, path: &str) -> Result<(Vec<u8>, Version), StoreError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn store_if(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        let mut blobs = self.blobs.write().await;
        let current = blobs.get(path).map(|(_, v)| *v);
        if current != expected {
            return Err(StoreError::Conflict(path.to_string()));
        }
        let next = Version(current.map_or(1, |v| v.0 + 1));
        blobs.insert(path.to_string(), (data.to_vec(), next));
        Ok(next)
    }

    async fn store(&self, path: &str, data: &[u8], overwrite: bool) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write().await;
        let current = blobs.get(path).map(|(_, v)| *v);
        if current.is_some() && !overwrite {
            return Err(StoreError::Conflict(path.to_string()));
        }
        let next = Version(current.map_or(1, |v| v.0 + 1));
        blobs.insert(path.to_string(), (data.to_vec(), next));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Directory-tree store rooted at `BLOB_ROOT`.
///
/// Versions are content hashes. Conditional writes are serialized by an
/// in-process lock, so two writers in different processes can still race.
pub struct FsBlobStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(StoreError::Io {
                    path: path.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "relative segments are not allowed in blob paths",
                    ),
                });
            }
            full.push(segment);
        }
        Ok(full)
    }

    async fn read_current(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn write_atomic(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        let tmp = full.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| io_error(path, e))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .map_err(|e| io_error(path, e))?;
        debug!("Wrote blob {} ({} bytes)", path, data.len());
        Ok(())
    }

    fn collect_files<'a>(
        &'a self,
        dir: PathBuf,
        out: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(io_error(&dir.to_string_lossy(), e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error(&dir.to_string_lossy(), e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error(&entry.path().to_string_lossy(), e))?;
                if file_type.is_dir() {
                    self.collect_files(entry.path(), out).await?;
                } else if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                    let name = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    // skip in-flight temp files
                    if !name.contains(".tmp-") {
                        out.push(name);
                    }
                }
            }
            Ok(())
        })
    }
}

fn io_error(path: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_string(),
        source,
    }
}

fn content_version(data: &[u8]) -> Version {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    Version(hasher.finish())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn load_versioned(&self, path: &str) -> Result<(Vec<u8>, Version), StoreError> {
        match self.read_current(path).await? {
            Some(data) => {
                let version = content_version(&data);
                Ok((data, version))
            }
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn store_if(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_current(path).await?.map(|d| content_version(&d));
        if current != expected {
            return Err(StoreError::Conflict(path.to_string()));
        }
        self.write_atomic(path, data).await?;
        Ok(content_version(data))
    }

    async fn store(&self, path: &str, data: &[u8], overwrite: bool) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if !overwrite && self.read_current(path).await?.is_some() {
            return Err(StoreError::Conflict(path.to_string()));
        }
        self.write_atomic(path, data).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // Walk from the deepest directory the prefix fully names.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.resolve(dir_part)?;
        let mut out = Vec::new();
        self.collect_files(start, &mut out).await?;
        out.retain(|p| p.starts_with(prefix));
        out.sort();
        info!("Found {} blobs under '{}'", out.len(), prefix);
        Ok(out)
    }
}

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::types::UploadId;
use crate::{BlobReader, StoreFuture, TransferError, validate_file_name};

/// Append-only byte store keyed by upload identifier.
///
/// Append is the only mutating primitive: a blob is never overwritten in
/// place, so an interrupted append leaves at worst a truncated tail.
pub trait ChunkSink: Send + Sync + 'static {
    /// Appends `bytes` to the blob for `id`, creating it if needed.
    ///
    /// Resolves once the bytes are durable and returns the blob length.
    fn append<'a>(&'a self, id: &'a UploadId, bytes: &'a [u8]) -> StoreFuture<'a, u64>;

    /// Opens the blob for `id` for reading from the start.
    fn open_for_read<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, BlobReader>;

    /// Deletes the blob for `id`. Deleting a missing blob succeeds.
    fn delete<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, ()>;
}

// ---------------------------------------------------------------------------
// FsChunkSink
// ---------------------------------------------------------------------------

/// Stores each blob as one file under a temp folder.
pub struct FsChunkSink {
    root: PathBuf,
}

impl FsChunkSink {
    /// Creates a sink rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, TransferError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the temp folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &UploadId) -> Result<PathBuf, TransferError> {
        validate_file_name(id.as_str())?;
        Ok(self.root.join(id.as_str()))
    }
}

impl ChunkSink for FsChunkSink {
    fn append<'a>(&'a self, id: &'a UploadId, bytes: &'a [u8]) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let path = self.blob_path(id)?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(bytes).await?;
            file.sync_data().await?;
            Ok(file.metadata().await?.len())
        })
    }

    fn open_for_read<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, BlobReader> {
        Box::pin(async move {
            let path = self.blob_path(id)?;
            match tokio::fs::File::open(&path).await {
                Ok(file) => Ok(Box::pin(file) as BlobReader),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(TransferError::BlobNotFound(id.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.blob_path(id)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryChunkSink
// ---------------------------------------------------------------------------

/// Keeps blobs in memory. Suited to tests and single-process setups
/// with small files.
#[derive(Default)]
pub struct MemoryChunkSink {
    blobs: RwLock<HashMap<UploadId, Vec<u8>>>,
}

impl MemoryChunkSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl ChunkSink for MemoryChunkSink {
    fn append<'a>(&'a self, id: &'a UploadId, bytes: &'a [u8]) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut blobs = self.blobs.write().await;
            let blob = blobs.entry(id.clone()).or_default();
            blob.extend_from_slice(bytes);
            Ok(blob.len() as u64)
        })
    }

    fn open_for_read<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, BlobReader> {
        Box::pin(async move {
            let blobs = self.blobs.read().await;
            match blobs.get(id) {
                Some(data) => Ok(Box::pin(Cursor::new(data.clone())) as BlobReader),
                None => Err(TransferError::BlobNotFound(id.to_string())),
            }
        })
    }

    fn delete<'a>(&'a self, id: &'a UploadId) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.blobs.write().await.remove(id);
            Ok(())
        })
    }
}

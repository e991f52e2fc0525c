use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use chunkyard_protocol::UploadedFile;

use crate::types::UploadId;
use crate::{BlobReader, StoreFuture, TransferError, validate_file_name};

/// Buffer used when streaming an assembled blob into its final location.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// A finished upload as recorded by the persistence layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedArtifact {
    pub name: String,
    pub size: u64,
    /// Collaborator fields merged into the success response.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<PersistedArtifact> for UploadedFile {
    fn from(artifact: PersistedArtifact) -> Self {
        artifact
            .extra
            .into_iter()
            .fold(UploadedFile::new(artifact.name, artifact.size), |file, (k, v)| {
                file.with_field(k, v)
            })
    }
}

/// Identifier strategy and final persistence for assembled uploads.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Mints the identifier for a new upload of `name`.
    fn mint_identifier(&self, name: &str, expected_total: Option<u64>) -> UploadId {
        let _ = (name, expected_total);
        UploadId::generate()
    }

    /// Stores the assembled content of `name`. The reader is consumed
    /// and dropped before the future resolves.
    fn persist<'a>(&'a self, name: &'a str, blob: BlobReader) -> StoreFuture<'a, PersistedArtifact>;
}

// ---------------------------------------------------------------------------
// DiskArtifactStore
// ---------------------------------------------------------------------------

/// Writes finished uploads into a media directory.
///
/// Name collisions get a random `_xxxxxxxx` suffix before the extension.
/// The response carries the public `url` and the content `sha256`.
pub struct DiskArtifactStore {
    root: PathBuf,
    url_prefix: String,
}

impl DiskArtifactStore {
    pub async fn new(
        root: impl AsRef<Path>,
        url_prefix: impl Into<String>,
    ) -> Result<Self, TransferError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            url_prefix: url_prefix.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a new file for `name`, picking a free variant on collision.
    async fn create_available(&self, name: &str) -> Result<(String, tokio::fs::File), TransferError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                suffixed_name(name)
            };
            let result = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
                .await;
            match result {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(TransferError::Persistence(format!(
            "no free name for {name} after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    async fn copy_into(
        file: &mut tokio::fs::File,
        mut blob: BlobReader,
    ) -> Result<(u64, String), TransferError> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut size = 0u64;
        loop {
            let n = blob.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as u64;
        }
        file.sync_all().await?;
        Ok((size, hex::encode(hasher.finalize())))
    }
}

impl ArtifactStore for DiskArtifactStore {
    fn persist<'a>(&'a self, name: &'a str, blob: BlobReader) -> StoreFuture<'a, PersistedArtifact> {
        Box::pin(async move {
            validate_file_name(name)?;
            let (stored_name, mut file) = self.create_available(name).await?;

            let (size, sha256) = match Self::copy_into(&mut file, blob).await {
                Ok(done) => done,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(self.root.join(&stored_name)).await;
                    return Err(e);
                }
            };

            tracing::debug!(name, stored = %stored_name, size, "artifact written");

            let mut extra = serde_json::Map::new();
            extra.insert(
                "url".into(),
                serde_json::Value::String(format!("{}{}", self.url_prefix, stored_name)),
            );
            extra.insert("sha256".into(), serde_json::Value::String(sha256));

            Ok(PersistedArtifact {
                name: name.to_string(),
                size,
                extra,
            })
        })
    }
}

/// `report.pdf` -> `report_1a2b3c4d.pdf`
fn suffixed_name(name: &str) -> String {
    let tag = &uuid::Uuid::new_v4().simple().to_string()[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{tag}.{ext}"),
        _ => format!("{name}_{tag}"),
    }
}

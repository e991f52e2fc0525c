//! Chunk assembly for resumable uploads.
//!
//! An upload arrives as one or more chunks. [`UploadCoordinator`] appends
//! each chunk to a [`ChunkSink`], tracks progress in an
//! [`UploadStateStore`], and hands the assembled blob to an
//! [`ArtifactStore`] once the received byte count matches the declared
//! total.

mod artifact;
mod coordinator;
mod locks;
mod sink;
mod state;
mod types;
mod validation;

use std::future::Future;
use std::pin::Pin;

pub use artifact::{ArtifactStore, DiskArtifactStore, PersistedArtifact};
pub use coordinator::{CoordinatorConfig, UploadCoordinator};
pub use sink::{ChunkSink, FsChunkSink, MemoryChunkSink};
pub use state::{MemoryStateStore, UploadStateStore};
pub use types::{FinalizedBlob, IngestOutcome, UploadId, UploadScope};
pub use validation::validate_file_name;

/// Boxed future returned by the storage traits.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// Readable handle on an assembled blob.
pub type BlobReader = Pin<Box<dyn tokio::io::AsyncRead + Send>>;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

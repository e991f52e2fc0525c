//! Upload state machine.
//!
//! Per logical upload `(scope, target name)`:
//!
//! ```text
//! Absent -> InProgress -> Finalizing -> Completed | Failed
//! ```
//!
//! `ingest` moves an upload from Absent/InProgress to InProgress or
//! Finalizing; `complete` takes a finalizing upload to its terminal state.
//! All state is erased on finalization, whatever persistence does next.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactStore, PersistedArtifact};
use crate::locks::KeyedLocks;
use crate::sink::ChunkSink;
use crate::state::UploadStateStore;
use crate::types::{FinalizedBlob, IngestOutcome, UploadId, UploadScope};
use crate::{TransferError, validate_file_name};

/// Coordinator behavior switches.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Chunked (resumable) mode. When off, every request is a whole file
    /// and the state store is never touched.
    pub partial_uploads: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            partial_uploads: true,
        }
    }
}

/// Decides identifier assignment, tracks progress, detects finalization
/// and hands finished blobs to persistence.
pub struct UploadCoordinator {
    config: CoordinatorConfig,
    sink: Arc<dyn ChunkSink>,
    state: Arc<dyn UploadStateStore>,
    artifacts: Arc<dyn ArtifactStore>,
    locks: KeyedLocks,
}

impl UploadCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        sink: Arc<dyn ChunkSink>,
        state: Arc<dyn UploadStateStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            config,
            sink,
            state,
            artifacts,
            locks: KeyedLocks::new(),
        }
    }

    /// Returns `true` when chunked uploads are enabled.
    pub fn partial_uploads(&self) -> bool {
        self.config.partial_uploads
    }

    /// Ingests one chunk of `target_name`.
    ///
    /// - `start_offset` of 0 or `None` restarts the upload: any state for the
    ///   same target in this scope is discarded first.
    /// - Progress is the previous byte count plus `bytes.len()`, recorded
    ///   only after the append has completed.
    /// - The upload finalizes when the byte count equals `declared_total`;
    ///   an unknown total keeps it in progress.
    ///
    /// In whole-file mode the offset and total are ignored: the chunk is
    /// the complete file and always finalizes.
    pub async fn ingest(
        &self,
        scope: &UploadScope,
        target_name: &str,
        bytes: &[u8],
        start_offset: Option<u64>,
        declared_total: Option<u64>,
    ) -> Result<IngestOutcome, TransferError> {
        validate_file_name(target_name)?;

        if !self.config.partial_uploads {
            return self.ingest_whole(target_name, bytes).await;
        }

        let name_key = scope.file_id_key(target_name);
        let _guard = self.locks.lock(&name_key).await;

        if start_offset.unwrap_or(0) == 0 {
            if let Some(stale) = self.forget(scope, &name_key, None).await? {
                info!(%scope, name = target_name, upload_id = %stale, "restarting upload from offset 0");
                if let Err(e) = self.sink.delete(&stale).await {
                    warn!(upload_id = %stale, "failed to delete abandoned blob: {e}");
                }
            }
        }

        let existing = self.state.get(&name_key).await?.map(UploadId::from);
        let upload_id = match existing {
            Some(id) => id,
            None => {
                if let Some(offset) = start_offset.filter(|&o| o > 0) {
                    warn!(%scope, name = target_name, offset, "no state for resumed upload, starting a new one");
                }
                let id = self.artifacts.mint_identifier(target_name, declared_total);
                info!(%scope, name = target_name, upload_id = %id, expected = ?declared_total, "new upload");
                id
            }
        };

        let stored_len = self.sink.append(&upload_id, bytes).await?;

        let count_key = scope.byte_count_key(&upload_id);
        let bytes_received = self.read_count(&count_key).await? + bytes.len() as u64;
        if stored_len != bytes_received {
            warn!(
                upload_id = %upload_id,
                stored_len,
                bytes_received,
                "stored blob length differs from received byte count"
            );
        }

        if declared_total == Some(bytes_received) {
            self.forget(scope, &name_key, Some(&upload_id)).await?;
            return self.finalize(upload_id, bytes_received).await;
        }

        if declared_total.is_some_and(|total| bytes_received > total) {
            warn!(
                upload_id = %upload_id,
                bytes_received,
                expected = ?declared_total,
                "received more bytes than declared"
            );
        }

        // Rewrite both entries on every chunk to refresh their expiry.
        let recorded = async {
            self.state
                .set(&count_key, bytes_received.to_string())
                .await?;
            self.state.set(&name_key, upload_id.to_string()).await
        };
        if let Err(e) = recorded.await {
            error!(
                upload_id = %upload_id,
                stored_len,
                bytes_received,
                "chunk appended but upload state not recorded: {e}"
            );
            return Err(e);
        }

        debug!(
            upload_id = %upload_id,
            bytes_received,
            expected = ?declared_total,
            "chunk stored"
        );
        Ok(IngestOutcome::InProgress {
            upload_id,
            bytes_received,
        })
    }

    /// Hands a finalized blob to persistence.
    ///
    /// The chunk sink entry is deleted whether or not persistence succeeds.
    /// A failed save is not resumable; the client has to start over.
    pub async fn complete(
        &self,
        name: &str,
        blob: FinalizedBlob,
    ) -> Result<PersistedArtifact, TransferError> {
        let FinalizedBlob {
            upload_id,
            bytes_received,
            reader,
        } = blob;

        let result = self.artifacts.persist(name, reader).await;

        if let Err(e) = self.sink.delete(&upload_id).await {
            warn!(upload_id = %upload_id, "failed to delete assembled blob: {e}");
        }

        match result {
            Ok(artifact) => {
                info!(upload_id = %upload_id, name, size = artifact.size, "upload persisted");
                Ok(artifact)
            }
            Err(e) => {
                error!(upload_id = %upload_id, name, bytes_received, "persisting upload failed: {e}");
                Err(match e {
                    TransferError::Persistence(_) => e,
                    other => TransferError::Persistence(other.to_string()),
                })
            }
        }
    }

    /// Bytes received so far for `target_name`, 0 when nothing is in progress.
    pub async fn progress(
        &self,
        scope: &UploadScope,
        target_name: &str,
    ) -> Result<u64, TransferError> {
        if !self.config.partial_uploads {
            return Ok(0);
        }
        match self.state.get(&scope.file_id_key(target_name)).await? {
            Some(id) => {
                self.read_count(&scope.byte_count_key(&UploadId::from(id)))
                    .await
            }
            None => Ok(0),
        }
    }

    async fn ingest_whole(
        &self,
        target_name: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, TransferError> {
        let total = bytes.len() as u64;
        let upload_id = self.artifacts.mint_identifier(target_name, Some(total));
        self.sink.append(&upload_id, bytes).await?;
        debug!(upload_id = %upload_id, name = target_name, size = total, "whole-file upload");
        self.finalize(upload_id, total).await
    }

    async fn finalize(
        &self,
        upload_id: UploadId,
        bytes_received: u64,
    ) -> Result<IngestOutcome, TransferError> {
        let reader = match self.sink.open_for_read(&upload_id).await {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(delete_err) = self.sink.delete(&upload_id).await {
                    warn!(upload_id = %upload_id, "failed to delete unreadable blob: {delete_err}");
                }
                return Err(e);
            }
        };
        info!(upload_id = %upload_id, bytes_received, "upload complete");
        Ok(IngestOutcome::Finalized(FinalizedBlob {
            upload_id,
            bytes_received,
            reader,
        }))
    }

    /// Erases the `file_id` mapping and byte counter of an upload.
    ///
    /// When `upload_id` is not given it is looked up first. Returns the
    /// identifier that was forgotten, if any.
    async fn forget(
        &self,
        scope: &UploadScope,
        name_key: &str,
        upload_id: Option<&UploadId>,
    ) -> Result<Option<UploadId>, TransferError> {
        let upload_id = match upload_id {
            Some(id) => Some(id.clone()),
            None => self.state.get(name_key).await?.map(UploadId::from),
        };
        self.state.delete(name_key).await?;
        if let Some(id) = &upload_id {
            self.state.delete(&scope.byte_count_key(id)).await?;
        }
        Ok(upload_id)
    }

    async fn read_count(&self, count_key: &str) -> Result<u64, TransferError> {
        match self.state.get(count_key).await? {
            Some(raw) => Ok(raw.parse().unwrap_or_else(|_| {
                warn!(key = count_key, value = %raw, "unreadable byte count, treating as 0");
                0
            })),
            None => Ok(0),
        }
    }
}

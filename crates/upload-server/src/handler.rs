//! Upload request handling.
//!
//! Resolves target name, offset and declared total for a chunk, feeds it
//! to the coordinator and turns the outcome into a response body.

use std::borrow::Cow;
use std::sync::Arc;

use axum::http::HeaderMap;

use chunkyard_protocol::constants::{CONTENT_DISPOSITION_HEADER, CONTENT_RANGE_HEADER};
use chunkyard_protocol::{ChunkMeta, UploadResponse, parse_disposition_filename};
use chunkyard_transfer::{IngestOutcome, UploadCoordinator, UploadScope, validate_file_name};

use crate::ApiError;
use crate::request::ChunkBody;

/// Chunk parameters handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChunk {
    pub name: String,
    pub start: Option<u64>,
    pub total: Option<u64>,
}

impl ResolvedChunk {
    /// Resolves a chunk from its headers and body.
    ///
    /// In chunked mode the `Content-Range` total wins over the body length
    /// and the `Content-Disposition` name wins over the part name. In
    /// whole-file mode both headers are ignored.
    pub fn resolve(
        partial_uploads: bool,
        headers: &HeaderMap,
        body: &ChunkBody,
    ) -> Result<Self, ApiError> {
        let body_len = body.bytes.len() as u64;
        let disposition = disposition_header(headers);
        let disposition = disposition.as_deref();

        if !partial_uploads {
            if body.bytes.is_empty() && body.part_name.is_none() {
                return Err(ApiError::MissingUploadBody);
            }
            // A raw body has no part of its own; its disposition names it.
            let name = body
                .part_name
                .clone()
                .or_else(|| disposition.and_then(parse_disposition_filename))
                .ok_or(ApiError::MissingUploadBody)?;
            return Ok(Self {
                name,
                start: Some(0),
                total: Some(body_len),
            });
        }

        let range = range_header(headers)?;
        if body.bytes.is_empty() && body.part_name.is_none() && range.is_none() && disposition.is_none() {
            return Err(ApiError::MissingUploadBody);
        }

        let meta = ChunkMeta::from_headers(range, disposition)?;
        let total = match &meta.range {
            Some(range) => range.total,
            None => Some(body_len),
        };
        let start = meta.start();
        let name = meta
            .file_name
            .or_else(|| body.part_name.clone())
            .ok_or(ApiError::MissingUploadBody)?;

        Ok(Self { name, start, total })
    }
}

/// A `Content-Range` that is present but not visible ASCII is malformed.
fn range_header(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(CONTENT_RANGE_HEADER)
        .map(|v| {
            v.to_str().map_err(|_| {
                ApiError::MalformedRangeHeader(String::from_utf8_lossy(v.as_bytes()).into_owned())
            })
        })
        .transpose()
}

/// Browsers send raw UTF-8 file names in `Content-Disposition`.
fn disposition_header(headers: &HeaderMap) -> Option<Cow<'_, str>> {
    headers
        .get(CONTENT_DISPOSITION_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
}

/// Drives the coordinator for incoming chunks.
pub struct UploadHandler {
    coordinator: Arc<UploadCoordinator>,
}

impl UploadHandler {
    pub fn new(coordinator: Arc<UploadCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Ingests one chunk and, when it completes the upload, persists it.
    ///
    /// A failed save is reported in the response body, not as an error.
    pub async fn handle(
        &self,
        scope: &UploadScope,
        headers: &HeaderMap,
        body: ChunkBody,
    ) -> Result<UploadResponse, ApiError> {
        let chunk = ResolvedChunk::resolve(self.coordinator.partial_uploads(), headers, &body)?;
        tracing::debug!(
            %scope,
            name = %chunk.name,
            start = ?chunk.start,
            expected = ?chunk.total,
            len = body.bytes.len(),
            "chunk received"
        );

        let outcome = self
            .coordinator
            .ingest(scope, &chunk.name, &body.bytes, chunk.start, chunk.total)
            .await?;

        match outcome {
            IngestOutcome::InProgress { bytes_received, .. } => {
                Ok(UploadResponse::progress(bytes_received))
            }
            IngestOutcome::Finalized(blob) => {
                match self.coordinator.complete(&chunk.name, blob).await {
                    Ok(artifact) => Ok(UploadResponse::completed(artifact.into())),
                    Err(_) => Ok(UploadResponse::save_failed(chunk.name)),
                }
            }
        }
    }

    /// Bytes received so far for `name` in `scope`.
    pub async fn progress(
        &self,
        scope: &UploadScope,
        name: &str,
    ) -> Result<UploadResponse, ApiError> {
        validate_file_name(name)?;
        let size = self.coordinator.progress(scope, name).await?;
        Ok(UploadResponse::progress(size))
    }
}

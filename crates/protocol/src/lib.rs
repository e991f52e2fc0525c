//! Wire types for chunkyard uploads.
//!
//! Covers the request side (`Content-Range` / `Content-Disposition` parsing)
//! and the three JSON response shapes returned to upload widgets.

pub mod constants;
pub mod range;
pub mod response;

// Re-export primary types for convenience.
pub use range::{ChunkMeta, ContentRange, parse_content_range, parse_disposition_filename};
pub use response::{FileError, UploadResponse, UploadedFile};

/// Errors produced while decoding request metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed Content-Range header: {0}")]
    MalformedRangeHeader(String),
}

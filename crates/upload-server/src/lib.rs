//! HTTP front end for chunkyard uploads.
//!
//! Accepts `POST /upload/{collection}` requests carrying one chunk each
//! (multipart `files` part or raw body), resolves the chunk metadata from
//! the request headers, and drives an [`UploadCoordinator`]. Responses use
//! the JSON shapes from [`chunkyard_protocol::UploadResponse`].
//!
//! [`UploadCoordinator`]: chunkyard_transfer::UploadCoordinator

mod error;
mod handler;
mod request;
mod server;

pub use error::{ApiError, ErrorResponse};
pub use handler::{ResolvedChunk, UploadHandler};
pub use request::{ChunkBody, client_scope};
pub use server::{ServerConfig, UploadServer, router};

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server already running")]
    AlreadyRunning,
}

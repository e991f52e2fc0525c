//! Extraction of the chunk bytes and client scope from a request.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_TYPE, COOKIE};

use chunkyard_protocol::constants::{
    ANONYMOUS_SCOPE, FILES_FIELD, FILES_FIELD_ARRAY, SESSION_COOKIE, UPLOAD_SESSION_HEADER,
};

use crate::ApiError;

/// The chunk carried by one request.
#[derive(Debug, Clone)]
pub struct ChunkBody {
    /// File name of the multipart part, if any. Always a bare file name.
    pub part_name: Option<String>,
    pub bytes: Bytes,
}

impl ChunkBody {
    /// Reads the `files` multipart part, or the whole body when the request
    /// is not `multipart/form-data`.
    pub async fn extract(request: Request) -> Result<Self, ApiError> {
        if is_multipart(request.headers()) {
            let multipart = Multipart::from_request(request, &()).await?;
            Self::from_multipart(multipart).await
        } else {
            let bytes = Bytes::from_request(request, &()).await?;
            Ok(Self {
                part_name: None,
                bytes,
            })
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        while let Some(field) = multipart.next_field().await? {
            if !matches!(field.name(), Some(FILES_FIELD | FILES_FIELD_ARRAY)) {
                continue;
            }
            let part_name = field
                .file_name()
                .map(basename)
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            let bytes = field.bytes().await?;
            return Ok(Self { part_name, bytes });
        }
        Err(ApiError::MissingUploadBody)
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("multipart/form-data"))
}

/// Strips any directory part a browser may have sent with the file name.
fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Resolves the client scope: `X-Upload-Session`, else the `sessionid`
/// cookie, else `anonymous`.
pub fn client_scope(headers: &HeaderMap) -> String {
    let header = headers
        .get(UPLOAD_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(session) = header {
        return session.to_string();
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .unwrap_or_else(|| ANONYMOUS_SCOPE.to_string())
}

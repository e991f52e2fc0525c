use std::fmt;

use serde::{Deserialize, Serialize};

use chunkyard_protocol::constants::{BYTE_COUNT_KEY_SUFFIX, FILE_ID_KEY_SUFFIX, KEY_SEPARATOR};

use crate::BlobReader;

/// Opaque identifier of one logical upload.
///
/// Minted once, stable across every chunk of the upload, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Mints a random identifier (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UploadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Disambiguates unrelated uploads sharing one state store.
///
/// `client` is the opaque client scope (a session key), `collection` the
/// model or collection the files are uploaded into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadScope {
    client: String,
    collection: String,
}

impl UploadScope {
    pub fn new(client: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            collection: collection.into(),
        }
    }

    /// `<client>::<collection>::<target>::file_id`
    pub fn file_id_key(&self, target_name: &str) -> String {
        [
            escape_component(&self.client),
            escape_component(&self.collection),
            escape_component(target_name),
            FILE_ID_KEY_SUFFIX.to_string(),
        ]
        .join(KEY_SEPARATOR)
    }

    /// `<client>::<upload_id>::uploaded_byte_count`
    pub fn byte_count_key(&self, upload_id: &UploadId) -> String {
        [
            escape_component(&self.client),
            escape_component(upload_id.as_str()),
            BYTE_COUNT_KEY_SUFFIX.to_string(),
        ]
        .join(KEY_SEPARATOR)
    }
}

impl fmt::Display for UploadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client, self.collection)
    }
}

/// Keeps a component from forging a separator inside a key.
fn escape_component(s: &str) -> String {
    s.replace('%', "%25").replace(':', "%3A")
}

/// An upload whose received bytes match its declared total.
///
/// Only ever produced by a finalizing ingest; the state for the upload
/// has already been erased when the caller receives it.
pub struct FinalizedBlob {
    pub upload_id: UploadId,
    pub bytes_received: u64,
    pub reader: BlobReader,
}

impl fmt::Debug for FinalizedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizedBlob")
            .field("upload_id", &self.upload_id)
            .field("bytes_received", &self.bytes_received)
            .finish_non_exhaustive()
    }
}

/// Result of ingesting one chunk.
#[derive(Debug)]
pub enum IngestOutcome {
    InProgress {
        upload_id: UploadId,
        bytes_received: u64,
    },
    Finalized(FinalizedBlob),
}

impl IngestOutcome {
    pub fn upload_id(&self) -> &UploadId {
        match self {
            Self::InProgress { upload_id, .. } => upload_id,
            Self::Finalized(blob) => &blob.upload_id,
        }
    }

    pub fn bytes_received(&self) -> u64 {
        match self {
            Self::InProgress { bytes_received, .. } => *bytes_received,
            Self::Finalized(blob) => blob.bytes_received,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }
}

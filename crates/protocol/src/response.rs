use serde::{Deserialize, Serialize};

use crate::constants::SAVE_ERROR_MESSAGE;

/// A successfully persisted file, as reported to the upload widget.
///
/// Fields contributed by the persistence layer (a content URL, a digest)
/// are flattened next to `name` and `size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            extra: serde_json::Map::new(),
        }
    }

    /// Adds a collaborator field. `name` and `size` cannot be overridden.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        if key != "name" && key != "size" {
            self.extra.insert(key, value);
        }
        self
    }
}

/// Per-file failure entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub name: String,
    pub error: String,
}

/// Body of every upload response; exactly one of three shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    /// `{"size": n}`: chunk accepted, upload not yet complete.
    Progress { size: u64 },
    /// `{"files": [...]}`: upload finalized and persisted.
    Completed { files: Vec<UploadedFile> },
    /// `[{"name", "error"}]`: finalized but not persisted.
    Failed(Vec<FileError>),
}

impl UploadResponse {
    pub fn progress(bytes_received: u64) -> Self {
        Self::Progress {
            size: bytes_received,
        }
    }

    pub fn completed(file: UploadedFile) -> Self {
        Self::Completed { files: vec![file] }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed(vec![FileError {
            name: name.into(),
            error: error.into(),
        }])
    }

    /// Failure entry carrying the standard save-error message.
    pub fn save_failed(name: impl Into<String>) -> Self {
        Self::failed(name, SAVE_ERROR_MESSAGE)
    }

    /// Returns `true` once the upload has left the in-progress state.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

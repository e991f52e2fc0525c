/// Header carrying the byte span of a chunk: `bytes <start>-<end>/<total>`.
pub const CONTENT_RANGE_HEADER: &str = "content-range";

/// Header carrying the original file name of a chunked upload.
pub const CONTENT_DISPOSITION_HEADER: &str = "content-disposition";

/// Header carrying the opaque client scope (session key).
pub const UPLOAD_SESSION_HEADER: &str = "x-upload-session";

/// Cookie consulted for the client scope when the header is absent.
pub const SESSION_COOKIE: &str = "sessionid";

/// Scope used when a request carries no session at all.
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Multipart field holding the chunk blob.
pub const FILES_FIELD: &str = "files";

/// Array-style alias of [`FILES_FIELD`] sent by some upload widgets.
pub const FILES_FIELD_ARRAY: &str = "files[]";

/// Separator between the components of a state-store key.
pub const KEY_SEPARATOR: &str = "::";

/// Suffix of the key mapping a target name to its upload identifier.
pub const FILE_ID_KEY_SUFFIX: &str = "file_id";

/// Suffix of the key holding the received byte count of an upload.
pub const BYTE_COUNT_KEY_SUFFIX: &str = "uploaded_byte_count";

/// Message reported per file when the assembled upload could not be saved.
pub const SAVE_ERROR_MESSAGE: &str = "ERROR SAVING FILE";

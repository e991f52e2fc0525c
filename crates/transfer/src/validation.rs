use std::path::{Component, Path};

use crate::TransferError;

/// Validates that `name` is a single, plain file name.
///
/// Target names and upload identifiers both end up as file names inside a
/// storage root, so anything that could address another directory is
/// rejected:
/// - Empty names
/// - Path separators (`/`, `\`) and absolute paths
/// - `.` and `..`
/// - NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidName(format!(
            "separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir | Component::CurDir), _) => Err(TransferError::InvalidName(
            format!("relative directory not allowed: {name}"),
        )),
        _ => Err(TransferError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

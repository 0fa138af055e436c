//! Atomic JSON persistence shared by every state file.
//!
//! Write flow: serialize -> `<path>.tmp` sibling -> `rename`. The `.tmp` is
//! always in the same directory as the target, so the rename never crosses a
//! filesystem.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{io_err, StateError};

/// Load `path` as JSON, or `None` if the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Atomically replace `path` with the pretty JSON of `value`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("state path has no parent directory"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

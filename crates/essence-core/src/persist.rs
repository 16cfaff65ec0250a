//! Whole-file JSON persistence helpers.
//!
//! Writes serialize the full structure in memory first, land in a temp file
//! next to the target, and only then rename over it, so a failed write never
//! corrupts the previous on-disk state.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{EssenceError, Result};

/// Atomically serialize `value` as JSON to `path`.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, &bytes)
        .map_err(|e| EssenceError::persistence(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .map_err(|e| EssenceError::persistence(format!("renaming into {}", path.display()), e))?;

    Ok(())
}

/// Deserialize a JSON value previously written by [`save_json`].
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)
        .map_err(|e| EssenceError::persistence(format!("reading {}", path.display()), e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

//! JSON persistence for logs, reports and comparisons.
//!
//! The engine only needs `serialize(value) -> bytes` and `deserialize(bytes) -> value`;
//! the expected shape is chosen through the target type.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::MidgeResult;

/// Serializes a record (or a list/map of records) to JSON bytes.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T, pretty: bool) -> MidgeResult<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    Ok(bytes)
}

/// Parses JSON bytes into the requested record shape.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> MidgeResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Writes a record to `path`, replacing any existing file.
pub fn write_file<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
    pretty: bool,
) -> MidgeResult<()> {
    let path = path.as_ref();
    let bytes = to_bytes(value, pretty)?;
    fs::write(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "record written");
    Ok(())
}

/// Reads a record of the requested shape from `path`.
pub fn read_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> MidgeResult<T> {
    let bytes = fs::read(path.as_ref())?;
    from_bytes(&bytes)
}

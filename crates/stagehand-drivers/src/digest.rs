//! SHA-256 helpers for folding file contents into configurations.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use stagehand_lifecycle::DriverError;
use walkdir::WalkDir;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of the file at `path`.
///
/// # Errors
///
/// Returns [`DriverError::Io`] when the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String, DriverError> {
    fs::read(path)
        .map(|bytes| sha256_hex(&bytes))
        .map_err(|source| DriverError::io("read", path, source))
}

/// Hashes every regular file beneath `root`.
///
/// Symbolic links are followed, so a migration linked in from elsewhere is
/// hashed by its target's contents. Keys are paths relative to `root` joined
/// with `/`, so the map is the same on every platform and sorts
/// deterministically.
///
/// # Errors
///
/// Returns [`DriverError::Io`] when the tree cannot be walked or a file
/// cannot be read.
pub fn hash_tree(root: &Path) -> Result<BTreeMap<String, String>, DriverError> {
    let mut hashes = BTreeMap::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(root).to_path_buf();
            DriverError::io("walk", &path, io::Error::from(error))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file = entry.path();
        let relative = file.strip_prefix(root).map_err(|_| {
            DriverError::configuration(format!(
                "{} escapes {}",
                file.display(),
                root.display()
            ))
        })?;
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        hashes.insert(key, hash_file(file)?);
    }
    Ok(hashes)
}

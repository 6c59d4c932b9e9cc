//! Bundle manifest reading: extract the canonical identifier from a
//! property-list document inside an application bundle.

use std::fs;
use std::path::{Path, PathBuf};

use plist::Value;
use thiserror::Error;

/// Why the identifier could not be read from a bundle manifest.
///
/// Always non-fatal: the locator attaches it to the result and carries on
/// without an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest not found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("manifest at {} is malformed: {details}", path.display())]
    Malformed { path: PathBuf, details: String },

    #[error("manifest at {} is not a dictionary", path.display())]
    NotADictionary { path: PathBuf },

    #[error("manifest at {} has no usable {key:?} string", path.display())]
    MissingKey { path: PathBuf, key: String },
}

impl ManifestError {
    /// Path of the manifest file that failed.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        match self {
            Self::Missing { path }
            | Self::Malformed { path, .. }
            | Self::NotADictionary { path }
            | Self::MissingKey { path, .. } => path,
        }
    }
}

/// Read the string value of `key` from the manifest at `bundle/manifest_rel`.
///
/// Accepts XML and binary property lists. An empty or whitespace-only value
/// counts as missing.
pub fn read_identifier(
    bundle: &Path,
    manifest_rel: &Path,
    key: &str,
) -> Result<String, ManifestError> {
    let path = bundle.join(manifest_rel);

    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(ManifestError::Malformed {
                path,
                details: "not a regular file".to_string(),
            });
        }
        Err(_) => return Err(ManifestError::Missing { path }),
    }

    let value = Value::from_file(&path).map_err(|e| ManifestError::Malformed {
        path: path.clone(),
        details: e.to_string(),
    })?;
    let Some(dict) = value.into_dictionary() else {
        return Err(ManifestError::NotADictionary { path });
    };

    dict.get(key)
        .and_then(Value::as_string)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| ManifestError::MissingKey {
            path,
            key: key.to_string(),
        })
}

//! Name and version of distribution files, from their filenames

use std::path::{Path, PathBuf};

use pyndex_core::normalize_package_name;

use crate::error::PublishError;

/// Source distribution extensions, longest first.
const SDIST_EXTENSIONS: [&str; 2] = [".tar.gz", ".zip"];

/// A local distribution file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub name: String,
    pub version: String,
    pub local_path: PathBuf,
}

impl Distribution {
    /// Base filename, as listed in the index.
    pub fn filename(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Index directory of the package.
    pub fn directory(&self) -> String {
        normalize_package_name(&self.name)
    }
}

/// Split a distribution filename into `(name, version)`.
///
/// Wheels follow `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`;
/// source distributions are `{name}-{version}.tar.gz` or `.zip`, split at the
/// last `-`. Returns `None` for anything else.
pub fn parse_filename(filename: &str) -> Option<(String, String)> {
    if let Some(stem) = filename.strip_suffix(".whl") {
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 5 || parts[0].is_empty() || parts[1].is_empty() {
            return None;
        }
        return Some((parts[0].to_string(), parts[1].to_string()));
    }

    let stem = SDIST_EXTENSIONS
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))?;
    let (name, version) = stem.rsplit_once('-')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name.to_string(), version.to_string()))
}

/// Parse a local distribution file.
pub fn parse_distribution(path: &Path) -> Result<Distribution, PublishError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (name, version) = parse_filename(&filename).ok_or_else(|| PublishError::Distribution {
        path: path.to_path_buf(),
        reason: "unknown distribution file type".to_string(),
    })?;
    Ok(Distribution {
        name,
        version,
        local_path: path.to_path_buf(),
    })
}

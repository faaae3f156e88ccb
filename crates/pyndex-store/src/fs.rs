//! Object store backed by a directory tree.
//!
//! Keys map to paths below the root. A key ending in `/` (a directory
//! marker) is stored as `index.html` inside that directory, so the tree can
//! be served as-is by a static web server.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use pyndex_core::{BackendError, INDEX_HTML};

use crate::object::{ObjectStore, PutOptions};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the objects below `prefix`.
    fn dir_path(&self, prefix: &str) -> Result<PathBuf, BackendError> {
        let mut path = self.root.clone();
        for part in prefix.split('/').filter(|p| !p.is_empty()) {
            if part == "." || part == ".." {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("invalid object key segment '{part}' in {prefix}"),
                )
                .into());
            }
            path.push(part);
        }
        Ok(path)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BackendError> {
        let mut path = self.dir_path(key)?;
        if key.is_empty() || key.ends_with('/') {
            path.push(INDEX_HTML);
        }
        Ok(path)
    }

    /// Write through a uniquely named temp file in the target directory,
    /// then rename it over `path`. The temp file is removed on failure.
    fn replace_with(
        &self,
        path: &Path,
        write: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<(), BackendError> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        write(tmp.as_file_mut())?;
        // Temp files are private; published objects are served as-is.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
        }
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove now-empty directories between `dir` and the root.
    fn prune_empty_dirs(&self, mut dir: Option<&Path>) {
        while let Some(d) = dir {
            if d == self.root.as_path() || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, body: &[u8], _opts: &PutOptions) -> Result<(), BackendError> {
        let path = self.object_path(key)?;
        self.replace_with(&path, |tmp| tmp.write_all(body))
    }

    fn put_file(&self, key: &str, src: &Path, _opts: &PutOptions) -> Result<(), BackendError> {
        let path = self.object_path(key)?;
        self.replace_with(&path, |tmp| io::copy(&mut File::open(src)?, tmp).map(|_| ()))
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(path.parent());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let dir = self.dir_path(prefix)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut prefixes = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                prefixes.push(format!("{prefix}{name}/"));
            }
        }
        prefixes.sort();
        Ok(prefixes)
    }
}

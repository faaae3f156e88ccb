//! Delete workflow

use pyndex_core::normalize_package_name;

use crate::distribution::parse_filename;
use crate::error::PublishError;
use crate::publisher::Publisher;

/// Outcome of deleting one version of a package.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub directory: String,
    /// Filenames removed from the bucket and the index.
    pub deleted: Vec<String>,
    /// The directory's index was removed because no files remain.
    pub index_removed: bool,
    /// The directory was dropped from the root index.
    pub root_updated: bool,
}

impl Publisher {
    /// Delete every file of `name` at `version`.
    pub fn delete(&self, name: &str, version: &str) -> Result<DeleteSummary, PublishError> {
        let directory = normalize_package_name(name);

        let locked: Result<(Vec<String>, bool), PublishError> = self.locker.with_lock(&directory, || {
            let mut index = self.store.get_index(&directory)?;
            let matching: Vec<String> = index
                .filenames()
                .filter(|f| parse_filename(f).is_some_and(|(_, v)| v == version))
                .map(str::to_string)
                .collect();
            if matching.is_empty() {
                return Err(PublishError::PackageNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                });
            }

            for (done, filename) in matching.iter().enumerate() {
                log::info!("deleting {directory}/{filename}");
                if let Err(e) = self.store.delete(&directory, filename) {
                    // Files already deleted must not stay listed.
                    if done > 0 {
                        if let Err(put_err) = self.store.put_index(&directory, &index) {
                            log::error!("failed to update index of {directory}: {put_err}");
                        }
                    }
                    return Err(e.into());
                }
                index.remove(filename);
            }
            self.store.put_index(&directory, &index)?;
            Ok((matching, index.is_empty()))
        });
        let (deleted, index_removed) = locked?;

        let root_updated = index_removed && self.remove_from_root_index(&directory)?;
        Ok(DeleteSummary {
            directory,
            deleted,
            index_removed,
            root_updated,
        })
    }
}

//! Upload workflow

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::distribution::{Distribution, parse_distribution};
use crate::error::PublishError;
use crate::publisher::Publisher;

/// Outcome of an upload run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Files written to the bucket, as `directory/filename`.
    pub uploaded: Vec<String>,
    /// Files skipped because they were already indexed.
    pub conflicts: Vec<String>,
    /// Directories whose index was touched.
    pub directories: Vec<String>,
    /// Entries in the rebuilt root index, when it was rebuilt.
    pub root_entries: Option<usize>,
}

impl Publisher {
    /// Parse and upload local files. Every path is parsed before anything
    /// is uploaded.
    pub fn upload_paths(&self, paths: &[PathBuf]) -> Result<UploadSummary, PublishError> {
        let dists = paths
            .iter()
            .map(|p| parse_distribution(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.upload(&dists)
    }

    /// Upload distributions, one locked read-modify-write per directory.
    pub fn upload(&self, dists: &[Distribution]) -> Result<UploadSummary, PublishError> {
        let mut groups: BTreeMap<String, Vec<&Distribution>> = BTreeMap::new();
        for dist in dists {
            groups.entry(dist.directory()).or_default().push(dist);
        }

        let mut summary = UploadSummary::default();
        for (directory, group) in &groups {
            self.upload_directory(directory, group, &mut summary)?;
            summary.directories.push(directory.clone());
        }

        if self.cfg.put_root_index {
            summary.root_entries = Some(self.update_root_index()?);
        }

        if self.cfg.strict && !summary.conflicts.is_empty() {
            return Err(PublishError::Conflicts {
                count: summary.conflicts.len(),
                filenames: summary.conflicts,
            });
        }
        Ok(summary)
    }

    fn upload_directory(
        &self,
        directory: &str,
        group: &[&Distribution],
        summary: &mut UploadSummary,
    ) -> Result<(), PublishError> {
        self.locker.with_lock(directory, || {
            let mut index = self.store.get_index(directory)?;

            for dist in group {
                let filename = dist.filename();
                if index.contains(&filename) && !self.cfg.force {
                    log::warn!("{filename} already exists! (use --force to overwrite)");
                    summary.conflicts.push(filename);
                    continue;
                }
                log::info!("uploading {directory}/{filename}");
                let hash = self.store.put_distribution(directory, &dist.local_path)?;
                index.put(filename.clone(), Some(hash));
                summary.uploaded.push(format!("{directory}/{filename}"));
            }

            self.store.put_index(directory, &index)?;
            Ok(())
        })
    }
}

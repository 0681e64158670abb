//! Dated report persistence.
//!
//! Each calendar day owns exactly one artifact, named by
//! [`artifact_key`](super::report::artifact_key). Saving again for the same
//! day replaces the file. Writes land in a temporary sibling first and are
//! renamed into place, so readers see either the old or the new report,
//! never a partial one.

use super::report::artifact_key;
use crate::error::StoreError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Where reports are kept, keyed by date.
pub trait ArtifactStore {
    async fn save(&self, date: NaiveDate, text: &str) -> Result<PathBuf, StoreError>;
    async fn load(&self, date: NaiveDate) -> Result<String, StoreError>;
}

/// Stores reports as UTF-8 text files in one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(artifact_key(date))
    }
}

impl ArtifactStore for FsStore {
    #[instrument(level = "info", skip_all, fields(%date))]
    async fn save(&self, date: NaiveDate, text: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(date);
        let tmp = self.dir.join(format!(".{}.tmp", artifact_key(date)));
        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(write_err)?;
        if let Err(e) = fs::write(&tmp, text).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        info!(path = %path.display(), bytes = text.len(), "Wrote report");
        Ok(path)
    }

    #[instrument(level = "info", skip_all, fields(%date))]
    async fn load(&self, date: NaiveDate) -> Result<String, StoreError> {
        let path = self.path_for(date);
        fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Read { path, source })
    }
}

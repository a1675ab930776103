//! Removal of a job's files
//!
//! Every file written for a job is registered in its [`ArtifactSet`]. The
//! set is consumed by [`ArtifactSet::cleanup`], so a job's files are removed
//! at most once; if a set is dropped without cleanup (a panic unwinding
//! through the runner) its `Drop` removes the files synchronously.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::runner::job::JobId;

/// Files owned by one job
#[derive(Debug)]
pub struct ArtifactSet {
    job_id: JobId,
    dir: PathBuf,
    files: Vec<PathBuf>,
    cleaned: bool,
}

impl ArtifactSet {
    /// Create the job directory and an empty set for it
    pub async fn create(job_id: JobId, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(%job_id, dir = %dir.display(), "created job directory");
        Ok(Self {
            job_id,
            dir,
            files: Vec::new(),
            cleaned: false,
        })
    }

    /// Record a file that belongs to the job
    ///
    /// The file does not have to exist yet.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove every registered file and the job directory
    ///
    /// Files that are already gone are fine. Other failures are logged and
    /// never returned, so they cannot replace the job's real outcome.
    #[instrument(skip(self), fields(job_id = %self.job_id))]
    pub async fn cleanup(mut self) {
        for file in &self.files {
            match tokio::fs::remove_file(file).await {
                Ok(()) => debug!(file = %file.display(), "removed artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(file = %file.display(), error = %e, "failed to remove artifact"),
            }
        }

        // Catches files no stage declared, e.g. nested classes from javac
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "removed job directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "failed to remove job directory"),
        }

        self.cleaned = true;
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }

        warn!(
            job_id = %self.job_id,
            dir = %self.dir.display(),
            "artifact set dropped without cleanup, removing files synchronously"
        );

        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file)
                && e.kind() != ErrorKind::NotFound
            {
                warn!(file = %file.display(), error = %e, "failed to remove artifact");
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove job directory");
        }
    }
}

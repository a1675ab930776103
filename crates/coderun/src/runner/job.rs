//! Jobs and job handles
//!
//! A job is one execution request on its way through the pipeline. Each job
//! gets its own directory under the work root, named after a random UUID so
//! concurrent jobs never share files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::process::AbortSignal;
use crate::types::ExecutionRequest;

/// Unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Name of the job's directory under the work root
    pub fn dir_name(&self) -> String {
        format!("job-{}", self.0)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Materializing,
    Launching,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    CleaningUp,
    Terminal,
}

impl JobState {
    /// Check whether moving from `self` to `next` is allowed
    ///
    /// `Succeeded -> Launching` is the step from one stage to the next.
    /// Every path to `Terminal` goes through `CleaningUp`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Materializing)
                | (Created, Failed)
                | (Materializing, Launching)
                | (Materializing, Failed)
                | (Launching, Running)
                | (Launching, Failed)
                | (Launching, TimedOut)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Succeeded, Launching)
                | (Succeeded, CleaningUp)
                | (Failed, CleaningUp)
                | (TimedOut, CleaningUp)
                | (CleaningUp, Terminal)
        )
    }

}

/// One execution request being processed
#[derive(Debug)]
pub struct Job {
    id: JobId,
    language: String,
    source: String,
    stdin: Option<String>,
    work_dir: PathBuf,
    state: JobState,
}

impl Job {
    /// Create a job for a request; its directory is not created yet
    pub fn new(id: JobId, request: ExecutionRequest, work_root: &Path) -> Self {
        Self {
            id,
            work_dir: work_root.join(id.dir_name()),
            language: request.language,
            source: request.source,
            stdin: request.stdin,
            state: JobState::Created,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Directory holding every file of this job
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to the next lifecycle state
    pub fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!(job_id = %self.id, from = ?self.state, to = ?next, "unexpected job state transition");
        }
        debug!(job_id = %self.id, from = ?self.state, to = ?next, "job state");
        self.state = next;
    }
}

/// Handle to a submitted job, used to abort it
///
/// Handles are cheap to clone. Aborting only affects the job the handle was
/// created for.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    abort_tx: Arc<watch::Sender<bool>>,
}

impl JobHandle {
    /// Create a handle and the signal its job listens on
    pub fn new(id: JobId) -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        let handle = Self {
            id,
            abort_tx: Arc::new(tx),
        };
        (handle, AbortSignal::new(rx))
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Request the job to stop
    ///
    /// Returns `true` if this call requested the abort, `false` if it had
    /// already been requested. Aborting a finished job has no effect.
    pub fn abort(&self) -> bool {
        self.abort_tx.send_if_modified(|aborted| {
            if *aborted {
                false
            } else {
                *aborted = true;
                true
            }
        })
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }
}

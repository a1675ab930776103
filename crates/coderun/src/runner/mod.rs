//! Job orchestration
//!
//! [`Runner`] takes an [`ExecutionRequest`] through the whole pipeline:
//! language lookup, toolchain probes, writing the source, running the
//! compile and run stages under one deadline, removing every file and
//! building the [`ExecutionResponse`]. Every request gets a response; errors
//! end up in its `errors` field.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

pub use crate::runner::cleanup::ArtifactSet;
pub use crate::runner::job::{Job, JobHandle, JobId, JobState};
pub use crate::runner::materialize::{MaterializedSource, detect_public_type};
pub use crate::runner::perf::PerformanceMarkers;
pub use crate::runner::pipeline::{Stage, StageKind};

pub mod assemble;
pub mod cleanup;
pub mod job;
pub mod materialize;
pub mod perf;
pub mod pipeline;

use crate::config::{Config, Language};
use crate::process::{self, AbortSignal, ProcessError, StageOutcome, Supervisor};
use crate::types::{ExecutionRequest, ExecutionResponse, FeedbackAnalyzer, NoFeedback};

/// Why a job did not succeed
#[derive(Debug, Error)]
pub enum RunError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("{toolchain} is not installed or not on PATH ({reason})")]
    ToolchainUnavailable {
        toolchain: String,
        #[source]
        reason: ProcessError,
    },

    #[error("failed to write source files: {0}")]
    MaterializationFailed(#[source] std::io::Error),

    #[error("compilation failed: {diagnostics}")]
    CompileFailed { diagnostics: String },

    #[error("{}", runtime_summary(.exit_code, .signal))]
    RuntimeFailed {
        exit_code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    #[error("failed to launch {stage} stage: {reason}")]
    LaunchFailed { stage: StageKind, reason: String },

    #[error("execution timeout")]
    TimedOut,

    #[error("execution aborted")]
    Aborted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Text placed in the response's `errors` field
    ///
    /// Compiler diagnostics and the program's stderr are passed through as
    /// they are; everything else uses the error's display text.
    pub fn user_message(&self) -> String {
        match self {
            RunError::CompileFailed { diagnostics } => diagnostics.clone(),
            RunError::RuntimeFailed { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

fn runtime_summary(exit_code: &Option<i32>, signal: &Option<i32>) -> String {
    match (exit_code, signal) {
        (_, Some(signal)) => format!("process terminated by signal {signal}"),
        (Some(code), None) => format!("process exited with code {code}"),
        (None, None) => "process exited abnormally".to_owned(),
    }
}

/// A job running in the background
#[derive(Debug)]
pub struct Submission {
    handle: JobHandle,
    task: JoinHandle<ExecutionResponse>,
}

impl Submission {
    /// Handle used to abort the job
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Wait for the job's response
    ///
    /// Always resolves to a response, even if the job task panicked.
    pub async fn response(self) -> ExecutionResponse {
        match self.task.await {
            Ok(response) => response,
            Err(e) => {
                error!(job_id = %self.handle.id(), error = %e, "job task failed");
                ExecutionResponse::failure(
                    RunError::Internal(format!("job task failed: {e}")).to_string(),
                    0.0,
                )
            }
        }
    }
}

/// High-level runner for code execution
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    supervisor: Supervisor,
    feedback: Arc<dyn FeedbackAnalyzer>,
    /// Limits concurrently running jobs
    limiter: Option<Arc<Semaphore>>,
    /// Probe commands that already succeeded
    probed: Arc<RwLock<HashSet<Vec<String>>>>,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let supervisor = Supervisor::new(config.kill_grace(), config.max_output);
        let limiter = config
            .max_concurrent_jobs
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            config: Arc::new(config),
            supervisor,
            feedback: Arc::new(NoFeedback),
            limiter,
            probed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Attach a feedback analyzer
    pub fn with_feedback(mut self, analyzer: impl FeedbackAnalyzer + 'static) -> Self {
        self.feedback = Arc::new(analyzer);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a request to completion
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResponse {
        let (handle, abort) = JobHandle::new(JobId::new());
        self.execute_job(handle.id(), request, abort).await
    }

    /// Start a request in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: ExecutionRequest) -> Submission {
        let (handle, abort) = JobHandle::new(JobId::new());
        let runner = self.clone();
        let id = handle.id();
        let task = tokio::spawn(async move { runner.execute_job(id, request, abort).await });
        Submission { handle, task }
    }

    /// Abort a submitted job
    ///
    /// Returns `false` if the job was already asked to stop.
    pub fn abort(&self, handle: &JobHandle) -> bool {
        let requested = handle.abort();
        if requested {
            info!(job_id = %handle.id(), "abort requested");
        }
        requested
    }

    /// Check that every external program a language needs is available
    pub async fn check_toolchain(&self, tag: &str) -> Result<(), RunError> {
        let language = pipeline::resolve(&self.config, tag)?;
        self.probe_toolchain(language).await
    }

    async fn probe_toolchain(&self, language: &Language) -> Result<(), RunError> {
        for toolchain in &language.toolchain {
            if self.config.cache_probes && self.probed.read().await.contains(&toolchain.probe) {
                continue;
            }

            process::probe(toolchain, self.config.probe_timeout())
                .await
                .map_err(|reason| RunError::ToolchainUnavailable {
                    toolchain: toolchain.name.clone(),
                    reason,
                })?;

            if self.config.cache_probes {
                self.probed.write().await.insert(toolchain.probe.clone());
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %id, language = %request.language))]
    async fn execute_job(
        &self,
        id: JobId,
        request: ExecutionRequest,
        mut abort: AbortSignal,
    ) -> ExecutionResponse {
        let _permit = match &self.limiter {
            Some(limiter) => match limiter.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return ExecutionResponse::failure(
                        RunError::Internal("job limiter closed".to_owned()).to_string(),
                        0.0,
                    );
                }
            },
            None => None,
        };

        let mut job = Job::new(id, request, &self.config.work_root());
        let (result, elapsed) = self.run_job(&mut job, &mut abort).await;

        if job.state() != JobState::CleaningUp {
            job.transition(JobState::CleaningUp);
        }
        job.transition(JobState::Terminal);

        match &result {
            Ok(_) => info!(elapsed = ?elapsed, "job succeeded"),
            Err(e) => info!(elapsed = ?elapsed, error = %e, "job failed"),
        }

        let feedback = self.feedback.analyze(job.source(), job.language());
        assemble::assemble(result, elapsed, feedback)
    }

    /// Everything up to and including cleanup
    async fn run_job(
        &self,
        job: &mut Job,
        abort: &mut AbortSignal,
    ) -> (Result<Vec<u8>, RunError>, Duration) {
        let prepared = async {
            let language = pipeline::resolve(&self.config, job.language())?;
            self.probe_toolchain(language).await?;
            if abort.is_aborted() {
                return Err(RunError::Aborted);
            }
            Ok::<_, RunError>(language)
        }
        .await;

        let language = match prepared {
            Ok(language) => language,
            Err(e) => {
                job.transition(JobState::Failed);
                return (Err(e), Duration::ZERO);
            }
        };

        job.transition(JobState::Materializing);
        let mut artifacts = match ArtifactSet::create(job.id(), job.work_dir()).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                job.transition(JobState::Failed);
                return (Err(RunError::MaterializationFailed(e)), Duration::ZERO);
            }
        };

        let outcome = self
            .run_pipeline(job, language, &mut artifacts, abort)
            .await;

        job.transition(JobState::CleaningUp);
        artifacts.cleanup().await;
        outcome
    }

    async fn run_pipeline(
        &self,
        job: &mut Job,
        language: &Language,
        artifacts: &mut ArtifactSet,
        abort: &mut AbortSignal,
    ) -> (Result<Vec<u8>, RunError>, Duration) {
        let staged = async {
            let source = materialize::materialize(artifacts, language, job.source())
                .await
                .map_err(RunError::MaterializationFailed)?;
            pipeline::select(language, &source, job.work_dir())
        }
        .await;

        let stages = match staged {
            Ok(stages) => stages,
            Err(e) => {
                job.transition(JobState::Failed);
                return (Err(e), Duration::ZERO);
            }
        };
        for output in stages.iter().filter_map(|stage| stage.output.as_ref()) {
            artifacts.register(output);
        }

        let stdin = job.stdin().map(|s| s.as_bytes().to_vec());
        let started = Instant::now();
        let deadline = job_deadline(started, self.config.deadline());
        let mut stdout = Vec::new();

        for stage in &stages {
            job.transition(JobState::Launching);
            debug!(stage = %stage.kind, command = %stage.command, "launching stage");

            let input = match stage.kind {
                StageKind::Run => stdin.as_deref(),
                StageKind::Compile => None,
            };
            let outcome = match self
                .supervisor
                .run(&stage.command, input, deadline, abort)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    job.transition(JobState::Failed);
                    return (Err(RunError::Internal(e.to_string())), started.elapsed());
                }
            };
            let elapsed = started.elapsed();

            if matches!(outcome, StageOutcome::Completed { .. }) {
                job.transition(JobState::Running);
            }

            let result = match assemble::classify(stage, outcome) {
                Ok(out) => check_output(stage).await.map(|()| out),
                Err(e) => Err(e),
            };

            match result {
                Ok(out) => {
                    job.transition(JobState::Succeeded);
                    stdout = out;
                }
                Err(e) => {
                    job.transition(match e {
                        RunError::TimedOut => JobState::TimedOut,
                        _ => JobState::Failed,
                    });
                    if stage.aborts_pipeline {
                        return (Err(e), elapsed);
                    }
                }
            }
        }

        (Ok(stdout), started.elapsed())
    }
}

/// Instant at which a job started at `started` runs out of time
///
/// Budgets too large to represent end roughly 30 years out.
fn job_deadline(started: Instant, budget: Duration) -> Instant {
    started
        .checked_add(budget)
        .unwrap_or_else(|| started + Duration::from_secs(86_400 * 365 * 30))
}

/// Make sure a successful stage left behind the file it promised
async fn check_output(stage: &Stage) -> Result<(), RunError> {
    let Some(output) = &stage.output else {
        return Ok(());
    };
    match tokio::fs::try_exists(output).await {
        Ok(true) => Ok(()),
        _ => Err(RunError::CompileFailed {
            diagnostics: format!(
                "compiler did not produce '{}'",
                output
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default()
            ),
        }),
    }
}

//! Stage supervision
//!
//! Runs one stage process to completion while racing it against the job
//! deadline and the job's abort signal.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::process::stream::pump;
use crate::process::{
    ProcessError, StageCommand, StreamAggregator, StreamKind, describe_spawn_error,
};

/// Result of running one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The process exited on its own
    Completed {
        /// Exit code if the program exited normally
        exit_code: Option<i32>,
        /// Signal number if the program was killed by a signal
        signal: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        /// Output exceeded the capture limit and was cut
        truncated: bool,
    },

    /// The job deadline expired and the process was killed
    TimedOut,

    /// The job was aborted through its handle and the process was killed
    Aborted,

    /// The process could not be started
    LaunchFailed { reason: String },
}

impl StageOutcome {
    /// Check if the stage exited with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StageOutcome::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }
}

/// Receiving side of a job's abort flag
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once an abort has been requested
    ///
    /// Pends forever if the sending side is dropped without aborting.
    pub async fn aborted(&mut self) {
        let fired = self.rx.wait_for(|aborted| *aborted).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

enum Termination {
    Exited(ExitStatus),
    TimedOut,
    Aborted,
}

/// Launches stage processes and enforces the job deadline
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    /// How long to wait for a killed child to be reaped, and for output
    /// streams to close after a normal exit
    kill_grace: Duration,
    /// Per-stream capture limit in bytes
    max_output: usize,
}

impl Supervisor {
    pub fn new(kill_grace: Duration, max_output: usize) -> Self {
        Self {
            kill_grace,
            max_output,
        }
    }

    /// Run a stage until it exits, the deadline passes or the job is aborted
    ///
    /// When `stdin` is given it is written to the child and the pipe is
    /// closed; otherwise the child's stdin is `/dev/null`. Only a failure to
    /// wait on a spawned child is reported as an error; everything else is
    /// a [`StageOutcome`].
    #[instrument(skip_all, fields(program = %command.program()))]
    pub async fn run(
        &self,
        command: &StageCommand,
        stdin: Option<&[u8]>,
        deadline: Instant,
        abort: &mut AbortSignal,
    ) -> Result<StageOutcome, ProcessError> {
        if abort.is_aborted() {
            return Ok(StageOutcome::Aborted);
        }
        if Instant::now() >= deadline {
            return Ok(StageOutcome::TimedOut);
        }

        let mut child = match command
            .build()
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(error = %e, "failed to spawn stage process");
                return Ok(StageOutcome::LaunchFailed {
                    reason: describe_spawn_error(command.program(), &e),
                });
            }
        };

        debug!(pid = child.id(), "spawned stage process");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(3);
        if let Some(stdout) = child.stdout.take() {
            tasks.push(tokio::spawn(pump(stdout, StreamKind::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(pump(stderr, StreamKind::Stderr, tx.clone())));
        }
        drop(tx);

        if let (Some(mut pipe), Some(data)) = (child.stdin.take(), stdin) {
            let data = data.to_vec();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&data).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    debug!(error = %e, "failed to write stdin");
                }
                // dropping the pipe closes the child's stdin
            }));
        }

        let mut aggregator = StreamAggregator::new(self.max_output);
        let mut streams_open = true;

        let termination = loop {
            tokio::select! {
                chunk = rx.recv(), if streams_open => match chunk {
                    Some(chunk) => aggregator.push(chunk),
                    None => streams_open = false,
                },
                status = child.wait() => match status {
                    Ok(status) => break Termination::Exited(status),
                    Err(e) => {
                        self.terminate(&mut child).await;
                        abort_tasks(&tasks);
                        return Err(ProcessError::Wait(e));
                    }
                },
                _ = tokio::time::sleep_until(deadline) => break Termination::TimedOut,
                _ = abort.aborted() => break Termination::Aborted,
            }
        };

        let status = match termination {
            Termination::Exited(status) => status,
            Termination::TimedOut => {
                debug!("deadline expired, killing stage process");
                self.terminate(&mut child).await;
                abort_tasks(&tasks);
                return Ok(StageOutcome::TimedOut);
            }
            Termination::Aborted => {
                debug!("job aborted, killing stage process");
                self.terminate(&mut child).await;
                abort_tasks(&tasks);
                return Ok(StageOutcome::Aborted);
            }
        };

        // A process that left children behind may keep the pipes open
        if streams_open {
            let drained = tokio::time::timeout(self.kill_grace, async {
                while let Some(chunk) = rx.recv().await {
                    aggregator.push(chunk);
                }
            })
            .await;
            if drained.is_err() {
                warn!("output streams still open after process exit, discarding the rest");
            }
        }
        abort_tasks(&tasks);

        let captured = aggregator.finish();
        if captured.truncated {
            warn!(limit = self.max_output, "stage output exceeded the capture limit");
        }

        let exit_code = status.code();
        let signal = exit_signal(&status);
        debug!(
            exit_code,
            signal,
            stdout_len = captured.stdout.len(),
            stderr_len = captured.stderr.len(),
            "stage process exited"
        );

        Ok(StageOutcome::Completed {
            exit_code,
            signal,
            stdout: captured.stdout,
            stderr: captured.stderr,
            truncated: captured.truncated,
        })
    }

    /// Kill the child and reap it, giving up after the grace period
    async fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.start_kill() {
            warn!(error = %e, "failed to kill stage process");
        }
        match tokio::time::timeout(self.kill_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "killed stage process reaped"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap killed stage process"),
            Err(_) => warn!("killed stage process was not reaped within the grace period"),
        }
    }
}

fn abort_tasks(tasks: &[JoinHandle<()>]) {
    for task in tasks {
        task.abort();
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

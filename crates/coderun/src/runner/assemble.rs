//! Turning stage outcomes into a response

use std::time::Duration;

use crate::process::StageOutcome;
use crate::runner::RunError;
use crate::runner::perf;
use crate::runner::pipeline::{Stage, StageKind};
use crate::types::{ExecutionResponse, Feedback};

/// Check a stage outcome against what the stage expects
///
/// On success returns the stage's stdout.
pub fn classify(stage: &Stage, outcome: StageOutcome) -> Result<Vec<u8>, RunError> {
    match outcome {
        StageOutcome::Completed {
            exit_code: Some(code),
            stdout,
            ..
        } if code == stage.expected_exit_code => Ok(stdout),

        StageOutcome::Completed {
            exit_code,
            signal,
            stdout,
            stderr,
            ..
        } => Err(match stage.kind {
            StageKind::Compile => RunError::CompileFailed {
                diagnostics: compile_diagnostics(exit_code, signal, &stdout, &stderr),
            },
            StageKind::Run => RunError::RuntimeFailed {
                exit_code,
                signal,
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            },
        }),

        StageOutcome::TimedOut => Err(RunError::TimedOut),
        StageOutcome::Aborted => Err(RunError::Aborted),
        StageOutcome::LaunchFailed { reason } => Err(RunError::LaunchFailed {
            stage: stage.kind,
            reason,
        }),
    }
}

/// Compiler output for the user: stderr, else stdout, else a summary
fn compile_diagnostics(
    exit_code: Option<i32>,
    signal: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.into_owned();
    }
    let stdout = String::from_utf8_lossy(stdout);
    if !stdout.trim().is_empty() {
        return stdout.into_owned();
    }
    match (exit_code, signal) {
        (_, Some(signal)) => format!("compiler terminated by signal {signal}"),
        (Some(code), None) => format!("compilation failed with exit code {code}"),
        (None, None) => "compilation failed".to_owned(),
    }
}

/// Build the response for a finished job
///
/// `elapsed` is the wall time from the first stage launch. Markers reported
/// by an instrumented program take precedence over it.
pub fn assemble(
    result: Result<Vec<u8>, RunError>,
    elapsed: Duration,
    feedback: Option<Feedback>,
) -> ExecutionResponse {
    let mut response = match result {
        Ok(stdout) => {
            let stdout = String::from_utf8_lossy(&stdout);
            let (output, markers) = perf::extract(&stdout);
            ExecutionResponse {
                output: output.to_owned(),
                errors: None,
                execution_time_seconds: markers
                    .map_or(elapsed.as_secs_f64(), |m| m.elapsed_seconds),
                memory_megabytes: markers.map_or(0.0, |m| m.memory_megabytes),
                feedback: None,
            }
        }
        Err(error) => ExecutionResponse::failure(error.user_message(), elapsed.as_secs_f64()),
    };
    response.feedback = feedback;
    response
}

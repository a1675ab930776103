//! External process handling
//!
//! This module launches and supervises the compile and run stages of a job:
//! command building, toolchain probes, stream capture and the deadline race.

use thiserror::Error;

pub use crate::process::command::StageCommand;
pub use crate::process::probe::probe;
pub use crate::process::stream::{CapturedOutput, StreamAggregator, StreamChunk, StreamKind};
pub use crate::process::supervisor::{AbortSignal, StageOutcome, Supervisor};

mod command;
mod probe;
mod stream;
mod supervisor;

/// Errors that occur while running external processes
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("{}", describe_spawn_error(.program, .source))]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ProbeFailed { program: String, status: String },

    #[error("'{program}' did not respond within {seconds:.1}s")]
    ProbeTimedOut { program: String, seconds: f64 },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Human readable reason for a failed spawn
pub fn describe_spawn_error(program: &str, error: &std::io::Error) -> String {
    match error.kind() {
        std::io::ErrorKind::NotFound => format!("command '{program}' not found"),
        std::io::ErrorKind::PermissionDenied => {
            format!("permission denied when executing '{program}'")
        }
        _ => format!("failed to spawn '{program}': {error}"),
    }
}

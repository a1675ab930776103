//! Toolchain probes
//!
//! A probe is a cheap version check (`gcc --version`, `javac -version`)
//! run before anything is written for a job, so a host without the
//! toolchain fails fast with a clear message.

use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::Toolchain;
use crate::process::{ProcessError, StageCommand};

/// Check that a toolchain can be invoked
#[instrument(skip(toolchain), fields(toolchain = %toolchain.name))]
pub async fn probe(toolchain: &Toolchain, timeout: Duration) -> Result<(), ProcessError> {
    let command = StageCommand::from_argv(toolchain.probe.iter().cloned())?;
    let program = command.program().to_owned();

    let mut child = command
        .build()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ProcessError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status.map_err(ProcessError::Wait)?,
        Err(_) => {
            // kill_on_drop reaps the probe when `child` goes out of scope
            let _ = child.start_kill();
            return Err(ProcessError::ProbeTimedOut {
                program,
                seconds: timeout.as_secs_f64(),
            });
        }
    };

    if !status.success() {
        return Err(ProcessError::ProbeFailed {
            program,
            status: status.to_string(),
        });
    }

    debug!("toolchain available");
    Ok(())
}
